//! CLI mínima:
//! `studyflow <plan|run|list> --study <mri|t2> [--artifact <name>] [--project <id>]
//!  [--snapshot <json>] [--subjects a,b] [--visits v1,v2] [--reprocess no|yes|all]
//!  [--option k=v]... [--graph <out.dot>] [--backend <name>] [--email <addr>]`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flow_adapters::studies;
use flow_core::{Archive, Backend, ConnectRequest, OptionSet, PipelineAssembler, ReprocessMode, WorkflowGraph};
use serde_json::Value;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::exec::{engine_for, LoggingRunner};
use crate::snapshot;

pub const USAGE: &str = "studyflow <plan|run|list> --study <name> [--artifact <name>] [--project <id>] \
                         [--snapshot <json>] [--subjects a,b] [--visits v1,v2] [--reprocess no|yes|all] \
                         [--option k=v]... [--graph <out.dot>] [--backend <name>] [--email <addr>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Arma el grafo sin ejecutarlo.
    Plan,
    Run,
    /// Lista los artifacts del estudio.
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub command: Command,
    pub study: String,
    pub artifact: Option<String>,
    pub project: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub subjects: Option<Vec<String>>,
    pub visits: Option<Vec<String>>,
    pub reprocess: ReprocessMode,
    pub options: OptionSet,
    pub graph: Option<PathBuf>,
    pub backend: Option<String>,
    pub email: Option<String>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// `k=v`; `v` se interpreta como JSON y, si no lo es, como texto.
fn parse_option(raw: &str) -> AppResult<(String, Value)> {
    let (key, value) = raw.split_once('=')
                          .ok_or_else(|| AppError::Usage(format!("option '{raw}' must be key=value")))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

pub fn parse_args(args: &[String]) -> AppResult<CliArgs> {
    let command = match args.first().map(String::as_str) {
        Some("plan") => Command::Plan,
        Some("run") => Command::Run,
        Some("list") => Command::List,
        _ => return Err(AppError::Usage(USAGE.into())),
    };
    let mut parsed = CliArgs { command,
                               study: String::new(),
                               artifact: None,
                               project: None,
                               snapshot: None,
                               subjects: None,
                               visits: None,
                               reprocess: ReprocessMode::No,
                               options: OptionSet::new(),
                               graph: None,
                               backend: None,
                               email: None };
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1)
                        .cloned()
                        .ok_or_else(|| AppError::Usage(format!("'{flag}' needs a value")))?;
        match flag {
            "--study" => parsed.study = value,
            "--artifact" => parsed.artifact = Some(value),
            "--project" => parsed.project = Some(value),
            "--snapshot" => parsed.snapshot = Some(PathBuf::from(value)),
            "--subjects" => parsed.subjects = Some(split_list(&value)),
            "--visits" => parsed.visits = Some(split_list(&value)),
            "--reprocess" => {
                parsed.reprocess = value.parse()
                                        .map_err(|_| AppError::Usage(format!("--reprocess must be no, yes or all (got '{value}')")))?
            }
            "--option" => {
                let (k, v) = parse_option(&value)?;
                parsed.options = parsed.options.with(k, v);
            }
            "--graph" => parsed.graph = Some(PathBuf::from(value)),
            "--backend" => parsed.backend = Some(value),
            "--email" => parsed.email = Some(value),
            other => return Err(AppError::Usage(format!("unknown flag '{other}'"))),
        }
        i += 2;
    }
    if parsed.study.is_empty() {
        return Err(AppError::Usage("--study is required".into()));
    }
    if parsed.command != Command::List && parsed.artifact.is_none() {
        return Err(AppError::Usage("--artifact is required".into()));
    }
    Ok(parsed)
}

fn export_graph(graph: &WorkflowGraph, path: &Path) -> AppResult<()> {
    fs::write(path, graph.to_dot()).map_err(|e| AppError::io(path, e))?;
    log::info!("graph written to {}", path.display());
    Ok(())
}

/// Tabla de artifacts del estudio: nombre, multiplicidad y formato.
fn list_schema(study_name: &str) -> AppResult<String> {
    let schema = studies::schema_by_name(study_name).ok_or_else(|| unknown_study(study_name))??;
    let lines: Vec<String> = schema.iter()
                                   .map(|s| format!("{}\t{}\t{}", s.name(), s.multiplicity(), s.format().name))
                                   .collect();
    Ok(lines.join("\n"))
}

fn unknown_study(name: &str) -> AppError {
    AppError::Config(format!("unknown study '{}' (known: {})", name, studies::known().join(", ")))
}

/// Estudio sobre el snapshot y la petición de conexión de `args`.
fn prepare(args: &CliArgs, config: &AppConfig) -> AppResult<(PipelineAssembler, ConnectRequest)> {
    let snapshot_path = args.snapshot
                            .clone()
                            .or_else(|| config.snapshot.clone())
                            .ok_or_else(|| AppError::Config("no snapshot given (--snapshot or STUDYFLOW_SNAPSHOT)".into()))?;
    let archive = snapshot::load_archive(&snapshot_path)?;
    let project = match &args.project {
        Some(p) => p.clone(),
        None => archive.project_ids()
                       .next()
                       .map(str::to_string)
                       .ok_or_else(|| AppError::Config("snapshot has no projects".into()))?,
    };
    let archive: Arc<dyn Archive> = Arc::new(archive);
    let study = studies::study_by_name(&args.study, &project, archive, args.options.clone())
        .ok_or_else(|| unknown_study(&args.study))??;

    let mut request = ConnectRequest::new().reprocess(args.reprocess);
    if let Some(subjects) = &args.subjects {
        request = request.subjects(subjects.iter().cloned());
    }
    if let Some(visits) = &args.visits {
        request = request.visits(visits.iter().cloned());
    }
    Ok((PipelineAssembler::new(study), request))
}

fn plan(args: &CliArgs, config: &AppConfig) -> AppResult<String> {
    let (assembler, request) = prepare(args, config)?;
    let assembly = assembler.connect_output(args.artifact.as_deref().unwrap_or_default(), &request)?;
    if let Some(path) = args.graph.as_ref().or(config.graph_path.as_ref()) {
        export_graph(&assembly.graph, path)?;
    }
    let steps: Vec<String> = assembly.traces
                                     .values()
                                     .map(|t| format!("{}\t{}\t{}", t.step, t.state(), t.work_set_size))
                                     .collect();
    Ok(format!("run {}: {} nodes\n{}", assembly.run_id, assembly.graph.len(), steps.join("\n")))
}

fn run(args: &CliArgs, config: &AppConfig) -> AppResult<String> {
    let mut settings = config.backend_settings();
    if args.email.is_some() {
        settings.email = args.email.clone();
    }
    let backend = Backend::from_name(args.backend.as_deref().unwrap_or(&config.backend), &settings)?;
    let (assembler, request) = prepare(args, config)?;
    let engine = engine_for(&backend, Arc::new(LoggingRunner), &config.work_dir);
    let step = assembler.study().step_for(args.artifact.as_deref().unwrap_or_default())?;
    let outcome = assembler.run(step, &request, &backend, engine.as_ref())?;
    if let Some(path) = args.graph.as_ref().or(config.graph_path.as_ref()) {
        export_graph(&outcome.assembly.graph, path)?;
    }
    let failed = outcome.report.as_ref().map_or(0, |r| r.failed().count());
    Ok(format!("run {}: {} ({} failed nodes)", outcome.assembly.run_id, outcome.state(), failed))
}

/// Ejecuta el comando y devuelve lo que se imprime por stdout.
pub fn execute(args: &CliArgs, config: &AppConfig) -> AppResult<String> {
    match args.command {
        Command::List => list_schema(&args.study),
        Command::Plan => plan(args, config),
        Command::Run => run(args, config),
    }
}
