//! Ensamblado del grafo completo de una corrida.
//!
//! Para cada step (el pedido y, recursivamente, sus prerequisitos):
//! selección incremental → espacio de iteración → prerequisitos → binding al
//! archivo → routing de outputs. Un `WorkSet` vacío omite el step sin error.
//! Todo el estado de la corrida (snapshot del proyecto, cache de
//! prerequisitos, grafo en construcción) vive en un `RunContext` que se
//! descarta al terminar `connect`.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::archive::check_primary_inputs;
use crate::constants::{CONVERSION_IN_PORT, CONVERSION_OUT_PORT, PREREQ_REPORTS_PORT, SUBJECT_ID_FIELD,
                       SUBJECT_SESSION_PAIRS_PORT, VISIT_ID_FIELD};
use crate::errors::{FlowError, FlowResult};
use crate::exec::{Backend, ExecutionEngine, ExecutionReport};
use crate::graph::{Node, NodeId, NodeKind, WorkflowGraph};
use crate::iteration::build_iteration_space;
use crate::model::{ArtifactSpec, Project, ReportToken};
use crate::prerequisites::{resolve_prerequisites, PrerequisiteConnector, RunCache};
use crate::router::{route_outputs, IterationNodes};
use crate::selector::{select_work, ReprocessMode, WorkSet};
use crate::step::{InvocationState, StepIdentity, StepSpec};
use crate::study::Study;

/// Parámetros de una invocación de nivel superior.
#[derive(Debug, Clone, Default)]
pub struct ConnectRequest {
    pub subject_filter: Option<Vec<String>>,
    pub visit_filter: Option<Vec<String>>,
    pub reprocess: ReprocessMode,
}

impl ConnectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.subject_filter = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn visits<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.visit_filter = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn reprocess(mut self, mode: ReprocessMode) -> Self {
        self.reprocess = mode;
        self
    }
}

/// Historia de estados de un step dentro de la corrida.
#[derive(Debug, Clone, Serialize)]
pub struct StepTrace {
    pub step: String,
    pub identity: StepIdentity,
    pub states: Vec<InvocationState>,
    pub work_set_size: usize,
    /// Prerequisitos cuyos tokens se esperan antes de leer.
    pub prerequisites: Vec<String>,
    pub report_node: Option<NodeId>,
}

impl StepTrace {
    fn new(step: &StepSpec) -> Self {
        Self { step: step.name().to_string(),
               identity: step.identity().clone(),
               states: vec![InvocationState::Unbuilt],
               work_set_size: 0,
               prerequisites: vec![],
               report_node: None }
    }

    pub fn state(&self) -> InvocationState {
        self.states.last().copied().unwrap_or(InvocationState::Unbuilt)
    }

    fn advance(&mut self, next: InvocationState) -> FlowResult<()> {
        let next = self.state().advance(next)?;
        log::debug!("step '{}': {} -> {}", self.step, self.state(), next);
        self.states.push(next);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.state().is_terminal() {
            self.states.push(InvocationState::Failed);
        }
    }
}

/// Resultado de `connect`: el grafo listo para el engine y el token del step
/// pedido (`None` si ya estaba al día).
#[derive(Debug, Clone)]
pub struct Assembly {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub step: String,
    pub graph: WorkflowGraph,
    pub token: Option<ReportToken>,
    pub traces: IndexMap<String, StepTrace>,
}

impl Assembly {
    pub fn is_skipped(&self) -> bool {
        self.token.is_none()
    }

    pub fn trace(&self, step: &str) -> Option<&StepTrace> {
        self.traces.get(step)
    }

    /// Estado final del step pedido.
    pub fn state(&self) -> InvocationState {
        self.trace(&self.step).map_or(InvocationState::Unbuilt, StepTrace::state)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub assembly: Assembly,
    pub report: Option<ExecutionReport>,
}

impl RunOutcome {
    pub fn state(&self) -> InvocationState {
        self.assembly.state()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineAssembler {
    study: Study,
}

impl PipelineAssembler {
    pub fn new(study: Study) -> Self {
        Self { study }
    }

    pub fn study(&self) -> &Study {
        &self.study
    }

    /// Conecta `step` (y sus prerequisitos) al archivo.
    pub fn connect(&self, step: StepSpec, request: &ConnectRequest) -> FlowResult<Assembly> {
        let study = &self.study;
        // El filtro de visitas lo aplica el selector: un output de proyecto
        // ausente necesita todas las sesiones.
        let project = study.archive()
                           .project(study.project_id(), request.subject_filter.as_deref(), None)?;
        let run_id = Uuid::new_v4();
        log::info!("run {}: connecting '{}' for study '{}' (reprocess={})",
                   run_id,
                   step.name(),
                   study.name(),
                   request.reprocess);
        let top = step.name().to_string();
        let mut ctx = RunContext { study,
                                   project,
                                   visit_filter: request.visit_filter.clone(),
                                   cache: RunCache::new(),
                                   graph: WorkflowGraph::new(format!("{}_{}", study.name(), top)),
                                   traces: IndexMap::new(),
                                   in_progress: vec![] };
        let token = ctx.connect_step(step, request.reprocess)?;
        Ok(Assembly { run_id,
                      created_at: Utc::now(),
                      step: top,
                      graph: ctx.graph,
                      token,
                      traces: ctx.traces })
    }

    /// Conecta el step que produce `artifact`.
    pub fn connect_output(&self, artifact: &str, request: &ConnectRequest) -> FlowResult<Assembly> {
        self.connect(self.study.step_for(artifact)?, request)
    }

    /// Conecta y ejecuta. Cada step programado pasa a `Reported` si su nodo
    /// de reporte terminó bien, o a `Failed` en otro caso.
    pub fn run(&self,
               step: StepSpec,
               request: &ConnectRequest,
               backend: &Backend,
               engine: &dyn ExecutionEngine)
               -> FlowResult<RunOutcome> {
        let mut assembly = self.connect(step, request)?;
        if assembly.is_skipped() {
            log::info!("run {}: '{}' is up to date, nothing to execute", assembly.run_id, assembly.step);
            return Ok(RunOutcome { assembly,
                                   report: None });
        }
        let report = engine.execute(&assembly.graph, backend)?;
        for trace in assembly.traces.values_mut() {
            if trace.state() != InvocationState::Scheduled {
                continue;
            }
            let ok = trace.report_node
                          .as_ref()
                          .and_then(|n| report.outcome(n.as_str()))
                          .map_or(false, |o| o.is_ok());
            if ok {
                trace.advance(InvocationState::Reported)?;
            } else {
                log::warn!("run {}: step '{}' failed", assembly.run_id, trace.step);
                trace.advance(InvocationState::Failed)?;
            }
        }
        Ok(RunOutcome { assembly,
                        report: Some(report) })
    }
}

struct RunContext<'a> {
    study: &'a Study,
    project: Project,
    visit_filter: Option<Vec<String>>,
    cache: RunCache,
    graph: WorkflowGraph,
    traces: IndexMap<String, StepTrace>,
    /// Pila de steps en construcción, para detectar ciclos.
    in_progress: Vec<String>,
}

impl RunContext<'_> {
    fn connect_step(&mut self, step: StepSpec, reprocess: ReprocessMode) -> FlowResult<Option<ReportToken>> {
        let study = self.study;
        let name = step.name().to_string();
        if self.in_progress.contains(&name) {
            return Err(FlowError::construction(&name,
                                               format!("cyclic prerequisite chain: {} -> {}",
                                                       self.in_progress.join(" -> "),
                                                       name)));
        }
        let mut trace = StepTrace::new(&step);
        trace.advance(InvocationState::SpecValidated)?;

        let outputs = step.outputs()
                          .map(|p| study.artifact(&p.name))
                          .collect::<FlowResult<Vec<&ArtifactSpec>>>()?;
        let work_set = select_work(&self.project, study.name(), &outputs, self.visit_filter.as_deref(), reprocess);
        trace.work_set_size = work_set.len();
        trace.advance(InvocationState::SelectionComputed)?;

        if work_set.is_empty() {
            log::info!("step '{}': outputs already archived, skipping", name);
            trace.advance(InvocationState::Skipped)?;
            self.traces.insert(name, trace);
            return Ok(None);
        }

        self.in_progress.push(name.clone());
        let result = self.schedule(&step, &work_set, reprocess, &mut trace);
        self.in_progress.pop();
        match result {
            Ok(token) => {
                log::info!("step '{}' scheduled over {} session(s) [{}]",
                           name,
                           work_set.len(),
                           step.identity().short());
                trace.report_node = Some(token.node.clone());
                self.traces.insert(name, trace);
                Ok(Some(token))
            }
            Err(e) => {
                trace.fail();
                self.traces.insert(name, trace);
                Err(e)
            }
        }
    }

    fn schedule(&mut self,
                step: &StepSpec,
                work_set: &WorkSet,
                reprocess: ReprocessMode,
                trace: &mut StepTrace)
                -> FlowResult<ReportToken> {
        let study = self.study;
        let name = step.name();
        let space = build_iteration_space(work_set);

        let subjects = self.graph.add_node(Node::plumbing(NodeId::namespaced(name, "subjects"),
                                                          NodeKind::SubjectIterator { subjects: space.subjects.clone() }))?;
        let item_source = (!space.is_uniform()).then(|| subjects.clone());
        let sessions = self.graph.add_node(Node::plumbing(NodeId::namespaced(name, "sessions"),
                                                          NodeKind::SessionIterator { visits: space.visits.clone(),
                                                                                      item_source }))?;
        self.graph.connect(&subjects, SUBJECT_ID_FIELD, &sessions, SUBJECT_ID_FIELD)?;

        let tokens = {
            let mut nested = Nested { ctx: &mut *self,
                                      reprocess: reprocess.for_prerequisites() };
            resolve_prerequisites(study, step, &mut nested)?
        };
        trace.prerequisites = tokens.iter().map(|t| t.step.clone()).collect();
        trace.advance(InvocationState::PrerequisitesResolved)?;
        if !tokens.is_empty() {
            let merge = self.graph.add_node(Node::plumbing(NodeId::namespaced(name, "prereq_reports"),
                                                           NodeKind::Merge { inputs: tokens.len() }))?;
            for (i, token) in tokens.iter().enumerate() {
                self.graph
                    .connect(&token.node, SUBJECT_SESSION_PAIRS_PORT, &merge, &format!("in{}", i + 1))?;
            }
            self.graph.connect(&merge, "out", &subjects, PREREQ_REPORTS_PORT)?;
        }

        let inputs = step.inputs()
                         .iter()
                         .map(|p| study.artifact(&p.name))
                         .collect::<FlowResult<Vec<&ArtifactSpec>>>()?;
        check_primary_inputs(&self.project, &inputs, work_set, name)?;
        self.graph.absorb(step.graph().clone())?;
        let input_node = step.input_node();
        if !inputs.is_empty() {
            let source = study.archive()
                              .source(study.project_id(), &inputs, study.name(), NodeId::namespaced(name, "source"))?;
            let ports = source.ports.clone();
            let source_id = self.graph.add_node(source.node)?;
            self.graph.connect(&subjects, SUBJECT_ID_FIELD, &source_id, SUBJECT_ID_FIELD)?;
            self.graph.connect(&sessions, VISIT_ID_FIELD, &source_id, VISIT_ID_FIELD)?;
            for (port, spec) in step.inputs().iter().zip(inputs.iter()) {
                let out_port = ports.get(spec.name())
                                    .ok_or_else(|| FlowError::Internal(format!("source has no port for '{}'", spec.name())))?;
                if &port.format != spec.format() {
                    let conv = study.converter()
                                    .convert(spec.name(),
                                             spec.format(),
                                             &port.format,
                                             NodeId::namespaced(name, &format!("{}_input_conversion", spec.name())))?;
                    let conv = self.graph.add_node(conv)?;
                    self.graph.connect(&source_id, out_port, &conv, CONVERSION_IN_PORT)?;
                    self.graph.connect(&conv, CONVERSION_OUT_PORT, input_node, &port.name)?;
                } else {
                    self.graph.connect(&source_id, out_port, input_node, &port.name)?;
                }
            }
        }
        self.graph.connect(&subjects, SUBJECT_ID_FIELD, input_node, SUBJECT_ID_FIELD)?;
        self.graph.connect(&sessions, VISIT_ID_FIELD, input_node, VISIT_ID_FIELD)?;
        trace.advance(InvocationState::ArchiveBound)?;

        let token = route_outputs(&mut self.graph,
                                  study,
                                  step,
                                  &space,
                                  &IterationNodes { subjects, sessions })?;
        trace.advance(InvocationState::Scheduled)?;
        Ok(token)
    }
}

/// Conecta prerequisitos sobre el mismo `RunContext` con el modo de
/// reprocesamiento propagado.
struct Nested<'r, 'a> {
    ctx: &'r mut RunContext<'a>,
    reprocess: ReprocessMode,
}

impl PrerequisiteConnector for Nested<'_, '_> {
    fn cache(&mut self) -> &mut RunCache {
        &mut self.ctx.cache
    }

    fn connect_prerequisite(&mut self, step: StepSpec) -> FlowResult<Option<ReportToken>> {
        self.ctx.connect_step(step, self.reprocess)
    }
}
