use std::fs;
use std::path::PathBuf;

use flow_core::{Project, ReprocessMode};
use studyflow::cli::{execute, parse_args, CliArgs};
use studyflow::config::AppConfig;
use studyflow::AppError;

fn scratch() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("studyflow-e2e-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Snapshot 2×2 con DICOM y referencia; `s2/v2` sin DICOM si `gap`.
fn write_snapshot(dir: &PathBuf, gap: bool) -> PathBuf {
    let mut project = Project::grid("P", &["s1", "s2"], &["v1", "v2"]);
    for r in project.session_refs().collect::<Vec<_>>() {
        if !(gap && r.subject_id == "s2" && r.visit_id == "v2") {
            project.mark_session(&r.subject_id, &r.visit_id, "primary");
        }
        project.mark_session(&r.subject_id, &r.visit_id, "coreg_ref_brain");
    }
    let path = dir.join("snapshot.json");
    fs::write(&path, serde_json::to_string(&project).unwrap()).unwrap();
    path
}

fn config(dir: &PathBuf, backend: &str, email: Option<&str>) -> AppConfig {
    let dir = dir.clone();
    let backend = backend.to_string();
    let email = email.map(str::to_string);
    AppConfig::from_lookup(move |key| match key {
        "STUDYFLOW_WORK_DIR" => Some(dir.join("work").display().to_string()),
        "STUDYFLOW_BACKEND" => Some(backend.clone()),
        "EMAIL" => email.clone(),
        _ => None,
    })
}

fn cli(raw: &[&str], snapshot: &PathBuf) -> CliArgs {
    let mut args: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
    args.push("--snapshot".into());
    args.push(snapshot.display().to_string());
    parse_args(&args).unwrap()
}

#[test]
fn plan_exports_the_graph_and_lists_steps() {
    let dir = scratch();
    let snapshot = write_snapshot(&dir, false);
    let dot = dir.join("graph.dot");
    let args = cli(&["plan", "--study", "mri", "--artifact", "coreg_brain", "--graph", &dot.display().to_string()],
                   &snapshot);
    let out = execute(&args, &config(&dir, "linear", None)).unwrap();
    assert!(out.contains("preproc\tScheduled\t4"), "{out}");
    assert!(out.contains("linear_coreg"));
    assert!(fs::read_to_string(&dot).unwrap().starts_with("digraph"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn linear_run_reports_every_step() {
    let dir = scratch();
    let snapshot = write_snapshot(&dir, false);
    let args = cli(&["run", "--study", "t2", "--artifact", "brain"], &snapshot);
    let out = execute(&args, &config(&dir, "linear", None)).unwrap();
    assert!(out.contains("(0 failed nodes)"), "{out}");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn slurm_needs_an_email() {
    let dir = scratch();
    let snapshot = write_snapshot(&dir, false);
    let args = cli(&["run", "--study", "mri", "--artifact", "preproc"], &snapshot);
    let err = execute(&args, &config(&dir, "slurm", None)).unwrap_err();
    assert_eq!(err.exit_code(), 3);

    let out = execute(&args, &config(&dir, "slurm", Some("lab@example.org"))).unwrap();
    assert!(out.contains("(0 failed nodes)"), "{out}");
    assert!(dir.join("work").join("submit.sh").exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_dicom_is_reported_with_exit_code_four() {
    let dir = scratch();
    let snapshot = write_snapshot(&dir, true);
    let mut args = cli(&["plan", "--study", "mri", "--artifact", "brain"], &snapshot);
    let err = execute(&args, &config(&dir, "linear", None)).unwrap_err();
    assert!(matches!(err, AppError::Flow(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(err.to_string().contains("subject 's2' visit 'v2'"), "{err}");

    // filtrando el sujeto incompleto se puede planificar
    args.subjects = Some(vec!["s1".into()]);
    args.reprocess = ReprocessMode::No;
    assert!(execute(&args, &config(&dir, "linear", None)).is_ok());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn list_prints_the_schema() {
    let dir = scratch();
    let snapshot = write_snapshot(&dir, false);
    let out = execute(&cli(&["list", "--study", "t2"], &snapshot), &config(&dir, "linear", None)).unwrap();
    assert!(out.lines().any(|l| l.starts_with("manual_wmh_mask\t")));
    assert!(out.lines().any(|l| l.starts_with("template\t")));
    let _ = fs::remove_dir_all(&dir);
}
