//! Carga de snapshots del archivo desde JSON.
//!
//! Un snapshot es un `Project` serializado (o una lista de ellos). Las visitas
//! que aparecen en sesiones pero no en `visits` se agregan al cargar.

use std::fs;
use std::path::Path;

use flow_core::{InMemoryArchive, Project};

use crate::errors::{AppError, AppResult};

/// Completa la lista de visitas con las que sólo aparecen en sesiones.
fn normalize(mut project: Project) -> Project {
    let pairs: Vec<_> = project.session_refs().collect();
    for r in pairs {
        project.add_session(&r.subject_id, &r.visit_id);
    }
    project
}

pub fn parse_projects(json: &str) -> AppResult<Vec<Project>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let projects: Vec<Project> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    if projects.is_empty() {
        return Err(AppError::Config("snapshot has no projects".into()));
    }
    Ok(projects.into_iter().map(normalize).collect())
}

pub fn load_archive(path: &Path) -> AppResult<InMemoryArchive> {
    let json = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let mut archive = InMemoryArchive::new();
    for project in parse_projects(&json)? {
        log::debug!("snapshot {}: project '{}' ({} subjects)", path.display(), project.id, project.subjects.len());
        archive.insert(project);
    }
    Ok(archive)
}
