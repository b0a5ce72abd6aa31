use indexmap::IndexMap;

use crate::errors::{FlowError, FlowResult};
use crate::graph::NodeId;
use crate::model::{ArtifactSpec, Multiplicity, Project};

use super::{sink_binding, source_binding, Archive, SinkBinding, SourceBinding};

/// Archivo en memoria: un snapshot por proyecto.
///
/// Útil en tests y para planificar a partir de un snapshot JSON.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArchive {
    projects: IndexMap<String, Project>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.insert(project);
        self
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn project_ids(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    fn get(&self, project_id: &str) -> FlowResult<&Project> {
        self.projects
            .get(project_id)
            .ok_or_else(|| FlowError::Archive(format!("unknown project '{project_id}'")))
    }
}

impl Archive for InMemoryArchive {
    fn project(&self,
               project_id: &str,
               subject_filter: Option<&[String]>,
               visit_filter: Option<&[String]>)
               -> FlowResult<Project> {
        let mut project = self.get(project_id)?.clone();
        if let Some(subjects) = subject_filter {
            project.subjects.retain(|s| subjects.contains(&s.id));
        }
        if let Some(visits) = visit_filter {
            for sub in project.subjects.iter_mut() {
                sub.sessions.retain(|s| visits.contains(&s.visit_id));
            }
            project.visits.retain(|v| visits.contains(&v.id));
        }
        Ok(project)
    }

    fn source(&self,
              project_id: &str,
              specs: &[&ArtifactSpec],
              study_name: &str,
              node: NodeId)
              -> FlowResult<SourceBinding> {
        self.get(project_id)?;
        Ok(source_binding(project_id, specs, study_name, node))
    }

    fn sink(&self,
            project_id: &str,
            specs: &[&ArtifactSpec],
            multiplicity: Multiplicity,
            study_name: &str,
            node: NodeId,
            description: &str)
            -> FlowResult<SinkBinding> {
        self.get(project_id)?;
        sink_binding(project_id, specs, multiplicity, study_name, node, description)
    }
}
