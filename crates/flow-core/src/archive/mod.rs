//! Colaborador de archivo.
//!
//! El core sólo necesita tres operaciones: tomar un snapshot del proyecto y
//! generar los nodos source/sink que leen y escriben artifacts. Los puertos
//! siguen una convención fija: un source expone `{name}_out` y un sink acepta
//! `{name}_in` más los campos de iteración que corresponden a su
//! multiplicidad.

mod memory;

pub use memory::InMemoryArchive;

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{INPUT_SUFFIX, OUTPUT_SUFFIX};
use crate::errors::{FlowError, FlowResult};
use crate::graph::{Node, NodeId, NodeKind};
use crate::model::{ArtifactSpec, Multiplicity, Project, SessionRef};
use crate::selector::WorkSet;

/// Nodo source y el puerto de salida de cada artifact.
#[derive(Debug, Clone)]
pub struct SourceBinding {
    pub node: Node,
    /// nombre de artifact → puerto (`{name}_out`)
    pub ports: BTreeMap<String, String>,
}

/// Nodo sink y el puerto de entrada de cada artifact.
#[derive(Debug, Clone)]
pub struct SinkBinding {
    pub node: Node,
    /// nombre de artifact → puerto (`{name}_in`)
    pub ports: BTreeMap<String, String>,
    pub multiplicity: Multiplicity,
}

pub trait Archive: Send + Sync + fmt::Debug {
    /// Snapshot del proyecto, opcionalmente restringido a sujetos/visitas.
    fn project(&self,
               project_id: &str,
               subject_filter: Option<&[String]>,
               visit_filter: Option<&[String]>)
               -> FlowResult<Project>;

    fn source(&self,
              project_id: &str,
              specs: &[&ArtifactSpec],
              study_name: &str,
              node: NodeId)
              -> FlowResult<SourceBinding>;

    fn sink(&self,
            project_id: &str,
            specs: &[&ArtifactSpec],
            multiplicity: Multiplicity,
            study_name: &str,
            node: NodeId,
            description: &str)
            -> FlowResult<SinkBinding>;
}

/// Binding de lectura con la convención de puertos estándar.
pub fn source_binding(project_id: &str, specs: &[&ArtifactSpec], study_name: &str, node: NodeId) -> SourceBinding {
    let ports = specs.iter()
                     .map(|s| (s.name().to_string(), format!("{}{}", s.name(), OUTPUT_SUFFIX)))
                     .collect();
    let kind = NodeKind::Source { project: project_id.to_string(),
                                  study: study_name.to_string(),
                                  artifacts: specs.iter().map(|s| s.archive_key(study_name)).collect() };
    SourceBinding { node: Node::plumbing(node, kind),
                    ports }
}

/// Binding de escritura con la convención de puertos estándar.
pub fn sink_binding(project_id: &str,
                    specs: &[&ArtifactSpec],
                    multiplicity: Multiplicity,
                    study_name: &str,
                    node: NodeId,
                    description: &str)
                    -> FlowResult<SinkBinding> {
    if let Some(bad) = specs.iter().find(|s| s.multiplicity() != multiplicity) {
        return Err(FlowError::Archive(format!("'{}' is {} but sink '{}' writes {}",
                                              bad.name(),
                                              bad.multiplicity(),
                                              node,
                                              multiplicity)));
    }
    let ports = specs.iter()
                     .map(|s| (s.name().to_string(), format!("{}{}", s.name(), INPUT_SUFFIX)))
                     .collect();
    let kind = NodeKind::Sink { project: project_id.to_string(),
                                study: study_name.to_string(),
                                multiplicity,
                                artifacts: specs.iter().map(|s| s.archive_key(study_name)).collect(),
                                description: description.to_string() };
    Ok(SinkBinding { node: Node::plumbing(node, kind),
                     ports,
                     multiplicity })
}

/// Verifica que los inputs primarios existan para todas las entradas
/// seleccionadas. Los inputs procesados no se verifican: los produce un
/// prerequisito.
pub fn check_primary_inputs(project: &Project,
                            inputs: &[&ArtifactSpec],
                            work_set: &WorkSet,
                            step: &str)
                            -> FlowResult<()> {
    for spec in inputs.iter().filter(|s| !s.is_processed()) {
        let key = spec.name();
        let missing: Option<String> = match spec.multiplicity() {
            Multiplicity::Session => work_set.iter()
                                             .find(|r| !session_has(project, r, key))
                                             .map(|r| r.to_string()),
            Multiplicity::Subject => work_set.subject_ids()
                                             .into_iter()
                                             .find(|s| !project.subject(s).map_or(false, |sub| sub.archived.contains(key)))
                                             .map(|s| format!("subject '{s}'")),
            Multiplicity::Visit => work_set.visit_ids()
                                           .into_iter()
                                           .find(|v| !project.visit_has(v, key))
                                           .map(|v| format!("visit '{v}'")),
            Multiplicity::Project => {
                (!project.archived.contains(key)).then(|| format!("project '{}'", project.id))
            }
        };
        if let Some(missing) = missing {
            log::warn!("step '{}': primary input '{}' missing for {}", step, key, missing);
            return Err(FlowError::missing_data(key, missing, step));
        }
    }
    Ok(())
}

fn session_has(project: &Project, r: &SessionRef, key: &str) -> bool {
    project.session(r).map_or(false, |s| s.archived.contains(key))
}
