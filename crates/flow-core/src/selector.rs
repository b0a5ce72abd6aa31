//! Selector incremental: diff entre outputs deseados y contenido del archivo.
//!
//! Resultado vacío = todo al día; el assembler omite el step (éxito, sin
//! token). El selector nunca consulta el archivo: trabaja sobre el snapshot
//! `Project` tomado al inicio de la corrida.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::FlowError;
use crate::model::{ArtifactSpec, Multiplicity, Project, SessionRef};

/// Política de reprocesamiento de una invocación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReprocessMode {
    /// Sólo lo que falta.
    #[default]
    No,
    /// Todo el step pedido; los prerequisitos no se fuerzan.
    Yes,
    /// Todo el step pedido y, recursivamente, sus prerequisitos.
    All,
}

impl ReprocessMode {
    pub fn forces(&self) -> bool {
        !matches!(self, Self::No)
    }

    /// Modo con el que se conectan los prerequisitos: sólo `All` se propaga.
    pub fn for_prerequisites(&self) -> Self {
        match self {
            Self::All => Self::All,
            _ => Self::No,
        }
    }
}

impl FromStr for ReprocessMode {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "false" | "no" | "" => Ok(Self::No),
            "true" | "yes" => Ok(Self::Yes),
            "all" => Ok(Self::All),
            other => Err(FlowError::unsupported(format!("unknown reprocess mode '{other}'"))),
        }
    }
}

impl fmt::Display for ReprocessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
                        Self::No => "false",
                        Self::Yes => "true",
                        Self::All => "all",
                    })
    }
}

/// Sesiones que requieren (re)procesamiento, en orden (sujeto, visita).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkSet(BTreeSet<SessionRef>);

impl WorkSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, session: &SessionRef) -> bool {
        self.0.contains(session)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRef> {
        self.0.iter()
    }

    /// Sujetos derivables del conjunto de sesiones.
    pub fn subject_ids(&self) -> BTreeSet<&str> {
        self.0.iter().map(|s| s.subject_id.as_str()).collect()
    }

    /// Visitas derivables del conjunto de sesiones.
    pub fn visit_ids(&self) -> BTreeSet<&str> {
        self.0.iter().map(|s| s.visit_id.as_str()).collect()
    }
}

impl FromIterator<SessionRef> for WorkSet {
    fn from_iter<I: IntoIterator<Item = SessionRef>>(iter: I) -> Self {
        WorkSet(iter.into_iter().collect())
    }
}

impl Extend<SessionRef> for WorkSet {
    fn extend<I: IntoIterator<Item = SessionRef>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// Calcula el conjunto mínimo de sesiones a procesar para producir
/// `outputs`.
///
/// - `reprocess` distinto de `No`: todas las sesiones del proyecto.
/// - output de proyecto ausente: todas las sesiones, ignorando `visit_filter`
///   (un agregado global no admite recomputación parcial).
/// - output por sujeto / por visita ausente: todas las sesiones del sujeto /
///   de la visita, filtradas por `visit_filter`.
/// - output por sesión ausente: esa sesión, filtrada por `visit_filter`.
pub fn select_work(project: &Project,
                   study_name: &str,
                   outputs: &[&ArtifactSpec],
                   visit_filter: Option<&[String]>,
                   reprocess: ReprocessMode)
                   -> WorkSet {
    if reprocess.forces() {
        return project.session_refs().collect();
    }
    let passes = |visit_id: &str| visit_filter.map_or(true, |f| f.iter().any(|v| v == visit_id));
    let passes = &passes;
    let mut selected = WorkSet::default();
    for output in outputs {
        let key = output.archive_key(study_name);
        let key = key.as_str();
        match output.multiplicity() {
            Multiplicity::Project => {
                if !project.archived.contains(key) {
                    return project.session_refs().collect();
                }
            }
            Multiplicity::Subject => {
                selected.extend(project.subjects
                                       .iter()
                                       .filter(|sub| !sub.archived.contains(key))
                                       .flat_map(move |sub| {
                                           sub.sessions
                                              .iter()
                                              .filter(move |s| passes(&s.visit_id))
                                              .map(move |s| SessionRef::new(&sub.id, &s.visit_id))
                                       }));
            }
            Multiplicity::Visit => {
                selected.extend(project.session_refs()
                                       .filter(|r| passes(&r.visit_id) && !project.visit_has(&r.visit_id, key)));
            }
            Multiplicity::Session => {
                selected.extend(project.subjects.iter().flat_map(move |sub| {
                                                           sub.sessions
                                                              .iter()
                                                              .filter(move |s| passes(&s.visit_id) && !s.archived.contains(key))
                                                              .map(move |s| SessionRef::new(&sub.id, &s.visit_id))
                                                       }));
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FlowResult;
    use crate::model::{FileFormat, OptionSet};
    use crate::registry::StepFactory;
    use crate::step::StepSpec;
    use crate::study::Study;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Unused;

    impl StepFactory for Unused {
        fn name(&self) -> &str {
            "unused"
        }

        fn build(&self, _study: &Study, _options: &OptionSet) -> FlowResult<StepSpec> {
            Err(FlowError::Internal("not built in selector tests".into()))
        }
    }

    fn derived(name: &str, level: Multiplicity) -> ArtifactSpec {
        ArtifactSpec::derived(name, &FileFormat::new("nifti", ".nii"), level, Arc::new(Unused))
    }

    #[test]
    fn reprocess_mode_parses_flags() {
        assert_eq!("".parse::<ReprocessMode>().unwrap(), ReprocessMode::No);
        assert_eq!("True".parse::<ReprocessMode>().unwrap(), ReprocessMode::Yes);
        assert_eq!("all".parse::<ReprocessMode>().unwrap().for_prerequisites(), ReprocessMode::All);
        assert_eq!(ReprocessMode::Yes.for_prerequisites(), ReprocessMode::No);
        assert!("sometimes".parse::<ReprocessMode>().is_err());
    }

    #[test]
    fn selection_is_idempotent_and_empties_once_outputs_are_archived() {
        let mut project = Project::grid("P", &["A", "B"], &["1", "2"]);
        let brain = derived("brain", Multiplicity::Session);
        let first = select_work(&project, "S", &[&brain], None, ReprocessMode::No);
        let second = select_work(&project, "S", &[&brain], None, ReprocessMode::No);
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);

        for r in project.session_refs().collect::<Vec<_>>() {
            project.mark_session(&r.subject_id, &r.visit_id, brain.archive_key("S"));
        }
        assert!(select_work(&project, "S", &[&brain], None, ReprocessMode::No).is_empty());
        assert_eq!(select_work(&project, "S", &[&brain], None, ReprocessMode::Yes).len(), 4);
    }

    #[test]
    fn missing_project_output_ignores_visit_filter() {
        let project = Project::grid("P", &["A", "B"], &["1", "2", "3"]);
        let template = derived("template", Multiplicity::Project);
        let filter = vec!["1".to_string()];
        let ws = select_work(&project, "S", &[&template], Some(&filter), ReprocessMode::No);
        assert_eq!(ws.len(), 6);
    }

    #[test]
    fn missing_visit_output_selects_only_that_visit() {
        let mut project = Project::grid("P", &["A", "B", "C"], &["1", "2"]);
        let qc = derived("qc", Multiplicity::Visit);
        project.mark_visit("1", qc.archive_key("S"));
        let ws = select_work(&project, "S", &[&qc], None, ReprocessMode::No);
        assert_eq!(ws.len(), 3);
        assert!(ws.iter().all(|r| r.visit_id == "2"));
    }

    #[test]
    fn missing_subject_output_selects_filtered_sessions_of_that_subject() {
        let mut project = Project::grid("P", &["A", "B"], &["1", "2"]);
        let mean = derived("mean", Multiplicity::Subject);
        project.mark_subject("A", mean.archive_key("S"));
        let filter = vec!["2".to_string()];
        let ws = select_work(&project, "S", &[&mean], Some(&filter), ReprocessMode::No);
        assert_eq!(ws.iter().cloned().collect::<Vec<_>>(), vec![SessionRef::new("B", "2")]);
    }

    #[test]
    fn derived_keys_are_scoped_by_study() {
        let mut project = Project::grid("P", &["A"], &["1"]);
        let brain = derived("brain", Multiplicity::Session);
        // mismo nombre archivado por otro estudio
        project.mark_session("A", "1", brain.archive_key("other"));
        assert_eq!(select_work(&project, "S", &[&brain], None, ReprocessMode::No).len(), 1);
    }
}
