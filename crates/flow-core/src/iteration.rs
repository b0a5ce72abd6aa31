//! Espacio de iteración de dos niveles (sujeto × visita).
//!
//! Cuando todos los ids de visita seleccionados están presentes para el mismo
//! conjunto de sujetos el eje de visitas es una lista plana compartida
//! (producto cartesiano, permite joins por visita entre sujetos). Si no, el eje
//! se "alimenta" del eje de sujetos con un mapa explícito sujeto → visitas,
//! de modo que nunca se generan pares (sujeto, visita) inexistentes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::SessionRef;
use crate::selector::WorkSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "binding", content = "visits", rename_all = "snake_case")]
pub enum VisitAxis {
    /// Mismas visitas para todos los sujetos.
    Uniform(Vec<String>),
    /// Visitas explícitas por sujeto.
    PerSubject(BTreeMap<String, Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSpace {
    pub subjects: Vec<String>,
    pub visits: VisitAxis,
}

impl IterationSpace {
    pub fn is_uniform(&self) -> bool {
        matches!(self.visits, VisitAxis::Uniform(_))
    }

    /// Visitas sobre las que itera `subject_id`.
    pub fn visits_of(&self, subject_id: &str) -> &[String] {
        match &self.visits {
            VisitAxis::Uniform(v) => v,
            VisitAxis::PerSubject(map) => map.get(subject_id).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    /// Pares (sujeto, visita) que genera la iteración, sujeto por sujeto.
    pub fn pairs(&self) -> Vec<SessionRef> {
        self.subjects
            .iter()
            .flat_map(|s| self.visits_of(s).iter().map(move |v| SessionRef::new(s, v)))
            .collect()
    }

    /// Visitas distintas en orden de primera aparición.
    pub fn distinct_visits(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for s in &self.subjects {
            for v in self.visits_of(s) {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
        }
        out
    }
}

pub fn build_iteration_space(work_set: &WorkSet) -> IterationSpace {
    let subjects: BTreeSet<&str> = work_set.iter().map(|s| s.subject_id.as_str()).collect();
    let mut visit_subjects: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for s in work_set.iter() {
        visit_subjects.entry(s.visit_id.as_str()).or_default().insert(s.subject_id.as_str());
    }
    let uniform = visit_subjects.values().all(|subs| *subs == subjects);
    let visits = if uniform {
        VisitAxis::Uniform(visit_subjects.keys().map(|v| v.to_string()).collect())
    } else {
        let mut per_subject: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for s in work_set.iter() {
            per_subject.entry(s.subject_id.clone()).or_default().push(s.visit_id.clone());
        }
        VisitAxis::PerSubject(per_subject)
    };
    log::debug!("iteration space: {} subjects, uniform={}", subjects.len(), uniform);
    IterationSpace { subjects: subjects.into_iter().map(String::from).collect(),
                     visits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(pairs: &[(&str, &str)]) -> WorkSet {
        pairs.iter().map(|(s, v)| SessionRef::new(*s, *v)).collect()
    }

    #[test]
    fn identical_visit_sets_bind_flat_axis() {
        let space = build_iteration_space(&ws(&[("A", "1"), ("A", "2"), ("B", "1"), ("B", "2")]));
        assert_eq!(space.visits, VisitAxis::Uniform(vec!["1".into(), "2".into()]));
        assert_eq!(space.pairs().len(), 4);
    }

    #[test]
    fn disjoint_visit_sets_bind_sourced_axis() {
        let space = build_iteration_space(&ws(&[("A", "1"), ("B", "2")]));
        assert!(!space.is_uniform());
        // sin pares inexistentes (A,2) o (B,1)
        assert_eq!(space.pairs(), vec![SessionRef::new("A", "1"), SessionRef::new("B", "2")]);
        assert_eq!(space.distinct_visits(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn partially_overlapping_visits_are_not_uniform() {
        let space = build_iteration_space(&ws(&[("A", "1"), ("A", "2"), ("B", "1")]));
        assert!(!space.is_uniform());
        assert_eq!(space.visits_of("B"), &["1".to_string()]);
    }
}
