//! Snapshot del archivo: proyecto → sujetos → sesiones.
//!
//! Se consulta una sola vez por invocación de nivel superior y se comparte
//! (sólo lectura) con todos los prerequisitos de esa corrida.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Referencia a una sesión: par (sujeto, visita).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionRef {
    pub subject_id: String,
    pub visit_id: String,
}

impl SessionRef {
    pub fn new(subject_id: impl Into<String>, visit_id: impl Into<String>) -> Self {
        Self { subject_id: subject_id.into(),
               visit_id: visit_id.into() }
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject '{}' visit '{}'", self.subject_id, self.visit_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub visit_id: String,
    #[serde(default)]
    pub archived: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Artifacts archivados a nivel sujeto.
    #[serde(default)]
    pub archived: BTreeSet<String>,
}

/// Artifacts archivados a nivel visita (agregado sobre sujetos).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    #[serde(default)]
    pub archived: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub visits: Vec<Visit>,
    /// Artifacts archivados a nivel proyecto.
    #[serde(default)]
    pub archived: BTreeSet<String>,
}

impl Project {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(),
               ..Default::default() }
    }

    /// Proyecto rectangular: cada sujeto tiene todas las visitas, sin datos.
    pub fn grid(id: impl Into<String>, subject_ids: &[&str], visit_ids: &[&str]) -> Self {
        let mut project = Self::new(id);
        for s in subject_ids {
            for v in visit_ids {
                project.add_session(s, v);
            }
        }
        project
    }

    /// Añade (si no existe) la sesión `subject_id`/`visit_id`.
    pub fn add_session(&mut self, subject_id: &str, visit_id: &str) -> &mut Session {
        if !self.visits.iter().any(|v| v.id == visit_id) {
            self.visits.push(Visit { id: visit_id.to_string(),
                                     archived: BTreeSet::new() });
        }
        let idx = match self.subjects.iter().position(|s| s.id == subject_id) {
            Some(i) => i,
            None => {
                self.subjects.push(Subject { id: subject_id.to_string(),
                                             sessions: vec![],
                                             archived: BTreeSet::new() });
                self.subjects.len() - 1
            }
        };
        let subject = &mut self.subjects[idx];
        let pos = match subject.sessions.iter().position(|s| s.visit_id == visit_id) {
            Some(p) => p,
            None => {
                subject.sessions.push(Session { visit_id: visit_id.to_string(),
                                                archived: BTreeSet::new() });
                subject.sessions.len() - 1
            }
        };
        &mut subject.sessions[pos]
    }

    pub fn mark_session(&mut self, subject_id: &str, visit_id: &str, key: impl Into<String>) {
        self.add_session(subject_id, visit_id).archived.insert(key.into());
    }

    pub fn mark_subject(&mut self, subject_id: &str, key: impl Into<String>) {
        if let Some(s) = self.subjects.iter_mut().find(|s| s.id == subject_id) {
            s.archived.insert(key.into());
        }
    }

    pub fn mark_visit(&mut self, visit_id: &str, key: impl Into<String>) {
        if let Some(v) = self.visits.iter_mut().find(|v| v.id == visit_id) {
            v.archived.insert(key.into());
        }
    }

    pub fn mark_project(&mut self, key: impl Into<String>) {
        self.archived.insert(key.into());
    }

    /// Todas las sesiones como `SessionRef`, en orden de archivo.
    pub fn session_refs(&self) -> impl Iterator<Item = SessionRef> + '_ {
        self.subjects
            .iter()
            .flat_map(|sub| sub.sessions.iter().map(move |s| SessionRef::new(&sub.id, &s.visit_id)))
    }

    pub fn subject(&self, subject_id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == subject_id)
    }

    pub fn session(&self, r: &SessionRef) -> Option<&Session> {
        self.subject(&r.subject_id)
            .and_then(|s| s.sessions.iter().find(|sess| sess.visit_id == r.visit_id))
    }

    /// ¿La visita tiene archivado `key`? Una visita sin entrada no tiene nada.
    pub fn visit_has(&self, visit_id: &str, key: &str) -> bool {
        self.visits
            .iter()
            .find(|v| v.id == visit_id)
            .map(|v| v.archived.contains(key))
            .unwrap_or(false)
    }

    /// Ids de visita presentes en alguna sesión (sin duplicados, ordenados).
    pub fn visit_ids(&self) -> BTreeSet<String> {
        self.session_refs().map(|r| r.visit_id).collect()
    }
}
