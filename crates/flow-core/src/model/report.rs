//! Tokens de reporte: la única primitiva de orden entre steps.
//!
//! Un `ReportToken` representa "el conjunto de entradas del archivo cuyos
//! outputs del step X fueron escritos". Se produce uno por invocación de step
//! y sólo vive durante una llamada `connect` de nivel superior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::graph::NodeId;
use crate::step::StepIdentity;

use super::SessionRef;

/// Entradas completadas por un step, agregadas por multiplicidad.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Pares (sujeto, sesión) escritos por outputs por sesión.
    pub session_pairs: Vec<SessionRef>,
    /// Sujetos escritos por outputs por sujeto.
    pub subjects: Vec<String>,
    /// Visitas escritas por outputs por visita.
    pub visits: Vec<String>,
    /// Proyecto escrito por outputs de proyecto.
    pub project: Option<String>,
}

impl Completion {
    /// Une dos completions sin duplicar entradas (orden de primera aparición).
    pub fn merge(mut self, other: Completion) -> Completion {
        let mut seen: BTreeSet<SessionRef> = self.session_pairs.iter().cloned().collect();
        for p in other.session_pairs {
            if seen.insert(p.clone()) {
                self.session_pairs.push(p);
            }
        }
        for s in other.subjects {
            if !self.subjects.contains(&s) {
                self.subjects.push(s);
            }
        }
        for v in other.visits {
            if !self.visits.contains(&v) {
                self.visits.push(v);
            }
        }
        if self.project.is_none() {
            self.project = other.project;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.session_pairs.is_empty() && self.subjects.is_empty() && self.visits.is_empty() && self.project.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportToken {
    /// Step que emitió el token.
    pub step: String,
    /// Identidad del step emisor.
    pub identity: StepIdentity,
    /// Nodo de reporte del grafo; los dependientes se conectan a él.
    pub node: NodeId,
    pub completion: Completion,
}
