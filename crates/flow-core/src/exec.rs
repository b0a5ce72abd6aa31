//! Contrato con el engine de ejecución externo.
//!
//! El core sólo entrega el grafo y el backend elegido; el engine devuelve el
//! resultado por nodo. Las implementaciones concretas (local, batch) viven
//! fuera del core.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{FlowError, FlowResult};
use crate::graph::WorkflowGraph;

/// Tipos de notificación por defecto de un backend batch.
pub const DEFAULT_MAIL_ON: [&str; 2] = ["END", "FAIL"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum Backend {
    /// Secuencial, en orden topológico.
    Linear,
    /// Local en paralelo por oleadas de dependencias.
    MultiProc { max_parallel: usize },
    /// Un job por nodo en una cola SLURM.
    Slurm { email: String, mail_on: Vec<String> },
}

/// Parámetros opcionales para construir un backend por nombre.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub max_parallel: Option<usize>,
    pub email: Option<String>,
    pub mail_on: Option<Vec<String>>,
}

impl Backend {
    /// `linear`, `multiproc` o `slurm`; cualquier otro nombre, o `slurm` sin
    /// email, es `UnsupportedConfiguration`.
    pub fn from_name(name: &str, settings: &BackendSettings) -> FlowResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "multiproc" => Ok(Self::MultiProc { max_parallel: settings.max_parallel.unwrap_or(0) }),
            "slurm" => {
                let email = settings.email
                                    .clone()
                                    .filter(|e| !e.trim().is_empty())
                                    .ok_or_else(|| {
                                        FlowError::unsupported("'slurm' backend needs a notification email (set EMAIL)")
                                    })?;
                let mail_on = settings.mail_on
                                      .clone()
                                      .unwrap_or_else(|| DEFAULT_MAIL_ON.iter().map(|m| m.to_string()).collect());
                Ok(Self::Slurm { email, mail_on })
            }
            other => Err(FlowError::unsupported(format!("unknown execution backend '{other}'"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::MultiProc { .. } => "multiproc",
            Self::Slurm { .. } => "slurm",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum NodeOutcome {
    Succeeded,
    Failed(String),
    /// No se ejecutó porque falló una dependencia.
    Skipped,
    /// Enviado a una cola externa; el resultado no se conoce aún.
    Submitted,
}

impl NodeOutcome {
    /// ¿El nodo terminó (o quedó encolado) sin error?
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Submitted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    outcomes: IndexMap<String, NodeOutcome>,
}

impl ExecutionReport {
    pub fn new(backend: &Backend) -> Self {
        Self { backend: backend.name().to_string(),
               started_at: Utc::now(),
               finished_at: None,
               outcomes: IndexMap::new() }
    }

    pub fn record(&mut self, node: impl Into<String>, outcome: NodeOutcome) {
        self.outcomes.insert(node.into(), outcome);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn outcome(&self, node: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(node)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&String, &NodeOutcome)> {
        self.outcomes.iter()
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeOutcome::Failed(_)))
            .map(|(k, _)| k.as_str())
    }

    pub fn all_ok(&self) -> bool {
        self.outcomes.values().all(NodeOutcome::is_ok)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub trait ExecutionEngine {
    fn execute(&self, graph: &WorkflowGraph, backend: &Backend) -> FlowResult<ExecutionReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_resolve() {
        let settings = BackendSettings::default();
        assert_eq!(Backend::from_name("Linear", &settings).unwrap(), Backend::Linear);
        assert_eq!(Backend::from_name("multiproc", &settings).unwrap().name(), "multiproc");
    }

    #[test]
    fn unknown_backend_or_slurm_without_email_is_unsupported() {
        let settings = BackendSettings::default();
        assert!(matches!(Backend::from_name("pbs", &settings), Err(FlowError::UnsupportedConfiguration(_))));
        assert!(matches!(Backend::from_name("slurm", &settings), Err(FlowError::UnsupportedConfiguration(_))));
        let with_email = BackendSettings { email: Some("someone@example.org".into()),
                                           ..Default::default() };
        match Backend::from_name("slurm", &with_email).unwrap() {
            Backend::Slurm { mail_on, .. } => assert_eq!(mail_on, vec!["END".to_string(), "FAIL".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
