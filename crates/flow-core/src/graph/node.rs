use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{DEFAULT_MEMORY_MB, DEFAULT_WALL_TIME_MINS, PLUMBING_MEMORY_MB, PLUMBING_WALL_TIME_MINS};
use crate::iteration::VisitAxis;
use crate::model::{FileFormat, Multiplicity};

/// Identificador de nodo, único dentro de un `WorkflowGraph`. Los nodos de un
/// step siempre llevan el nombre del step como prefijo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `{step}_{name}`
    pub fn namespaced(step: &str, name: &str) -> Self {
        Self(format!("{step}_{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interfaz opaca que ejecutará el engine externo (p.ej. `fsl.BET`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               params: BTreeMap::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Recursos estimados de un nodo, usados por backends batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub wall_time_mins: u32,
    pub memory_mb: u32,
    pub nthreads: u32,
    pub gpu: bool,
    pub requirements: Vec<String>,
}

impl Default for Resources {
    fn default() -> Self {
        Self { wall_time_mins: DEFAULT_WALL_TIME_MINS,
               memory_mb: DEFAULT_MEMORY_MB,
               nthreads: 1,
               gpu: false,
               requirements: vec![] }
    }
}

impl Resources {
    pub fn plumbing() -> Self {
        Self { wall_time_mins: PLUMBING_WALL_TIME_MINS,
               memory_mb: PLUMBING_MEMORY_MB,
               ..Self::default() }
    }

    pub fn requirement(mut self, req: impl Into<String>) -> Self {
        self.requirements.push(req.into());
        self
    }

    pub fn wall_time(mut self, mins: u32) -> Self {
        self.wall_time_mins = mins;
        self
    }

    pub fn memory(mut self, mb: u32) -> Self {
        self.memory_mb = mb;
        self
    }

    pub fn threads(mut self, n: u32) -> Self {
        self.nthreads = n;
        self
    }
}

/// Agregación que realiza un nodo de reporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    /// Join sobre el eje de visitas de pares (sujeto, visita).
    Session,
    /// Join sobre el eje de sujetos de las listas por sujeto.
    SubjectSession,
    Subject,
    Visit,
    /// Reporte final del step (token).
    Pipeline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Nodo de procesamiento definido por el step.
    Interface { interface: Interface },
    /// Nodo identidad (input/output node de un step).
    Identity { fields: Vec<String> },
    /// Primer nivel de iteración.
    SubjectIterator { subjects: Vec<String> },
    /// Segundo nivel de iteración; si el eje no es uniforme, `item_source`
    /// apunta al iterador de sujetos.
    SessionIterator { visits: VisitAxis, item_source: Option<NodeId> },
    Source { project: String, study: String, artifacts: Vec<String> },
    Sink {
        project: String,
        study: String,
        multiplicity: Multiplicity,
        artifacts: Vec<String>,
        description: String,
    },
    Conversion { artifact: String, from: FileFormat, to: FileFormat, tool: String },
    /// Join sobre un iterador (`join_source`).
    Join { interface: Interface, join_source: NodeId, join_fields: Vec<String> },
    /// Fusiona `inputs` listas (`in1..inN`) en `out`.
    Merge { inputs: usize },
    /// Agregación de completions; los reportes intermedios hacen join sobre
    /// `join_source`, el reporte final del step no.
    Report { kind: ReportKind, join_source: Option<NodeId> },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Interface { .. } => "interface",
            Self::Identity { .. } => "identity",
            Self::SubjectIterator { .. } => "subjects",
            Self::SessionIterator { .. } => "sessions",
            Self::Source { .. } => "source",
            Self::Sink { .. } => "sink",
            Self::Conversion { .. } => "conversion",
            Self::Join { .. } => "join",
            Self::Merge { .. } => "merge",
            Self::Report { .. } => "report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub resources: Resources,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self { id,
               kind,
               resources: Resources::default() }
    }

    /// Nodo de plumbing (iteradores, joins, reportes): recursos mínimos.
    pub fn plumbing(id: NodeId, kind: NodeKind) -> Self {
        Self { id,
               kind,
               resources: Resources::plumbing() }
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }
}

/// Conexión dirigida `from.from_port -> to.to_port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub from_port: String,
    pub to: NodeId,
    pub to_port: String,
}
