//! `StepSpec`: step validado e inmutable.
//!
//! La identidad se calcula una sola vez al congelar el step: hash blake3 del
//! JSON canónico de (versión del builder, nombre, estudio, inputs, outputs,
//! opciones, citas). Dos instancias son el mismo step sii sus identidades
//! coinciden; opciones complejas (listas, objetos) se comparan por valor.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::BUILDER_VERSION;
use crate::graph::{NodeId, WorkflowGraph};
use crate::hashing::hash_value;
use crate::model::{Multiplicity, OptionSet};

use super::builder::{StepDeclaration, StepPort};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepIdentity(String);

impl StepIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefijo corto para logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for StepIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct StepSpec {
    name: String,
    study: String,
    description: String,
    version: u32,
    inputs: Vec<StepPort>,
    outputs: BTreeMap<Multiplicity, Vec<StepPort>>,
    options: OptionSet,
    default_options: OptionSet,
    bound_options: OptionSet,
    citations: Vec<String>,
    graph: WorkflowGraph,
    input_node: NodeId,
    output_nodes: BTreeMap<Multiplicity, NodeId>,
    identity: StepIdentity,
}

impl StepSpec {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn assemble(decl: StepDeclaration,
                           study: String,
                           outputs: BTreeMap<Multiplicity, Vec<StepPort>>,
                           options: OptionSet,
                           bound_options: OptionSet,
                           graph: WorkflowGraph,
                           input_node: NodeId,
                           output_nodes: BTreeMap<Multiplicity, NodeId>)
                           -> Self {
        let identity = compute_identity(&decl.name, &study, &decl.inputs, &outputs, &options, &decl.citations);
        Self { name: decl.name,
               study,
               description: decl.description,
               version: decl.version,
               inputs: decl.inputs,
               outputs,
               options,
               default_options: decl.default_options,
               bound_options,
               citations: decl.citations,
               graph,
               input_node,
               output_nodes,
               identity }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn study_name(&self) -> &str {
        &self.study
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn inputs(&self) -> &[StepPort] {
        &self.inputs
    }

    /// Todos los outputs, agrupados por multiplicidad (session → project).
    pub fn outputs(&self) -> impl Iterator<Item = &StepPort> {
        self.outputs.values().flatten()
    }

    pub fn outputs_at(&self, level: Multiplicity) -> &[StepPort] {
        self.outputs.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Multiplicidades con al menos un output, en orden.
    pub fn multiplicities(&self) -> impl Iterator<Item = Multiplicity> + '_ {
        self.outputs.keys().copied()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn default_options(&self) -> &OptionSet {
        &self.default_options
    }

    /// Opciones con las que se invocó la fábrica.
    pub fn bound_options(&self) -> &OptionSet {
        &self.bound_options
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn input_node(&self) -> &NodeId {
        &self.input_node
    }

    pub fn output_node(&self, level: Multiplicity) -> Option<&NodeId> {
        self.output_nodes.get(&level)
    }

    pub fn identity(&self) -> &StepIdentity {
        &self.identity
    }

    /// Opciones que reciben los prerequisitos: las recibidas por la fábrica
    /// con las efectivas de este step encima.
    pub fn propagated_options(&self) -> OptionSet {
        self.bound_options.overlay(&self.options)
    }

    pub fn non_default_options(&self) -> OptionSet {
        self.options
            .differing_from(&self.default_options)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// `key_value__key_value` con las opciones no default; vacío si no hay.
    pub fn suffix(&self) -> String {
        self.non_default_options()
            .iter()
            .map(|(k, v)| format!("{}_{}", k, option_label(v)))
            .collect::<Vec<_>>()
            .join("__")
    }
}

impl PartialEq for StepSpec {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for StepSpec {}

fn option_label(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compute_identity(name: &str,
                    study: &str,
                    inputs: &[StepPort],
                    outputs: &BTreeMap<Multiplicity, Vec<StepPort>>,
                    options: &OptionSet,
                    citations: &[String])
                    -> StepIdentity {
    let fp = json!({
        "builder_version": BUILDER_VERSION,
        "name": name,
        "study": study,
        "inputs": port_values(inputs.iter()),
        "outputs": port_values(outputs.values().flatten()),
        "options": options.to_value(),
        "citations": citations,
    });
    StepIdentity(hash_value(&fp))
}

fn port_values<'a>(ports: impl Iterator<Item = &'a StepPort>) -> Vec<Value> {
    ports.map(|p| json!([p.name, p.format.name])).collect()
}
