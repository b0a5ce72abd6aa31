//! Construcción de steps.
//!
//! Una `StepFactory` declara nombre, puertos y opciones por defecto
//! (`StepDeclaration`), abre un `StepBuilder`, crea sus nodos internos y los
//! cablea al nodo de entrada y a los nodos de salida por multiplicidad.
//! `build()` sólo tiene éxito si cada input y cada output declarado quedó
//! conectado.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{ITER_FIELDS, SUBJECT_ID_FIELD, VISIT_ID_FIELD};
use crate::errors::{FlowError, FlowResult};
use crate::graph::{Interface, Node, NodeId, NodeKind, Resources, WorkflowGraph};
use crate::model::{FileFormat, Multiplicity, OptionSet};
use crate::study::Study;

use super::spec::StepSpec;

/// Referencia a un artifact del estudio con el formato que el step espera
/// (input) o produce (output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPort {
    pub name: String,
    pub format: FileFormat,
}

impl StepPort {
    pub fn new(name: impl Into<String>, format: &FileFormat) -> Self {
        Self { name: name.into(),
               format: format.clone() }
    }
}

/// Parte declarativa de un step.
#[derive(Debug, Clone)]
pub struct StepDeclaration {
    pub(super) name: String,
    pub(super) description: String,
    pub(super) inputs: Vec<StepPort>,
    pub(super) outputs: Vec<StepPort>,
    pub(super) default_options: OptionSet,
    pub(super) citations: Vec<String>,
    pub(super) version: u32,
}

impl StepDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               description: String::new(),
               inputs: vec![],
               outputs: vec![],
               default_options: OptionSet::new(),
               citations: vec![],
               version: 1 }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, name: impl Into<String>, format: &FileFormat) -> Self {
        self.inputs.push(StepPort::new(name, format));
        self
    }

    pub fn output(mut self, name: impl Into<String>, format: &FileFormat) -> Self {
        self.outputs.push(StepPort::new(name, format));
        self
    }

    pub fn default_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_options = self.default_options.with(key, value);
        self
    }

    pub fn citation(mut self, citation: impl Into<String>) -> Self {
        self.citations.push(citation.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct StepBuilder {
    decl: StepDeclaration,
    study_name: String,
    options: OptionSet,
    bound_options: OptionSet,
    output_levels: BTreeMap<String, Multiplicity>,
    graph: WorkflowGraph,
    input_node: NodeId,
    output_nodes: BTreeMap<Multiplicity, NodeId>,
    connected_inputs: BTreeSet<String>,
    connected_outputs: BTreeSet<String>,
}

impl StepBuilder {
    /// Valida los nombres declarados contra el esquema del estudio y crea los
    /// nodos de entrada y salida del step.
    ///
    /// `supplied` son las opciones con las que se invoca la fábrica; sólo se
    /// aplican las claves presentes en los defaults.
    pub fn new(study: &Study, decl: StepDeclaration, supplied: &OptionSet) -> FlowResult<Self> {
        let name = decl.name.clone();
        for (kind, ports) in [("input", &decl.inputs), ("output", &decl.outputs)] {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for p in ports {
                if ITER_FIELDS.contains(&p.name.as_str()) {
                    return Err(FlowError::construction(&name,
                                                       format!("{kind} '{}' clashes with a reserved iteration field",
                                                               p.name)));
                }
                if !seen.insert(p.name.as_str()) {
                    return Err(FlowError::construction(&name, format!("duplicate {kind} '{}'", p.name)));
                }
                if !study.schema().contains(&p.name) {
                    return Err(FlowError::construction(&name,
                                                       format!("unknown {kind} '{}' for study '{}'",
                                                               p.name,
                                                               study.name())));
                }
            }
        }

        let mut output_levels = BTreeMap::new();
        for p in &decl.outputs {
            output_levels.insert(p.name.clone(), study.artifact(&p.name)?.multiplicity());
        }

        let mut graph = WorkflowGraph::new(name.clone());
        let input_fields = decl.inputs
                               .iter()
                               .map(|p| p.name.clone())
                               .chain(ITER_FIELDS.iter().map(|f| f.to_string()))
                               .collect();
        let input_node = graph.add_node(Node::plumbing(NodeId::namespaced(&name, "inputnode"),
                                                       NodeKind::Identity { fields: input_fields }))?;
        let mut output_nodes = BTreeMap::new();
        let levels: BTreeSet<Multiplicity> = output_levels.values().copied().collect();
        for level in levels {
            let fields = decl.outputs
                             .iter()
                             .filter(|p| output_levels.get(&p.name) == Some(&level))
                             .map(|p| p.name.clone())
                             .collect();
            let id = graph.add_node(Node::plumbing(NodeId::namespaced(&name, &format!("{}_outputnode", level.as_str())),
                                                   NodeKind::Identity { fields }))?;
            output_nodes.insert(level, id);
        }

        let options = decl.default_options.overlay_known(supplied);
        log::debug!("step '{}': building with {} option(s)", name, options.len());
        Ok(Self { study_name: study.name().to_string(),
                  options,
                  bound_options: supplied.clone(),
                  output_levels,
                  graph,
                  input_node,
                  output_nodes,
                  connected_inputs: BTreeSet::new(),
                  connected_outputs: BTreeSet::new(),
                  decl })
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Opciones efectivas (defaults + overrides conocidos).
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn input_node(&self) -> &NodeId {
        &self.input_node
    }

    /// Nodo de procesamiento `{step}_{name}`.
    pub fn create_node(&mut self, name: &str, interface: Interface, resources: Resources) -> FlowResult<NodeId> {
        let node = Node::new(NodeId::namespaced(&self.decl.name, name), NodeKind::Interface { interface });
        self.graph.add_node(node.with_resources(resources))
    }

    /// Nodo que junta las sesiones de un sujeto (join sobre el iterador de
    /// visitas del step).
    pub fn create_join_sessions_node(&mut self,
                                     name: &str,
                                     interface: Interface,
                                     join_fields: &[&str],
                                     resources: Resources)
                                     -> FlowResult<NodeId> {
        self.create_join(name, interface, "sessions", join_fields, resources)
    }

    /// Nodo que junta todos los sujetos (join sobre el iterador de sujetos).
    pub fn create_join_subjects_node(&mut self,
                                     name: &str,
                                     interface: Interface,
                                     join_fields: &[&str],
                                     resources: Resources)
                                     -> FlowResult<NodeId> {
        self.create_join(name, interface, "subjects", join_fields, resources)
    }

    fn create_join(&mut self,
                   name: &str,
                   interface: Interface,
                   iterator: &str,
                   join_fields: &[&str],
                   resources: Resources)
                   -> FlowResult<NodeId> {
        let kind = NodeKind::Join { interface,
                                    join_source: NodeId::namespaced(&self.decl.name, iterator),
                                    join_fields: join_fields.iter().map(|f| f.to_string()).collect() };
        let node = Node::new(NodeId::namespaced(&self.decl.name, name), kind);
        self.graph.add_node(node.with_resources(resources))
    }

    /// Conexión entre dos nodos internos.
    pub fn connect(&mut self, from: &NodeId, from_port: &str, to: &NodeId, to_port: &str) -> FlowResult<()> {
        self.graph.connect(from, from_port, to, to_port)
    }

    /// Conecta el input declarado `input` a `to.to_port`. Un input puede
    /// alimentar varios nodos.
    pub fn connect_input(&mut self, input: &str, to: &NodeId, to_port: &str) -> FlowResult<()> {
        if !self.decl.inputs.iter().any(|p| p.name == input) {
            return Err(FlowError::construction(&self.decl.name, format!("'{input}' is not a declared input")));
        }
        self.graph.connect(&self.input_node, input, to, to_port)?;
        self.connected_inputs.insert(input.to_string());
        Ok(())
    }

    /// Conecta `from.from_port` al output declarado `output`. Cada output
    /// admite exactamente una conexión.
    pub fn connect_output(&mut self, output: &str, from: &NodeId, from_port: &str) -> FlowResult<()> {
        let level = *self.output_levels.get(output).ok_or_else(|| {
                                                       FlowError::construction(&self.decl.name,
                                                                               format!("'{output}' is not a declared output"))
                                                   })?;
        if self.connected_outputs.contains(output) {
            return Err(FlowError::construction(&self.decl.name, format!("output '{output}' is already connected")));
        }
        let out_node = self.output_nodes
                           .get(&level)
                           .cloned()
                           .ok_or_else(|| FlowError::Internal(format!("no output node for level {level}")))?;
        self.graph.connect(from, from_port, &out_node, output)?;
        self.connected_outputs.insert(output.to_string());
        Ok(())
    }

    pub fn connect_subject_id(&mut self, to: &NodeId, to_port: &str) -> FlowResult<()> {
        self.graph.connect(&self.input_node, SUBJECT_ID_FIELD, to, to_port)
    }

    pub fn connect_visit_id(&mut self, to: &NodeId, to_port: &str) -> FlowResult<()> {
        self.graph.connect(&self.input_node, VISIT_ID_FIELD, to, to_port)
    }

    /// Inputs y outputs declarados que aún no tienen conexión.
    pub fn unconnected(&self) -> Vec<&str> {
        let inputs = self.decl
                         .inputs
                         .iter()
                         .filter(|p| !self.connected_inputs.contains(&p.name));
        let outputs = self.decl
                          .outputs
                          .iter()
                          .filter(|p| !self.connected_outputs.contains(&p.name));
        inputs.chain(outputs).map(|p| p.name.as_str()).collect()
    }

    /// Valida y congela el step.
    pub fn build(self) -> FlowResult<StepSpec> {
        let missing = self.unconnected();
        if !missing.is_empty() {
            return Err(FlowError::construction(&self.decl.name,
                                               format!("unconnected inputs/outputs: '{}'", missing.join("', '"))));
        }
        let mut outputs: BTreeMap<Multiplicity, Vec<StepPort>> = BTreeMap::new();
        for p in &self.decl.outputs {
            if let Some(level) = self.output_levels.get(&p.name) {
                outputs.entry(*level).or_default().push(p.clone());
            }
        }
        Ok(StepSpec::assemble(self.decl,
                              self.study_name,
                              outputs,
                              self.options,
                              self.bound_options,
                              self.graph,
                              self.input_node,
                              self.output_nodes))
    }
}
