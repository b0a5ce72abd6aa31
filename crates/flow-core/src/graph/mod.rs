//! Grafo de ejecución producido por el builder.
//!
//! Una vez entregado al engine externo el grafo no se vuelve a mutar; por eso
//! no necesita sincronización interna. Los nodos conservan orden de inserción
//! para que el export y el orden topológico sean deterministas.

mod dot;
mod node;

pub use node::{Edge, Interface, Node, NodeId, NodeKind, ReportKind, Resources};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::errors::{FlowError, FlowResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    name: String,
    nodes: IndexMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               nodes: IndexMap::new(),
               edges: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Añade un nodo; un id repetido es error de construcción.
    pub fn add_node(&mut self, node: Node) -> FlowResult<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return Err(FlowError::construction(&self.name, format!("duplicate node '{}'", node.id)));
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    pub fn connect(&mut self, from: &NodeId, from_port: &str, to: &NodeId, to_port: &str) -> FlowResult<()> {
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(FlowError::construction(&self.name, format!("unknown node '{id}'")));
            }
        }
        self.edges.push(Edge { from: from.clone(),
                               from_port: from_port.to_string(),
                               to: to.clone(),
                               to_port: to_port.to_string() });
        Ok(())
    }

    /// Incorpora todos los nodos y conexiones de `other` (p.ej. el sub-grafo
    /// interno de un step).
    pub fn absorb(&mut self, other: WorkflowGraph) -> FlowResult<()> {
        for (_, node) in other.nodes {
            self.add_node(node)?;
        }
        self.edges.extend(other.edges);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(&NodeId::new(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodos de los que `id` depende directamente (sin duplicados).
    pub fn predecessors(&self, id: &NodeId) -> Vec<&NodeId> {
        let mut out: Vec<&NodeId> = Vec::new();
        for e in self.edges.iter().filter(|e| &e.to == id) {
            if !out.contains(&&e.from) {
                out.push(&e.from);
            }
        }
        out
    }

    /// ¿Existe una conexión directa `from -> to` (cualquier puerto)?
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from.as_str() == from && e.to.as_str() == to)
    }

    /// Orden topológico estable (Kahn, desempate por orden de inserción).
    /// Un ciclo es un error interno: el builder nunca debería producirlo.
    pub fn topological_order(&self) -> FlowResult<Vec<NodeId>> {
        let mut indegree: HashMap<&NodeId, usize> = self.nodes.keys().map(|k| (k, 0)).collect();
        let mut successors: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for e in &self.edges {
            *indegree.entry(&e.to).or_insert(0) += 1;
            successors.entry(&e.from).or_default().push(&e.to);
        }
        let mut ready: VecDeque<&NodeId> = self.nodes.keys().filter(|k| indegree[k] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.clone());
            if let Some(next) = successors.get(id) {
                for n in next {
                    if let Some(d) = indegree.get_mut(n) {
                        *d -= 1;
                        if *d == 0 {
                            ready.push_back(*n);
                        }
                    }
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(FlowError::Internal(format!("graph '{}' contains a cycle", self.name)));
        }
        Ok(order)
    }

    /// Representación Graphviz del grafo.
    pub fn to_dot(&self) -> String {
        dot::render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(id: &str) -> Node {
        Node::plumbing(NodeId::new(id), NodeKind::Identity { fields: vec!["x".into()] })
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut g = WorkflowGraph::new("g");
        g.add_node(ident("a")).unwrap();
        let err = g.add_node(ident("a")).unwrap_err();
        assert!(matches!(err, FlowError::Construction { .. }));
    }

    #[test]
    fn topological_order_respects_edges_and_insertion_order() {
        let mut g = WorkflowGraph::new("g");
        let c = g.add_node(ident("c")).unwrap();
        let a = g.add_node(ident("a")).unwrap();
        let b = g.add_node(ident("b")).unwrap();
        g.connect(&a, "x", &b, "x").unwrap();
        g.connect(&b, "x", &c, "x").unwrap();
        let order: Vec<String> = g.topological_order().unwrap().iter().map(|n| n.to_string()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_reported() {
        let mut g = WorkflowGraph::new("g");
        let a = g.add_node(ident("a")).unwrap();
        let b = g.add_node(ident("b")).unwrap();
        g.connect(&a, "x", &b, "x").unwrap();
        g.connect(&b, "x", &a, "x").unwrap();
        assert!(g.topological_order().is_err());
    }

    #[test]
    fn connecting_unknown_node_fails() {
        let mut g = WorkflowGraph::new("g");
        let a = g.add_node(ident("a")).unwrap();
        assert!(g.connect(&a, "x", &NodeId::new("ghost"), "x").is_err());
    }
}
