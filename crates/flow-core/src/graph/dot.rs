//! Export Graphviz (DOT) del grafo completo.

use std::fmt::Write;

use super::{NodeKind, WorkflowGraph};

pub(super) fn render(graph: &WorkflowGraph) -> String {
    let mut out = String::new();
    // `write!` sobre String no falla.
    let _ = writeln!(out, "digraph \"{}\" {{", escape(graph.name()));
    let _ = writeln!(out, "  rankdir=TB;");
    for node in graph.nodes() {
        let shape = match node.kind {
            NodeKind::Interface { .. } => "box",
            NodeKind::SubjectIterator { .. } | NodeKind::SessionIterator { .. } => "invhouse",
            NodeKind::Source { .. } | NodeKind::Sink { .. } => "cylinder",
            NodeKind::Join { .. } | NodeKind::Merge { .. } => "trapezium",
            NodeKind::Report { .. } => "doubleoctagon",
            NodeKind::Conversion { .. } => "parallelogram",
            NodeKind::Identity { .. } => "ellipse",
        };
        let _ = writeln!(out,
                         "  \"{}\" [shape={}, label=\"{}\\n({})\"];",
                         escape(node.id.as_str()),
                         shape,
                         escape(node.id.as_str()),
                         node.kind.label());
    }
    for e in graph.edges() {
        let _ = writeln!(out,
                         "  \"{}\" -> \"{}\" [label=\"{}:{}\"];",
                         escape(e.from.as_str()),
                         escape(e.to.as_str()),
                         escape(&e.from_port),
                         escape(&e.to_port));
    }
    out.push_str("}\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use crate::graph::{Node, NodeId, NodeKind, ReportKind, WorkflowGraph};

    #[test]
    fn dot_lists_nodes_and_labelled_edges() {
        let mut g = WorkflowGraph::new("demo");
        let a = g.add_node(Node::plumbing(NodeId::new("a_report"), NodeKind::Report { kind: ReportKind::Pipeline,
                                                                                    join_source: None }))
                 .unwrap();
        let b = g.add_node(Node::plumbing(NodeId::new("b_subjects"), NodeKind::SubjectIterator { subjects: vec![] }))
                 .unwrap();
        g.connect(&a, "subject_session_pairs", &b, "prereq_reports").unwrap();
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph \"demo\""));
        assert!(dot.contains("\"a_report\" [shape=doubleoctagon"));
        assert!(dot.contains("\"a_report\" -> \"b_subjects\" [label=\"subject_session_pairs:prereq_reports\"]"));
    }
}
