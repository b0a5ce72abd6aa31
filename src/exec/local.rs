//! Ejecución local: secuencial o por oleadas de dependencias.

use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use flow_core::{Backend, ExecutionEngine, ExecutionReport, FlowError, FlowResult, Node, NodeId, NodeOutcome,
                WorkflowGraph};

/// Ejecuta un nodo. El error es un mensaje legible que termina en el reporte.
pub trait NodeRunner: Send + Sync + fmt::Debug {
    fn run(&self, node: &Node) -> Result<(), String>;
}

/// Runner que sólo registra lo que se ejecutaría.
#[derive(Debug, Default)]
pub struct LoggingRunner;

impl NodeRunner for LoggingRunner {
    fn run(&self, node: &Node) -> Result<(), String> {
        log::info!("[{}] {}", node.kind.label(), node.id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LocalEngine {
    runner: Arc<dyn NodeRunner>,
}

impl LocalEngine {
    pub fn new(runner: Arc<dyn NodeRunner>) -> Self {
        Self { runner }
    }

    fn run_node(&self, graph: &WorkflowGraph, id: &NodeId, done: &HashMap<NodeId, NodeOutcome>) -> NodeOutcome {
        // una dependencia que no terminó bien deja al nodo sin ejecutar
        if graph.predecessors(id).iter().any(|p| !done.get(*p).map_or(false, NodeOutcome::is_ok)) {
            return NodeOutcome::Skipped;
        }
        let Some(node) = graph.node(id) else {
            return NodeOutcome::Failed(format!("unknown node '{id}'"));
        };
        match self.runner.run(node) {
            Ok(()) => NodeOutcome::Succeeded,
            Err(message) => {
                log::warn!("node '{}' failed: {}", id, message);
                NodeOutcome::Failed(message)
            }
        }
    }

    fn execute_linear(&self, graph: &WorkflowGraph, report: &mut ExecutionReport) -> FlowResult<()> {
        let mut done = HashMap::new();
        for id in graph.topological_order()? {
            let outcome = self.run_node(graph, &id, &done);
            report.record(id.as_str(), outcome.clone());
            done.insert(id, outcome);
        }
        Ok(())
    }

    fn execute_waves(&self, graph: &WorkflowGraph, max_parallel: usize, report: &mut ExecutionReport) -> FlowResult<()> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(max_parallel)
                                                  .build()
                                                  .map_err(|e| FlowError::Internal(format!("thread pool: {e}")))?;
        let mut done: HashMap<NodeId, NodeOutcome> = HashMap::new();
        for (i, wave) in dependency_waves(graph)?.into_iter().enumerate() {
            log::debug!("wave {}: {} nodes", i, wave.len());
            let outcomes: Vec<(NodeId, NodeOutcome)> = pool.install(|| {
                                                            wave.into_par_iter()
                                                                .map(|id| {
                                                                    let outcome = self.run_node(graph, &id, &done);
                                                                    (id, outcome)
                                                                })
                                                                .collect()
                                                        });
            for (id, outcome) in outcomes {
                report.record(id.as_str(), outcome.clone());
                done.insert(id, outcome);
            }
        }
        Ok(())
    }
}

/// Agrupa los nodos por profundidad: cada oleada sólo depende de las
/// anteriores. Dentro de una oleada se conserva el orden topológico.
pub fn dependency_waves(graph: &WorkflowGraph) -> FlowResult<Vec<Vec<NodeId>>> {
    let mut depth: HashMap<NodeId, usize> = HashMap::new();
    let mut waves: Vec<Vec<NodeId>> = Vec::new();
    for id in graph.topological_order()? {
        let d = graph.predecessors(&id)
                     .iter()
                     .filter_map(|p| depth.get(*p))
                     .map(|d| d + 1)
                     .max()
                     .unwrap_or(0);
        if waves.len() <= d {
            waves.resize_with(d + 1, Vec::new);
        }
        waves[d].push(id.clone());
        depth.insert(id, d);
    }
    Ok(waves)
}

impl ExecutionEngine for LocalEngine {
    fn execute(&self, graph: &WorkflowGraph, backend: &Backend) -> FlowResult<ExecutionReport> {
        let mut report = ExecutionReport::new(backend);
        match backend {
            Backend::Linear => self.execute_linear(graph, &mut report)?,
            Backend::MultiProc { max_parallel } => self.execute_waves(graph, *max_parallel, &mut report)?,
            Backend::Slurm { .. } => {
                return Err(FlowError::unsupported("the local engine cannot run the 'slurm' backend"));
            }
        }
        let report = report.finish();
        log::info!("graph '{}': {} nodes on {} ({} failed)",
                   graph.name(),
                   report.len(),
                   backend,
                   report.failed().count());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{Interface, NodeKind};

    /// Falla en los nodos indicados.
    #[derive(Debug)]
    struct FailOn(Vec<&'static str>);

    impl NodeRunner for FailOn {
        fn run(&self, node: &Node) -> Result<(), String> {
            if self.0.contains(&node.id.as_str()) {
                Err(format!("{} exited with 1", node.id))
            } else {
                Ok(())
            }
        }
    }

    /// a → b → d, a → c → d, e aislado.
    fn diamond() -> WorkflowGraph {
        let mut g = WorkflowGraph::new("diamond");
        for id in ["a", "b", "c", "d", "e"] {
            g.add_node(Node::new(NodeId::new(id), NodeKind::Interface { interface: Interface::new("test.noop") }))
             .unwrap();
        }
        for (from, to) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            g.connect(&NodeId::new(from), "out", &NodeId::new(to), "in").unwrap();
        }
        g
    }

    #[test]
    fn waves_follow_dependency_depth() {
        let waves = dependency_waves(&diamond()).unwrap();
        let names: Vec<Vec<&str>> = waves.iter().map(|w| w.iter().map(NodeId::as_str).collect()).collect();
        assert_eq!(names, vec![vec!["a", "e"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn linear_skips_dependents_of_a_failure() {
        let engine = LocalEngine::new(Arc::new(FailOn(vec!["b"])));
        let report = engine.execute(&diamond(), &Backend::Linear).unwrap();
        assert_eq!(report.outcome("a"), Some(&NodeOutcome::Succeeded));
        assert!(matches!(report.outcome("b"), Some(NodeOutcome::Failed(_))));
        assert_eq!(report.outcome("c"), Some(&NodeOutcome::Succeeded));
        assert_eq!(report.outcome("d"), Some(&NodeOutcome::Skipped));
        assert!(!report.all_ok());
    }

    #[test]
    fn multiproc_matches_linear_outcomes() {
        let engine = LocalEngine::new(Arc::new(FailOn(vec!["c"])));
        let linear = engine.execute(&diamond(), &Backend::Linear).unwrap();
        let parallel = engine.execute(&diamond(), &Backend::MultiProc { max_parallel: 2 }).unwrap();
        for id in ["a", "b", "c", "d", "e"] {
            assert_eq!(linear.outcome(id), parallel.outcome(id), "{id}");
        }
        assert_eq!(parallel.backend, "multiproc");
    }

    #[test]
    fn slurm_is_not_a_local_backend() {
        let engine = LocalEngine::new(Arc::new(LoggingRunner));
        let backend = Backend::Slurm { email: "lab@example.org".into(),
                                       mail_on: vec!["FAIL".into()] };
        assert!(matches!(engine.execute(&diamond(), &backend), Err(FlowError::UnsupportedConfiguration(_))));
    }
}
