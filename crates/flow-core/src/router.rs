//! Router de outputs por multiplicidad y barrera de reporte.
//!
//! Por cada multiplicidad con outputs se crea un sink; la completion de cada
//! sink se pliega hacia arriba por los ejes de iteración hasta el nodo de
//! reporte del step:
//! - `session`: join por visitas y luego por sujetos
//! - `subject`: join por sujetos
//! - `visit`: join por visitas
//! - `project`: directo
//!
//! Los dependientes se conectan al puerto `subject_session_pairs` del nodo
//! de reporte, que sólo se completa cuando todos los sinks escribieron.

use crate::constants::{CONVERSION_IN_PORT, CONVERSION_OUT_PORT, SUBJECT_ID_FIELD, VISIT_ID_FIELD};
use crate::errors::{FlowError, FlowResult};
use crate::graph::{Node, NodeId, NodeKind, ReportKind, WorkflowGraph};
use crate::iteration::IterationSpace;
use crate::model::{ArtifactSpec, Completion, Multiplicity, ReportToken};
use crate::step::StepSpec;
use crate::study::Study;

/// Iteradores del step en el grafo completo.
#[derive(Debug, Clone)]
pub struct IterationNodes {
    pub subjects: NodeId,
    pub sessions: NodeId,
}

pub fn route_outputs(graph: &mut WorkflowGraph,
                     study: &Study,
                     step: &StepSpec,
                     space: &IterationSpace,
                     iter: &IterationNodes)
                     -> FlowResult<ReportToken> {
    let name = step.name();
    let report = graph.add_node(Node::plumbing(NodeId::namespaced(name, "report"),
                                               NodeKind::Report { kind: ReportKind::Pipeline,
                                                                  join_source: None }))?;
    let mut completion = Completion::default();

    for level in step.multiplicities() {
        let ports = step.outputs_at(level);
        let specs = ports.iter()
                         .map(|p| study.artifact(&p.name))
                         .collect::<FlowResult<Vec<&ArtifactSpec>>>()?;
        let sink = study.archive().sink(study.project_id(),
                                        &specs,
                                        level,
                                        study.name(),
                                        NodeId::namespaced(name, &format!("{}_sink", level.as_str())),
                                        step.description())?;
        let sink_ports = sink.ports.clone();
        let sink_id = graph.add_node(sink.node)?;
        let out_node = step.output_node(level)
                           .cloned()
                           .ok_or_else(|| FlowError::Internal(format!("step '{name}' has no {level} output node")))?;

        for (port, spec) in ports.iter().zip(specs.iter()) {
            let sink_port = sink_ports.get(spec.name())
                                      .ok_or_else(|| FlowError::Internal(format!("sink has no port for '{}'", spec.name())))?;
            if &port.format != spec.format() {
                let conv = study.converter().convert(spec.name(),
                                                     &port.format,
                                                     spec.format(),
                                                     NodeId::namespaced(name, &format!("{}_output_conversion", spec.name())))?;
                let conv = graph.add_node(conv)?;
                graph.connect(&out_node, &port.name, &conv, CONVERSION_IN_PORT)?;
                graph.connect(&conv, CONVERSION_OUT_PORT, &sink_id, sink_port)?;
            } else {
                graph.connect(&out_node, &port.name, &sink_id, sink_port)?;
            }
        }
        if level.keyed_by_subject() {
            graph.connect(&iter.subjects, SUBJECT_ID_FIELD, &sink_id, SUBJECT_ID_FIELD)?;
        }
        if level.keyed_by_visit() {
            graph.connect(&iter.sessions, VISIT_ID_FIELD, &sink_id, VISIT_ID_FIELD)?;
        }

        let folded = match level {
            Multiplicity::Session => {
                let per_subject = fold(graph, name, "session_outputs", ReportKind::Session, &iter.sessions, &sink_id)?;
                let all = fold(graph,
                               name,
                               "subject_session_outputs",
                               ReportKind::SubjectSession,
                               &iter.subjects,
                               &per_subject)?;
                completion.session_pairs = space.pairs();
                all
            }
            Multiplicity::Subject => {
                completion.subjects = space.subjects.clone();
                fold(graph, name, "subject_summary_outputs", ReportKind::Subject, &iter.subjects, &sink_id)?
            }
            Multiplicity::Visit => {
                completion.visits = space.distinct_visits();
                fold(graph, name, "visit_summary_outputs", ReportKind::Visit, &iter.sessions, &sink_id)?
            }
            Multiplicity::Project => {
                completion.project = Some(study.project_id().to_string());
                sink_id
            }
        };
        graph.connect(&folded, "out", &report, level.as_str())?;
    }

    log::debug!("step '{}': report barrier over {} session pair(s)", name, completion.session_pairs.len());
    Ok(ReportToken { step: name.to_string(),
                     identity: step.identity().clone(),
                     node: report,
                     completion })
}

fn fold(graph: &mut WorkflowGraph,
        step: &str,
        name: &str,
        kind: ReportKind,
        join_source: &NodeId,
        from: &NodeId)
        -> FlowResult<NodeId> {
    let id = graph.add_node(Node::plumbing(NodeId::namespaced(step, name),
                                           NodeKind::Report { kind,
                                                              join_source: Some(join_source.clone()) }))?;
    graph.connect(from, "out", &id, "in")?;
    Ok(id)
}
