//! Backend SLURM: un script sbatch por nodo más un `submit.sh` que los encola
//! encadenando dependencias `afterok`.
//!
//! No se espera a los jobs: cada nodo queda como `Submitted`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use flow_core::{Backend, ExecutionEngine, ExecutionReport, FlowError, FlowResult, Node, NodeOutcome, WorkflowGraph};

/// Comando que ejecuta un nodo serializado dentro del job.
pub const NODE_COMMAND: &str = "${STUDYFLOW_NODE_CMD:-studyflow-node}";

#[derive(Debug, Clone, PartialEq)]
pub struct SlurmJob {
    pub node: String,
    /// Variable de shell con el id del job en `submit.sh`.
    pub var: String,
    pub depends_on: Vec<String>,
    pub script: String,
    pub spec: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlurmPlan {
    pub jobs: Vec<SlurmJob>,
    pub submit_script: String,
}

#[derive(Debug, Clone)]
pub struct SlurmPlanner {
    work_dir: PathBuf,
}

impl SlurmPlanner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self { work_dir: work_dir.into() }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn job_script(&self, node: &Node, email: &str, mail_on: &[String]) -> String {
        let r = &node.resources;
        let mut s = String::from("#!/bin/bash\n");
        let _ = writeln!(s, "#SBATCH --job-name={}", node.id);
        let _ = writeln!(s, "#SBATCH --time={}", r.wall_time_mins);
        let _ = writeln!(s, "#SBATCH --mem={}", r.memory_mb);
        let _ = writeln!(s, "#SBATCH --cpus-per-task={}", r.nthreads);
        if r.gpu {
            s.push_str("#SBATCH --gres=gpu:1\n");
        }
        let _ = writeln!(s, "#SBATCH --output={}", self.work_dir.join("logs").join(format!("{}.out", node.id)).display());
        let _ = writeln!(s, "#SBATCH --mail-user={email}");
        if !mail_on.is_empty() {
            let _ = writeln!(s, "#SBATCH --mail-type={}", mail_on.join(","));
        }
        for req in &r.requirements {
            let _ = writeln!(s, "module load {req}");
        }
        let _ = writeln!(s,
                         "{} {}",
                         NODE_COMMAND,
                         self.work_dir.join("nodes").join(format!("{}.json", node.id)).display());
        s
    }

    /// Arma los scripts sin tocar el sistema de archivos.
    pub fn plan(&self, graph: &WorkflowGraph, email: &str, mail_on: &[String]) -> FlowResult<SlurmPlan> {
        let order = graph.topological_order()?;
        let var_of = |id: &str| order.iter().position(|n| n.as_str() == id).map(|i| format!("J{i}"));
        let mut jobs = Vec::with_capacity(order.len());
        let mut submit = String::from("#!/bin/bash\nset -e\n");
        for (i, id) in order.iter().enumerate() {
            let node = graph.node(id)
                            .ok_or_else(|| FlowError::Internal(format!("node '{id}' missing from graph")))?;
            let depends_on: Vec<String> = graph.predecessors(id).iter().map(|p| p.as_str().to_string()).collect();
            let dep_vars: Vec<String> = depends_on.iter().filter_map(|d| var_of(d)).collect();
            let var = format!("J{i}");
            let script_path = self.work_dir.join("jobs").join(format!("{id}.sbatch"));
            let dependency = if dep_vars.is_empty() {
                String::new()
            } else {
                format!(" --dependency=afterok:{}",
                        dep_vars.iter().map(|v| format!("${v}")).collect::<Vec<_>>().join(":"))
            };
            let _ = writeln!(submit, "{var}=$(sbatch --parsable{dependency} {})", script_path.display());
            let spec = serde_json::to_string_pretty(node).map_err(|e| FlowError::Internal(format!("node '{id}': {e}")))?;
            jobs.push(SlurmJob { node: id.as_str().to_string(),
                                 var,
                                 depends_on,
                                 script: self.job_script(node, email, mail_on),
                                 spec });
        }
        Ok(SlurmPlan { jobs,
                       submit_script: submit })
    }

    /// Escribe el plan bajo `work_dir` y devuelve la ruta de `submit.sh`.
    pub fn write(&self, plan: &SlurmPlan) -> FlowResult<PathBuf> {
        let io = |path: &Path, e: std::io::Error| FlowError::Internal(format!("{}: {e}", path.display()));
        for sub in ["jobs", "nodes", "logs"] {
            let dir = self.work_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| io(&dir, e))?;
        }
        for job in &plan.jobs {
            let script = self.work_dir.join("jobs").join(format!("{}.sbatch", job.node));
            fs::write(&script, &job.script).map_err(|e| io(&script, e))?;
            let spec = self.work_dir.join("nodes").join(format!("{}.json", job.node));
            fs::write(&spec, &job.spec).map_err(|e| io(&spec, e))?;
        }
        let submit = self.work_dir.join("submit.sh");
        fs::write(&submit, &plan.submit_script).map_err(|e| io(&submit, e))?;
        Ok(submit)
    }
}

impl ExecutionEngine for SlurmPlanner {
    fn execute(&self, graph: &WorkflowGraph, backend: &Backend) -> FlowResult<ExecutionReport> {
        let Backend::Slurm { email, mail_on } = backend else {
            return Err(FlowError::unsupported(format!("the slurm planner cannot run the '{backend}' backend")));
        };
        let plan = self.plan(graph, email, mail_on)?;
        let submit = self.write(&plan)?;
        log::info!("graph '{}': {} sbatch jobs written, submit with {}", graph.name(), plan.jobs.len(), submit.display());
        let mut report = ExecutionReport::new(backend);
        for job in &plan.jobs {
            report.record(job.node.as_str(), NodeOutcome::Submitted);
        }
        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{Interface, NodeId, NodeKind, Resources};

    fn chain() -> WorkflowGraph {
        let mut g = WorkflowGraph::new("chain");
        let bet = Node::new(NodeId::new("brain_extraction_bet"),
                            NodeKind::Interface { interface: Interface::new("fsl.BET") })
            .with_resources(Resources::default().wall_time(30).requirement("fsl>=5.0.9"));
        let flirt = Node::new(NodeId::new("linear_coreg_flirt"),
                              NodeKind::Interface { interface: Interface::new("fsl.FLIRT") });
        g.add_node(bet).unwrap();
        g.add_node(flirt).unwrap();
        g.connect(&NodeId::new("brain_extraction_bet"), "out_file", &NodeId::new("linear_coreg_flirt"), "in_file")
         .unwrap();
        g
    }

    #[test]
    fn plan_chains_jobs_with_afterok() {
        let planner = SlurmPlanner::new("/scratch/run");
        let plan = planner.plan(&chain(), "lab@example.org", &["END".into(), "FAIL".into()]).unwrap();
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[1].depends_on, vec!["brain_extraction_bet".to_string()]);
        assert!(plan.submit_script.contains("J0=$(sbatch --parsable /scratch/run/jobs/brain_extraction_bet.sbatch)"));
        assert!(plan.submit_script.contains("J1=$(sbatch --parsable --dependency=afterok:$J0 "));
        let bet = &plan.jobs[0].script;
        assert!(bet.contains("#SBATCH --time=30"));
        assert!(bet.contains("#SBATCH --mail-user=lab@example.org"));
        assert!(bet.contains("#SBATCH --mail-type=END,FAIL"));
        assert!(bet.contains("module load fsl>=5.0.9"));
    }

    #[test]
    fn execute_writes_scripts_and_marks_submitted() {
        let dir = std::env::temp_dir().join(format!("studyflow-slurm-{}", uuid::Uuid::new_v4()));
        let planner = SlurmPlanner::new(&dir);
        let backend = Backend::Slurm { email: "lab@example.org".into(),
                                       mail_on: vec![] };
        let report = planner.execute(&chain(), &backend).unwrap();
        assert!(report.outcomes().all(|(_, o)| *o == NodeOutcome::Submitted));
        assert!(dir.join("submit.sh").exists());
        assert!(dir.join("nodes").join("linear_coreg_flirt.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn local_backends_are_rejected() {
        let planner = SlurmPlanner::new("/tmp/unused");
        assert!(matches!(planner.execute(&chain(), &Backend::Linear), Err(FlowError::UnsupportedConfiguration(_))));
    }
}
