//! Engines de ejecución concretos para los grafos que arma `flow-core`.
//!
//! - `LocalEngine`: backends `linear` y `multiproc` (pool de rayon).
//! - `SlurmPlanner`: backend `slurm`, un job sbatch por nodo.

pub mod local;
pub mod slurm;

use std::path::Path;
use std::sync::Arc;

use flow_core::{Backend, ExecutionEngine};

pub use local::{LocalEngine, LoggingRunner, NodeRunner};
pub use slurm::{SlurmJob, SlurmPlan, SlurmPlanner};

/// Engine adecuado para `backend`.
pub fn engine_for(backend: &Backend, runner: Arc<dyn NodeRunner>, work_dir: &Path) -> Box<dyn ExecutionEngine> {
    match backend {
        Backend::Slurm { .. } => Box::new(SlurmPlanner::new(work_dir)),
        Backend::Linear | Backend::MultiProc { .. } => Box::new(LocalEngine::new(runner)),
    }
}
