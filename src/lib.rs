//! studyflow
//!
//! Este crate actúa como la capa de aplicación sobre `flow-core`:
//! - `config`: configuración desde entorno (.env).
//! - `snapshot`: carga de snapshots JSON del archivo.
//! - `exec`: engines de ejecución locales y el planificador SLURM.
//! - `cli`: parseo de argumentos y comandos del binario.

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod snapshot;

pub use errors::{AppError, AppResult};
