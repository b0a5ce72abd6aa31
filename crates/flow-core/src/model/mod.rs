//! Modelos neutrales: esquema de artifacts, formatos, opciones, snapshot del
//! archivo y tokens de reporte.

pub mod artifact;
pub mod format;
pub mod multiplicity;
pub mod options;
pub mod project;
pub mod report;

pub use artifact::ArtifactSpec;
pub use format::FileFormat;
pub use multiplicity::Multiplicity;
pub use options::OptionSet;
pub use project::{Project, Session, SessionRef, Subject, Visit};
pub use report::{Completion, ReportToken};
