//! Definición de steps.
//!
//! Un step es un sub-grafo con nombre que consume artifacts del estudio y
//! produce otros. Este módulo define:
//! - `StepDeclaration`: nombre, puertos, opciones por defecto y citas.
//! - `StepBuilder`: API para crear nodos internos y cablear puertos.
//! - `StepSpec`: resultado validado e inmutable, con identidad por contenido.
//! - `InvocationState`: máquina de estados de una invocación.

mod builder;
mod spec;
mod state;

pub use builder::{StepBuilder, StepDeclaration, StepPort};
pub use spec::{StepIdentity, StepSpec};
pub use state::InvocationState;
