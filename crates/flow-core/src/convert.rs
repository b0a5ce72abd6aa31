//! Colaborador de conversión de formatos.
//!
//! Cuando el formato almacenado de un artifact difiere del que declara un
//! step, el assembler pide un nodo de conversión y lo intercala entre el
//! source (o el output node) y el consumidor. El nodo recibe por
//! `in_file` y entrega por `out_file`.

use std::fmt;

use crate::errors::FlowResult;
use crate::graph::{Node, NodeId};
use crate::model::FileFormat;

pub trait FormatConverter: Send + Sync + fmt::Debug {
    /// Nodo que convierte `artifact` de `from` a `to`. Sin conversión
    /// registrada devuelve `FlowError::Conversion`.
    fn convert(&self, artifact: &str, from: &FileFormat, to: &FileFormat, node: NodeId) -> FlowResult<Node>;
}
