//! flow-adapters: formatos, conversiones y estudios concretos sobre flow-core
//!
//! Este crate provee:
//! - Formatos de archivo de neuroimagen como estáticos inicializados una vez.
//! - `ConverterTable`: registro (formato origen, destino) → herramienta.
//! - Un estudio de MRI estructural y un estudio T2 compuesto sobre él.
//!
//! El core no conoce ningún formato ni herramienta concreta: todo lo
//! específico del dominio vive aquí.

pub mod converters;
pub mod formats;
pub mod studies;

pub use converters::ConverterTable;
