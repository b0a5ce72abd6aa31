//! Errores del builder.
//!
//! Todas las variantes son fatales: el core no reintenta ni recupera. La única
//! salida temprana que no es error es un `WorkSet` vacío (step omitido).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum FlowError {
    /// Definición de step inválida (nombres desconocidos/duplicados, puertos
    /// sin conectar, colisión con campos de iteración, ciclos).
    #[error("construction error in '{step}': {message}")]
    Construction { step: String, message: String },

    /// Dato primario requerido ausente en el archivo. `chain` lista los steps
    /// desde el que lo requiere directamente hasta el step raíz.
    #[error("missing data: '{artifact}' absent for {missing} (required by {})", chain.join(" <- "))]
    MissingData { artifact: String, missing: String, chain: Vec<String> },

    /// Dos steps con el mismo nombre y distinta identidad en una misma corrida.
    #[error("prerequisite conflict: step '{name}' requested with identity {requested} but {existing} is already connected")]
    PrerequisiteConflict { name: String, existing: String, requested: String },

    /// Backend de ejecución desconocido o mal configurado.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// No existe conversión registrada entre dos formatos.
    #[error("no conversion from '{from}' to '{to}' for '{artifact}'")]
    Conversion { artifact: String, from: String, to: String },

    /// Error reportado por el colaborador de archivo.
    #[error("archive error: {0}")]
    Archive(String),

    #[error("internal: {0}")]
    Internal(String),
}

/// Alias usado en todo el crate.
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    pub fn construction(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction { step: step.into(),
                             message: message.into() }
    }

    pub fn missing_data(artifact: impl Into<String>, missing: impl Into<String>, step: impl Into<String>) -> Self {
        Self::MissingData { artifact: artifact.into(),
                            missing: missing.into(),
                            chain: vec![step.into()] }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(message.into())
    }

    /// Anota un `MissingData` con el step que lo propaga. El resto de
    /// variantes se devuelven intactas.
    pub fn within_step(self, step: &str) -> Self {
        match self {
            Self::MissingData { artifact,
                                missing,
                                mut chain, } => {
                if chain.last().map(String::as_str) != Some(step) {
                    chain.push(step.to_string());
                }
                Self::MissingData { artifact, missing, chain }
            }
            other => other,
        }
    }

    /// Nombre del step que originó el error, si aplica.
    pub fn originating_step(&self) -> Option<&str> {
        match self {
            Self::Construction { step, .. } => Some(step),
            Self::MissingData { chain, .. } => chain.first().map(String::as_str),
            Self::PrerequisiteConflict { name, .. } => Some(name),
            _ => None,
        }
    }
}
