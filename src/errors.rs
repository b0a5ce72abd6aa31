//! Errores del binario y de los adaptadores de nivel aplicación.

use std::path::PathBuf;

use flow_core::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("Error de E/S en '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Snapshot inválido: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Configuración inválida: {0}")]
    Config(String),
    #[error("Uso: {0}")]
    Usage(String),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(),
                   source }
    }

    /// Código de salida del proceso para este error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) | Self::Flow(FlowError::UnsupportedConfiguration(_)) => 3,
            Self::Flow(FlowError::MissingData { .. }) => 4,
            _ => 5,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_errors_keep_their_message() {
        let err: AppError = FlowError::unsupported("backend 'pbs'").into();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), FlowError::unsupported("backend 'pbs'").to_string());
    }

    #[test]
    fn usage_exits_with_two() {
        assert_eq!(AppError::Usage("studyflow plan".into()).exit_code(), 2);
    }
}
