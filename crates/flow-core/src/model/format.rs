use serde::{Deserialize, Serialize};
use std::fmt;

/// Formato de archivo de un artifact (nombre + extensión).
///
/// Dos formatos son iguales si coinciden nombre y extensión; cuando el formato
/// almacenado difiere del declarado por un step se inserta una conversión.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFormat {
    pub name: String,
    pub extension: String,
}

impl FileFormat {
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self { name: name.into(),
               extension: extension.into() }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
