use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularidad con la que existe un artifact en el archivo.
///
/// El orden de declaración fija el orden de sinks y reportes en el grafo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// Un valor por sesión (sujeto × visita).
    Session,
    /// Un valor por sujeto (agregado sobre sus visitas).
    Subject,
    /// Un valor por visita (agregado sobre sujetos).
    Visit,
    /// Un único agregado global.
    Project,
}

impl Multiplicity {
    pub const ALL: [Multiplicity; 4] = [Self::Session, Self::Subject, Self::Visit, Self::Project];

    /// Prefijo usado en nombres de nodos (`per_session_outputnode`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "per_session",
            Self::Subject => "per_subject",
            Self::Visit => "per_visit",
            Self::Project => "per_project",
        }
    }

    /// ¿El sink de esta multiplicidad recibe el id de sujeto?
    pub fn keyed_by_subject(&self) -> bool {
        matches!(self, Self::Session | Self::Subject)
    }

    /// ¿El sink de esta multiplicidad recibe el id de visita?
    pub fn keyed_by_visit(&self) -> bool {
        matches!(self, Self::Session | Self::Visit)
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
