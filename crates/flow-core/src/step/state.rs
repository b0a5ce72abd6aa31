use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{FlowError, FlowResult};

/// Estado de una invocación de step dentro de un `connect`.
///
/// Las transiciones válidas son:
/// - `Unbuilt` -> `SpecValidated` -> `SelectionComputed`
/// - `SelectionComputed` -> `Skipped` (WorkSet vacío, terminal)
/// - `SelectionComputed` -> `PrerequisitesResolved` -> `ArchiveBound` ->
///   `Scheduled`
/// - `Scheduled` -> `Reported` | `Failed`
///
/// Cualquier estado no terminal puede pasar a `Failed`. No hay reversiones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Unbuilt,
    SpecValidated,
    SelectionComputed,
    Skipped,
    PrerequisitesResolved,
    ArchiveBound,
    Scheduled,
    Reported,
    Failed,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Reported | Self::Failed)
    }

    pub fn can_advance_to(&self, next: InvocationState) -> bool {
        use InvocationState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!((self, next),
                 (Unbuilt, SpecValidated)
                 | (SpecValidated, SelectionComputed)
                 | (SelectionComputed, Skipped)
                 | (SelectionComputed, PrerequisitesResolved)
                 | (PrerequisitesResolved, ArchiveBound)
                 | (ArchiveBound, Scheduled)
                 | (Scheduled, Reported))
    }

    /// Devuelve el nuevo estado o `Internal` si la transición no es válida.
    pub fn advance(self, next: InvocationState) -> FlowResult<InvocationState> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(FlowError::Internal(format!("invalid step transition {self} -> {next}")))
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::InvocationState::*;

    #[test]
    fn forward_path_is_accepted() {
        let mut s = Unbuilt;
        for next in [SpecValidated, SelectionComputed, PrerequisitesResolved, ArchiveBound, Scheduled, Reported] {
            s = s.advance(next).unwrap();
        }
        assert_eq!(s, Reported);
    }

    #[test]
    fn no_backward_or_skipping_transitions() {
        assert!(SelectionComputed.advance(SpecValidated).is_err());
        assert!(Unbuilt.advance(Scheduled).is_err());
        assert!(Skipped.advance(Failed).is_err());
        assert!(ArchiveBound.advance(Failed).is_ok());
    }
}
