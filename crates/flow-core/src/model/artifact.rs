//! Esquema de un artifact del estudio.
//!
//! Un `ArtifactSpec` es inmutable una vez registrado. Si tiene `producer` es
//! un artifact *procesado* (lo genera un step); si no, es *primario* (lo
//! aporta el archivo) y nunca dispara resolución de prerequisitos.

use std::fmt;
use std::sync::Arc;

use crate::constants::ARCHIVE_KEY_SEPARATOR;
use crate::registry::StepFactory;

use super::{FileFormat, Multiplicity};

#[derive(Clone)]
pub struct ArtifactSpec {
    name: String,
    format: FileFormat,
    multiplicity: Multiplicity,
    producer: Option<Arc<dyn StepFactory>>,
    description: Option<String>,
}

impl ArtifactSpec {
    /// Artifact primario (aportado externamente).
    pub fn primary(name: impl Into<String>, format: &FileFormat, multiplicity: Multiplicity) -> Self {
        Self { name: name.into(),
               format: format.clone(),
               multiplicity,
               producer: None,
               description: None }
    }

    /// Artifact derivado, producido por `producer`.
    pub fn derived(name: impl Into<String>,
                   format: &FileFormat,
                   multiplicity: Multiplicity,
                   producer: Arc<dyn StepFactory>)
                   -> Self {
        Self { name: name.into(),
               format: format.clone(),
               multiplicity,
               producer: Some(producer),
               description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> &FileFormat {
        &self.format
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn producer(&self) -> Option<&Arc<dyn StepFactory>> {
        self.producer.as_ref()
    }

    pub fn is_processed(&self) -> bool {
        self.producer.is_some()
    }

    /// Clave con la que el artifact aparece en el archivo. Los derivados se
    /// sufijan con el nombre del estudio que los generó (`brain__mri`); los
    /// primarios conservan su nombre.
    pub fn archive_key(&self, study_name: &str) -> String {
        if self.is_processed() {
            format!("{}{}{}", self.name, ARCHIVE_KEY_SEPARATOR, study_name)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Debug for ArtifactSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSpec")
         .field("name", &self.name)
         .field("format", &self.format.name)
         .field("multiplicity", &self.multiplicity)
         .field("producer", &self.producer.as_ref().map(|p| p.name().to_string()))
         .finish()
    }
}
