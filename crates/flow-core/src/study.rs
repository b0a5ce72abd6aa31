//! Estudio: esquema + colaboradores externos + snapshot de opciones.

use std::fmt;
use std::sync::Arc;

use crate::archive::Archive;
use crate::convert::FormatConverter;
use crate::errors::{FlowError, FlowResult};
use crate::model::{ArtifactSpec, OptionSet};
use crate::registry::StudySchema;
use crate::step::StepSpec;

#[derive(Clone)]
pub struct Study {
    name: String,
    project_id: String,
    schema: Arc<StudySchema>,
    archive: Arc<dyn Archive>,
    converter: Arc<dyn FormatConverter>,
    options: OptionSet,
}

impl Study {
    pub fn new(name: impl Into<String>,
               project_id: impl Into<String>,
               schema: Arc<StudySchema>,
               archive: Arc<dyn Archive>,
               converter: Arc<dyn FormatConverter>)
               -> Self {
        Self { name: name.into(),
               project_id: project_id.into(),
               schema,
               archive,
               converter,
               options: OptionSet::new() }
    }

    /// Fija el snapshot de opciones con el que se construyen los steps.
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn schema(&self) -> &StudySchema {
        &self.schema
    }

    pub fn archive(&self) -> &dyn Archive {
        self.archive.as_ref()
    }

    pub fn converter(&self) -> &dyn FormatConverter {
        self.converter.as_ref()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn artifact(&self, name: &str) -> FlowResult<&ArtifactSpec> {
        self.schema.artifact(name)
    }

    /// Construye el step que produce `artifact` con las opciones del estudio.
    pub fn step_for(&self, artifact: &str) -> FlowResult<StepSpec> {
        let spec = self.artifact(artifact)?;
        let factory = spec.producer().ok_or_else(|| {
                                         FlowError::construction(&self.name,
                                                                 format!("'{artifact}' is a primary artifact and has no producing step"))
                                     })?;
        factory.build(self, &self.options)
    }
}

impl fmt::Debug for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Study")
         .field("name", &self.name)
         .field("project_id", &self.project_id)
         .field("schema", &self.schema.name())
         .finish()
    }
}
