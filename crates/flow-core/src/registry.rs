//! Registro de especificaciones de un estudio.
//!
//! Cada `ArtifactSpec` derivado guarda una referencia tipada a su
//! `StepFactory`, resuelta una vez al registrar el esquema (no hay búsqueda
//! por nombre en tiempo de ejecución). Un esquema de estudio es una
//! composición explícita de tablas con semántica override-por-nombre: la
//! última tabla que define un nombre gana, conservando la posición original.

use indexmap::IndexMap;
use std::fmt;

use crate::constants::ITER_FIELDS;
use crate::errors::{FlowError, FlowResult};
use crate::model::{ArtifactSpec, OptionSet};
use crate::step::StepSpec;
use crate::study::Study;

/// Fábrica de un step. Se invoca con el estudio y un snapshot inmutable de
/// opciones; debe devolver un `StepSpec` nuevo en cada llamada.
pub trait StepFactory: Send + Sync + fmt::Debug {
    /// Nombre estable; dos artifacts con la misma fábrica comparten nombre.
    fn name(&self) -> &str;

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec>;
}

/// Tabla nombrada de especificaciones (p.ej. "mri_base").
#[derive(Debug, Clone)]
pub struct SpecTable {
    name: String,
    specs: IndexMap<String, ArtifactSpec>,
}

impl SpecTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               specs: IndexMap::new() }
    }

    /// Añade (o reemplaza) una especificación.
    pub fn with(mut self, spec: ArtifactSpec) -> Self {
        self.specs.insert(spec.name().to_string(), spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactSpec> {
        self.specs.get(name)
    }
}

/// Esquema inmutable de un estudio.
#[derive(Debug, Clone)]
pub struct StudySchema {
    name: String,
    tables: Vec<String>,
    specs: IndexMap<String, ArtifactSpec>,
}

impl StudySchema {
    /// Compone `tables` en orden; definiciones posteriores reemplazan a las
    /// anteriores con el mismo nombre.
    pub fn compose(name: impl Into<String>, tables: impl IntoIterator<Item = SpecTable>) -> FlowResult<Self> {
        let name = name.into();
        let mut specs: IndexMap<String, ArtifactSpec> = IndexMap::new();
        let mut table_names = Vec::new();
        for table in tables {
            for (spec_name, spec) in table.specs {
                if ITER_FIELDS.contains(&spec_name.as_str()) {
                    return Err(FlowError::construction(&name,
                                                       format!("artifact '{spec_name}' in table '{}' clashes with an iteration field",
                                                               table.name)));
                }
                if specs.contains_key(&spec_name) {
                    log::debug!("schema '{}': '{}' overridden by table '{}'", name, spec_name, table.name);
                }
                specs.insert(spec_name, spec);
            }
            table_names.push(table.name);
        }
        Ok(Self { name,
                  tables: table_names,
                  specs })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tablas que forman el esquema, en orden de composición.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn artifact(&self, name: &str) -> FlowResult<&ArtifactSpec> {
        self.specs.get(name).ok_or_else(|| {
                                FlowError::construction(&self.name,
                                                        format!("'{name}' is not a valid artifact name (valid: '{}')",
                                                                self.names().collect::<Vec<_>>().join("', '")))
                            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.specs.values()
    }
}
