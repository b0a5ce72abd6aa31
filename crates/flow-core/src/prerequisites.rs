//! Resolución de prerequisitos.
//!
//! Por cada input procesado se busca la fábrica que lo produce, se construye
//! el step con las opciones propagadas y se deduplica por identidad. Un cache
//! por corrida (nombre → identidad + token) garantiza que un prerequisito
//! compartido se construya una sola vez; pedirlo con otra identidad es un
//! conflicto fatal.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::errors::{FlowError, FlowResult};
use crate::model::ReportToken;
use crate::registry::StepFactory;
use crate::step::{StepIdentity, StepSpec};
use crate::study::Study;

/// Step ya conectado en la corrida actual. `token` es `None` si el step se
/// omitió (outputs al día).
#[derive(Debug, Clone)]
pub struct CachedStep {
    pub identity: StepIdentity,
    pub token: Option<ReportToken>,
}

/// Cache de una llamada `connect` de nivel superior. Nunca se comparte entre
/// corridas.
#[derive(Debug, Default)]
pub struct RunCache {
    steps: IndexMap<String, CachedStep>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Ok(None)` si el step no se conectó aún; `Ok(Some(..))` si ya se
    /// conectó con la misma identidad; `PrerequisiteConflict` si difiere.
    pub fn lookup(&self, step: &StepSpec) -> FlowResult<Option<&CachedStep>> {
        match self.steps.get(step.name()) {
            None => Ok(None),
            Some(cached) if &cached.identity == step.identity() => Ok(Some(cached)),
            Some(cached) => {
                log::warn!("step '{}' requested twice with different identities ({} vs {})",
                           step.name(),
                           cached.identity.short(),
                           step.identity().short());
                Err(FlowError::PrerequisiteConflict { name: step.name().to_string(),
                                                      existing: cached.identity.to_string(),
                                                      requested: step.identity().to_string() })
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, identity: StepIdentity, token: Option<ReportToken>) {
        self.steps.insert(name.into(), CachedStep { identity, token });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CachedStep> {
        self.steps.get(name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Quien conecta prerequisitos al grafo en curso (el assembler).
pub trait PrerequisiteConnector {
    fn cache(&mut self) -> &mut RunCache;

    /// Conecta `step` recursivamente; `None` si resultó omitido.
    fn connect_prerequisite(&mut self, step: StepSpec) -> FlowResult<Option<ReportToken>>;
}

/// Steps que producen los inputs procesados de `step`, en orden de
/// declaración de inputs. Se deduplican por identidad: dos fábricas con el
/// mismo nombre e identidad distinta llegan ambas al cache y chocan ahí.
pub fn prerequisite_steps(study: &Study, step: &StepSpec) -> FlowResult<Vec<StepSpec>> {
    let options = step.propagated_options();
    let mut built: Vec<&Arc<dyn StepFactory>> = Vec::new();
    let mut out: Vec<StepSpec> = Vec::new();
    for input in step.inputs() {
        let spec = study.artifact(&input.name)?;
        let Some(factory) = spec.producer() else {
            continue;
        };
        // misma fábrica, mismas opciones: mismo step
        if built.iter().any(|f| Arc::ptr_eq(f, factory)) {
            continue;
        }
        built.push(factory);
        let prereq = factory.build(study, &options).map_err(|e| e.within_step(step.name()))?;
        if !out.iter().any(|s| s.identity() == prereq.identity()) {
            out.push(prereq);
        }
    }
    Ok(out)
}

/// Devuelve los tokens de los prerequisitos no omitidos.
pub fn resolve_prerequisites<C>(study: &Study, step: &StepSpec, connector: &mut C) -> FlowResult<Vec<ReportToken>>
    where C: PrerequisiteConnector + ?Sized
{
    let mut tokens = Vec::new();
    for prereq in prerequisite_steps(study, step)? {
        if let Some(token) = connector.cache().lookup(&prereq)?.map(|c| c.token.clone()) {
            log::debug!("step '{}': prerequisite '{}' already connected", step.name(), prereq.name());
            tokens.extend(token);
            continue;
        }
        let name = prereq.name().to_string();
        let identity = prereq.identity().clone();
        let token = connector.connect_prerequisite(prereq).map_err(|e| e.within_step(step.name()))?;
        connector.cache().insert(name, identity, token.clone());
        tokens.extend(token);
    }
    Ok(tokens)
}
