//! Conjunto inmutable de opciones de step.
//!
//! Un `OptionSet` se construye una vez (defaults del estudio, overrides del
//! usuario) y se pasa explícitamente a cada `StepFactory`. Nunca se muta un
//! default compartido: toda combinación devuelve un conjunto nuevo.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeMap<String, Value>);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devuelve una copia con `key = value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Claves de `other` reemplazan a las propias; claves nuevas se añaden.
    pub fn overlay(&self, other: &OptionSet) -> OptionSet {
        let mut out = self.0.clone();
        for (k, v) in other.iter() {
            out.insert(k.clone(), v.clone());
        }
        OptionSet(out)
    }

    /// Overrides restringidos a claves conocidas: se parte de `self` (los
    /// defaults) y sólo se aceptan valores de `supplied` cuya clave ya existe.
    /// Claves extra se ignoran.
    pub fn overlay_known(&self, supplied: &OptionSet) -> OptionSet {
        let mut out = self.0.clone();
        for (k, v) in supplied.iter() {
            if let Some(slot) = out.get_mut(k) {
                *slot = v.clone();
            }
        }
        OptionSet(out)
    }

    /// Pares cuyo valor difiere del default correspondiente.
    pub fn differing_from<'a>(&'a self, defaults: &'a OptionSet) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.0.iter().filter(move |(k, v)| defaults.get(k) != Some(*v))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for OptionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        OptionSet(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_known_ignores_extra_keys() {
        let defaults = OptionSet::new().with("threshold", 0.5).with("robust", true);
        let supplied = OptionSet::new().with("threshold", 0.7).with("unrelated", "x");
        let merged = defaults.overlay_known(&supplied);
        assert_eq!(merged.get("threshold"), Some(&json!(0.7)));
        assert_eq!(merged.get("robust"), Some(&json!(true)));
        assert!(!merged.contains("unrelated"));
        // los defaults no se mutan
        assert_eq!(defaults.get("threshold"), Some(&json!(0.5)));
    }

    #[test]
    fn differing_from_lists_only_changed_values() {
        let defaults = OptionSet::new().with("a", 1).with("b", 2);
        let current = defaults.overlay_known(&OptionSet::new().with("b", 3));
        let changed: Vec<_> = current.differing_from(&defaults).map(|(k, _)| k.as_str()).collect();
        assert_eq!(changed, vec!["b"]);
    }
}
