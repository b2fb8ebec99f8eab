use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

// One value in a feature bundle. Variables are written `?name` in grammar
// files but are never stored as prefixed strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureValue {
    Bound(String),
    Unbound(String),
}

impl FeatureValue {
    pub fn bound(value: &str) -> Self {
        FeatureValue::Bound(value.to_string())
    }

    pub fn unbound(variable: &str) -> Self {
        FeatureValue::Unbound(variable.to_string())
    }
}

impl Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Bound(value) => write!(f, "{}", value),
            FeatureValue::Unbound(variable) => write!(f, "?{}", variable),
        }
    }
}

/// Feature name to value. An absent key is simply not in the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureBundle(BTreeMap<String, FeatureValue>);

impl FeatureBundle {
    pub fn new() -> Self {
        FeatureBundle(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: FeatureValue) -> Option<FeatureValue> {
        self.0.insert(key.to_string(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Replaces every variable that already has a value in `bindings`
    pub fn resolve(&self, bindings: &HashMap<String, String>) -> FeatureBundle {
        self.iter()
            .map(|(key, value)| {
                let value = match value {
                    FeatureValue::Unbound(variable) => bindings
                        .get(variable)
                        .map(|bound| FeatureValue::Bound(bound.clone()))
                        .unwrap_or_else(|| value.clone()),
                    bound => bound.clone(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureBundle {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        FeatureBundle(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, FeatureValue)> for FeatureBundle {
    fn from_iter<I: IntoIterator<Item = (&'a str, FeatureValue)>>(iter: I) -> Self {
        FeatureBundle(iter.into_iter().map(|(key, value)| (key.to_string(), value)).collect())
    }
}

impl Display for FeatureBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter().map(|(key, value)| format!("{}: {}", key, value)).join(", ")
        )
    }
}
