/*
    This module merges feature bundles
*/

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::grammar::{FeatureBundle, FeatureValue};

// A variable that received a concrete value while unifying `key`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub key: String,
    pub variable: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unified {
    pub features: FeatureBundle,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clash {
    // Two different concrete values. Only rules out the candidate rule.
    Conflict { key: String, left: String, right: String },
    // Two variables with nothing concrete to anchor them. Never recoverable.
    Ambiguous { key: String, left: String, right: String },
}

impl Display for Clash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Clash::Conflict { key, left, right } => write!(f, "`{}` is both `{}` and `{}`", key, left, right),
            Clash::Ambiguous { key, left, right } => write!(f, "`{}` unifies variables ?{} and ?{}", key, left, right),
        }
    }
}

pub fn unify(context: &FeatureBundle, rule: &FeatureBundle) -> Result<Unified, Clash> {
    let keys: BTreeSet<&String> = context.keys().chain(rule.keys()).collect();

    let mut features = FeatureBundle::new();
    let mut bindings = Vec::new();
    let mut conflict = None;

    for key in keys {
        let merged = match (context.get(key), rule.get(key)) {
            (Some(value), None) | (None, Some(value)) => value.clone(),
            (Some(FeatureValue::Unbound(left)), Some(FeatureValue::Unbound(right))) => {
                return Err(Clash::Ambiguous {
                    key: key.clone(),
                    left: left.clone(),
                    right: right.clone(),
                });
            }
            (Some(FeatureValue::Unbound(variable)), Some(FeatureValue::Bound(value)))
            | (Some(FeatureValue::Bound(value)), Some(FeatureValue::Unbound(variable))) => {
                bindings.push(Binding {
                    key: key.clone(),
                    variable: variable.clone(),
                    value: value.clone(),
                });
                FeatureValue::Bound(value.clone())
            }
            (Some(FeatureValue::Bound(left)), Some(FeatureValue::Bound(right))) => {
                if left != right && conflict.is_none() {
                    conflict = Some(Clash::Conflict {
                        key: key.clone(),
                        left: left.clone(),
                        right: right.clone(),
                    });
                }
                FeatureValue::Bound(left.clone())
            }
            (None, None) => continue,
        };
        features.insert(key, merged);
    }

    match conflict {
        Some(clash) => Err(clash),
        None => Ok(Unified { features, bindings }),
    }
}

/// Lays `scope` over `local`. Keys that are missing or still variable in
/// `local` take the scope's value, and each variable filled that way comes
/// back as a binding. Concrete local values are kept.
pub fn overlay(local: &FeatureBundle, scope: &FeatureBundle) -> Unified {
    let mut features = local.clone();
    let mut bindings = Vec::new();

    for (key, value) in scope.iter() {
        match (local.get(key), value) {
            (Some(FeatureValue::Bound(_)), _) => continue,
            (Some(FeatureValue::Unbound(_)), FeatureValue::Unbound(_)) => continue,
            (Some(FeatureValue::Unbound(variable)), FeatureValue::Bound(concrete)) => {
                bindings.push(Binding {
                    key: key.clone(),
                    variable: variable.clone(),
                    value: concrete.clone(),
                });
            }
            (None, _) => {}
        }
        features.insert(key, value.clone());
    }

    Unified { features, bindings }
}
