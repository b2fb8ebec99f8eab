use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::grammar::{Rule, Symbol};
use super::CompileErrorType::{DuplicateRule, EmptyRuleSet, UndefinedAxiom};
use super::{CompileError, CompileErrors, FileResult, Location, LocatedRule};

fn get_duplicate_rules(rules: &[LocatedRule]) -> CompileErrors {
    // Every repeat of an earlier production is reported where it repeats
    let mut seen = HashSet::with_capacity(rules.len());
    rules.iter()
        .filter(|located| !seen.insert(&located.rule))
        .map(|located| CompileError {
            location: located.location.clone(),
            error: DuplicateRule(located.rule.to_string())
        })
        .collect()
}

fn get_undefined_axiom(rules: &[LocatedRule], axiom: &str, path: &Path) -> Option<CompileError> {
    if rules.iter().any(|located| located.rule.left == axiom) {
        return None;
    }

    Some(CompileError {
        location: Location::file(path),
        error: if rules.is_empty() { EmptyRuleSet } else { UndefinedAxiom(axiom.to_string()) }
    })
}

pub fn verify_rules(rules: &[LocatedRule], axiom: &str, path: &Path) -> FileResult<()> {
    let mut errors = Vec::new();

    errors.extend(get_duplicate_rules(rules));
    errors.extend(get_undefined_axiom(rules, axiom, path));

    if errors.len() > 0 {
        Err(errors)
    } else {
        Ok(())
    }
}

/// Non-terminals from which no sequence of rewrites reaches terminals only.
/// Generating through one of these never finishes.
pub fn unproductive_symbols(rules: &[Rule]) -> BTreeSet<Symbol> {
    let non_terminals: BTreeSet<&str> = rules.iter().map(|rule| rule.left.as_str()).collect();
    let mut productive: HashSet<&str> = HashSet::new();

    loop {
        let before = productive.len();
        for rule in rules {
            let finishes = rule.right.iter()
                .all(|symbol| !non_terminals.contains(symbol.as_str()) || productive.contains(symbol.as_str()));
            if finishes {
                productive.insert(&rule.left);
            }
        }
        if productive.len() == before {
            break;
        }
    }

    non_terminals.into_iter()
        .filter(|symbol| !productive.contains(symbol))
        .map(str::to_string)
        .collect()
}
