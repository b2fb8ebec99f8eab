/*
    This module is for storing and manipulating grammars
*/

mod features;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use tracing::{debug, warn};

pub use features::{FeatureBundle, FeatureValue};

// Weight sums closer than this to 1.0 count as normalised
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

// The base unit in a grammar rule. Whether a symbol is terminal is decided by
// the grammar it appears in, never by the symbol itself.
pub type Symbol = String;

#[derive(Debug, Clone)]
pub struct Rule {
    pub left: Symbol,
    pub right: Vec<Symbol>,
    pub weight: f64,
    pub features: FeatureBundle,
}

impl Rule {
    pub fn new(left: &str, right: &[&str]) -> Self {
        Rule {
            left: left.to_string(),
            right: right.iter().map(|s| s.to_string()).collect(),
            weight: 1.0,
            features: FeatureBundle::new(),
        }
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_features(mut self, features: FeatureBundle) -> Self {
        self.features = features;
        self
    }
}

// Rules are the same production whatever their weight or features. Merging
// mined rules relies on this.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left && self.right == other.right
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.left.hash(state);
        self.right.hash(state);
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> [{}]", self.left, self.right.iter().join(", "))?;
        if self.weight != 1.0 {
            write!(f, " @{}", self.weight)?;
        }
        if !self.features.is_empty() {
            write!(f, " {}", self.features)?;
        }
        Ok(())
    }
}

/// How `generate` picks among the rules that survive unification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Sampling {
    /// Proportionally to each rule's normalised weight
    #[default]
    Weighted,
    /// Uniformly, ignoring weights
    Uniform,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<Rule>,
    axiom: Symbol,
    non_terminals: BTreeSet<Symbol>,
    terminals: BTreeSet<Symbol>,
    rules_by_left: HashMap<Symbol, Vec<usize>>,
    sampling: Sampling,
}

impl Grammar {
    pub fn new(mut rules: Vec<Rule>, axiom: &str) -> Self {
        normalize_weights(&mut rules);

        let non_terminals: BTreeSet<Symbol> = rules.iter().map(|rule| rule.left.clone()).collect();
        let terminals = rules.iter()
            .flat_map(|rule| rule.right.iter())
            .filter(|symbol| !non_terminals.contains(*symbol))
            .cloned()
            .collect();

        let mut rules_by_left: HashMap<Symbol, Vec<usize>> = HashMap::with_capacity(non_terminals.len());
        for (index, rule) in rules.iter().enumerate() {
            rules_by_left.entry(rule.left.clone()).or_default().push(index);
        }

        debug!(rules = rules.len(), non_terminals = non_terminals.len(), axiom, "grammar built");

        Grammar {
            rules,
            axiom: axiom.to_string(),
            non_terminals,
            terminals,
            rules_by_left,
            sampling: Sampling::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Adds rules not already present (by left and right side) and rebuilds
    /// the symbol partition and weights.
    pub fn merge(self, extra: Vec<Rule>) -> Self {
        let Grammar { rules, axiom, sampling, .. } = self;
        let known: HashSet<&Rule> = rules.iter().collect();
        let added = extra.iter().unique().filter(|rule| !known.contains(rule)).count();
        debug!(added, "merged rules into grammar");
        let merged = rules.into_iter().chain(extra).unique().collect_vec();
        Grammar::new(merged, &axiom).with_sampling(sampling)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn axiom(&self) -> &str {
        &self.axiom
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn terminals(&self) -> &BTreeSet<Symbol> {
        &self.terminals
    }

    pub fn non_terminals(&self) -> &BTreeSet<Symbol> {
        &self.non_terminals
    }

    pub fn is_terminal(&self, symbol: &str) -> bool {
        !self.non_terminals.contains(symbol)
    }

    pub fn is_non_terminal(&self, symbol: &str) -> bool {
        self.non_terminals.contains(symbol)
    }

    // The rules rewriting `symbol`, in the order they were given
    pub fn rules_for<'a>(&'a self, symbol: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules_by_left
            .get(symbol)
            .into_iter()
            .flatten()
            .map(move |&index| &self.rules[index])
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bullet = "\n   - ";
        writeln!(f, "Axiom:{}{}\n", bullet, self.axiom)?;
        writeln!(f, "Terminals:{}{}\n", bullet, self.terminals.iter().join(bullet))?;
        writeln!(f, "Non-terminals:{}{}\n", bullet, self.non_terminals.iter().join(bullet))?;
        write!(f, "Rules:{}{}", bullet, self.rules.iter().join(bullet))
    }
}

// Scales each non-terminal's weights to sum to one, warning when they did not
fn normalize_weights(rules: &mut [Rule]) {
    let mut totals: HashMap<Symbol, f64> = HashMap::new();
    for rule in rules.iter() {
        *totals.entry(rule.left.clone()).or_default() += rule.weight;
    }

    for (symbol, total) in totals.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        if (total - 1.0).abs() <= WEIGHT_TOLERANCE {
            continue;
        }
        if *total <= 0.0 {
            warn!(symbol = %symbol, "every rule for `{}` has weight zero", symbol);
            continue;
        }
        warn!(symbol = %symbol, total, "weights for `{}` sum to {:.6}, normalising", symbol, total);
    }

    for rule in rules.iter_mut() {
        let total = totals[&rule.left];
        if total > 0.0 && (total - 1.0).abs() > WEIGHT_TOLERANCE {
            rule.weight /= total;
        }
    }
}
