/*
    This module generates derivation trees
*/

use std::collections::HashMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use tracing::{debug, trace};

use crate::error_handling::*;
use crate::grammar::*;
use crate::tree::Tree;
use crate::unify::{overlay, unify, Binding, Clash, Unified};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateErrorType {
    // The start symbol is not the left side of any rule
    #[error("No rule rewrites the start symbol `{0}`")]
    UnknownAxiom(Symbol),
    // Every rule for a symbol was ruled out by the features gathered so far
    #[error("No rule for `{symbol}` applies under {features}")]
    NoApplicableRule { symbol: Symbol, features: FeatureBundle },
    // A rule tried to unify two unbound variables
    #[error("Rules for `{symbol}` unify variables ?{left} and ?{right} on feature `{key}`")]
    AmbiguousVariables { symbol: Symbol, key: String, left: String, right: String },
}

impl ErrorType for GenerateErrorType {}

pub type GenerateError = Error<GenerateErrorType>;
pub type GenResult = Result<Tree, GenerateErrorType>;

// A tree node while the derivation is still running. Children are indices
// into the same arena.
struct Node {
    label: Symbol,
    features: FeatureBundle,
    children: Vec<usize>,
}

impl Grammar {
    pub fn generate<R: Rng>(&self, rng: &mut R) -> GenResult {
        generate_from(self, self.axiom(), rng)
    }
}

pub fn generate(grammar: &Grammar) -> GenResult {
    grammar.generate(&mut thread_rng())
}

// Generates a tree in the given grammar starting with the given symbol
pub fn generate_from<R: Rng>(grammar: &Grammar, start: &str, rng: &mut R) -> GenResult {
    if !grammar.is_non_terminal(start) {
        return Err(GenerateErrorType::UnknownAxiom(start.to_string()));
    }

    // Most specific features resolved so far for each non-terminal, and the
    // values of the variables bound during this derivation
    let mut scopes: HashMap<&str, FeatureBundle> = grammar.non_terminals()
        .iter()
        .map(|symbol| (symbol.as_str(), FeatureBundle::new()))
        .collect();
    let mut variables: HashMap<String, String> = HashMap::new();

    let mut arena = vec![Node {
        label: start.to_string(),
        features: FeatureBundle::new(),
        children: Vec::new(),
    }];
    let mut stack: Vec<(usize, Option<&str>)> = vec![(0, None)];

    while let Some((index, parent)) = stack.pop() {
        let node = &arena[index];
        if grammar.is_terminal(&node.label) {
            continue;
        }

        // Variables the node already knows win over the scope. Those the
        // scope fills in stay bound for the rest of the derivation.
        let local = node.features.resolve(&variables);
        let scoped = match scopes.get(node.label.as_str()) {
            Some(scope) => overlay(&local, scope),
            None => Unified { features: local, bindings: Vec::new() },
        };
        for binding in scoped.bindings {
            bind(&mut scopes, &mut variables, parent, binding);
        }
        let context = scoped.features;

        let candidates = applicable_rules(grammar, &node.label, &context, &variables)?;
        let (rule, unified) = choose(grammar.sampling(), candidates, rng)
            .ok_or_else(|| GenerateErrorType::NoApplicableRule {
                symbol: node.label.clone(),
                features: context.clone(),
            })?;

        trace!(rule = %rule, features = %unified.features, "applied rule");

        for binding in unified.bindings {
            bind(&mut scopes, &mut variables, parent, binding);
        }

        let first_child = arena.len();
        for symbol in &rule.right {
            arena.push(Node {
                label: symbol.clone(),
                features: unified.features.clone(),
                children: Vec::new(),
            });
        }
        let children = first_child..arena.len();
        arena[index].children = children.clone().collect();

        // Reversed so the leftmost child is popped first
        stack.extend(children.rev().map(|child| (child, Some(rule.left.as_str()))));
    }

    return Ok(assemble(arena));
}

// Records a binding in the parent's scope and in the derivation's variables
fn bind<'g>(
    scopes: &mut HashMap<&'g str, FeatureBundle>,
    variables: &mut HashMap<String, String>,
    parent: Option<&'g str>,
    binding: Binding
) {
    debug!(variable = %binding.variable, value = %binding.value, key = %binding.key, "bound variable");
    if let Some(parent) = parent {
        scopes.entry(parent)
            .or_default()
            .insert(&binding.key, FeatureValue::Bound(binding.value.clone()));
    }
    variables.insert(binding.variable, binding.value);
}

// Collects every rule for `symbol` whose features unify with the context
fn applicable_rules<'g>(
    grammar: &'g Grammar,
    symbol: &str,
    context: &FeatureBundle,
    variables: &HashMap<String, String>
) -> Result<Vec<(&'g Rule, Unified)>, GenerateErrorType> {
    let mut candidates = Vec::new();

    for rule in grammar.rules_for(symbol) {
        match unify(context, &rule.features.resolve(variables)) {
            Ok(unified) => candidates.push((rule, unified)),
            Err(clash @ Clash::Conflict { .. }) => trace!(rule = %rule, "rejected: {}", clash),
            Err(Clash::Ambiguous { key, left, right }) => {
                return Err(GenerateErrorType::AmbiguousVariables {
                    symbol: symbol.to_string(),
                    key,
                    left,
                    right,
                });
            }
        }
    }

    return Ok(candidates);
}

// Weights are the rules' own normalised weights, not renormalised over the
// candidates that survived unification
fn choose<'g, R: Rng>(
    sampling: Sampling,
    candidates: Vec<(&'g Rule, Unified)>,
    rng: &mut R
) -> Option<(&'g Rule, Unified)> {
    if candidates.is_empty() {
        return None;
    }

    let index = match sampling {
        Sampling::Uniform => rng.gen_range(0..candidates.len()),
        Sampling::Weighted => WeightedIndex::new(candidates.iter().map(|(rule, _)| rule.weight))
            .ok()?
            .sample(rng),
    };

    candidates.into_iter().nth(index)
}

// Turns the arena into an owned tree. Children always come after their
// parent, so building from the back finds every child already built.
fn assemble(arena: Vec<Node>) -> Tree {
    let mut built: Vec<Option<Tree>> = (0..arena.len()).map(|_| None).collect();

    for (index, node) in arena.into_iter().enumerate().rev() {
        let children = node.children.iter().filter_map(|&child| built[child].take()).collect();
        built[index] = Some(Tree {
            label: node.label,
            features: node.features,
            children,
        });
    }

    built.into_iter().next().flatten().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::tree::join;

    fn features(pairs: &[(&str, FeatureValue)]) -> FeatureBundle {
        pairs.iter().cloned().collect()
    }

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn agreement_grammar() -> Grammar {
        Grammar::new(vec![
            Rule::new("S", &["[P]", "A", ".", "[H]", "B", "."]),
            Rule::new("A", &["NAME", "sleeps"]).with_features(features(&[("name", FeatureValue::unbound("n"))])),
            Rule::new("B", &["NAME", "rests"]).with_features(features(&[("name", FeatureValue::unbound("n"))])),
            Rule::new("NAME", &["Alice"]).with_features(features(&[("name", FeatureValue::bound("Alice"))])),
            Rule::new("NAME", &["Bob"]).with_features(features(&[("name", FeatureValue::bound("Bob"))])),
        ], "S")
    }

    #[test]
    fn shared_variable_agrees_across_premise_and_hypothesis() {
        let grammar = agreement_grammar();
        let mut seen = HashSet::new();

        for seed in 0..200 {
            let tree = grammar.generate(&mut seeded(seed)).unwrap();
            seen.insert(join(&tree.terminal_yield()));
        }

        let expected: HashSet<String> = [
            "[P] Alice sleeps. [H] Alice rests.",
            "[P] Bob sleeps. [H] Bob rests.",
        ].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn parent_scope_carries_bindings_between_variables() {
        // Both SUBJ rules use different variables, the SUBJ scope still
        // forces the second subject to repeat the first name
        let grammar = Grammar::new(vec![
            Rule::new("S", &["SUBJ", "sleeps", "and", "SUBJ", "rests"]),
            Rule::new("SUBJ", &["NAME"]).with_features(features(&[("name", FeatureValue::unbound("a"))])),
            Rule::new("SUBJ", &["NAME", "too"]).with_features(features(&[("name", FeatureValue::unbound("b"))])),
            Rule::new("NAME", &["Alice"]).with_features(features(&[("name", FeatureValue::bound("Alice"))])),
            Rule::new("NAME", &["Bob"]).with_features(features(&[("name", FeatureValue::bound("Bob"))])),
            Rule::new("NAME", &["Carol"]).with_features(features(&[("name", FeatureValue::bound("Carol"))])),
        ], "S");

        for seed in 0..200 {
            let tree = grammar.generate(&mut seeded(seed)).unwrap();
            let names: Vec<&str> = tree.terminal_yield()
                .into_iter()
                .filter(|t| ["Alice", "Bob", "Carol"].contains(t))
                .collect();
            assert_eq!(names.len(), 2);
            assert_eq!(names[0], names[1]);
        }
    }

    #[test]
    fn scope_values_bind_waiting_variables() {
        // The second P takes its name from the P scope, which must also bind
        // ?m so that R repeats it
        let grammar = Grammar::new(vec![
            Rule::new("S", &["P", "Q"]),
            Rule::new("P", &["NAME"]).with_features(features(&[("name", FeatureValue::unbound("x"))])),
            Rule::new("Q", &["P", "R"]).with_features(features(&[("name", FeatureValue::unbound("m"))])),
            Rule::new("R", &["NAME"]),
            Rule::new("NAME", &["Alice"]).with_features(features(&[("name", FeatureValue::bound("Alice"))])),
            Rule::new("NAME", &["Bob"]).with_features(features(&[("name", FeatureValue::bound("Bob"))])),
        ], "S");

        for seed in 0..200 {
            let tree = grammar.generate(&mut seeded(seed)).unwrap();
            let names = tree.terminal_yield();
            assert_eq!(names.len(), 3);
            assert_eq!(names[1], names[2], "seed {} gave {:?}", seed, names);
        }
    }

    #[test]
    fn children_inherit_merged_features() {
        let grammar = agreement_grammar();
        let tree = grammar.generate(&mut seeded(7)).unwrap();

        let a = &tree.children[1];
        assert_eq!(a.label, "A");
        let name = &a.children[0];
        assert_eq!(name.features, features(&[("name", FeatureValue::unbound("n"))]));

        let chosen = name.children[0].label.clone();
        assert_eq!(name.children[0].features, features(&[("name", FeatureValue::Bound(chosen))]));
    }

    #[test]
    fn terminates_with_terminal_leaves() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["NP", "VP"]),
            Rule::new("NP", &["ADJ", "NP"]),
            Rule::new("NP", &["ideas"]),
            Rule::new("ADJ", &["colorless"]),
            Rule::new("ADJ", &["green"]),
            Rule::new("VP", &["sleep", "ADV"]),
            Rule::new("ADV", &["furiously"]),
            Rule::new("ADV", &[""]),
        ], "S");

        for seed in 0..100 {
            let tree = grammar.generate(&mut seeded(seed)).unwrap();
            let leaves = tree.terminal_yield();
            assert!(leaves.iter().all(|leaf| grammar.is_terminal(leaf)));
            assert_eq!(leaves.len(), tree.leaf_count());
            assert_eq!(tree.label, "S");
        }
    }

    #[test]
    fn same_seed_same_tree() {
        let grammar = agreement_grammar();
        assert_eq!(
            grammar.generate(&mut seeded(42)).unwrap(),
            grammar.generate(&mut seeded(42)).unwrap()
        );
    }

    #[test]
    fn deep_derivations_build_compare_and_drop() {
        let depth = 200_000;
        let mut rules: Vec<Rule> = (0..depth)
            .map(|i| Rule::new(&format!("N{}", i), &[format!("N{}", i + 1).as_str()]))
            .collect();
        rules.push(Rule::new(&format!("N{}", depth), &["end"]));
        let grammar = Grammar::new(rules, "N0");

        let tree = grammar.generate(&mut seeded(0)).unwrap();
        assert_eq!(tree.terminal_yield(), vec!["end"]);
        assert!(tree == grammar.generate(&mut seeded(1)).unwrap());
        drop(tree);
    }

    #[test]
    fn generate_with_thread_rng() {
        let tree = generate(&agreement_grammar()).unwrap();
        assert_eq!(tree.label, "S");
        assert_eq!(tree.leaf_count(), 8);
    }

    #[test]
    fn start_from_other_symbol() {
        let grammar = agreement_grammar();
        let tree = generate_from(&grammar, "NAME", &mut seeded(1)).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert!(["Alice", "Bob"].contains(&tree.terminal_yield()[0]));
    }

    #[test]
    fn unknown_axiom() {
        let grammar = Grammar::new(vec![Rule::new("S", &["p"])], "T");
        assert_eq!(
            grammar.generate(&mut seeded(0)),
            Err(GenerateErrorType::UnknownAxiom("T".to_string()))
        );
        assert_eq!(
            generate_from(&grammar, "p", &mut seeded(0)),
            Err(GenerateErrorType::UnknownAxiom("p".to_string()))
        );
    }

    #[test]
    fn no_applicable_rule() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["NAME", "sleeps"]).with_features(features(&[("name", FeatureValue::bound("Carol"))])),
            Rule::new("NAME", &["Alice"]).with_features(features(&[("name", FeatureValue::bound("Alice"))])),
            Rule::new("NAME", &["Bob"]).with_features(features(&[("name", FeatureValue::bound("Bob"))])),
        ], "S");

        assert_eq!(
            grammar.generate(&mut seeded(0)),
            Err(GenerateErrorType::NoApplicableRule {
                symbol: "NAME".to_string(),
                features: features(&[("name", FeatureValue::bound("Carol"))]),
            })
        );
    }

    #[test]
    fn variables_without_anchor_are_fatal() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["A"]).with_features(features(&[("x", FeatureValue::unbound("a"))])),
            Rule::new("A", &["a"]).with_features(features(&[("x", FeatureValue::unbound("b"))])),
        ], "S");

        assert!(matches!(
            grammar.generate(&mut seeded(0)),
            Err(GenerateErrorType::AmbiguousVariables { .. })
        ));
    }

    #[test]
    fn zero_weight_is_unreachable() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["MOD"]),
            Rule::new("MOD", &["OB"]).weighted(1.0),
            Rule::new("MOD", &["PE"]).weighted(0.0),
        ], "S");

        for seed in 0..100 {
            let tree = grammar.generate(&mut seeded(seed)).unwrap();
            assert_eq!(tree.terminal_yield(), vec!["OB"]);
        }
    }

    #[test]
    fn zero_weight_survivors_have_no_applicable_rule() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["MOD"]).with_features(features(&[("m", FeatureValue::bound("pe"))])),
            Rule::new("MOD", &["OB"]).weighted(1.0).with_features(features(&[("m", FeatureValue::bound("ob"))])),
            Rule::new("MOD", &["PE"]).weighted(0.0).with_features(features(&[("m", FeatureValue::bound("pe"))])),
        ], "S");

        assert!(matches!(
            grammar.generate(&mut seeded(0)),
            Err(GenerateErrorType::NoApplicableRule { .. })
        ));

        let uniform = grammar.with_sampling(Sampling::Uniform);
        assert_eq!(uniform.generate(&mut seeded(0)).unwrap().terminal_yield(), vec!["PE"]);
    }

    #[test]
    fn uniform_sampling_ignores_weights() {
        let grammar = Grammar::new(vec![
            Rule::new("S", &["MOD"]),
            Rule::new("MOD", &["OB"]).weighted(0.999),
            Rule::new("MOD", &["PE"]).weighted(0.001),
        ], "S").with_sampling(Sampling::Uniform);

        let mut rng = seeded(3);
        let picks: Vec<String> = (0..400)
            .map(|_| grammar.generate(&mut rng).unwrap().terminal_yield()[0].to_string())
            .collect();
        let pe = picks.iter().filter(|p| *p == "PE").count();
        assert!(pe > 100 && pe < 300, "PE picked {} times", pe);
    }

    #[test]
    fn shared_grammar_across_threads() {
        let grammar = agreement_grammar();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|seed| {
                    let grammar = &grammar;
                    scope.spawn(move || {
                        let mut rng = seeded(seed);
                        (0..50).all(|_| {
                            let text = join(&grammar.generate(&mut rng).unwrap().terminal_yield());
                            text == "[P] Alice sleeps. [H] Alice rests." || text == "[P] Bob sleeps. [H] Bob rests."
                        })
                    })
                })
                .collect();

            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });
    }
}
