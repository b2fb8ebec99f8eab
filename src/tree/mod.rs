/*
    This module holds derivation trees and turns them back into text
*/

mod join;

use std::fmt::Display;
use std::iter::zip;

use crate::grammar::{FeatureBundle, Symbol};

pub use join::join;

/// A derivation tree. Dropping and comparing walk the tree with an explicit
/// stack, so derivations of any depth are safe; `Debug` still recurses and is
/// meant for small trees.
#[derive(Debug, Default)]
pub struct Tree {
    pub label: Symbol,
    pub features: FeatureBundle,
    pub children: Vec<Tree>,
}

impl Tree {
    pub fn new(label: &str) -> Self {
        Tree {
            label: label.to_string(),
            features: FeatureBundle::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(label: &str, children: Vec<Tree>) -> Self {
        let mut tree = Tree::new(label);
        tree.children = children;
        tree
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The leaf labels from left to right. For a finished derivation these are
    /// exactly its terminals.
    pub fn terminal_yield(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                leaves.push(node.label.as_str());
            } else {
                stack.extend(node.children.iter().rev());
            }
        }

        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.terminal_yield().len()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];

        while let Some((left, right)) = stack.pop() {
            if left.label != right.label
                || left.features != right.features
                || left.children.len() != right.children.len()
            {
                return false;
            }
            stack.extend(zip(&left.children, &right.children));
        }

        true
    }
}

enum Visit<'a> {
    Open(&'a Tree),
    Close,
}

// Bracketed notation: `[ S [ A Alice sleeps ] . ]`
impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        let mut stack = vec![Visit::Open(self)];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Open(node) if node.is_leaf() => parts.push(&node.label),
                Visit::Open(node) => {
                    parts.push("[");
                    parts.push(&node.label);
                    stack.push(Visit::Close);
                    stack.extend(node.children.iter().rev().map(Visit::Open));
                }
                Visit::Close => parts.push("]"),
            }
        }

        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(label: &str) -> Tree {
        Tree::new(label)
    }

    fn sample() -> Tree {
        Tree::with_children("S", vec![
            leaf("[P]"),
            Tree::with_children("A", vec![
                Tree::with_children("NAME", vec![leaf("Alice")]),
                leaf("sleeps"),
            ]),
            leaf("."),
        ])
    }

    #[test]
    fn yield_left_to_right() {
        assert_eq!(sample().terminal_yield(), vec!["[P]", "Alice", "sleeps", "."]);
        assert_eq!(sample().leaf_count(), 4);
        assert_eq!(leaf("p").terminal_yield(), vec!["p"]);
    }

    #[test]
    fn render_brackets() {
        assert_eq!(sample().to_string(), "[ S [P] [ A [ NAME Alice ] sleeps ] . ]");
        assert_eq!(leaf("p").to_string(), "p");
    }

    #[test]
    fn compare_trees() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), leaf("S"));

        let mut renamed = sample();
        renamed.children[1].children[0].children[0].label = "Bob".to_string();
        assert_ne!(sample(), renamed);

        let mut pruned = sample();
        pruned.children.pop();
        assert_ne!(sample(), pruned);
    }

    fn chain(depth: usize, last: &str) -> Tree {
        let mut tree = leaf(last);
        for _ in 0..depth {
            tree = Tree::with_children("N", vec![tree]);
        }
        tree
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let tree = chain(300_000, "x");
        assert_eq!(tree.terminal_yield(), vec!["x"]);
        assert!(tree.to_string().ends_with("x ]"));

        assert!(tree == chain(300_000, "x"));
        assert!(tree != chain(300_000, "y"));
        drop(tree);
    }
}
