/*
    Generates premise/hypothesis sentence pairs from feature-annotated
    grammars
*/

pub mod corpus;
pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod parser;
pub mod tree;
pub mod unify;

pub use generator::{generate, generate_from, GenerateError, GenerateErrorType};
pub use grammar::{FeatureBundle, FeatureValue, Grammar, Rule, Sampling, Symbol};
pub use tree::{join, Tree};
