/*
    This module parses grammar files
*/

mod lexer;
mod records;
mod verifier;

use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::grammar::*;
use crate::error_handling::*;
use itertools::Itertools;
use lexer::*;
use tracing::info;

pub use records::{load_lexicon, rules_from_table, save_lexicon, LexicalTable, Lexicon, RuleRecord};

#[derive(Debug, thiserror::Error)]
pub enum CompileErrorType {
    // A line which should contain a rule does not
    #[error("Expected `=` after the rule's symbol")]
    MissingEquals,
    // A rule has multiple equals signs
    #[error("Unexpected `=` encountered")]
    UnexpectedEquals,
    // The line starts with something other than a bare symbol
    #[error("Rules must start with a bare symbol")]
    MissingLeftSymbol,
    // There is an unclosed quote
    #[error("Unmatched quotes")]
    UnmatchedQuote,
    // There is an unclosed or stray brace
    #[error("Unmatched braces")]
    UnmatchedBrace,
    #[error("Malformed feature `{0}`")]
    MalformedFeature(String),
    #[error("Invalid weight `{0}` (weights are finite and not negative)")]
    InvalidWeight(String),
    // A weight or feature bundle before a symbol, or given twice
    #[error("Weights and features go once each, after an alternative's symbols")]
    MisplacedAnnotation,
    // An alternative with no symbols at all
    #[error("Empty alternative (write `\"\"` for an empty word)")]
    EmptyAlternative,
    #[error("Rule `{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("Start symbol `{0}` has no rules")]
    UndefinedAxiom(String),
    #[error("No rules found")]
    EmptyRuleSet,
    #[error("Invalid rule record: {0}")]
    InvalidRecord(String),
    #[error("Row has {found} items but there are {expected} fields")]
    RaggedRow { expected: usize, found: usize },
    // Somehow a full rewrite was parsed as a single alternative
    // This is a problem with nligen, not the grammar
    #[error("Rewrite was not fully split (this is a problem with nligen, not the grammar)")]
    UnsplitRewrite,
    // A blank line got too deep into the parser
    // This is a problem with nligen, not the grammar
    #[error("Blank line encountered in rule parser (this is a problem with nligen, not the grammar)")]
    UnexpectedBlankLine,
    // There was an issue with reading or writing a file
    #[error("File error: {0}")]
    FileError(std::io::Error),
}

impl ErrorType for CompileErrorType {}

impl PartialEq for CompileErrorType {
    fn eq(&self, other: &Self) -> bool {
        if let CompileErrorType::FileError(a) = self {
            if let CompileErrorType::FileError(b) = other {
                return a.kind() == b.kind();
            }
        }
        return std::mem::discriminant(self) == std::mem::discriminant(other);
    }
}

pub type CompileError = Error<CompileErrorType>;
pub type CompileErrors = Errors<CompileErrorType>;

fn io_error(error: std::io::Error, file: &Path) -> CompileError {
    CompileError {
        location: Location::file(file),
        error: CompileErrorType::FileError(error)
    }
}

pub type Result<T> = std::result::Result<T, CompileErrorType>;
pub type LineResult<T> = std::result::Result<T, CompileError>;
pub type FileResult<T> = std::result::Result<T, CompileErrors>;

#[derive(PartialEq, Debug)]
struct LocatedRule {
    rule: Rule,
    location: Location
}

fn parse_alternative(left: &str, tokens: &[Token]) -> Result<Rule> {
    let mut symbols = Vec::new();
    let mut weight = None;
    let mut features = None;

    for token in tokens {
        match token {
            Token::Equals => return Err(CompileErrorType::UnexpectedEquals),
            Token::Or => return Err(CompileErrorType::UnsplitRewrite),
            Token::Word(s) | Token::Literal(s) => {
                if weight.is_some() || features.is_some() {
                    return Err(CompileErrorType::MisplacedAnnotation);
                }
                symbols.push(s.clone());
            }
            Token::Weight(w) => {
                if symbols.is_empty() || weight.replace(*w).is_some() {
                    return Err(CompileErrorType::MisplacedAnnotation);
                }
            }
            Token::Features(f) => {
                if symbols.is_empty() || features.replace(f.clone()).is_some() {
                    return Err(CompileErrorType::MisplacedAnnotation);
                }
            }
        }
    }

    if symbols.is_empty() {
        return Err(CompileErrorType::EmptyAlternative);
    }

    Ok(Rule {
        left: left.to_string(),
        right: symbols,
        weight: weight.unwrap_or(1.0),
        features: features.unwrap_or_default(),
    })
}

fn parse_line(tokens: &[Token], location: Location) -> Result<Vec<LocatedRule>> {
    // Try to get the symbol the rule is for. The match returns a result which
    // is then unwrapped with the ? operator
    let left = match tokens.first() {
        Some(Token::Word(s)) => Ok(s.clone()),
        Some(_) => Err(CompileErrorType::MissingLeftSymbol),
        None => Err(CompileErrorType::UnexpectedBlankLine)
    }?;

    if tokens.get(1) != Some(&Token::Equals) {
        return Err(CompileErrorType::MissingEquals)
    }

    tokens[2..]
        .split(|t| *t == Token::Or)
        .map(|alternative| parse_alternative(&left, alternative).map(|rule| LocatedRule {
            rule,
            location: location.clone()
        }))
        .collect()
}

fn parse_lex_line(line: &str, location: Location) -> LineResult<Vec<LocatedRule>> {
    lexer::lex_line(line)
        .and_then(|lexed_line| parse_line(&lexed_line, location.clone()))
        .map_err(|error| CompileError { location, error })
}

fn is_rule_line(line: &String) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with(';')
}

// Returns an iterator over the lines of a reader, with the io errors wrapped
// in CompileError and enumerated
fn numbered_lines(reader: impl BufRead, path: PathBuf) -> impl Iterator<Item = (usize, LineResult<String>)> {
    reader
        .lines()
        .map(move |line| line.map_err(|e| io_error(e, &path)))
        .enumerate()
        .filter(|(_, line)| line.as_ref().is_ok_and(is_rule_line) || line.is_err())
        .map(|(num, line)| (num + 1, line))
}

fn grammar_from_rules(rule_list: Vec<LocatedRule>, start: Option<&str>, path: &Path) -> FileResult<Grammar> {
    let axiom = match start {
        Some(symbol) => symbol.to_string(),
        None => rule_list.first().map(|r| r.rule.left.clone()).unwrap_or_default(),
    };

    verifier::verify_rules(&rule_list, &axiom, path)?;

    let rules = rule_list.into_iter().map(|r| r.rule).collect_vec();
    for symbol in verifier::unproductive_symbols(&rules) {
        tracing::warn!(symbol = %symbol, "`{}` can never finish rewriting", symbol);
    }

    info!(rules = rules.len(), axiom = %axiom, file = %path.display(), "loaded grammar");
    return Ok(Grammar::new(rules, &axiom));
}

/// Parses grammar text read from `reader`. `path` is only used in error
/// locations. The start symbol defaults to the first rule's left side.
pub fn parse_reader(reader: impl BufRead, path: &Path, start: Option<&str>) -> FileResult<Grammar> {
    let parsed_lines = numbered_lines(reader, path.to_path_buf()).map(|(num, line_res)| {
        line_res.and_then(|line| parse_lex_line(&line, Location {
            file: path.to_path_buf(),
            line: num
        }))
    });

    let (rules, errors): (Vec<_>, Vec<_>) = parsed_lines.partition_result();
    if errors.len() > 0 {
        return Err(errors);
    }

    return grammar_from_rules(rules.into_iter().flatten().collect_vec(), start, path);
}

pub fn parse_file(path: &Path, start: Option<&str>) -> FileResult<Grammar> {
    let file = File::open(path).map_err(|e| vec![io_error(e, path)])?;
    parse_reader(std::io::BufReader::new(file), path, start)
}
