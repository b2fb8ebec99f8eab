use itertools::{Itertools, PeekingNext};

use crate::grammar::{FeatureBundle, FeatureValue};
use super::{CompileErrorType, Result};

#[derive(PartialEq, Debug)]
pub enum Token {
    Equals,
    Or,
    // A bare symbol
    Word(String),
    // A quoted symbol, which may hold spaces or be empty
    Literal(String),
    Weight(f64),
    Features(FeatureBundle),
}

pub fn lex_literal(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open quote
    let token_text = line.peeking_take_while(|&c| c != '\"').collect();

    // Check if there is a close quote and consume it if there is
    if line.next() != Some('\"') {
        return Err(CompileErrorType::UnmatchedQuote);
    }

    Ok(Token::Literal(token_text))
}

pub fn lex_word(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    Ok(Token::Word(line.peeking_take_while(|c| !c.is_whitespace() && !is_reserved(*c)).collect()))
}

pub fn lex_weight(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume @
    let text: String = line.peeking_take_while(|c| !c.is_whitespace() && !is_reserved(*c)).collect();

    match text.parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight >= 0.0 => Ok(Token::Weight(weight)),
        _ => Err(CompileErrorType::InvalidWeight(text)),
    }
}

fn lex_feature_value(text: &str) -> Result<FeatureValue> {
    let text = text.trim_matches('\"');
    match text.strip_prefix('?') {
        Some("") => Err(CompileErrorType::MalformedFeature(text.to_string())),
        Some(variable) => Ok(FeatureValue::unbound(variable)),
        None => Ok(FeatureValue::bound(text)),
    }
}

pub fn lex_features(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open brace
    let body: String = line.peeking_take_while(|&c| c != '}').collect();

    if line.next() != Some('}') {
        return Err(CompileErrorType::UnmatchedBrace);
    }

    let mut features = FeatureBundle::new();
    for entry in body.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once(':')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .ok_or_else(|| CompileErrorType::MalformedFeature(entry.to_string()))?;
        features.insert(key, lex_feature_value(value)?);
    }

    Ok(Token::Features(features))
}

// Characters that end a bare word
fn is_reserved(c: char) -> bool {
    matches!(c, '=' | '|' | '\"' | '{' | '}' | '@')
}

pub fn lex_line(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(c) = line_chars.peek() {
        if *c == '=' {
            line_chars.next();
            tokens.push(Token::Equals);
        } else if *c == '|' {
            line_chars.next();
            tokens.push(Token::Or);
        } else if *c == '\"' {
            tokens.push(lex_literal(&mut line_chars)?);
        } else if *c == '{' {
            tokens.push(lex_features(&mut line_chars)?);
        } else if *c == '}' {
            return Err(CompileErrorType::UnmatchedBrace);
        } else if *c == '@' {
            tokens.push(lex_weight(&mut line_chars)?);
        } else if !c.is_whitespace() {
            tokens.push(lex_word(&mut line_chars)?);
        } else {
            line_chars.next();
        }
    }

    return Ok(tokens);
}
