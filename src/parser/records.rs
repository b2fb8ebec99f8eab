/*
    Persisted rule records. Lexicons mined by the lexical services are stored
    as JSON and validated field by field on the way in.
*/

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::grammar::{FeatureBundle, Rule};
use super::{io_error, CompileError, CompileErrorType, FileResult, Location, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleRecord {
    pub left: String,
    pub right: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "FeatureBundle::is_empty")]
    pub features: FeatureBundle,
}

// Records grouped under the label they were mined for
pub type Lexicon = BTreeMap<String, Vec<RuleRecord>>;

/// Structured output of the chat-generation service: one column per field,
/// each row a joint lexical choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LexicalTable {
    pub fields: Vec<String>,
    pub items: Vec<Vec<String>>,
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        RuleRecord {
            left: rule.left.clone(),
            right: rule.right.clone(),
            weight: (rule.weight != 1.0).then_some(rule.weight),
            features: rule.features.clone(),
        }
    }
}

impl TryFrom<RuleRecord> for Rule {
    type Error = CompileErrorType;

    fn try_from(record: RuleRecord) -> Result<Rule> {
        if record.left.is_empty() {
            return Err(CompileErrorType::InvalidRecord("empty left side".to_string()));
        }
        if record.right.is_empty() {
            return Err(CompileErrorType::InvalidRecord(format!("`{}` has an empty right side", record.left)));
        }

        let weight = record.weight.unwrap_or(1.0);
        if !weight.is_finite() || weight < 0.0 {
            return Err(CompileErrorType::InvalidWeight(weight.to_string()));
        }

        Ok(Rule {
            left: record.left,
            right: record.right,
            weight,
            features: record.features,
        })
    }
}

fn json_error(error: serde_json::Error, path: &Path) -> CompileError {
    CompileError {
        location: Location {
            file: path.to_path_buf(),
            line: error.line()
        },
        error: CompileErrorType::InvalidRecord(error.to_string())
    }
}

/// Reads a lexicon file and returns its rules in label order, then record
/// order. Every invalid record is reported.
pub fn load_lexicon(path: &Path) -> FileResult<Vec<Rule>> {
    let file = File::open(path).map_err(|e| vec![io_error(e, path)])?;
    let lexicon: Lexicon = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| vec![json_error(e, path)])?;

    let mut rules = Vec::new();
    let mut errors = Vec::new();
    for record in lexicon.into_values().flatten() {
        match Rule::try_from(record) {
            Ok(rule) => rules.push(rule),
            Err(error) => errors.push(CompileError { location: Location::file(path), error }),
        }
    }

    if errors.len() > 0 {
        return Err(errors);
    }

    tracing::info!(rules = rules.len(), file = %path.display(), "loaded lexicon");
    return Ok(rules);
}

pub fn save_lexicon(path: &Path, lexicon: &Lexicon) -> std::result::Result<(), CompileError> {
    let file = File::create(path).map_err(|e| io_error(e, path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, lexicon).map_err(|e| json_error(e, path))?;
    writer.write_all(b"\n").and_then(|_| writer.flush()).map_err(|e| io_error(e, path))
}

/// Splits a lexical table column by column: every field becomes a label
/// holding one `field -> [word]` record per row.
pub fn rules_from_table(table: &LexicalTable) -> Result<Lexicon> {
    if let Some(row) = table.items.iter().find(|row| row.len() != table.fields.len()) {
        return Err(CompileErrorType::RaggedRow {
            expected: table.fields.len(),
            found: row.len()
        });
    }

    let lexicon = table.fields.iter()
        .enumerate()
        .map(|(column, field)| {
            let records = table.items.iter()
                .map(|row| RuleRecord {
                    left: field.clone(),
                    right: vec![row[column].clone()],
                    weight: None,
                    features: FeatureBundle::new(),
                })
                .collect();
            (field.clone(), records)
        })
        .collect();

    Ok(lexicon)
}
