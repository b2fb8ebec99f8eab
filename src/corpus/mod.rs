/*
    This module turns generated examples into premise/hypothesis pairs and
    keeps them in a JSON corpus
*/

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use tracing::info;

pub const PREMISE_MARKER: &str = "[P]";
pub const HYPOTHESIS_MARKER: &str = "[H]";

pub type Pair = (String, String);

// Grammar name to its example pairs
pub type Corpus = BTreeMap<String, Vec<Pair>>;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Could not access corpus: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corpus is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Splits a joined example at its hypothesis marker. Examples without one are
/// not pairs.
pub fn split_pair(example: &str) -> Option<Pair> {
    let (premise, hypothesis) = example.split_once(HYPOTHESIS_MARKER)?;
    let premise = premise.replacen(PREMISE_MARKER, "", 1);
    Some((premise.trim().to_string(), hypothesis.trim().to_string()))
}

pub fn split_pairs<S: AsRef<str>>(examples: &[S]) -> Vec<Pair> {
    examples.iter().filter_map(|example| split_pair(example.as_ref())).collect()
}

pub fn load(path: &Path) -> Result<Corpus, CorpusError> {
    if !path.exists() {
        return Ok(Corpus::new());
    }
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Appends `pairs` under `name` in the corpus file, creating it if needed.
/// Pairs already stored are not repeated. Returns how many were added.
pub fn merge_into(path: &Path, name: &str, pairs: Vec<Pair>) -> Result<usize, CorpusError> {
    let mut corpus = load(path)?;

    let stored = corpus.entry(name.to_string()).or_default();
    let known: HashSet<&Pair> = stored.iter().collect();
    let added = pairs.iter().unique().filter(|pair| !known.contains(pair)).count();
    let merged = stored.drain(..).chain(pairs).unique().collect_vec();
    *stored = merged;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &corpus)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(added, grammar = name, file = %path.display(), "saved examples");
    Ok(added)
}
