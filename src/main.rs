mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Show};
use nligen::error_handling::{Error, ErrorType, Location};
use nligen::parser;
use nligen::{corpus, generate_from, join, GenerateError, Grammar};

// Prints every error on its own line and signals failure
fn report<T: ErrorType>(errors: Vec<Error<T>>) -> ExitCode {
    for error in errors {
        eprintln!("{}", error);
    }
    ExitCode::FAILURE
}

fn convert_table(path: &Path, save: Option<&Path>) -> Result<ExitCode> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table: parser::LexicalTable = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a lexical table", path.display()))?;

    let lexicon = match parser::rules_from_table(&table) {
        Ok(lexicon) => lexicon,
        Err(error) => return Ok(report(vec![Error { location: Location::file(path), error }])),
    };

    match save {
        Some(target) => {
            if let Err(error) = parser::save_lexicon(target, &lexicon) {
                return Ok(report(vec![error]));
            }
            println!("Saved {} rule labels to {}", lexicon.len(), target.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&lexicon)?),
    }

    Ok(ExitCode::SUCCESS)
}

fn load_grammar(cli: &Cli) -> std::result::Result<(Grammar, Grammar), ExitCode> {
    let base = parser::parse_file(&cli.file, cli.start.as_deref())
        .map_err(report)?
        .with_sampling(cli.mode);

    let mut extra = Vec::new();
    for path in &cli.lexicons {
        extra.extend(parser::load_lexicon(path).map_err(report)?);
    }

    let full = base.clone().merge(extra);
    Ok((base, full))
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(table) = &cli.table {
        return convert_table(table, cli.save.as_deref());
    }

    let (base, grammar) = match load_grammar(&cli) {
        Ok(grammars) => grammars,
        Err(code) => return Ok(code),
    };

    match cli.show {
        Some(Show::Base) => println!("\n----Grammar {}----\n\n{}\n", cli.file.display(), base),
        Some(Show::Full) => println!("\n----Grammar {} with lexicons----\n\n{}\n", cli.file.display(), grammar),
        None => {}
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut examples = Vec::with_capacity(cli.amount as usize);
    for _ in 0..cli.amount {
        let tree = match generate_from(&grammar, grammar.axiom(), &mut rng) {
            Ok(tree) => tree,
            Err(error) => return Ok(report(vec![GenerateError { location: Location::file(&cli.file), error }])),
        };

        let tokens = tree.terminal_yield();
        if cli.tree {
            println!("sampled tree: {}", tree);
            println!("yield: {:?}", tokens);
        }

        let example = join(&tokens);
        println!("{}", example);
        examples.push(example);
    }

    if let Some(target) = &cli.save {
        let name = cli.file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let pairs = corpus::split_pairs(&examples);
        let added = corpus::merge_into(target, &name, pairs)
            .with_context(|| format!("saving examples to {}", target.display()))?;
        println!("\nSaved {} new example pairs to {}", added, target.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}

