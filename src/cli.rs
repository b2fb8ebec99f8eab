use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use nligen::Sampling;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Show {
    /// The grammar file's rules only
    Base,
    /// The grammar with every lexicon merged in
    Full,
}

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// File containing the grammar
    pub file: PathBuf,

    /// Start symbol (default: first in the file)
    #[arg(short, long, value_name = "SYMBOL")]
    pub start: Option<String>,

    /// Amount to generate
    #[arg(short = 'n', long, value_name = "AMOUNT", default_value_t = 1)]
    pub amount: u32,

    /// How to pick among applicable rules
    #[arg(short, long, value_enum, default_value_t = Sampling::Weighted)]
    pub mode: Sampling,

    /// JSON rule records to merge into the grammar
    #[arg(short, long = "lexicon", value_name = "FILE")]
    pub lexicons: Vec<PathBuf>,

    /// Print the grammar before generating
    #[arg(long, value_enum, value_name = "TYPE")]
    pub show: Option<Show>,

    /// Print each derivation tree and its yield
    #[arg(short, long)]
    pub tree: bool,

    /// Seed for reproducible output
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Save example pairs (or converted rules with --table) to this file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Convert a lexical table into rule records instead of generating
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// More logging (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    // Default log filter when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arguments() {
        let cli = Cli::parse_from([
            "nligen", "grammar.bnf", "-n", "5", "-m", "uniform",
            "-l", "a.json", "-l", "b.json", "--show", "full", "-vv", "--seed", "9",
        ]);

        assert_eq!(cli.file, PathBuf::from("grammar.bnf"));
        assert_eq!(cli.amount, 5);
        assert_eq!(cli.mode, Sampling::Uniform);
        assert_eq!(cli.lexicons, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(cli.show, Some(Show::Full));
        assert_eq!(cli.seed, Some(9));
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["nligen", "grammar.bnf"]);
        assert_eq!(cli.amount, 1);
        assert_eq!(cli.mode, Sampling::Weighted);
        assert!(cli.start.is_none() && cli.save.is_none() && cli.table.is_none());
        assert!(!cli.tree);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["nligen", "g.bnf", "-q", "-v"]).is_err());
        assert_eq!(Cli::parse_from(["nligen", "g.bnf", "-q"]).log_level(), "error");
    }
}
