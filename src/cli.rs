//! CLI argument definitions using clap with subcommand architecture
//!
//! A thin harness over the library: `build` runs the refresh pipeline and
//! writes a snapshot; the query commands load the newest snapshot from the
//! index directory and serve one query against it.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cross-layer API index: catalog, call mappings, relationship graph,
/// capability search
#[derive(Parser, Debug)]
#[command(name = "lexmap")]
#[command(about = "Index a scripting wrapper API and its object model as a queryable knowledge base")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding versioned snapshot artifacts
    #[arg(long, value_name = "DIR", default_value = "index", global = true)]
    pub index_dir: PathBuf,
}

/// Available subcommands for lexmap
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full refresh pipeline and write a new snapshot
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Search the capability index with free-text intent
    #[command(visible_alias = "s")]
    Search(SearchArgs),

    /// Find the shortest relationship path between two entities
    #[command(visible_alias = "p")]
    Path(PathArgs),

    /// Show one entity with its methods, properties, and edges
    #[command(visible_alias = "e")]
    Entity(EntityArgs),

    /// Show the cross-reference coverage report of the current snapshot
    Coverage,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Wrapper-layer extraction records (JSON array)
    #[arg(long, value_name = "FILE")]
    pub wrapper: PathBuf,

    /// Model-layer extraction records (JSON array)
    #[arg(long, value_name = "FILE")]
    pub model: PathBuf,

    /// Domain synonym table (JSON); built-in table when omitted
    #[arg(long, value_name = "FILE")]
    pub synonyms: Option<PathBuf>,

    /// Prebuilt embedding artifact; keyword-only scoring when omitted
    #[arg(long, value_name = "FILE")]
    pub embeddings: Option<PathBuf>,

    /// Version string for the snapshot artifacts
    #[arg(long, value_name = "X.Y.Z", default_value = "0.1.0")]
    pub index_version: String,
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text capability query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Restrict results to one semantic category
    #[arg(short, long, value_name = "CATEGORY")]
    pub category: Option<String>,
}

/// Arguments for the path command
#[derive(Args, Debug)]
pub struct PathArgs {
    /// Source entity identifier
    #[arg(value_name = "FROM")]
    pub from: String,

    /// Target entity identifier
    #[arg(value_name = "TO")]
    pub to: String,
}

/// Arguments for the entity command
#[derive(Args, Debug)]
pub struct EntityArgs {
    /// Entity identifier
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_parse() {
        let cli = Cli::try_parse_from([
            "lexmap",
            "build",
            "--wrapper",
            "wrapper.json",
            "--model",
            "model.json",
            "--index-version",
            "2.0.0",
        ])
        .unwrap();
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.wrapper, PathBuf::from("wrapper.json"));
                assert_eq!(args.index_version, "2.0.0");
                assert!(args.synonyms.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_search_with_global_flags() {
        let cli = Cli::try_parse_from([
            "lexmap",
            "search",
            "add gloss",
            "--category",
            "lexicon",
            "--format",
            "json",
            "--index-dir",
            "/tmp/index",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.index_dir, PathBuf::from("/tmp/index"));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "add gloss");
                assert_eq!(args.category.as_deref(), Some("lexicon"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_path_alias() {
        let cli = Cli::try_parse_from(["lexmap", "p", "ILexEntry", "ILexSense"]).unwrap();
        match cli.command {
            Commands::Path(args) => {
                assert_eq!(args.from, "ILexEntry");
                assert_eq!(args.to, "ILexSense");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
