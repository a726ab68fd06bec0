//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragline",
    version,
    author = "neur0map",
    about = "Embed a corpus, retrieve the closest documents, and ground answers in them",
    long_about = "Ragline embeds a document corpus into an exact vector index, retrieves the \
                  documents nearest to a question, and optionally asks a language model to answer \
                  using only that retrieved context."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragline/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed a corpus and save the index snapshot
    Index {
        /// Corpus file: one document per non-empty line, or a JSON array of strings (*.json)
        file: PathBuf,

        /// Snapshot path (defaults to storage.index_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Retrieve the documents closest to a question
    Query {
        /// Question text
        question: String,

        /// Number of documents to retrieve (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from retrieved context with the configured generator
    Ask {
        /// Question to ask
        question: String,

        /// Number of context documents to retrieve (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the rendered prompt before the answer
        #[arg(long)]
        show_prompt: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_arguments() {
        let cli = Cli::try_parse_from([
            "ragline",
            "--profile",
            "offline",
            "query",
            "What issues are customers facing?",
            "-k",
            "3",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.profile.as_deref(), Some("offline"));
        match cli.command {
            Commands::Query { question, k, json } => {
                assert_eq!(question, "What issues are customers facing?");
                assert_eq!(k, Some(3));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
