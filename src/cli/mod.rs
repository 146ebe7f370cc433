//! CLI module for askdoc
//!
//! Provides command-line interface parsing and handling for the askdoc binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// askdoc - ask questions about a PDF, text or CSV document
#[derive(Parser, Debug)]
#[command(
    name = "askdoc",
    version,
    about = "Ask questions about a PDF, text or CSV document",
    long_about = "Builds a searchable index of a document and answers natural-language\n\
                  questions about it with a language model grounded on the retrieved passages.\n\n\
                  Indexes are cached by content, so asking about the same file again is cheap.",
    after_help = "EXAMPLES:\n    \
                  askdoc init                                  # Write a starter askdoc.toml\n    \
                  askdoc process handbook.pdf                  # Build and persist the index\n    \
                  askdoc ask handbook.pdf \"Who do I call?\"     # Answer a question\n    \
                  askdoc ask --index data/indexes/<key>.askidx \"Who do I call?\""
)]
pub struct Cli {
    /// Path to the configuration file [default: askdoc.toml, if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Retry transient embedding and model failures this many times
    #[arg(long, global = true, default_value_t = 0)]
    pub retries: usize,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter askdoc.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// Provider for embeddings and answers
        #[arg(long, default_value = "openai", value_parser = ["openai", "ollama"])]
        provider: String,
    },

    /// Build (or reuse) the index for a document
    Process {
        /// Document to index (.pdf, .txt or .csv)
        file: PathBuf,
    },

    /// Answer a question about a document
    #[command(
        allow_missing_positional = true,
        group = clap::ArgGroup::new("target").required(true).args(["file", "index"])
    )]
    Ask {
        /// Document to ask about; processed first if needed
        file: Option<PathBuf>,

        /// The question
        question: String,

        /// Answer from a persisted index bundle instead of a document
        #[arg(long, conflicts_with = "file")]
        index: Option<PathBuf>,

        /// Also print the retrieved passages
        #[arg(short, long)]
        sources: bool,
    },

    /// Show the effective configuration, secrets redacted
    Config {
        /// Only validate the configuration
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
