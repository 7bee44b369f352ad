use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vimbridge",
    about = "Drive a headless Neovim with tracked, diffable edits",
    version
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// State directory for config, lock file and change journal
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Config file (default: <state-dir>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Editor RPC endpoint as host:port
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Code relationship graph (JSON) used to resolve names
    #[arg(long, global = true)]
    pub graph: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Editor server management
    Server {
        #[command(subcommand)]
        cmd: ServerCommand,
    },

    /// Open or create files in the editor
    File {
        #[command(subcommand)]
        cmd: FileCommand,
    },

    /// Intent-level edits
    Edit {
        #[command(subcommand)]
        cmd: EditCommand,
    },

    /// Send a raw command: `:cmd` for Ex, anything else as keys (`<Esc>` notation)
    Exec {
        /// Command text
        command: String,
    },

    /// Show or reset recorded changes
    Changes {
        /// Only changes to this file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "diff")]
        format: ChangesFormat,

        /// Clear the recorded changes
        #[arg(long)]
        reset: bool,
    },

    /// Resolve a function, class or method to a file location
    Resolve {
        /// Function or class name
        name: String,

        /// Treat NAME as a class; with --method, resolve one of its methods
        #[arg(long)]
        class: bool,

        /// Method of the class
        #[arg(long, requires = "class")]
        method: Option<String>,

        /// File to search
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Subcommand)]
pub enum ServerCommand {
    /// Start the editor server (installs an editor when none is found)
    Start,

    /// Stop the editor server
    Stop,

    /// Show editor server status
    Status,
}

#[derive(Clone, Subcommand)]
pub enum FileCommand {
    /// Open a file and start tracking it
    Open {
        path: PathBuf,
    },

    /// Create or overwrite a file
    Create {
        path: PathBuf,

        #[command(flatten)]
        content: ContentArgs,
    },
}

#[derive(Clone, Subcommand)]
pub enum EditCommand {
    /// Go to a function, optionally replacing its body
    Function {
        name: String,

        /// File containing the function (required without a graph)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Go to a class or one of its methods, optionally replacing it
    Class {
        name: String,

        /// Method to edit instead of the whole class
        #[arg(long)]
        method: Option<String>,

        /// File containing the class (required without a graph)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Add an import statement unless it is already present
    Import {
        path: PathBuf,

        /// Statement to add, e.g. "import os"
        statement: String,
    },

    /// Insert text below the first line matching a pattern
    InsertAfter {
        path: PathBuf,

        /// Editor search pattern
        #[arg(long)]
        pattern: String,

        #[command(flatten)]
        content: ContentArgs,
    },
}

/// Replacement text, inline or read from a file
#[derive(Clone, Debug, Default, clap::Args)]
pub struct ContentArgs {
    /// New content
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read new content from a file
    #[arg(long)]
    pub content_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChangesFormat {
    Diff,
    Json,
    Table,
}
