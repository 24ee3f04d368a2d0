//! Command line interface for the backend binary.
//!
//! With no subcommand the binary runs the full container startup sequence
//! and then serves HTTP. The remaining subcommands run a single step, for
//! one-off administration inside the backend container.

pub mod startup;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Foodgram API server
#[derive(Parser, Debug)]
#[command(name = "foodgram-backend", version)]
#[command(about = "Foodgram recipe API server and admin commands", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The command to run; `serve` when none is given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Wait for the database, migrate, collect static files, load fixtures, then serve
    Serve,

    /// Block until the database port accepts connections
    WaitForDb,

    /// Apply pending database migrations
    Migrate,

    /// Copy static files into STATIC_ROOT and export API docs into DOCS_ROOT
    CollectStatic,

    /// Load ingredients from a header-less CSV (`name,measurement_unit`)
    LoadIngredients {
        /// Fixture path (defaults to FIXTURES_DIR/ingredients.csv)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Load tags from a header-less CSV (`name,color,slug`)
    LoadTags {
        /// Fixture path (defaults to FIXTURES_DIR/tags.csv)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Create a staff account
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        username: String,

        /// Password (can also be set via SUPERUSER_PASSWORD env var)
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },

    /// Print the OpenAPI document, or write it to a file
    ExportOpenapi {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
