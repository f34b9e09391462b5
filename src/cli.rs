//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Hourly weather for where you are and where you care about")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, env = "SKYCAST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Forecast for the current location
    Current {
        /// Hours of forecast to print
        #[arg(short = 'n', long, default_value = "6")]
        hours: usize,
    },

    /// Forecast for the first place matching a name
    Show {
        query: String,

        /// Hours of forecast to print
        #[arg(short = 'n', long, default_value = "6")]
        hours: usize,
    },

    /// List places matching a name
    Search { query: String },

    /// Save the first place matching a name as a favorite
    Add { query: String },

    /// Remove a favorite by name
    Remove { name: String },

    /// Refresh and list favorites
    Favorites,
}
