//! Command-line interface definition for coursetimers
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to sign in, inspect and drive study timers.

use clap::{Parser, Subcommand};

/// coursetimers - study timer client
///
/// Starts, stops and adjusts per-course study timers kept by a remote
/// session service.
#[derive(Parser, Debug, Clone)]
#[command(name = "coursetimers")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Override the session service base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Act as this user instead of the stored one
    #[arg(short, long)]
    pub username: Option<String>,

    /// Override the local state directory
    #[arg(long)]
    pub state_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for coursetimers
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Remember the username sent with every request
    Login {
        /// Username, 1 to 32 characters
        username: String,
    },

    /// Show the running timer and per-timer totals
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a timer, stopping whichever one runs now
    Start {
        /// Timer to start
        timer_id: String,
    },

    /// Stop the running timer
    Stop,

    /// Correct a timer's total by a signed amount
    Adjust {
        /// Timer to correct
        timer_id: String,

        /// Amount such as +5m, -90s, 1h or -30 (seconds)
        #[arg(allow_hyphen_values = true)]
        delta: String,
    },

    /// Follow the running timer until interrupted
    Watch,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            api_url: None,
            username: None,
            state_path: None,
            verbose: false,
            command: Commands::Status { json: false },
        }
    }
}
