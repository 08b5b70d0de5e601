//! coursetimers - study timer client
//!
#![doc = "coursetimers - study timer client"]
#![doc = "Main entry point for the coursetimers command-line application."]

use anyhow::Result;

use coursetimers::cli::{Cli, Commands};
use coursetimers::commands;
use coursetimers::config::Config;
use coursetimers::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load and validate configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    init_logging(&config.logging)?;

    let local = commands::open_local_state(&config)?;

    match cli.command {
        Commands::Login { username } => {
            commands::login::run_login(&local, &username)?;
            Ok(())
        }
        Commands::Status { json } => {
            let runtime = commands::build_runtime(&config, local)?;
            commands::status::run_status(&runtime, json).await
        }
        Commands::Start { timer_id } => {
            let runtime = commands::build_runtime(&config, local)?;
            commands::timer::run_start(&runtime, &timer_id).await
        }
        Commands::Stop => {
            let runtime = commands::build_runtime(&config, local)?;
            commands::timer::run_stop(&runtime).await
        }
        Commands::Adjust { timer_id, delta } => {
            let runtime = commands::build_runtime(&config, local)?;
            commands::timer::run_adjust(&runtime, &timer_id, &delta).await?;
            Ok(())
        }
        Commands::Watch => {
            tracing::info!("Starting watch mode");
            let runtime = commands::build_runtime(&config, local)?;
            commands::watch::run_watch(&runtime).await
        }
    }
}
