/// Latest OpenRCT2 builds
mod builds;
/// checks for permission to execute a specific command
pub mod checks;
/// All available discord commands
mod commands;
/// discord setup
mod discord;
/// Build installation
mod install;
mod logger;
/// OpenRCT2 master server
mod master;
/// OpenRCT2 Server handling
mod server;
/// Bot Settings
mod settings;
/// Bot state
mod state;
/// Interval checkers
mod supervisor;
mod utils;

use anyhow::{Context, Result};
use server::ProcessManager;
use settings::Settings;
use state::State;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init()?;

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(_) => {
            Settings::default()
                .save()
                .await
                .context("Failed to save default config.")?;
            println!("Created default settings. Please fill out. Exiting...");
            std::process::exit(0);
        }
    };

    let state = match State::new() {
        Ok(state) => state,
        Err(e) => {
            log::info!("No usable state ({}), starting fresh.", e);
            State::empty(State::path())
        }
    };

    let servers = ProcessManager::new(
        &settings.binary,
        &settings.openrct2,
        &settings.scenarios,
    );
    log::info!(
        "Managing OpenRCT2 servers in {} with {}",
        settings.openrct2.display(),
        settings.binary.display()
    );

    discord::run(settings, state, servers)
        .await
        .context("Failed to start discord.")
}
