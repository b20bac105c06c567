pub mod build;
pub mod checker;
pub mod info;
pub mod install;
pub mod isup;
pub mod owner;
pub mod servers;

use crate::discord::{Context, Data, Error};
use crate::server::Slot;
use std::path::PathBuf;

/// Every command the bot knows.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        info::about(),
        info::status(),
        isup::isup(),
        build::build(),
        servers::run(),
        servers::resume(),
        servers::kill(),
        checker::checker(),
        install::install(),
        owner::admin(),
    ]
}

/// Turns the optional server number of a command into a slot, defaulting to the primary server.
async fn parse_slot(ctx: Context<'_>, server: Option<u32>) -> Result<Option<Slot>, Error> {
    match server {
        None => Ok(Some(Slot::PRIMARY)),
        Some(id) => match Slot::new(id) {
            Some(slot) => Ok(Some(slot)),
            None => {
                ctx.say("Servers are numbered starting at 1.").await?;
                Ok(None)
            }
        },
    }
}

/// Directory of `slot`, telling the user if there is none.
async fn resolve_server(ctx: Context<'_>, slot: Slot) -> Result<Option<PathBuf>, Error> {
    let dir = ctx.data().servers.server_dir(slot).await;
    if dir.is_none() {
        ctx.say(format!("Server {} does not exist.", slot)).await?;
    }
    Ok(dir)
}
