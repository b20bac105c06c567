use super::resolve_server;
use crate::discord::{Context, Error};
use crate::server::{ScenarioRef, Slot};
use crate::supervisor::InstallGate;
use poise::serenity_prelude::MessageBuilder;

/// Most scenarios listed when a search is ambiguous.
const MAX_LISTED: usize = 10;

async fn installing(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().installer.in_progress() {
        ctx.say("A new build is being installed, try again once it's done.")
            .await?;
        return Ok(true);
    }
    Ok(false)
}

async fn launch(
    ctx: Context<'_>,
    scenario: ScenarioRef,
    slot: Slot,
    headless: bool,
) -> Result<(), Error> {
    let dir = match resolve_server(ctx, slot).await? {
        Some(dir) => dir,
        None => return Ok(()),
    };

    let response = match ctx
        .data()
        .servers
        .launch(&scenario, slot, &dir, headless)
        .await
    {
        Ok(Some(name)) => format!("Started server {} with *{}*.", slot, name),
        Ok(None) => format!("Server {} has no autosave to resume.", slot),
        Err(e) => {
            log::error!("Failed to start server {}: {}", slot, e);
            format!("Failed to start server {}: {}", slot, e)
        }
    };
    ctx.say(response).await?;
    Ok(())
}

/// Host the scenario matching the search.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn run(
    ctx: Context<'_>,
    #[description = "Part of the scenario's name"] search: String,
    #[description = "Server number, defaults to 1"] server: Option<u32>,
    #[description = "Run without a window"] headless: Option<bool>,
) -> Result<(), Error> {
    if installing(ctx).await? {
        return Ok(());
    }
    let slot = match super::parse_slot(ctx, server).await? {
        Some(slot) => slot,
        None => return Ok(()),
    };

    let found = ctx.data().servers.find_scenarios(&search).await?;
    match found.as_slice() {
        [] => {
            ctx.say(
                MessageBuilder::new()
                    .push("No scenarios found with '")
                    .push_italic_safe(search.as_str())
                    .push("'.")
                    .build(),
            )
            .await?;
        }
        [file] => {
            launch(
                ctx,
                ScenarioRef::File(file.clone()),
                slot,
                headless.unwrap_or(false),
            )
            .await?;
        }
        files => {
            let mut response = MessageBuilder::new();
            response.push_bold_line(format!(
                "{} scenarios match, please be more specific:",
                files.len()
            ));
            for file in files.iter().take(MAX_LISTED) {
                response.push_line_safe(file.as_str());
            }
            if files.len() > MAX_LISTED {
                response.push_italic_line(format!("...and {} more", files.len() - MAX_LISTED));
            }
            ctx.say(response.build()).await?;
        }
    }

    Ok(())
}

/// Resume a server from its latest autosave.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn resume(
    ctx: Context<'_>,
    #[description = "Server number, defaults to 1"] server: Option<u32>,
    #[description = "Run without a window"] headless: Option<bool>,
) -> Result<(), Error> {
    if installing(ctx).await? {
        return Ok(());
    }
    if let Some(slot) = super::parse_slot(ctx, server).await? {
        launch(ctx, ScenarioRef::Autosave, slot, headless.unwrap_or(false)).await?;
    }

    Ok(())
}

/// Shut down a server.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn kill(
    ctx: Context<'_>,
    #[description = "Server number, defaults to 1"] server: Option<u32>,
) -> Result<(), Error> {
    let slot = match super::parse_slot(ctx, server).await? {
        Some(slot) => slot,
        None => return Ok(()),
    };

    let response = match ctx.data().servers.stop(slot).await {
        true => format!("Stopped server {}.", slot),
        false => format!("Server {} is not running.", slot),
    };
    ctx.say(response).await?;

    Ok(())
}
