use crate::discord::{Context, Error};
use crate::supervisor::InstallGate;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter, MessageBuilder};
use poise::CreateReply;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn footer() -> CreateEmbedFooter {
    CreateEmbedFooter::new(format!(
        "Powered by OpenRCT2 • {}",
        chrono::Utc::now().format("%Y")
    ))
}

/// Explains what this bot is about.
#[poise::command(slash_command, prefix_command)]
pub async fn about(ctx: Context<'_>) -> Result<(), Error> {
    let embed = CreateEmbed::new()
        .title(format!("OpenRCT2 Server Bot v{}", VERSION))
        .field(
            "Purpose of this bot",
            "Keeps our OpenRCT2 servers running, announces new builds and lets admins manage the servers.",
            true,
        )
        .footer(footer());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Prints the current status of the servers and checkers.
#[poise::command(slash_command, prefix_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();

    let mut servers = MessageBuilder::new();
    let running = data.servers.running().await;
    for slot in &running {
        servers.push_bold(format!("Server {}", slot));
        match data.servers.current_scenario(*slot).await {
            Some(scenario) => servers.push(": ").push_italic_line_safe(scenario),
            None => servers.push_line(""),
        };
    }
    if running.is_empty() {
        servers.push_italic_line("No servers running.");
    }

    let mut checkers = MessageBuilder::new();
    let active = data.supervisor.active().await;
    for target in &active {
        checkers.push_line(target.to_string());
    }
    for (slot, health) in data.supervisor.health().await {
        checkers.push_mono_line(format!("{}: {}", slot, health));
    }
    if active.is_empty() {
        checkers.push_italic_line("No checkers running.");
    }

    let installing = match data.installer.in_progress() {
        true => "Installing a new build",
        false => "Idle",
    };

    let embed = CreateEmbed::new()
        .title("OpenRCT2 Server Status")
        .field("Servers", servers.build(), false)
        .field("Checkers", checkers.build(), false)
        .field(
            "Installer",
            MessageBuilder::new().push_mono(installing).build(),
            true,
        )
        .field(
            "Address",
            MessageBuilder::new()
                .push_codeblock_safe(&data.settings.host, None)
                .build(),
            true,
        )
        .footer(footer());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
