use crate::discord::{Context, Error};
use poise::serenity_prelude::{MessageBuilder, User};

/// Manage admins which are able to manage the servers.
#[poise::command(
    slash_command,
    prefix_command,
    check = "crate::checks::is_owner",
    subcommands("add", "remove", "list")
)]
pub async fn admin(_ctx: Context<'_>) -> Result<(), Error> {
    // Discord doesn't allow root commands to be invoked. Only Subcommands.
    Ok(())
}

/// Add an admin.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_owner")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "User to promote"] user: User,
) -> Result<(), Error> {
    let added = ctx.data().state.lock().await.add_admin(user.id.get()).await?;

    let response = match added {
        true => format!("Added '{}' to the admins list.", user.name),
        false => format!("'{}' is already an admin.", user.name),
    };
    ctx.say(response).await?;
    Ok(())
}

/// Remove an admin.
#[poise::command(
    slash_command,
    prefix_command,
    aliases("rm"),
    check = "crate::checks::is_owner"
)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "User to demote"] user: User,
) -> Result<(), Error> {
    let removed = ctx
        .data()
        .state
        .lock()
        .await
        .remove_admin(user.id.get())
        .await?;

    let response = match removed {
        true => format!("Removed '{}' from the admins list.", user.name),
        false => format!("'{}' is not an admin.", user.name),
    };
    ctx.say(response).await?;
    Ok(())
}

/// List all admins.
#[poise::command(
    slash_command,
    prefix_command,
    aliases("ls"),
    check = "crate::checks::is_owner"
)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let admins = ctx.data().state.lock().await.admins();

    let mut response = MessageBuilder::new();
    response.push_bold_line("Admins:");
    for admin in &admins {
        match admin.to_user(ctx).await {
            Ok(user) => response.push_line_safe(format!("{} ({})", user.name, user.id)),
            Err(_) => response.push_line_safe(admin.to_string()),
        };
    }
    if admins.is_empty() {
        response.push_italic_line("No Admins found.");
    }
    ctx.say(response.build()).await?;
    Ok(())
}
