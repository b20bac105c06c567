use crate::discord::{Context, Error};
use crate::install::Install;
use poise::serenity_prelude::MessageBuilder;

/// Install a new OpenRCT2 build. Running servers will be restarted.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn install(
    ctx: Context<'_>,
    #[description = "Confirm that all running servers will be shut down"] confirm: bool,
    #[description = "Release to install, e.g. v0.4.12. Defaults to the latest one"]
    tag: Option<String>,
) -> Result<(), Error> {
    if !confirm {
        ctx.say(
            "All running servers will be shut down to install a build. Set `confirm` to go ahead.",
        )
        .await?;
        return Ok(());
    }

    let build = tag.as_deref().unwrap_or("the latest build");
    ctx.say(format!("Installing {}...", build)).await?;

    let response = match ctx.data().installer.install(tag.as_deref()).await? {
        Install::Busy => "Another build is currently being installed.".to_string(),
        Install::NotFound => format!(
            "No Linux build found for {}. Check the downloads page: https://openrct2.org/downloads",
            build
        ),
        Install::Installed {
            version,
            file,
            restarted,
        } => {
            let mut response = MessageBuilder::new();
            response
                .push("Installed ")
                .push_bold_safe(version)
                .push(" from ")
                .push_mono_line_safe(file.display().to_string());
            if !restarted.is_empty() {
                let servers: Vec<String> = restarted.iter().map(|s| s.to_string()).collect();
                response.push_line(format!("Resumed servers {}.", servers.join(", ")));
            }
            response.build()
        }
    };
    ctx.say(response).await?;

    Ok(())
}
