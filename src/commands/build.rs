use crate::builds::{Feed, Release};
use crate::discord::{Context, Error};

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum FeedChoice {
    #[name = "dev"]
    Dev,
    #[name = "launcher"]
    Launcher,
}

impl From<FeedChoice> for Feed {
    fn from(choice: FeedChoice) -> Self {
        match choice {
            FeedChoice::Dev => Feed::Dev,
            FeedChoice::Launcher => Feed::Launcher,
        }
    }
}

fn build_message(release: &Release, link_only: bool) -> String {
    match link_only {
        true => release.html_url.clone(),
        false => release.details(),
    }
}

/// Show the latest develop or launcher build.
#[poise::command(slash_command, prefix_command)]
pub async fn build(
    ctx: Context<'_>,
    #[description = "Which build to look up"] feed: FeedChoice,
    #[description = "Only post the link to the release"] link: Option<bool>,
) -> Result<(), Error> {
    let feed = Feed::from(feed);
    let release = match ctx.data().builds.latest(feed).await {
        Ok(release) => release,
        Err(e) => {
            log::warn!("Failed to fetch the latest {} build: {:#}", feed, e);
            ctx.say(format!("Could not reach the {} build page.", feed)).await?;
            return Ok(());
        }
    };

    ctx.say(build_message(&release, link.unwrap_or(false))).await?;
    Ok(())
}
