use crate::builds::Feed;
use crate::discord::{Context, Error};
use crate::supervisor::{StartOutcome, StopOutcome, Target, MAX_PERIOD};
use std::time::Duration;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum CheckerKind {
    #[name = "dev"]
    Dev,
    #[name = "launcher"]
    Launcher,
    #[name = "server"]
    Server,
}

/// Parses intervals like `30s`, `5m` or `1h 30m`. A bare number counts minutes.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let too_long = || {
        format!(
            "interval must not be longer than {}",
            humantime::format_duration(MAX_PERIOD)
        )
    };
    let interval = match input.parse::<u64>() {
        Ok(minutes) => minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(too_long)?,
        Err(_) => humantime::parse_duration(input).map_err(|e| e.to_string())?,
    };
    if interval.is_zero() {
        return Err("interval must be longer than zero".to_string());
    }
    if interval > MAX_PERIOD {
        return Err(too_long());
    }
    Ok(interval)
}

async fn target(
    ctx: Context<'_>,
    kind: CheckerKind,
    server: Option<u32>,
) -> Result<Option<Target>, Error> {
    Ok(match kind {
        CheckerKind::Dev => Some(Target::Build(Feed::Dev)),
        CheckerKind::Launcher => Some(Target::Build(Feed::Launcher)),
        CheckerKind::Server => super::parse_slot(ctx, server).await?.map(Target::Server),
    })
}

/// Manage the interval checkers.
#[poise::command(
    slash_command,
    prefix_command,
    check = "crate::checks::is_admin",
    subcommands("start", "stop")
)]
pub async fn checker(_ctx: Context<'_>) -> Result<(), Error> {
    // Discord doesn't allow root commands to be invoked. Only Subcommands.
    Ok(())
}

/// Start checking new builds or a server's health.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn start(
    ctx: Context<'_>,
    #[description = "What to check"] kind: CheckerKind,
    #[description = "Server number, defaults to 1"] server: Option<u32>,
    #[description = "e.g. 30s, 5m or 1h. A bare number counts minutes"] interval: Option<String>,
) -> Result<(), Error> {
    let period = match interval.as_deref().map(parse_interval) {
        Some(Ok(period)) => period,
        Some(Err(e)) => {
            ctx.say(format!("Invalid interval: {}", e)).await?;
            return Ok(());
        }
        None => ctx.data().settings.check_interval(),
    };
    let target = match target(ctx, kind, server).await? {
        Some(target) => target,
        None => return Ok(()),
    };

    let response = match ctx.data().supervisor.start(target, period).await {
        StartOutcome::Started => format!(
            "Checking {} every {}.",
            target,
            humantime::format_duration(period)
        ),
        StartOutcome::AlreadyRunning => format!("{} is already being checked.", target),
        StartOutcome::MissingDirectory => format!("{} does not exist.", target),
    };
    ctx.say(response).await?;

    Ok(())
}

/// Stop checking new builds or a server's health.
#[poise::command(slash_command, prefix_command, check = "crate::checks::is_admin")]
pub async fn stop(
    ctx: Context<'_>,
    #[description = "What to stop checking"] kind: CheckerKind,
    #[description = "Server number, defaults to 1"] server: Option<u32>,
) -> Result<(), Error> {
    let target = match target(ctx, kind, server).await? {
        Some(target) => target,
        None => return Ok(()),
    };

    let response = match ctx.data().supervisor.stop(target).await {
        StopOutcome::Stopped => format!("Stopped checking {}.", target),
        StopOutcome::NotRunning => format!("{} is not being checked.", target),
    };
    ctx.say(response).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_are_minutes() {
        assert_eq!(parse_interval("5"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_interval(" 1 "), Ok(Duration::from_secs(60)));
    }

    #[test]
    fn units_are_understood() {
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_interval("1h 30m"), Ok(Duration::from_secs(5400)));
    }

    #[test]
    fn nonsense_is_rejected() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("soon").is_err());
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("0s").is_err());
    }

    #[test]
    fn huge_intervals_are_rejected() {
        assert!(parse_interval("400000000000000000").is_err());
        assert!(parse_interval("200000000000000000").is_err());
        assert!(parse_interval("31d").is_err());
        assert_eq!(parse_interval("30d"), Ok(MAX_PERIOD));
    }
}
