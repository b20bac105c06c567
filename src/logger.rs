use crate::Result;
use fern::colors::{Color, ColoredLevelConfig};

/// Setup logging.
pub fn init() -> Result<()> {
    let log_path = std::env::var("BOT_LOGS").unwrap_or_else(|_| "bot.log".to_string());

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Cyan)
        .debug(Color::Green)
        .trace(Color::BrightBlack);

    let line = |record: &log::Record| {
        record
            .line()
            .map(|x| x.to_string())
            .unwrap_or_else(|| "X".to_string())
    };

    let file_cfg = fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        .level_for("serenity", log::LevelFilter::Warn)
        .level_for("tracing", log::LevelFilter::Warn)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                line(record),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_path)?);

    let stdout_cfg = fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        .level_for("serenity", log::LevelFilter::Warn)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.target(),
                line(record),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .chain(file_cfg)
        .chain(stdout_cfg)
        .apply()?;

    Ok(())
}
