use std::path::PathBuf;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Route `log` records to stderr and, optionally, to a log file with its own level.
pub fn setup_logging(
    console_level: LevelFilter,
    log_file: Option<PathBuf>,
    file_level: LevelFilter,
) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let console = fern::Dispatch::new()
        .level(console_level)
        .format(move |out, message, record| {
            out.finish(format_args!("[{}] {}", colors.color(record.level()), message))
        })
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        // Connection pool chatter drowns out our own debug output
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Info)
        .chain(console);

    if let Some(path) = log_file {
        let file = fern::log_file(&path)
            .wrap_err_with(|| format!("Failed to open log file: {}", path.display()))?;
        root = root.chain(
            fern::Dispatch::new()
                .level(file_level)
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {} [{}] {}",
                        chrono::Local::now().to_rfc3339(),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
    }

    root.apply().wrap_err("Failed to install logger")?;
    Ok(())
}
