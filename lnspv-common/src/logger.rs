//! Logging module.
///
/// Credit to https://github.com/vincenzopalazzo/nakamoto/blob/master/node/src/logger.rs
///
/// The plugin talks with the host over stdout, so nothing is ever
/// logged there: records go to stderr and the host copies them into
/// its own log.
use std::io;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::prelude::*;
use colored::*;

pub use log::{Level, Log, Metadata, Record, SetLoggerError};

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // There is nobody left to report this to.
        let _ = write(record, io::stderr());

        fn write(record: &log::Record, mut stream: impl io::Write) -> io::Result<()> {
            let message = format!(
                "{} {} {}. [{}:{}]",
                record.level(),
                record.target().bold(),
                record.args(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
            );
            let utc_time: DateTime<Utc> = DateTime::from(SystemTime::now());
            let time = utc_time.to_rfc3339_opts(SecondsFormat::Millis, true);
            let message = match record.level() {
                Level::Error => message.red(),
                Level::Warn => message.yellow(),
                Level::Info => message.normal(),
                Level::Debug => message.dimmed(),
                Level::Trace => message.cyan().dimmed(),
            };
            writeln!(stream, "{} {}", time.white(), message)
        }
    }

    fn flush(&self) {}
}

/// Initialize a new logger.
pub fn init(level: &str) -> anyhow::Result<()> {
    let level = Level::from_str(level).map_err(|err| anyhow::anyhow!("{err}"))?;

    log::set_boxed_logger(Box::new(Logger)).map_err(|err| anyhow::anyhow!("{err}"))?;
    log::set_max_level(level.to_level_filter());

    Ok(())
}

/// Change the level of an already installed logger.
///
/// The logger is installed before the host hands over the plugin
/// options, so the configured level can only be applied afterwards.
pub fn set_level(level: &str) -> anyhow::Result<()> {
    let level = Level::from_str(level).map_err(|err| anyhow::anyhow!("{err}"))?;
    log::set_max_level(level.to_level_filter());
    Ok(())
}
