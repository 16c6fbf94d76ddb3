use std::path::Path;

use chrono::Local;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use super::config::ServerConfig;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}{n}";

/// Install the global log4rs logger: console always, plus a timestamped file
/// under `config.log_dir` unless file logging is disabled.
pub fn setup_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if !config.no_file_log {
        let log_dir = Path::new(&config.log_dir);
        std::fs::create_dir_all(log_dir)?;
        let timestamp = Local::now().format("%Y-%m-%d-%H_%M").to_string();
        let log_path = log_dir.join(format!("{timestamp}.log"));

        let file_appender = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(log_path)?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file_appender)));
        root = root.appender("file");
    }

    log4rs::init_config(builder.build(root.build(level))?)?;

    Ok(())
}

// Convenience macros, all routed to the "system" target
#[macro_export]
macro_rules! sys_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "system", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_info {
    ($($arg:tt)*) => {
        ::log::info!(target: "system", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_warn {
    ($($arg:tt)*) => {
        ::log::warn!(target: "system", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_error {
    ($($arg:tt)*) => {
        ::log::error!(target: "system", $($arg)*)
    };
}
