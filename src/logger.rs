//! log4rs setup: stderr console for everything, plus rolling `app.log` and `audit.log`
//! (and `trace.log` at trace level) when a log directory is given.

use crate::errors::DbError;
use crate::trace::TRACE_TARGET;
use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use once_cell::sync::OnceCell;
use std::path::Path;

pub const AUDIT_TARGET: &str = "noteful::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

static HANDLE: OnceCell<Handle> = OnceCell::new();

fn config_err(e: impl std::fmt::Display) -> DbError {
    DbError::Config(format!("logging: {e}"))
}

/// `error|warn|info|debug|trace|off`, anything else is `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, name: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&dir.join(format!("{name}.{{}}.log")).display().to_string(), keep)
        .map_err(config_err)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{name}.log")), Box::new(policy))
        .map_err(config_err)
}

fn build_config(dir: Option<&Path>, level: LevelFilter, keep: u32) -> Result<Config, DbError> {
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
        .build();
    let mut builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
        builder = builder
            .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
            .appender(Appender::builder().build("audit", Box::new(rolling(dir, "audit", keep)?)))
            .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, level));
        root = root.appender("app");
        if level == LevelFilter::Trace {
            builder = builder
                .appender(Appender::builder().build("trace", Box::new(rolling(dir, "trace", keep)?)))
                .logger(Logger::builder().appender("trace").additive(false).build(TRACE_TARGET, level));
        }
    }
    builder.build(root.build(level)).map_err(config_err)
}

fn apply(config: Config) -> Result<(), DbError> {
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config).map_err(config_err)?;
    // a concurrent first call may have won; its handle drives the same global logger
    let _ = HANDLE.set(handle);
    Ok(())
}

/// Configure process-wide logging, replacing any configuration set by an earlier call.
///
/// # Errors
/// `Config` if the appenders cannot be built or another logger owns the `log` facade,
/// `Io` if `dir` cannot be created.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<(), DbError> {
    let level = level.map_or(LevelFilter::Info, parse_level);
    let keep = retention.and_then(|r| u32::try_from(r).ok()).unwrap_or(DEFAULT_RETENTION);
    apply(build_config(dir, level, keep)?)
}

/// Configure logging from a log4rs YAML file.
///
/// # Errors
/// `Config` if the file cannot be read or parsed.
pub fn init_from_file(path: &Path) -> Result<(), DbError> {
    let config = log4rs::config::load_config_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| config_err(format!("{}: {e}", path.display())))?;
    apply(config)
}

/// Configure logging from `NOTEFUL_LOG_DIR`, `NOTEFUL_LOG_LEVEL` and `NOTEFUL_LOG_RETENTION`.
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("NOTEFUL_LOG_DIR").ok().map(std::path::PathBuf::from);
    let level = std::env::var("NOTEFUL_LOG_LEVEL").ok();
    let retention = std::env::var("NOTEFUL_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn file_config_routes_audit_separately() {
        let dir = tempfile::tempdir().unwrap();
        let config = build_config(Some(dir.path()), LevelFilter::Info, 3).unwrap();
        assert!(config.loggers().iter().any(|l| l.name() == AUDIT_TARGET && !l.additive()));
        assert_eq!(config.appenders().len(), 3);
    }

    #[test]
    fn console_only_without_a_directory() {
        let config = build_config(None, LevelFilter::Warn, 3).unwrap();
        assert_eq!(config.appenders().len(), 1);
        assert_eq!(config.root().level(), LevelFilter::Warn);
    }
}
