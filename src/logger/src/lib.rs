use std::str::FromStr;

pub use log::*;

pub const LOG_LEVEL_ENV: &str = "EXTENT_MAP_LOG_LEVEL";

static LOGGER: Logger = Logger;

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    set_logger(&LOGGER).map(|()| set_max_level(level))
}

/// Installs the logger with the level named by `EXTENT_MAP_LOG_LEVEL`, `off` if unset or invalid.
pub fn init_from_env() -> Result<(), SetLoggerError> {
    init(level_from_env())
}

pub fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|s| LevelFilter::from_str(&s).ok())
        .unwrap_or(LevelFilter::Off)
}

#[derive(Copy, Clone)]
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }
    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    // The logger is process-global, so installation and the env lookup share one test.
    #[test]
    fn init_from_env_once() {
        std::env::set_var(LOG_LEVEL_ENV, "warn");
        assert_eq!(level_from_env(), LevelFilter::Warn);
        std::env::set_var(LOG_LEVEL_ENV, "loud");
        assert_eq!(level_from_env(), LevelFilter::Off);
        std::env::set_var(LOG_LEVEL_ENV, "debug");

        assert!(init_from_env().is_ok());
        assert_eq!(max_level(), LevelFilter::Debug);
        assert!(init(LevelFilter::Trace).is_err());
        assert_eq!(max_level(), LevelFilter::Debug);
        debug!("logger installed");
    }
}
