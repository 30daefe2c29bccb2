//! Configuration for log output.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// How the host's tracing subscriber is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Output format.
    pub log_format: LogFormat,
    /// `EnvFilter` directives, e.g. `"info,lexbridge_core=trace"`.
    pub log_filter: String,
    /// Include file and line of each event.
    pub include_location: bool,
    /// Include the event target.
    pub include_target: bool,
    /// Include the emitting thread's id.
    pub include_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
            include_target: true,
            include_thread_ids: false,
        }
    }
}

impl TracingConfig {
    /// Read the configuration from the environment.
    ///
    /// - `LEXBRIDGE_LOG_FORMAT`: `json`, `pretty` or `compact`. Defaults to
    ///   `pretty` on a terminal and `json` otherwise.
    /// - `LEXBRIDGE_LOG_LEVEL`, falling back to `RUST_LOG`: filter directives.
    /// - `LEXBRIDGE_LOG_LOCATION`: `true`/`1` to include file and line.
    /// - `LEXBRIDGE_LOG_THREAD_IDS`: `true`/`1` to include thread ids.
    pub fn from_env() -> Self {
        let log_format = env::var("LEXBRIDGE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                if is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Json
                }
            });

        let log_filter = env::var("LEXBRIDGE_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
            include_location: env_flag("LEXBRIDGE_LOG_LOCATION"),
            include_target: true,
            include_thread_ids: env_flag("LEXBRIDGE_LOG_THREAD_IDS"),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Include file and line of each event.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Include the event target.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Include thread ids.
    pub fn with_thread_ids(mut self, include: bool) -> Self {
        self.include_thread_ids = include;
        self
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("bogus".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn config_builder() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("debug,wasmtime=warn")
            .with_location(true)
            .with_thread_ids(true)
            .with_target(false);

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "debug,wasmtime=warn");
        assert!(config.include_location);
        assert!(config.include_thread_ids);
        assert!(!config.include_target);
    }
}
