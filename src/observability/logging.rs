//! Structured logging.
//!
//! The bridge configuration speaks in the four severities its operators know
//! (`severe`, `warning`, `info`, `config`) plus the finer debugging levels.
//! [`LogLevel`] maps those onto `tracing` level filters.

use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Environment variable that overrides the initial log filter.
pub const LOG_ENV: &str = "COMMUNITY_BRIDGE_LOG";

/// Verbosity as written in `general.log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Nothing is logged.
    Off,
    /// Only failures that disable a feature or skip a player.
    Severe,
    /// Recoverable problems.
    Warning,
    /// Normal operational messages.
    Info,
    /// Configuration echo.
    #[default]
    Config,
    /// Debugging detail.
    Fine,
    /// Everything.
    All,
}

impl LogLevel {
    /// Parses a level name, case-insensitively.
    ///
    /// Accepts both the bridge names and the `tracing` names (`error`,
    /// `warn`, `debug`, `trace`). Returns `None` for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "severe" | "error" => Some(Self::Severe),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "config" | "debug" => Some(Self::Config),
            "fine" | "finer" => Some(Self::Fine),
            "finest" | "all" | "trace" => Some(Self::All),
            _ => None,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Severe => "severe",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Config => "config",
            Self::Fine => "fine",
            Self::All => "all",
        }
    }

    /// Returns the matching `tracing` level filter.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Severe => LevelFilter::ERROR,
            Self::Warning => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Config => LevelFilter::DEBUG,
            Self::Fine | Self::All => LevelFilter::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, falling back to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Initial verbosity, replaced once the bridge configuration is read.
    pub level: LogLevel,
    /// Line format.
    pub format: LogFormat,
    /// Optional file to append to instead of stderr.
    pub file: Option<PathBuf>,
    /// Raw filter directives from the environment, if any.
    pub directives: Option<String>,
}

impl LoggingConfig {
    /// Builds logging configuration from the environment.
    ///
    /// `verbose` raises the initial level to [`LogLevel::Fine`].
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let directives = std::env::var(LOG_ENV).ok().filter(|v| !v.trim().is_empty());
        let format = std::env::var("COMMUNITY_BRIDGE_LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = std::env::var("COMMUNITY_BRIDGE_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            level: if verbose { LogLevel::Fine } else { LogLevel::Info },
            format,
            file,
            directives,
        }
    }

    /// Sets the initial level.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("severe", LogLevel::Severe)]
    #[test_case("WARNING", LogLevel::Warning)]
    #[test_case("warn", LogLevel::Warning)]
    #[test_case(" info ", LogLevel::Info)]
    #[test_case("config", LogLevel::Config)]
    #[test_case("finest", LogLevel::All)]
    #[test_case("off", LogLevel::Off)]
    fn test_parse_level(input: &str, expected: LogLevel) {
        assert_eq!(LogLevel::parse(input), Some(expected));
    }

    #[test]
    fn test_parse_unknown_level() {
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_level_filters_are_ordered() {
        assert_eq!(LogLevel::Severe.level_filter(), LevelFilter::ERROR);
        assert_eq!(LogLevel::Config.level_filter(), LevelFilter::DEBUG);
        assert!(LogLevel::Warning.level_filter() < LogLevel::Info.level_filter());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }
}
