//! restassay logging setup
//!
//! The restassay crates log through [`tracing`]. This crate turns a handful of
//! environment variables into a subscriber so that test suites get readable
//! output (request timings, retry warnings, mock server mismatches) without
//! wiring `tracing-subscriber` themselves.
//!
//! # Usage
//!
//! ```rust
//! // Typically the first line of a test
//! restassay_log::init();
//! tracing::info!("subscriber installed");
//! ```
//!
//! # Environment Variables
//!
//! - `RESTASSAY_DEBUG=1` - Enable debug logging
//! - `RESTASSAY_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `RESTASSAY_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `RESTASSAY_LOG_COLOR=1|0` - Enable/disable colors
//! - `RUST_LOG` - Overrides the level with a full `EnvFilter` directive

use once_cell::sync::OnceCell;
use std::env;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events written by the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get level name as understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable format
    Pretty,
    /// Single-line format (default, fits test output)
    Compact,
    /// JSON format for structured logging
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Compact,
            color: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("RESTASSAY_DEBUG").unwrap_or(false);

        let level = lookup("RESTASSAY_LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("RESTASSAY_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Compact);

        let color = flag("RESTASSAY_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        Self {
            debug,
            level,
            format,
            color,
        }
    }

    /// Build the filter for this configuration; `RUST_LOG` takes precedence.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

// ============================================================================
// Public API
// ============================================================================

static INSTALLED: OnceCell<LogConfig> = OnceCell::new();

/// Install the global subscriber using [`LogConfig::from_env`].
///
/// Safe to call from every test: only the first call installs anything.
pub fn init() {
    let _ = try_init(LogConfig::from_env());
}

/// Install the global subscriber with an explicit configuration.
///
/// Returns the configuration that is in effect, which is the one passed to the
/// first successful call.
pub fn try_init(config: LogConfig) -> &'static LogConfig {
    INSTALLED.get_or_init(|| {
        let registry = tracing_subscriber::registry().with(config.filter());
        // A subscriber installed by someone else wins; test harnesses often do that.
        let _ = match config.format {
            Format::Pretty => registry
                .with(fmt::layer().pretty().with_ansi(config.color).with_test_writer())
                .try_init(),
            Format::Compact => registry
                .with(fmt::layer().compact().with_ansi(config.color).with_test_writer())
                .try_init(),
            Format::Json => registry
                .with(fmt::layer().json().with_test_writer())
                .try_init(),
        };
        config
    })
}

/// The configuration installed by [`init`] or [`try_init`], if any.
pub fn installed() -> Option<&'static LogConfig> {
    INSTALLED.get()
}

// ============================================================================
// Tests
// ============================================================================
