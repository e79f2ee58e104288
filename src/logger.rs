// Subscriber setup: one fmt layer in the configured format under an EnvFilter
use std::str::FromStr;

use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::TracingConfig;

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logger(format: LogFormat, level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(format_layer(format))
        .with(filter)
        .init();
}

pub fn init_from_config(config: &TracingConfig) {
    let format = config.format.parse().unwrap_or(LogFormat::Compact);
    let level = config.level.parse().unwrap_or(LogLevel::Info);
    init_logger(format, level);
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_target(false);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed(),
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    /// Unknown names fall back to compact
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        })
    }
}

/// Log level options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    /// Unknown names fall back to info
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Warn,
            LogLevel::Error,
        ]
        .into_iter()
        .find(|level| s.eq_ignore_ascii_case(level.as_str()))
        .unwrap_or(LogLevel::Info);
        Ok(level)
    }
}
