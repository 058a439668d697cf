//! Tracing subscriber setup for applications embedding the search layer
//!
//! Console output is JSON or human readable, a rolling log file can be added
//! next to it, and `RUST_LOG` overrides the configured level.

use std::fs;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

/// Dependencies logged at warn unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["sqlx", "reqwest", "hyper"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer's worker alive. Dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.json)];

    let file_guard = if config.file_enabled {
        let (writer, guard) = file_writer(config)?;
        layers.push(file_layer(config.json, writer));
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(&config.level))
        .try_init()?;

    tracing::info!(
        level = %config.level,
        json = config.json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Install a human-readable console subscriber driven by `RUST_LOG` only.
///
/// For tools and tests; calling it twice is harmless.
pub fn init_simple_logging() {
    let _ = tracing_subscriber::registry()
        .with(console_layer(false))
        .with(env_filter("info"))
        .try_init();
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

fn default_directives(level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(format!("tessera_search={}", level), |directives, target| {
            format!("{},{}=warn", directives, target)
        })
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_writer(std::io::stdout).boxed()
    }
}

fn file_layer(json: bool, writer: NonBlocking) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

/// Rotation policy named by `logging.file_rotation`. Unknown names rotate daily.
fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn file_writer(config: &LoggingConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.file_directory)?;

    let rotation = rotation(&config.file_rotation);
    // A file that never rotates gets no date suffix, so name it fully.
    let file_name = if rotation == Rotation::NEVER {
        format!("{}.log", config.file_prefix)
    } else {
        config.file_prefix.clone()
    };

    let appender = RollingFileAppender::new(rotation, &config.file_directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
