use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level. JSON output is meant for
/// production, pretty output for development; either may go to an
/// append-mode file instead of stdout.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(path) => Some(std::sync::Arc::new(
            std::fs::OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    match config.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true)
                .with_line_number(true);
            match file {
                Some(file) => registry.with(json_layer.with_writer(file)).try_init()?,
                None => registry.with(json_layer).try_init()?,
            }
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_line_number(true)
                .with_file(false);
            match file {
                Some(file) => registry
                    .with(pretty_layer.with_ansi(false).with_writer(file))
                    .try_init()?,
                None => registry.with(pretty_layer).try_init()?,
            }
        }
    }

    Ok(())
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let default_level = parse_log_level(level)?;
    Ok(EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{default_level},tower_http=info")))
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string())))
}

/// Parse a log level name.
pub fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
