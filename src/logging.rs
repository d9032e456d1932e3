//! Tracing subscriber setup.

use tracing_subscriber::{filter::ParseError, fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Install the global subscriber. A valid `RUST_LOG` wins over the configured
/// filter; an invalid one is reported once logging is up.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_value = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected) = select_filter(env_value.as_deref(), &config.filter)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    if let Some(rejected) = rejected {
        tracing::warn!(
            rust_log = %rejected.directives,
            error = %rejected.error,
            fallback = %config.filter,
            "ignoring invalid RUST_LOG"
        );
    }

    Ok(())
}

#[derive(Debug)]
struct RejectedEnvFilter {
    directives: String,
    error: ParseError,
}

fn select_filter(
    env_value: Option<&str>,
    configured: &str,
) -> Result<(EnvFilter, Option<RejectedEnvFilter>), LoggingError> {
    let mut rejected = None;

    if let Some(directives) = env_value.filter(|v| !v.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return Ok((filter, None)),
            Err(error) => {
                rejected = Some(RejectedEnvFilter {
                    directives: directives.to_string(),
                    error,
                })
            }
        }
    }

    let filter = EnvFilter::try_new(configured).map_err(|source| LoggingError::Filter {
        filter: configured.to_string(),
        source,
    })?;
    Ok((filter, rejected))
}
