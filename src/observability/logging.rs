//! Structured logging.
//!
//! # Responsibilities
//! - Install the process subscriber once, from the binary
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Library components never install a subscriber; they log under the
//!   span they were constructed with

use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::schema::ObservabilityConfig;

/// Filter directives for the configured level.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!(
        "trusted_edge={level},tower_http={level}",
        level = config.log_level
    )
}

/// Handle to the installed filter, used to apply the level from a config
/// file loaded after logging started.
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Switch to the level in `config`. No-op when `RUST_LOG` is set.
    pub fn apply(&self, config: &ObservabilityConfig) {
        if self.from_env {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(default_directives(config))) {
            tracing::warn!(error = %e, "Failed to apply configured log level");
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns `None` if a subscriber was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Option<LogFilter> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(default_directives(config)), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match result {
        Ok(()) => Some(LogFilter { handle, from_env }),
        Err(e) => {
            tracing::warn!(error = %e, "Tracing subscriber already installed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_use_configured_level() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
        };
        assert_eq!(default_directives(&config), "trusted_edge=debug,tower_http=debug");
    }

    #[test]
    fn configured_level_applies_after_init() {
        let filter = init_logging(&ObservabilityConfig::default()).expect("subscriber already installed");
        if filter.from_env {
            return;
        }
        assert!(!tracing::enabled!(target: "trusted_edge::config", tracing::Level::DEBUG));

        filter.apply(&ObservabilityConfig {
            log_level: "debug".to_string(),
        });
        assert!(tracing::enabled!(target: "trusted_edge::config", tracing::Level::DEBUG));
    }
}
