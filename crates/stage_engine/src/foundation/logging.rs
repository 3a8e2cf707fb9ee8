//! Logging utilities and structured logging support

use std::sync::Once;

pub use log::{debug, error, info, trace, warn};

use crate::core::config::LoggingConfig;

static INIT: Once = Once::new();

/// Initialize the logging system
///
/// The filter follows `env_logger` syntax (`"info"`,
/// `"stage_engine=debug,warn"`). Without a configured filter `RUST_LOG` is
/// honoured, and without either the level defaults to `info`. Only the first
/// call has any effect, so tests and hosts may both call it.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match (&config.filter, std::env::var("RUST_LOG")) {
            (Some(filter), _) => {
                builder.parse_filters(filter);
            }
            (None, Ok(filter)) => {
                builder.parse_filters(&filter);
            }
            (None, Err(_)) => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        if config.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }

        // Another logger may already be installed by the host.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
