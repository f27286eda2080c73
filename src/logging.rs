use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DEFAULT_FILTER: &str = "cinema_recs=info";

/// Builds the filter from config, then `RUST_LOG`, then the crate default
pub fn filter_for(config: &Config) -> EnvFilter {
    if let Some(directive) = &config.log_filter {
        if let Ok(filter) = EnvFilter::try_new(directive) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global fmt subscriber. Logs go to stderr so stdout stays JSON.
pub fn init(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
