use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

static INIT: OnceCell<()> = OnceCell::new();

/// Initializes the global tracing subscriber from configuration.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the configured log
/// level. Safe to call more than once; only the first call installs a
/// subscriber, which keeps test binaries from panicking on double init.
pub fn init_tracing(cfg: &AppConfig) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone()));

        if cfg.log_json {
            let _ = fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .try_init();
        } else {
            let _ = fmt().with_env_filter(filter).try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = AppConfig::new("sqlite::memory:", "test");
        init_tracing(&cfg);
        init_tracing(&cfg);
    }
}
