use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};
use viewsync_config::Environment;

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for a process.
///
/// Logs are human readable in [`Environment::Dev`] and JSON in [`Environment::Prod`]. The
/// `RUST_LOG` variable overrides the default `info` filter. Every line carries `app_name`
/// through the root span returned to the caller, which must keep it entered.
pub fn init_tracing(app_name: &str) -> Result<tracing::span::EnteredSpan, TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let environment = Environment::load().unwrap_or(Environment::Dev);

    if environment.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()?;
    }

    Ok(tracing::info_span!("app", app_name = app_name).entered())
}

/// Installs a subscriber writing through the test harness capture, once per process.
///
/// Set `ENABLE_TRACING=1` to see the output of passing tests as well.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("viewsync=debug,info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
