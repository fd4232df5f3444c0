//! Logging setup for the process boundary

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit filter is given
pub const DEFAULT_FILTER: &str = "score_pipeline=info";

/// Install a formatted subscriber for the current thread.
///
/// `filter` overrides `RUST_LOG`. Logging stops when the returned guard is
/// dropped.
pub fn init(filter: Option<&str>) -> DefaultGuard {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_default(subscriber)
}
