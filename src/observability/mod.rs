//! Run observability.
//!
//! Observers receive typed [`RunEvent`]s and open hierarchical spans
//! around model calls, tool batches and guardrail checks. They are
//! purely additive: every callback runs behind a panic guard and nothing
//! an observer does feeds back into the run.
//!
//! ```rust
//! use std::sync::Arc;
//! use agent_engine::observability::{ObserverSet, TracingObserver};
//!
//! let mut observers = ObserverSet::new();
//! observers.register(Arc::new(TracingObserver::new()));
//! assert_eq!(observers.len(), 1);
//! ```

mod events;
mod observer;
mod spans;

pub use events::RunEvent;
pub use observer::{Observer, ObserverSet, ObserverSpan, SpanHandle};
pub use spans::TracingObserver;

/// Install a global `tracing` subscriber filtered by `filter`
/// (`RUST_LOG` syntax). Returns `false` if one was already installed.
#[cfg(feature = "subscriber")]
#[cfg_attr(docsrs, doc(cfg(feature = "subscriber")))]
pub fn init_tracing(filter: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
