//! # matchup-client
//!
//! The surface the UI layer calls: a [`Client`] that validates intents
//! against the visibility resolver, mutates sessions through the membership
//! engine, persists through the synchronizer (remote-first, cache-fallback)
//! and feeds snapshot diffs to the notifier.

pub mod client;

mod error;

pub use client::{ActionOutcome, Client};
pub use error::ClientError;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise tracing for the application process.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("matchup_client=debug,matchup_sync=debug,matchup_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Matchup client logging initialised");
}
