//! # matchup-store
//!
//! Local cache store for the Matchup application, backed by SQLite.
//!
//! This is the offline-first shadow of the remote session store: the
//! last-known state of sessions, messages, groups and block-lists survives
//! process restarts here and is the fallback of record when the remote store
//! is unreachable. Sessions are persisted as JSON payloads so that every bit
//! of legacy-shape tolerance lives in one place, [`repair::repair`], applied
//! at the read boundary.

pub mod blocks;
pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod repair;
pub mod sessions;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use repair::repair;
