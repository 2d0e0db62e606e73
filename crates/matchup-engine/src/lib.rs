//! # matchup-engine
//!
//! The pure core of Matchup: visibility predicates, the membership state
//! machine and the notification diff. No I/O, no clocks, no hidden state --
//! every function takes its inputs explicitly (including the current time)
//! and either returns a fully valid next snapshot or leaves the session
//! untouched.

pub mod membership;
pub mod notify;
pub mod visibility;

pub use membership::{CreateSessionParams, Outcome};
pub use notify::SessionEvent;
