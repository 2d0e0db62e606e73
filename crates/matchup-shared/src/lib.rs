//! # matchup-shared
//!
//! Domain types shared by every Matchup crate: identity handles, the
//! [`Session`] model with its participants, pending requests and visibility
//! modes, plus session chat messages and groups.
//!
//! Identity is an opaque string handle issued by the external authentication
//! provider; this crate never inspects it.

pub mod error;
pub mod session;
pub mod types;

pub use error::EngineError;
pub use session::*;
pub use types::*;
