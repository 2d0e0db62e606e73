use thiserror::Error;

/// Errors produced by the membership engine.
///
/// Expected-frequency concurrent outcomes (capacity race, duplicate request)
/// are not errors; the engine reports them as unchanged state instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or constraint-violating session creation parameters.
    #[error("Invalid session parameters: {0}")]
    Validation(String),

    /// The organizer tried to leave through the player-removal path.
    /// Organizers cancel their session instead of withdrawing from it.
    #[error("The organizer cannot leave the session, only cancel it")]
    OrganizerCannotLeave,
}
