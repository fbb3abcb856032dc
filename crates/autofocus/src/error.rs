use std::{fmt, result::Result as StdResult};

use thiserror::Error;

use crate::{id::ParticipantId, order::OrderKey};

/// Result type for autofocus operations.
pub type Result<T> = StdResult<T, Error>;

/// The lookup that failed when resolving a participant's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// No order key is recorded for the participant.
    OrderKey,
    /// An order key is recorded, but the index has no entry for it.
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderKey => write!(f, "no order key on record"),
            Self::Index => write!(f, "order key missing from index"),
        }
    }
}

/// Core error type.
#[derive(PartialEq, Eq, Error, Debug, Clone)]
pub enum Error {
    /// Two participants in one container asked for the same explicit order hint.
    #[error("duplicate order hint {hint}: key {key} is already taken")]
    DuplicateOrderHint {
        /// The hint as supplied by the caller.
        hint: i64,
        /// The scaled key that collided.
        key: OrderKey,
    },

    /// Traversal was requested for a participant that is not subscribed.
    #[error("next/prev called before subscribe: {0}")]
    NotSubscribed(Stage),

    /// The participant id was released, or was never minted by this container.
    #[error("unknown participant id {0:?}")]
    UnknownParticipant(ParticipantId),

    /// An unrecognized direction token was passed to `focus`.
    #[error("invalid direction {0:?}, use \"FORWARD\" or \"BACKWARD\"")]
    InvalidDirection(String),

    /// A focus source did not resolve to an invocable action.
    #[error("invalid focus extractor: {0}")]
    InvalidFocusExtractor(String),

    /// An order hint or automatic key fell outside the representable range.
    #[error("order key overflow")]
    OrderOverflow,

    /// Configuration could not be parsed.
    #[error("config: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
