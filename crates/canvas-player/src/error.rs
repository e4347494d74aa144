//! Typed errors for the player shell.

use thiserror::Error;

/// Failures while constructing or wiring a player session.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("wrapper element not found: {0}")]
    WrapperNotFound(String),
    #[error("wrapper element is already bound to session {0}")]
    WrapperInUse(u64),
    #[error("canvas element not found: {0}")]
    CanvasNotFound(String),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    /// Raised by a [`PlayerFactory`](crate::PlayerFactory) whose decoder
    /// could not be set up.
    #[error("player backend: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Misuse of the source contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source has no destination; call connect() before start()")]
    NotConnected,
    #[error("source already has a destination")]
    AlreadyConnected,
    #[error("source was already started")]
    AlreadyStarted,
    #[error("source was destroyed")]
    Destroyed,
}

/// Reasons a network acquisition did not complete.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("http status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("empty payload")]
    EmptyPayload,
}
