//! Error types for recito operations.
//!
//! This module defines the main error type [`RecitoError`] which represents
//! all possible faults that can occur while extracting text, resolving
//! voices, and driving speech playback.
//!
//! The variants follow the fault taxonomy of the playback pipeline:
//! source faults (a page fetch failed), speech faults (the synthesis engine
//! reported an error), navigation faults (seek requested with no active
//! session), and detection faults (the language detector was unavailable).

use thiserror::Error;

/// Main error type for read-aloud operations.
///
/// # Example
///
/// ```rust
/// use recito_core::{RecitoError, Result};
///
/// fn seek(active: bool) -> Result<()> {
///     if !active {
///         return Err(RecitoError::NotActive("forward"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum RecitoError {
    /// The document source failed to produce a page.
    ///
    /// The playback orchestrator recovers from this locally by treating the
    /// document as ended; it is never surfaced as a user-visible error.
    #[error("document source failed: {0}")]
    Source(String),

    /// The speech synthesis engine reported an error.
    ///
    /// Propagated to the session's terminal end event.
    #[error("speech synthesis failed: {0}")]
    Speech(String),

    /// A segment-boundary seek refusal from the active speech handle.
    ///
    /// Distinguishable from other speech faults so the orchestrator can fall
    /// back to a page-level jump instead of failing the session.
    #[error("cannot seek past segment boundary")]
    CannotSeek,

    /// Forward/rewind was requested with no active session.
    ///
    /// Returned to the immediate caller and never retried.
    #[error("can't {0}, not active")]
    NotActive(&'static str),

    /// The language detector was unavailable or failed.
    ///
    /// Swallowed by the orchestrator; playback proceeds with the document's
    /// declared or default language.
    #[error("language detection failed: {0}")]
    Detection(String),

    /// The settings store could not be read.
    #[error("settings unavailable: {0}")]
    Settings(String),

    /// The voice catalog could not be read.
    #[error("voice catalog unavailable: {0}")]
    VoiceCatalog(String),
}

/// Result type alias for RecitoError.
pub type Result<T> = std::result::Result<T, RecitoError>;
