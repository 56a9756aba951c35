/*!
 * Error types for the subtrans engine.
 *
 * The error taxonomy distinguishes how far a failure should propagate:
 * `Aborted` and `Impossible` unwind the whole run, everything else is
 * recoverable at the batch or scene level depending on run options.
 * Uses the thiserror crate for ergonomic error definitions.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised during a translation run
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The run was cancelled from outside; unwinds every level immediately
    #[error("Translation aborted")]
    Aborted,

    /// Fatal service-side condition, e.g. account quota exhausted
    #[error("Translation impossible: {0}")]
    Impossible(String),

    /// A batch could not be produced after all allowed attempts
    #[error("Translation failed: {0}")]
    Failed(String),

    /// The request was too large even with context omitted
    #[error("Too many tokens in translation")]
    TooManyTokens,

    /// The service returned a response with no translated text
    #[error("Translation contains no translated text")]
    NoTranslation,

    /// Original lines that no parsed entry could be matched to
    #[error("No translation found for {} lines", lines.len())]
    UntranslatedLines {
        /// Line numbers with no corresponding translation
        lines: Vec<usize>,
    },

    /// The parsed result failed a sanity check
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The document has no scenes and auto-batching produced none
    #[error("No scenes to translate")]
    NoScenes,

    /// The response text could not be parsed into lines
    #[error("Failed to parse translation: {0}")]
    ParseFailed(String),

    /// Error reported by the translation client
    #[error("Client error: {0}")]
    Client(String),
}

impl TranslationError {
    /// Whether the error was caused by cancellation
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Whether the error must terminate the whole run regardless of options
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Impossible(_))
    }
}

/// Kind of validation failure recorded against a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchErrorKind {
    /// Original lines with no matching translation
    UnmatchedLines,
    /// Any other validation failure
    Validation,
}

/// A validation error recorded on a batch.
///
/// Batch errors accumulate during response processing and are cleared at the
/// start of the next translation attempt. They are serialisable so they
/// survive in project files and can be sent back as repair guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// What kind of failure this was
    pub kind: BatchErrorKind,

    /// Human-readable description, also used as repair guidance
    pub message: String,

    /// Line numbers involved, if any
    #[serde(default)]
    pub lines: Vec<usize>,
}

impl BatchError {
    /// Record original lines that could not be matched to a translation
    pub fn unmatched(lines: Vec<usize>) -> Self {
        Self {
            kind: BatchErrorKind::UnmatchedLines,
            message: format!("No translation found for {} lines", lines.len()),
            lines,
        }
    }

    /// Record a general validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: BatchErrorKind::Validation,
            message: message.into(),
            lines: Vec::new(),
        }
    }
}

impl From<&TranslationError> for BatchError {
    fn from(error: &TranslationError) -> Self {
        match error {
            TranslationError::UntranslatedLines { lines } => Self::unmatched(lines.clone()),
            other => Self::validation(other.to_string()),
        }
    }
}
