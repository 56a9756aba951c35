/*!
 * Translation client interface.
 *
 * This module defines the contract a generation-service client must
 * satisfy, the raw `Translation` result it produces, and a registry that
 * maps model identifiers to client factories so new services can be added
 * without the orchestrator branching on model names.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::TranslationContext;
use crate::document::{Line, TranslatedLine};
use crate::errors::{BatchError, TranslationError};
use crate::options::TranslationOptions;

/// Raw result of one translation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// Full response text from the service
    pub text: String,

    /// Batch summary extracted from the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Scene summary extracted from the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,

    /// Whole-document synopsis extracted from the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,

    /// Prompt tokens consumed by the request
    #[serde(default)]
    pub prompt_tokens: u64,

    /// Completion tokens consumed by the request
    #[serde(default)]
    pub completion_tokens: u64,

    /// The service refused the request because the account quota is
    /// exhausted; terminal for the whole run
    #[serde(default)]
    pub quota_reached: bool,

    /// The request exceeded the service's token limit
    #[serde(default)]
    pub reached_token_limit: bool,

    /// Structured per-line results, filled by the client or its parser
    #[serde(default)]
    pub lines: Vec<TranslatedLine>,
}

impl Translation {
    /// Whether the response contains any translated text
    pub fn has_translation(&self) -> bool {
        !self.text.trim().is_empty() || !self.lines.is_empty()
    }

    /// Total tokens consumed by the request
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Extracts structured lines from a raw translation and sanity-checks them.
///
/// The parsing grammar itself belongs to the client; the orchestrator only
/// relies on this contract.
pub trait TranslationParser: Send + Sync {
    /// Parse the raw translation into ordered (line number, text) entries
    fn parse(&self, translation: &Translation) -> Result<Vec<TranslatedLine>, TranslationError>;

    /// Raise on structural anomalies in the parsed result
    fn validate(&self, lines: &[TranslatedLine]) -> Result<(), TranslationError>;
}

/// A client for a remote generation service.
///
/// The client owns connection handling, rate limiting and transport-level
/// retries; the orchestrator only distinguishes the error taxonomy it
/// returns. Implementations must honour `abort` by failing outstanding
/// requests with `TranslationError::Aborted` promptly.
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Request translation of a group of lines with optional context
    async fn request_translation(
        &self,
        prompt: &str,
        lines: &[Line],
        context: Option<&TranslationContext>,
    ) -> Result<Translation, TranslationError>;

    /// Request a corrected translation, carrying the current batch errors
    /// as repair guidance
    async fn request_retranslation(
        &self,
        translation: &Translation,
        errors: &[BatchError],
    ) -> Result<Translation, TranslationError>;

    /// The parser that understands this client's response format
    fn parser(&self) -> Arc<dyn TranslationParser>;

    /// Signal the client to abort any outstanding request
    fn abort(&self);
}

/// Factory producing a client for a set of run options
pub type ClientFactory =
    Box<dyn Fn(&TranslationOptions) -> Result<Arc<dyn TranslationClient>, TranslationError> + Send + Sync>;

/// Registry mapping model-name prefixes to client factories.
///
/// Resolution picks the longest registered prefix that matches the model
/// name, so "gpt-4" can be routed differently from "gpt" if both are
/// registered. Unknown models fail construction rather than falling back
/// to an arbitrary client.
#[derive(Default)]
pub struct ClientRegistry {
    factories: Vec<(String, ClientFactory)>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a model-name prefix
    pub fn register<F>(&mut self, prefix: impl Into<String>, factory: F)
    where
        F: Fn(&TranslationOptions) -> Result<Arc<dyn TranslationClient>, TranslationError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.push((prefix.into(), Box::new(factory)));
    }

    /// Create a client for the model named in the options
    pub fn create(
        &self,
        options: &TranslationOptions,
    ) -> Result<Arc<dyn TranslationClient>, TranslationError> {
        let model = options.model.as_str();

        let best = self
            .factories
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match best {
            Some((_, factory)) => factory(options),
            None => Err(TranslationError::Impossible(format!(
                "No translation client registered for model '{}'",
                model
            ))),
        }
    }
}
