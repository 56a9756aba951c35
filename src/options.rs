/*!
 * Translation run options.
 *
 * This module handles the configuration surface consumed by a run,
 * including loading and saving a JSON options file and mapping a project
 * mode string onto the individual mode flags.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration snapshot for one translation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOptions {
    /// Model identifier, used to select a client from the registry
    #[serde(default)]
    pub model: String,

    /// Target language for the translation
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Instruction text sent with every request; a default prompt is built
    /// from the target language when empty
    #[serde(default)]
    pub prompt: String,

    /// Movie or show title, stripped from summaries and offered as context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_name: Option<String>,

    /// Skip scenes and batches that are already fully translated
    #[serde(default)]
    pub resume: bool,

    /// Re-request translation for already-translated content
    #[serde(default)]
    pub retranslate: bool,

    /// Re-run response processing on stored raw results, without requests
    #[serde(default)]
    pub reparse: bool,

    /// Walk the document without sending any requests
    #[serde(default)]
    pub preview: bool,

    /// Escalate recoverable batch errors to a fatal run error
    #[serde(default)]
    pub stop_on_error: bool,

    /// Allow one repair request per batch when validation fails
    #[serde(default = "default_true")]
    pub allow_retranslations: bool,

    /// Treat unmatched original lines as a validation failure
    #[serde(default)]
    pub enforce_line_parity: bool,

    /// Global budget on lines dispatched across the whole run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<usize>,

    /// Fold blocks of inline whitespace into line breaks before sending
    #[serde(default)]
    pub whitespaces_to_newline: bool,

    /// Match substitutions inside words rather than on word boundaries
    #[serde(default)]
    pub match_partial_words: bool,

    /// Upper bound on the rolling summary history sent as context
    #[serde(default = "default_max_context_summaries")]
    pub max_context_summaries: usize,

    /// Word/phrase replacement table
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,

    /// Timing gap that starts a new scene during auto-batching
    #[serde(default = "default_scene_gap_ms")]
    pub scene_gap_ms: u64,

    /// Maximum lines per batch during auto-batching
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_target_language() -> String {
    "English".to_string()
}

fn default_max_context_summaries() -> usize {
    10
}

fn default_scene_gap_ms() -> u64 {
    30_000
}

fn default_max_batch_size() -> usize {
    30
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            target_language: default_target_language(),
            prompt: String::new(),
            movie_name: None,
            resume: false,
            retranslate: false,
            reparse: false,
            preview: false,
            stop_on_error: false,
            allow_retranslations: default_true(),
            enforce_line_parity: false,
            max_lines: None,
            whitespaces_to_newline: false,
            match_partial_words: false,
            max_context_summaries: default_max_context_summaries(),
            substitutions: BTreeMap::new(),
            scene_gap_ms: default_scene_gap_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl TranslationOptions {
    /// Load options from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read options file: {:?}", path.as_ref()))?;
        let options = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse options file: {:?}", path.as_ref()))?;
        Ok(options)
    }

    /// Save options to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write options file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Map a project mode string onto the mode flags.
    ///
    /// Recognised modes: "resume", "retranslate", "reparse", "preview".
    /// Any other value clears all four flags.
    pub fn apply_project_mode(&mut self, mode: &str) {
        let mode = mode.to_lowercase();
        self.resume = mode == "resume";
        self.retranslate = mode == "retranslate";
        self.reparse = mode == "reparse";
        self.preview = mode == "preview";
    }

    /// The instruction prompt sent with every request
    pub fn build_prompt(&self) -> String {
        if !self.prompt.trim().is_empty() {
            return self.prompt.trim().to_string();
        }

        match &self.movie_name {
            Some(name) if !name.is_empty() => format!(
                "Translate these subtitles for {} into {}",
                name, self.target_language
            ),
            _ => format!("Translate these subtitles into {}", self.target_language),
        }
    }
}
