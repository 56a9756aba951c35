/*!
 * Core document model types.
 *
 * These types are JSON-serializable so a whole document, including raw
 * translation results and per-batch context snapshots, can be persisted in
 * a project file and reloaded for resume/retranslate/reparse runs.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::client::Translation;
use crate::context::TranslationContext;
use crate::errors::BatchError;
use crate::substitutions::Substitutions;

/// Blocks of inline whitespace that stand in for a line break
static WHITESPACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{3,}").unwrap());

/// A single subtitle line.
///
/// The line number is globally unique and strictly increasing across the
/// whole document. Timing is opaque to the orchestrator and immutable after
/// creation; only the translation field changes during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Globally unique line number
    pub number: usize,

    /// Start of the timing range, in milliseconds
    pub start_ms: u64,

    /// End of the timing range, in milliseconds
    pub end_ms: u64,

    /// Original source text
    pub text: String,

    /// Translated text, written by the orchestrator; a repair round may
    /// overwrite it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl Line {
    /// Create an untranslated line
    pub fn new(number: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            start_ms,
            end_ms,
            text: text.into(),
            translation: None,
        }
    }

    /// Whether the line has no translatable content
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A translated line parsed out of a raw service response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedLine {
    /// Line number the translation claims to correspond to
    pub number: usize,

    /// Translated text
    pub text: String,
}

impl TranslatedLine {
    /// Create a translated line
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Merge two translated-line sets; entries in `incoming` take precedence
/// over `existing` for overlapping line numbers. The result is ordered by
/// line number.
pub fn merge_translations(
    existing: Vec<TranslatedLine>,
    incoming: Vec<TranslatedLine>,
) -> Vec<TranslatedLine> {
    let replaced: BTreeSet<usize> = incoming.iter().map(|line| line.number).collect();
    let mut merged: Vec<TranslatedLine> = existing
        .into_iter()
        .filter(|line| !replaced.contains(&line.number))
        .chain(incoming)
        .collect();
    merged.sort_by_key(|line| line.number);
    merged
}

/// The unit of a single request to the generation service: a bounded group
/// of lines sent together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Owning scene number
    pub scene: usize,

    /// Batch number, unique within its scene
    pub number: usize,

    /// Original lines, in line-number order
    pub originals: Vec<Line>,

    /// Translations matched to original line numbers
    #[serde(default)]
    pub translated: Vec<TranslatedLine>,

    /// Validation errors from the most recent attempt
    #[serde(default)]
    pub errors: Vec<BatchError>,

    /// Free-text summary of the batch, used as continuity context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Context snapshot from the most recent attempt
    #[serde(default)]
    pub context: TranslationContext,

    /// Raw translation result, kept for reparse runs and audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<Translation>,
}

impl Batch {
    /// Create a batch from its original lines
    pub fn new(scene: usize, number: usize, originals: Vec<Line>) -> Self {
        Self {
            scene,
            number,
            originals,
            translated: Vec::new(),
            errors: Vec::new(),
            summary: None,
            context: TranslationContext::new(),
            translation: None,
        }
    }

    /// Number of lines in the batch
    pub fn size(&self) -> usize {
        self.originals.len()
    }

    /// Display label used in logs and context
    pub fn label(&self) -> String {
        format!("Scene {} batch {}", self.scene, self.number)
    }

    /// Whether every translatable original line has a translation
    pub fn all_translated(&self) -> bool {
        let translated: BTreeSet<usize> = self.translated.iter().map(|line| line.number).collect();
        self.originals
            .iter()
            .filter(|line| !line.is_blank())
            .all(|line| translated.contains(&line.number))
    }

    /// Original lines that still have no translation, blank lines excluded
    pub fn untranslated(&self) -> Vec<&Line> {
        let translated: BTreeSet<usize> = self.translated.iter().map(|line| line.number).collect();
        self.originals
            .iter()
            .filter(|line| !line.is_blank() && !translated.contains(&line.number))
            .collect()
    }

    /// Apply input substitutions to the original lines, returning the
    /// replacements that were made
    pub fn perform_input_substitutions(
        &mut self,
        substitutions: &Substitutions,
    ) -> Vec<(String, String)> {
        let mut replacements = Vec::new();
        if substitutions.is_empty() {
            return replacements;
        }

        for line in &mut self.originals {
            let (text, replaced) = substitutions.apply(&line.text);
            if !replaced.is_empty() {
                line.text = text;
                replacements.extend(replaced);
            }
        }

        replacements.dedup();
        replacements
    }

    /// Fold blocks of inline whitespace into line breaks
    pub fn convert_whitespace_blocks_to_newlines(&mut self) {
        for line in &mut self.originals {
            if WHITESPACE_BLOCK.is_match(&line.text) {
                line.text = WHITESPACE_BLOCK.replace_all(&line.text, "\n").into_owned();
            }
        }
    }

    /// Record a value in the batch's context snapshot
    pub fn add_context(
        &mut self,
        key: impl Into<String>,
        value: impl Into<crate::context::ContextValue>,
    ) {
        self.context.set(key, value);
    }

    /// Write the matched translations back into the original lines
    pub fn commit_translations(&mut self) {
        for translated in &self.translated {
            if let Some(line) = self
                .originals
                .iter_mut()
                .find(|line| line.number == translated.number)
            {
                line.translation = Some(translated.text.clone());
            }
        }
    }
}

/// A contiguous narrative grouping of batches, used to give the generation
/// service larger-scale continuity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Scene number, unique within the document
    pub number: usize,

    /// Batches in batch-number order
    pub batches: Vec<Batch>,

    /// Free-text summary of the scene
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Context snapshot from the most recent run
    #[serde(default)]
    pub context: TranslationContext,
}

impl Scene {
    /// Create a scene from its batches
    pub fn new(number: usize, batches: Vec<Batch>) -> Self {
        Self {
            number,
            batches,
            summary: None,
            context: TranslationContext::new(),
        }
    }

    /// Total number of lines across all batches
    pub fn linecount(&self) -> usize {
        self.batches.iter().map(Batch::size).sum()
    }

    /// Whether every batch in the scene is fully translated
    pub fn all_translated(&self) -> bool {
        !self.batches.is_empty() && self.batches.iter().all(Batch::all_translated)
    }

    /// Numbers of the batches that are not yet fully translated
    pub fn untranslated_batch_numbers(&self) -> Vec<usize> {
        self.batches
            .iter()
            .filter(|batch| !batch.all_translated())
            .map(|batch| batch.number)
            .collect()
    }
}

/// A complete subtitle document: the scene hierarchy plus the flattened
/// line projections produced at the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// All source lines, in line-number order
    pub originals: Vec<Line>,

    /// Scene hierarchy; empty until the document is decomposed
    #[serde(default)]
    pub scenes: Vec<Scene>,

    /// Flattened translated lines, rebuilt after each run
    #[serde(default)]
    pub translated: Vec<Line>,
}

impl Document {
    /// Create a document from raw lines, with no scenes yet
    pub fn new(originals: Vec<Line>) -> Self {
        Self {
            originals,
            scenes: Vec::new(),
            translated: Vec::new(),
        }
    }

    /// Create a document directly from pre-batched scenes
    pub fn from_scenes(scenes: Vec<Scene>) -> Self {
        let originals = scenes
            .iter()
            .flat_map(|scene| scene.batches.iter())
            .flat_map(|batch| batch.originals.iter().cloned())
            .collect();
        Self {
            originals,
            scenes,
            translated: Vec::new(),
        }
    }

    /// Total line count
    pub fn linecount(&self) -> usize {
        if self.scenes.is_empty() {
            self.originals.len()
        } else {
            self.scenes.iter().map(Scene::linecount).sum()
        }
    }

    /// Total scene count
    pub fn scenecount(&self) -> usize {
        self.scenes.len()
    }

    /// Look up a scene by number
    pub fn get_scene(&mut self, number: usize) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|scene| scene.number == number)
    }

    /// Rolling summary history for a batch, for API use and inspection
    pub fn batch_context(
        &self,
        scene_number: usize,
        batch_number: usize,
        max_summaries: usize,
    ) -> Vec<String> {
        let Some(index) = self
            .scenes
            .iter()
            .position(|scene| scene.number == scene_number)
        else {
            return Vec::new();
        };
        batch_context_history(
            &self.scenes[..index],
            &self.scenes[index],
            batch_number,
            max_summaries,
        )
    }

    /// Flatten the scene hierarchy into the final line projections.
    ///
    /// Rebuilds `originals` and `translated` from the batches and returns
    /// the (translated, untranslated) lines.
    pub fn unbatch(&mut self) -> (Vec<Line>, Vec<Line>) {
        let originals: Vec<Line> = self
            .scenes
            .iter()
            .flat_map(|scene| scene.batches.iter())
            .flat_map(|batch| batch.originals.iter().cloned())
            .collect();

        let translated: Vec<Line> = originals
            .iter()
            .filter(|line| line.translation.is_some())
            .cloned()
            .collect();

        let untranslated: Vec<Line> = originals
            .iter()
            .filter(|line| !line.is_blank() && line.translation.is_none())
            .cloned()
            .collect();

        self.originals = originals;
        self.translated = translated.clone();

        (translated, untranslated)
    }
}

/// Build the bounded summary history for a batch: summaries of preceding
/// scenes and of earlier batches in the current scene, oldest first,
/// truncated to the most recent `max_summaries` entries.
pub fn batch_context_history(
    prior_scenes: &[Scene],
    scene: &Scene,
    batch_number: usize,
    max_summaries: usize,
) -> Vec<String> {
    let mut history = Vec::new();

    for prior in prior_scenes {
        if let Some(summary) = prior.summary.as_deref().filter(|s| !s.is_empty()) {
            history.push(format!("Scene {}: {}", prior.number, summary));
        }
    }

    for batch in scene.batches.iter().filter(|b| b.number < batch_number) {
        if let Some(summary) = batch.summary.as_deref().filter(|s| !s.is_empty()) {
            history.push(format!(
                "Scene {} batch {}: {}",
                batch.scene, batch.number, summary
            ));
        }
    }

    if history.len() > max_summaries {
        history.drain(..history.len() - max_summaries);
    }

    history
}
