/*!
 * Batch/scene orchestration.
 *
 * The translator walks the scene/batch hierarchy in order, decides what to
 * (re)send according to the run mode, manages per-batch retry policy,
 * merges results into the document and carries the rolling context forward
 * between requests. Processing is strictly sequential within a run because
 * each batch's context depends on the preceding batch's result.
 */

use log::{debug, info, warn};
use std::sync::Arc;

use crate::batcher::{Batcher, GapBatcher};
use crate::cancellation::CancellationToken;
use crate::client::{ClientRegistry, TranslationClient};
use crate::context::{ContextValue, TranslationContext};
use crate::document::{batch_context_history, Batch, Document, Line, Scene};
use crate::errors::TranslationError;
use crate::events::TranslationEvents;
use crate::options::TranslationOptions;
use crate::processor::ResponseProcessor;
use crate::substitutions::Substitutions;
use crate::summary::sanitise_summary;

/// Final line projections of a translation run
#[derive(Debug, Clone, Default)]
pub struct TranslationReport {
    /// Lines with a committed translation
    pub translated: Vec<Line>,

    /// Non-blank lines that remain untranslated
    pub untranslated: Vec<Line>,
}

/// How a batch left the batch loop
enum BatchOutcome {
    /// Nothing was sent and nothing changed
    Skipped,

    /// Preview mode: the batch was inspected but no request was made
    Previewed,

    /// The batch was dispatched and its result processed
    Translated,
}

/// Translates a document scene by scene, batch by batch
pub struct SubtitleTranslator {
    options: TranslationOptions,
    client: Arc<dyn TranslationClient>,
    batcher: Box<dyn Batcher>,
    events: TranslationEvents,
    token: CancellationToken,
    prompt: String,
    context: TranslationContext,
}

impl SubtitleTranslator {
    /// Create a translator with run options and a client
    pub fn new(options: TranslationOptions, client: Arc<dyn TranslationClient>) -> Self {
        let prompt = options.build_prompt();
        debug!("Translation prompt: {}", prompt);

        // Document-level context, established once per run
        let mut context = TranslationContext::new();
        if let Some(name) = options.movie_name.as_deref().filter(|name| !name.is_empty()) {
            context.set("movie_name", name);
        }
        if !options.substitutions.is_empty() {
            let table: std::collections::BTreeMap<String, ContextValue> = options
                .substitutions
                .iter()
                .map(|(before, after)| (before.clone(), ContextValue::Text(after.clone())))
                .collect();
            context.set("substitutions", table);
        }

        Self {
            prompt,
            context,
            options,
            client,
            batcher: Box::new(GapBatcher::new()),
            events: TranslationEvents::new(),
            token: CancellationToken::new(),
        }
    }

    /// Create a translator, resolving the client from a registry by the
    /// model named in the options
    pub fn from_registry(
        options: TranslationOptions,
        registry: &ClientRegistry,
    ) -> Result<Self, TranslationError> {
        let client = registry.create(&options)?;
        Ok(Self::new(options, client))
    }

    /// Replace the auto-batcher used for documents without scenes
    pub fn with_batcher(mut self, batcher: Box<dyn Batcher>) -> Self {
        self.batcher = batcher;
        self
    }

    /// The event subscriber list
    pub fn events(&self) -> &TranslationEvents {
        &self.events
    }

    /// A clone of the run's cancellation token
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The run options
    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    /// Cancel the run and abort any outstanding request
    pub fn stop(&self) {
        self.token.cancel();
        self.client.abort();
    }

    /// Translate a whole document in place.
    ///
    /// Returns the flattened translated/untranslated line projections, or
    /// the single fatal condition that terminated the run early. Batches
    /// committed before a fatal condition remain in the document.
    pub async fn translate(
        &self,
        document: &mut Document,
    ) -> Result<TranslationReport, TranslationError> {
        self.token.check()?;

        if document.scenes.is_empty() {
            if self.options.retranslate || self.options.resume {
                warn!("Previous translation not found, starting fresh...");
            }
            document.scenes = self.batcher.decompose(&document.originals, &self.options);
        }

        if document.scenes.is_empty() {
            return Err(TranslationError::NoScenes);
        }

        if self.options.resume {
            info!("Resuming translation");
        }

        info!(
            "Translating {} lines in {} scenes",
            document.linecount(),
            document.scenecount()
        );

        self.events.notify_preprocessed(&document.scenes);

        let max_lines = self.options.max_lines;
        let mut remaining = max_lines;
        let scenecount = document.scenecount();

        for index in 0..document.scenes.len() {
            self.token.check()?;

            let (prior, rest) = document.scenes.split_at_mut(index);
            let scene = &mut rest[0];

            if self.options.resume && scene.all_translated() {
                info!(
                    "Scene {} already translated {} lines...",
                    scene.number,
                    scene.linecount()
                );
                continue;
            }

            debug!("Translating scene {} of {}", scene.number, scenecount);

            let batch_numbers = if self.options.resume {
                Some(scene.untranslated_batch_numbers())
            } else {
                None
            };

            self.translate_scene(scene, prior, batch_numbers.as_deref(), None, &mut remaining)
                .await?;

            if remaining == Some(0) {
                info!(
                    "Reached max_lines limit of {} lines... finishing",
                    max_lines.unwrap_or(0)
                );
                break;
            }
        }

        let (translated, untranslated) = document.unbatch();

        if !translated.is_empty() && max_lines.is_none() {
            info!("Successfully translated {} lines!", translated.len());
        }

        if !untranslated.is_empty() && max_lines.is_none() {
            warn!("Failed to translate {} lines:", untranslated.len());
            for line in &untranslated {
                info!("Untranslated > {}. {}", line.number, line.text);
            }
        }

        Ok(TranslationReport {
            translated,
            untranslated,
        })
    }

    /// Translate one scene, applying the per-scene failure policy.
    ///
    /// `prior_scenes` supplies the summary history for context building;
    /// `batch_numbers`/`line_numbers` restrict the work when resuming or
    /// redoing a subset.
    pub async fn translate_scene(
        &self,
        scene: &mut Scene,
        prior_scenes: &[Scene],
        batch_numbers: Option<&[usize]>,
        line_numbers: Option<&[usize]>,
        remaining: &mut Option<usize>,
    ) -> Result<(), TranslationError> {
        // Scene context descends from the document context; the run's
        // context wins over a stored snapshot
        scene.context = scene.context.merged(&self.context);

        let mut context = scene.context.clone();
        let scene_label = match scene.summary.as_deref() {
            Some(summary) => format!("Scene {}: {}", scene.number, summary),
            None => format!("Scene {}", scene.number),
        };
        context.set("scene", scene_label);

        let result = self
            .translate_batches(scene, prior_scenes, batch_numbers, line_numbers, &mut context, remaining)
            .await;

        match result {
            Ok(()) => {
                let movie_name = self.options.movie_name.as_deref();
                scene.summary = scene
                    .summary
                    .as_deref()
                    .and_then(|text| sanitise_summary(text, movie_name))
                    .or_else(|| {
                        context
                            .get_text("scene")
                            .and_then(|text| sanitise_summary(text, movie_name))
                    })
                    .or_else(|| {
                        context
                            .get_text("summary")
                            .and_then(|text| sanitise_summary(text, movie_name))
                    });

                self.events.notify_scene_translated(scene);
                Ok(())
            },
            Err(failure) if failure.is_fatal() => Err(failure),
            Err(failure) => {
                if self.options.stop_on_error {
                    Err(failure)
                } else {
                    warn!(
                        "Failed to translate scene {} ({})... moving on",
                        scene.number, failure
                    );
                    Ok(())
                }
            },
        }
    }

    /// Send a scene's batches for translation, building up context
    async fn translate_batches(
        &self,
        scene: &mut Scene,
        prior_scenes: &[Scene],
        batch_numbers: Option<&[usize]>,
        line_numbers: Option<&[usize]>,
        context: &mut TranslationContext,
        remaining: &mut Option<usize>,
    ) -> Result<(), TranslationError> {
        let substitutions =
            Substitutions::compile(&self.options.substitutions, self.options.match_partial_words);

        for index in 0..scene.batches.len() {
            self.token.check()?;

            let batch_number = scene.batches[index].number;

            if let Some(numbers) = batch_numbers {
                if !numbers.contains(&batch_number) {
                    continue;
                }
            }

            if self.options.resume && scene.batches[index].all_translated() {
                info!(
                    "Scene {} batch {} already translated {} lines...",
                    scene.number,
                    batch_number,
                    scene.batches[index].size()
                );
                continue;
            }

            let history = batch_context_history(
                prior_scenes,
                scene,
                batch_number,
                self.options.max_context_summaries,
            );

            let batch = &mut scene.batches[index];
            let label = batch.label();

            let outcome = match self
                .translate_batch(batch, history, context, line_numbers, remaining, &substitutions)
                .await
            {
                Ok(outcome) => outcome,
                Err(failure) if failure.is_fatal() => return Err(failure),
                Err(TranslationError::NoTranslation) => {
                    // Empty response: treated as an empty result for this batch
                    warn!("No translation for {}", label);
                    BatchOutcome::Skipped
                },
                Err(failure) => {
                    if self.options.stop_on_error {
                        return Err(TranslationError::Failed(format!(
                            "Failed to translate a batch ({})",
                            failure
                        )));
                    }
                    warn!("Error translating batch: {}", failure);
                    BatchOutcome::Skipped
                },
            };

            match outcome {
                BatchOutcome::Skipped => {},
                BatchOutcome::Previewed => {
                    self.events.notify_batch_translated(&scene.batches[index]);
                },
                BatchOutcome::Translated => {
                    context.set("previous_batch", scene.batches[index].label());
                    self.events.notify_batch_translated(&scene.batches[index]);
                },
            }

            // The budget is charged inside translate_batch, so a failed
            // batch can exhaust it too
            if *remaining == Some(0) {
                break;
            }
        }

        Ok(())
    }

    /// Translate or reparse a single batch and process the result
    async fn translate_batch(
        &self,
        batch: &mut Batch,
        history: Vec<String>,
        context: &mut TranslationContext,
        line_numbers: Option<&[usize]>,
        remaining: &mut Option<usize>,
        substitutions: &Substitutions,
    ) -> Result<BatchOutcome, TranslationError> {
        // When redoing work, the batch's stored context overlays the
        // propagated one so the redo sees what the original request saw
        let mut request_context = if (self.options.retranslate || self.options.reparse)
            && !batch.context.is_empty()
        {
            context.merged(&batch.context)
        } else {
            context.clone()
        };

        let replacements = batch.perform_input_substitutions(substitutions);

        if self.options.whitespaces_to_newline {
            batch.convert_whitespace_blocks_to_newlines();
        }

        let mut originals: Vec<Line> = batch
            .originals
            .iter()
            .filter(|line| !line.is_blank())
            .cloned()
            .collect();

        if let Some(rem) = *remaining {
            if originals.len() > rem {
                info!("Truncating batch to remain within max_lines");
                originals.truncate(rem);
            }
        }

        if originals.is_empty() {
            debug!("{} has no translatable lines", batch.label());
            return Ok(BatchOutcome::Skipped);
        }

        let translation = if self.options.reparse {
            match &batch.translation {
                Some(stored) => {
                    info!("Reparsing {} with {} lines...", batch.label(), originals.len());
                    stored.clone()
                },
                None => {
                    warn!("No stored translation to reparse for {}", batch.label());
                    return Ok(BatchOutcome::Skipped);
                },
            }
        } else {
            debug!("Translating {} with {} lines...", batch.label(), originals.len());

            if !replacements.is_empty() {
                let listing: Vec<String> = replacements
                    .iter()
                    .map(|(before, after)| format!("{} -> {}", before, after))
                    .collect();
                info!("Made substitutions in input:\n{}", listing.join("\n"));
            }

            if self.options.preview {
                return Ok(BatchOutcome::Previewed);
            }

            request_context.set("summaries", history);
            request_context.set_optional("summary", batch.summary.as_deref());
            request_context.set("batch", batch.label());

            // Dispatched lines count against the budget whatever comes back
            if let Some(rem) = remaining.as_mut() {
                *rem = rem.saturating_sub(originals.len());
            }

            let mut translation = self
                .client
                .request_translation(&self.prompt, &originals, Some(&request_context))
                .await?;
            self.token.check()?;

            if translation.quota_reached {
                return Err(TranslationError::Impossible(
                    "Translation service quota reached, upgrade the plan or wait until it renews"
                        .to_string(),
                ));
            }

            if translation.reached_token_limit {
                // One bounded retry with the context omitted, never a loop
                warn!("Hit API token limit, retrying batch without context...");
                translation = self
                    .client
                    .request_translation(&self.prompt, &originals, None)
                    .await?;
                self.token.check()?;

                if translation.reached_token_limit {
                    return Err(TranslationError::TooManyTokens);
                }
            }

            translation
        };

        batch.translation = Some(translation);
        if let Some(summary) = request_context.get_text("summary") {
            let summary = summary.to_string();
            batch.add_context("summary", summary);
        }
        if let Some(summaries) = request_context.get("summaries") {
            let summaries = summaries.clone();
            batch.add_context("summaries", summaries);
        }

        let processor = ResponseProcessor::new(&self.options);
        processor
            .process(batch, context, self.client.as_ref(), &self.token, line_numbers)
            .await?;

        Ok(BatchOutcome::Translated)
    }
}
