/*!
 * Response processing for raw translations.
 *
 * Takes a batch's raw translation, parses it through the client's parser,
 * matches the parsed lines against the originals by line number, validates
 * the match set, and runs at most one bounded repair round when validation
 * fails. Unmatched lines that survive the repair stay recorded as both an
 * error and an untranslated line; that alone never aborts the run.
 */

use log::{debug, error, info, warn};
use std::collections::BTreeSet;

use crate::cancellation::CancellationToken;
use crate::client::{Translation, TranslationClient, TranslationParser};
use crate::context::TranslationContext;
use crate::document::{merge_translations, Batch, Line, TranslatedLine};
use crate::errors::{BatchError, TranslationError};
use crate::options::TranslationOptions;
use crate::substitutions::Substitutions;
use crate::summary::sanitise_summary;

/// Processes raw translations into per-batch results
pub struct ResponseProcessor<'a> {
    options: &'a TranslationOptions,
}

impl<'a> ResponseProcessor<'a> {
    /// Create a processor bound to the run options
    pub fn new(options: &'a TranslationOptions) -> Self {
        Self { options }
    }

    /// Extract structured results from the batch's raw translation and
    /// update `batch.translated`/`batch.errors` in place.
    ///
    /// `line_numbers` restricts which matched lines are committed; the rest
    /// of the batch's existing translations are kept. The rolling `context`
    /// is advanced with the new summary/scene/synopsis unless the run is in
    /// retranslate mode.
    pub async fn process(
        &self,
        batch: &mut Batch,
        context: &mut TranslationContext,
        client: &dyn TranslationClient,
        token: &CancellationToken,
        line_numbers: Option<&[usize]>,
    ) -> Result<(), TranslationError> {
        let translation = batch
            .translation
            .clone()
            .filter(Translation::has_translation)
            .ok_or(TranslationError::NoTranslation)?;

        debug!("{} translation:\n{}", batch.label(), translation.text);

        let parser = client.parser();

        // Previous attempt's errors are obsolete now
        batch.errors.clear();

        let mut translated = Vec::new();

        match parser.parse(&translation) {
            Ok(parsed) => {
                let (matched, unmatched) = match_translations(&batch.originals, parsed);
                translated = matched;

                if !unmatched.is_empty() {
                    warn!(
                        "Unable to match {} lines with a source line",
                        unmatched.len()
                    );
                    if self.options.enforce_line_parity {
                        let failure = TranslationError::UntranslatedLines { lines: unmatched };
                        if self.options.allow_retranslations {
                            batch.errors.push(BatchError::from(&failure));
                        } else {
                            return Err(failure);
                        }
                    }
                }

                if let Err(failure) = parser.validate(&translated) {
                    if self.options.allow_retranslations {
                        batch.errors.push(BatchError::from(&failure));
                    } else {
                        return Err(failure);
                    }
                }
            },
            Err(failure) => {
                if failure.is_fatal() || !self.options.allow_retranslations {
                    return Err(failure);
                }
                batch.errors.push(BatchError::from(&failure));
            },
        }

        // A single bounded repair round, never a loop
        if !batch.errors.is_empty() && self.options.allow_retranslations && !token.is_cancelled() {
            warn!(
                "{} failed validation, requesting retranslation",
                batch.label()
            );

            let retranslated = self
                .request_retranslation(client, batch, &translation, token)
                .await?;

            translated = merge_translations(translated, retranslated);

            batch.errors.clear();
            let unmatched = unmatched_numbers(&batch.originals, &translated);
            if !unmatched.is_empty() {
                warn!(
                    "Still unable to match {} lines with a source line - try splitting the batch",
                    unmatched.len()
                );
                batch.errors.push(BatchError::unmatched(unmatched));
            }

            if let Err(failure) = parser.validate(&translated) {
                warn!("Retranslation request did not fix problems: {}", failure);
                batch.errors.push(BatchError::from(&failure));
            } else if batch.errors.is_empty() {
                info!("Retranslation passed validation");
            }
        }

        // Commit the matched lines; retranslation entries already took
        // precedence during the merge
        if let Some(numbers) = line_numbers {
            let filtered: Vec<TranslatedLine> = translated
                .into_iter()
                .filter(|line| numbers.contains(&line.number))
                .collect();
            batch.translated = merge_translations(std::mem::take(&mut batch.translated), filtered);
        } else {
            batch.translated = translated;
        }

        let untranslated: Vec<String> = batch
            .untranslated()
            .iter()
            .map(|line| format!("{}. {}", line.number, line.text))
            .collect();
        if !untranslated.is_empty() {
            batch.add_context("untranslated_lines", untranslated);
        }

        self.apply_output_substitutions(batch);

        batch.commit_translations();

        if !self.options.retranslate {
            self.update_context(batch, context, &translation);
        }

        info!(
            "{}: {} lines translated, {} untranslated",
            batch.label(),
            batch.translated.len(),
            batch.untranslated().len()
        );
        if let Some(summary) = batch.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            info!("Summary: {}", summary);
        }

        Ok(())
    }

    /// Issue the repair request and parse its result, dropping entries that
    /// match no original line
    async fn request_retranslation(
        &self,
        client: &dyn TranslationClient,
        batch: &Batch,
        translation: &Translation,
        token: &CancellationToken,
    ) -> Result<Vec<TranslatedLine>, TranslationError> {
        let retranslation = client
            .request_retranslation(translation, &batch.errors)
            .await?;
        token.check()?;

        debug!("{} retranslation:\n{}", batch.label(), retranslation.text);

        let parser: std::sync::Arc<dyn TranslationParser> = client.parser();
        match parser.parse(&retranslation) {
            Ok(parsed) if !parsed.is_empty() => {
                let (matched, _) = match_translations(&batch.originals, parsed);
                Ok(matched)
            },
            _ => {
                error!("Retranslation request did not produce a useful result");
                Ok(Vec::new())
            },
        }
    }

    /// Apply output substitutions to the committed lines and, for audit
    /// consistency, to the raw translation text
    fn apply_output_substitutions(&self, batch: &mut Batch) {
        let substitutions =
            Substitutions::compile(&self.options.substitutions, self.options.match_partial_words);
        if substitutions.is_empty() {
            return;
        }

        let mut replacements = Vec::new();
        for line in &mut batch.translated {
            let (text, replaced) = substitutions.apply(&line.text);
            if !replaced.is_empty() {
                line.text = text;
                replacements.extend(replaced);
            }
        }

        if let Some(raw) = batch.translation.as_mut() {
            let (text, _) = substitutions.apply(&raw.text);
            raw.text = text;
        }

        if !replacements.is_empty() {
            replacements.dedup();
            let listing: Vec<String> = replacements
                .iter()
                .map(|(before, after)| format!("{} -> {}", before, after))
                .collect();
            info!("Made substitutions in output:\n{}", listing.join("\n"));
        }
    }

    /// Advance the rolling context with the sanitised summary, scene and
    /// synopsis from this translation
    fn update_context(
        &self,
        batch: &mut Batch,
        context: &mut TranslationContext,
        translation: &Translation,
    ) {
        let movie_name = self.options.movie_name.as_deref();

        let summary = translation.summary.clone().or_else(|| batch.summary.clone());
        batch.summary = summary
            .as_deref()
            .and_then(|text| sanitise_summary(text, movie_name));

        context.set_optional("summary", batch.summary.as_deref());

        if let Some(scene_summary) = translation
            .scene
            .as_deref()
            .and_then(|text| sanitise_summary(text, movie_name))
        {
            context.set("scene", scene_summary);
        }

        if let Some(synopsis) = translation.synopsis.as_deref().filter(|s| !s.is_empty()) {
            context.set("synopsis", synopsis);
        }

        batch.context = context.clone();
    }
}

/// Match parsed entries against original lines by number.
///
/// Parsed entries with no corresponding original are dropped with a
/// warning; returns the matched lines in number order and the original
/// line numbers left unmatched.
pub fn match_translations(
    originals: &[Line],
    parsed: Vec<TranslatedLine>,
) -> (Vec<TranslatedLine>, Vec<usize>) {
    let known: BTreeSet<usize> = originals
        .iter()
        .filter(|line| !line.is_blank())
        .map(|line| line.number)
        .collect();

    let mut matched: Vec<TranslatedLine> = Vec::new();
    for entry in parsed {
        if !known.contains(&entry.number) {
            warn!("Dropping translation for unknown line {}", entry.number);
            continue;
        }
        // A later entry for the same number replaces the earlier one
        matched.retain(|line| line.number != entry.number);
        matched.push(entry);
    }
    matched.sort_by_key(|line| line.number);

    let unmatched = unmatched_numbers(originals, &matched);
    (matched, unmatched)
}

/// Original line numbers with no entry in the translated set, blank lines
/// excluded
pub fn unmatched_numbers(originals: &[Line], translated: &[TranslatedLine]) -> Vec<usize> {
    let translated: BTreeSet<usize> = translated.iter().map(|line| line.number).collect();
    originals
        .iter()
        .filter(|line| !line.is_blank() && !translated.contains(&line.number))
        .map(|line| line.number)
        .collect()
}
