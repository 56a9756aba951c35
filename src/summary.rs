/*!
 * Summary sanitisation for continuity context.
 *
 * The generation service tends to decorate its summaries with boilerplate
 * ("Scene 4:", "Summary of the batch", the show title). Left alone that
 * noise accumulates in the rolling context over many requests, so every
 * summary is cleaned before it is stored or propagated.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading runs of "Scene"/"Batch" labels with their numbering and punctuation
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:(?:scene|batch)[\s\d:\-]*)+").unwrap());

/// Clean a free-text summary returned by the service.
///
/// Strips leading scene/batch labels, literal template phrases and an
/// optional title prefix, then trims. Returns `None` when nothing useful
/// remains.
pub fn sanitise_summary(summary: &str, movie_name: Option<&str>) -> Option<String> {
    let mut summary = LABEL_PREFIX.replace(summary, "").into_owned();

    summary = summary.replace("Summary of the batch", "");
    summary = summary.replace("Summary of the scene", "");

    if let Some(name) = movie_name.filter(|name| !name.is_empty()) {
        summary = strip_title_prefix(&summary, name);
    }

    let trimmed = summary.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Remove a literal title prefix, but only when followed by a `:` or `-`
/// separator so a summary that merely mentions the title is left intact
fn strip_title_prefix(summary: &str, name: &str) -> String {
    let Some(rest) = summary.strip_prefix(name) else {
        return summary.to_string();
    };

    let after_space = rest.trim_start();
    let Some(after_separator) = after_space
        .strip_prefix(':')
        .or_else(|| after_space.strip_prefix('-'))
    else {
        return summary.to_string();
    };

    after_separator.trim_start().to_string()
}
