/*!
 * Word and phrase substitution tables.
 *
 * Substitutions are applied to source lines before a batch is dispatched
 * and to translated lines after processing, so recurring names and phrases
 * stay consistent across the whole document. Matching is whole-word by
 * default, with an option to match inside words.
 */

use regex::Regex;
use std::collections::BTreeMap;

/// A compiled substitution table
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    entries: Vec<SubstitutionEntry>,
}

#[derive(Debug, Clone)]
struct SubstitutionEntry {
    pattern: Regex,
    before: String,
    after: String,
}

impl Substitutions {
    /// Compile a substitution table from replacement pairs.
    ///
    /// With `match_partial_words` the pattern matches anywhere in the text,
    /// otherwise it is anchored on word boundaries.
    pub fn compile(table: &BTreeMap<String, String>, match_partial_words: bool) -> Self {
        let entries = table
            .iter()
            .filter(|(before, _)| !before.trim().is_empty())
            .filter_map(|(before, after)| {
                let escaped = regex::escape(before);
                let pattern = if match_partial_words {
                    escaped
                } else {
                    format!(r"\b{}\b", escaped)
                };
                Regex::new(&pattern).ok().map(|pattern| SubstitutionEntry {
                    pattern,
                    before: before.clone(),
                    after: after.clone(),
                })
            })
            .collect();

        Self { entries }
    }

    /// Parse `before::after` pairs into a replacement table.
    ///
    /// Lines without a separator are ignored.
    pub fn parse_pairs(pairs: &[String]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .filter_map(|pair| {
                pair.split_once("::")
                    .map(|(before, after)| (before.trim().to_string(), after.trim().to_string()))
            })
            .filter(|(before, _)| !before.is_empty())
            .collect()
    }

    /// Whether the table has any entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply all substitutions to a text, returning the new text and the
    /// (before, after) pairs that actually matched
    pub fn apply(&self, text: &str) -> (String, Vec<(String, String)>) {
        let mut result = text.to_string();
        let mut replacements = Vec::new();

        for entry in &self.entries {
            if entry.pattern.is_match(&result) {
                result = entry
                    .pattern
                    .replace_all(&result, entry.after.as_str())
                    .into_owned();
                replacements.push((entry.before.clone(), entry.after.clone()));
            }
        }

        (result, replacements)
    }
}
