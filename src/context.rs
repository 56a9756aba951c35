/*!
 * Translation context propagation.
 *
 * The context is the rolling bag of continuity variables (summaries,
 * substitutions, labels, previous-batch reference) passed into every
 * request. It is an immutable value merged functionally at each level of
 * the document hierarchy: batch context = scene context overridden by
 * batch-local keys, scene context = document context overridden by
 * scene-local keys.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single context variable: free text, a list, or a nested mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Free-text value
    Text(String),

    /// Ordered list of values, e.g. the rolling summary history
    List(Vec<String>),

    /// Nested mapping, e.g. the substitutions table
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    /// The text payload, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The list payload, if this is a list value
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl From<String> for ContextValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ContextValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, ContextValue>> for ContextValue {
    fn from(map: BTreeMap<String, ContextValue>) -> Self {
        Self::Map(map)
    }
}

/// Mapping of contextual variables passed by value into each request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationContext {
    values: BTreeMap<String, ContextValue>,
}

impl TranslationContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the context has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a context variable
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Look up a text-valued context variable
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_text)
    }

    /// Set a context variable, replacing any existing value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set a text variable from an optional value, removing the key when None
    pub fn set_optional(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(text) => self.set(key, text),
            None => {
                self.values.remove(key);
            },
        }
    }

    /// Remove a context variable
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    /// Builder-style set, for constructing contexts inline
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Merge two contexts into a new one; `overrides` wins on key collision.
    ///
    /// This is the only way context descends the hierarchy, so a child level
    /// can never mutate its parent's context by accident.
    pub fn merged(&self, overrides: &TranslationContext) -> TranslationContext {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        TranslationContext { values }
    }

    /// Iterate over all values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}
