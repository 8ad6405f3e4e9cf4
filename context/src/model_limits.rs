//! Model context limits.
//!
//! [`ModelLimitTable`] holds the context window of every model a result is
//! classified against: a built-in set of common models plus caller-supplied
//! overrides. Lookups of versioned model ids fall back to prefix matching.

use std::collections::BTreeMap;

/// Built-in models and their context windows in tokens.
///
/// Ordered by specificity (more specific prefixes first) to ensure
/// correct matching when multiple prefixes could match.
const KNOWN_MODELS: &[(&str, u64)] = &[
    // OpenAI
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    // Anthropic
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-5-haiku", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-haiku", 200_000),
    // Google
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
];

/// Where a resolved limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLimitSource {
    /// Exact match from an override.
    Override,
    /// Matched a built-in prefix (the matched prefix).
    Prefix(&'static str),
}

/// Result of looking up one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedModelLimit {
    context_window: u64,
    source: ModelLimitSource,
}

impl ResolvedModelLimit {
    #[must_use]
    pub const fn context_window(self) -> u64 {
        self.context_window
    }

    #[must_use]
    pub const fn source(self) -> ModelLimitSource {
        self.source
    }
}

/// Named context limits, loaded once and read-only afterwards.
///
/// # Example
///
/// ```
/// use codecorpus_context::ModelLimitTable;
///
/// let table = ModelLimitTable::builtin().with_limit("local-llama", 32_768);
/// assert_eq!(table.get("gpt-4-0613").map(|r| r.context_window()), Some(8_192));
/// assert_eq!(table.get("local-llama").map(|r| r.context_window()), Some(32_768));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelLimitTable {
    include_builtin: bool,
    overrides: BTreeMap<String, u64>,
}

impl ModelLimitTable {
    /// Table with no models at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the built-in models.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            include_builtin: true,
            overrides: BTreeMap::new(),
        }
    }

    /// Adds or replaces a model's context window.
    pub fn with_limit(mut self, model: impl Into<String>, context_window: u64) -> Self {
        self.overrides.insert(model.into(), context_window);
        self
    }

    /// Lookup order: exact override, then built-in prefix.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<ResolvedModelLimit> {
        if let Some(&context_window) = self.overrides.get(model) {
            return Some(ResolvedModelLimit {
                context_window,
                source: ModelLimitSource::Override,
            });
        }

        if !self.include_builtin {
            return None;
        }

        KNOWN_MODELS
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|&(prefix, context_window)| ResolvedModelLimit {
                context_window,
                source: ModelLimitSource::Prefix(prefix),
            })
    }

    /// Every model in the table, sorted by name. Overrides replace built-ins.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, u64> {
        let mut entries: BTreeMap<String, u64> = if self.include_builtin {
            KNOWN_MODELS
                .iter()
                .map(|&(name, limit)| (name.to_string(), limit))
                .collect()
        } else {
            BTreeMap::new()
        };
        entries.extend(self.overrides.iter().map(|(k, v)| (k.clone(), *v)));
        entries
    }

    /// Narrows the table to the named models, resolving each by prefix.
    ///
    /// Names that resolve to nothing are returned in the second element.
    #[must_use]
    pub fn select(&self, models: &[String]) -> (Self, Vec<String>) {
        let mut selected = Self::empty();
        let mut unknown = Vec::new();
        for model in models {
            match self.get(model) {
                Some(resolved) => {
                    selected
                        .overrides
                        .insert(model.clone(), resolved.context_window());
                }
                None => unknown.push(model.clone()),
            }
        }
        (selected, unknown)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && !self.include_builtin
    }
}

#[cfg(test)]
mod tests {
    use super::{KNOWN_MODELS, ModelLimitSource, ModelLimitTable};

    #[test]
    fn builtin_prefix_lookup() {
        let table = ModelLimitTable::builtin();

        let resolved = table.get("gpt-4-0613").unwrap();
        assert_eq!(resolved.context_window(), 8_192);
        assert_eq!(resolved.source(), ModelLimitSource::Prefix("gpt-4"));

        let resolved = table.get("claude-3-5-sonnet-20241022").unwrap();
        assert_eq!(resolved.context_window(), 200_000);
    }

    #[test]
    fn more_specific_prefix_wins() {
        let table = ModelLimitTable::builtin();
        assert_eq!(
            table.get("gpt-4o-2024-08-06").unwrap().source(),
            ModelLimitSource::Prefix("gpt-4o")
        );
        assert_eq!(
            table.get("gpt-4o-mini").unwrap().source(),
            ModelLimitSource::Prefix("gpt-4o-mini")
        );
        assert_eq!(table.get("gpt-4-32k-0613").unwrap().context_window(), 32_768);
    }

    #[test]
    fn no_prefix_is_shadowed_by_an_earlier_one() {
        for (i, (later, _)) in KNOWN_MODELS.iter().enumerate() {
            for (earlier, _) in &KNOWN_MODELS[..i] {
                assert!(
                    !later.starts_with(earlier),
                    "{later} is unreachable behind {earlier}"
                );
            }
        }
    }

    #[test]
    fn unknown_model_is_none() {
        assert!(ModelLimitTable::builtin().get("llama-3-70b").is_none());
        assert!(ModelLimitTable::empty().get("gpt-4").is_none());
    }

    #[test]
    fn override_takes_precedence() {
        let table = ModelLimitTable::builtin().with_limit("gpt-4", 4_000);
        let resolved = table.get("gpt-4").unwrap();
        assert_eq!(resolved.source(), ModelLimitSource::Override);
        assert_eq!(resolved.context_window(), 4_000);
        assert_eq!(table.entries()["gpt-4"], 4_000);
        // Versioned ids still go through the built-in prefix.
        assert_eq!(table.get("gpt-4-0613").unwrap().context_window(), 8_192);
    }

    #[test]
    fn entries_include_builtins_and_overrides() {
        let table = ModelLimitTable::builtin().with_limit("local", 1_000);
        let entries = table.entries();
        assert_eq!(entries.len(), KNOWN_MODELS.len() + 1);
        assert_eq!(entries["local"], 1_000);
        assert_eq!(table.len(), entries.len());
    }

    #[test]
    fn select_narrows_and_reports_unknown() {
        let table = ModelLimitTable::builtin();
        let (selected, unknown) = table.select(&[
            "gpt-4-0613".to_string(),
            "mystery".to_string(),
        ]);
        assert_eq!(unknown, vec!["mystery".to_string()]);
        let entries = selected.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["gpt-4-0613"], 8_192);
    }

    #[test]
    fn empty_table_is_empty() {
        assert!(ModelLimitTable::empty().is_empty());
        assert!(!ModelLimitTable::builtin().is_empty());
    }
}
