//! Synonym correction for model-emitted discipline tags.
//!
//! The model spells the same discipline several ways ("mhc",
//! "mhc (mental health care)", "mental health care"). A [`SynonymMap`] is a
//! finite table of literal rewrites from raw spelling to canonical tag.
//!
//! Chains are resolved when the map is built: with `a → b` and `b → c` in the
//! table, `a` maps straight to `c`. That makes [`SynonymMap::canonical`]
//! idempotent: a canonical tag never maps anywhere else.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Built-in corrections observed in model output.
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("mhc", "mental health care"),
    ("mhc (mental health care)", "mental health care"),
    ("mental healthcare", "mental health care"),
    ("behavioral science", "behavioural science"),
    ("behavioural sciences", "behavioural science"),
    ("social sciences", "social science"),
    ("health services", "health services research"),
];

#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("synonym cycle through '{0}'")]
    Cycle(String),

    #[error("reading synonym file: {0}")]
    Io(#[from] std::io::Error),

    #[error("synonym file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw tag → canonical tag rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymMap {
    rewrites: BTreeMap<String, String>,
}

impl SynonymMap {
    /// Build a map from `(raw, canonical)` pairs. Later pairs override earlier ones.
    pub fn new<I, K, V>(entries: I) -> Result<Self, SynonymError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let raw: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| k != v)
            .collect();

        let mut rewrites = BTreeMap::new();
        for (from, to) in &raw {
            let mut seen = BTreeSet::from([from.as_str()]);
            let mut target = to.as_str();
            while let Some(next) = raw.get(target) {
                if !seen.insert(target) {
                    return Err(SynonymError::Cycle(target.to_string()));
                }
                target = next.as_str();
            }
            rewrites.insert(from.clone(), target.to_string());
        }

        Ok(Self { rewrites })
    }

    /// A map with no rewrites.
    pub fn empty() -> Self {
        Self {
            rewrites: BTreeMap::new(),
        }
    }

    /// Add entries on top of this map; new entries win on conflict.
    pub fn extended<I, K, V>(&self, entries: I) -> Result<Self, SynonymError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let merged: Vec<(String, String)> = self
            .rewrites
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(entries.into_iter().map(|(k, v)| (k.into(), v.into())))
            .collect();
        Self::new(merged)
    }

    /// Extend with a JSON object file: `{"raw spelling": "canonical tag", ...}`.
    pub fn extended_from_json_file(&self, path: &Path) -> Result<Self, SynonymError> {
        let text = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&text)?;
        debug!(path = %path.display(), entries = entries.len(), "loaded synonym overrides");
        self.extended(entries)
    }

    /// Canonical spelling of `tag`; tags not in the table pass through unchanged.
    pub fn canonical<'a>(&'a self, tag: &'a str) -> &'a str {
        self.rewrites.get(tag).map(String::as_str).unwrap_or(tag)
    }

    pub fn len(&self) -> usize {
        self.rewrites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rewrites.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for SynonymMap {
    fn default() -> Self {
        // The built-in table has no chains into itself that could cycle.
        Self::new(DEFAULT_SYNONYMS.iter().copied()).unwrap_or_else(|_| Self::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mhc_variants_are_canonicalised() {
        let map = SynonymMap::default();
        assert_eq!(map.canonical("mhc"), "mental health care");
        assert_eq!(map.canonical("mhc (mental health care)"), "mental health care");
    }

    #[test]
    fn unknown_tags_pass_through() {
        let map = SynonymMap::default();
        assert_eq!(map.canonical("psychiatry"), "psychiatry");
    }

    #[test]
    fn canonicalisation_is_idempotent() {
        let map = SynonymMap::default();
        for (raw, _) in DEFAULT_SYNONYMS {
            let once = map.canonical(raw);
            assert_eq!(map.canonical(once), once, "{raw:?} not idempotent");
        }
    }

    #[test]
    fn default_table_builds_without_loss() {
        assert_eq!(SynonymMap::default().len(), DEFAULT_SYNONYMS.len());
    }

    #[test]
    fn chains_resolve_to_final_target() {
        let map = SynonymMap::new([("a", "b"), ("b", "c")]).unwrap();
        assert_eq!(map.canonical("a"), "c");
        assert_eq!(map.canonical("b"), "c");
        assert_eq!(map.canonical("c"), "c");
    }

    #[test]
    fn cycles_are_rejected() {
        let result = SynonymMap::new([("a", "b"), ("b", "a")]);
        assert!(matches!(result, Err(SynonymError::Cycle(_))));
    }

    #[test]
    fn identity_entries_are_ignored() {
        let map = SynonymMap::new([("nursing", "nursing")]).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn extended_overrides_defaults() {
        let map = SynonymMap::default()
            .extended([("mhc", "mental health services"), ("cbt", "psychotherapy")])
            .unwrap();
        assert_eq!(map.canonical("mhc"), "mental health services");
        assert_eq!(map.canonical("cbt"), "psychotherapy");
        // Untouched defaults survive.
        assert_eq!(map.canonical("social sciences"), "social science");
    }

    #[test]
    fn extended_from_json_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("synonyms.json");
        std::fs::write(&path, r#"{"epi": "epidemiology"}"#).unwrap();

        let map = SynonymMap::default().extended_from_json_file(&path).unwrap();
        assert_eq!(map.canonical("epi"), "epidemiology");
        assert_eq!(map.canonical("mhc"), "mental health care");
    }

    #[test]
    fn malformed_json_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("synonyms.json");
        std::fs::write(&path, r#"["not", "an", "object"]"#).unwrap();

        let result = SynonymMap::default().extended_from_json_file(&path);
        assert!(matches!(result, Err(SynonymError::Json(_))));
    }
}
