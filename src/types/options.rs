//! Fetch options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options passed through to the fetcher alongside an item identifier.
///
/// Parameters are free-form string pairs (`quality=1080p`, `lang=en`) and
/// are stored in a sorted map, so two option sets built in a different order
/// compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchOptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Lightweight preview request. Occupies its own cache slot.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub quick: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for `name`.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Shorthand for `param("quality", ..)`.
    pub fn quality(self, quality: impl Into<String>) -> Self {
        self.param("quality", quality)
    }

    pub fn quick(mut self, quick: bool) -> Self {
        self.quick = quick;
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse a `name=value` pair, as given on the command line.
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.trim().to_string()))
    }
}
