//! Cache key derivation and item identifier validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::options::FetchOptions;
use crate::{HuginnError, Result};

/// Longest accepted item identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 2048;

/// Canonical identity of a metadata request.
///
/// Derived from the item identifier, the sorted option parameters, and the
/// quick flag. The derived string is stable across processes, so keys can be
/// persisted alongside cached values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `item_id` under `options`.
    ///
    /// The item id is expected to be validated already (see
    /// [`validate_item_id`]). Encoding is a JSON array
    /// `[item_id, {params...}, quick]`, which cannot be ambiguous no matter
    /// what characters the id or the parameters contain.
    pub fn derive(item_id: &str, options: &FetchOptions) -> Self {
        let encoded = serde_json::json!([item_id, options.params, options.quick]);
        Self(encoded.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate an item reference and return it with surrounding whitespace
/// removed.
///
/// Accepts bare provider ids (`abc123`) and absolute `http`/`https` URLs.
pub fn validate_item_id(item_id: &str) -> Result<&str> {
    let id = item_id.trim();
    if id.is_empty() {
        return Err(HuginnError::InvalidIdentifier("empty identifier".into()));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(HuginnError::InvalidIdentifier(format!(
            "identifier is {} bytes (max {MAX_IDENTIFIER_LEN})",
            id.len()
        )));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(HuginnError::InvalidIdentifier(format!(
            "identifier contains whitespace or control characters: {id:?}"
        )));
    }
    if id.contains("://") {
        let url = reqwest::Url::parse(id)
            .map_err(|e| HuginnError::InvalidIdentifier(format!("malformed URL {id:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HuginnError::InvalidIdentifier(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(HuginnError::InvalidIdentifier(format!("URL has no host: {id:?}")));
        }
    }
    Ok(id)
}
