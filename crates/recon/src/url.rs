//! Canonical URL keys.
//!
//! Every step below is idempotent, so `normalize_url(normalize_url(u)) ==
//! normalize_url(u)` for any URL that normalizes at all:
//!
//! 1. lower-case scheme and host
//! 2. drop the scheme's default port
//! 3. drop trailing slashes, except for the root path
//! 4. drop tracking query parameters
//! 5. sort the remaining query parameters
//! 6. drop the fragment
//!
//! Path case is preserved. Inputs written without a scheme (`a.com/x`) are
//! parsed as `http://` and returned without one.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::error::UrlError;

const IMPLIED_SCHEME: &str = "http://";

/// Normalize one URL, stripping the given query parameters.
pub fn normalize_url<S: AsRef<str>>(raw: &str, strip_params: &[S]) -> Result<String, UrlError> {
    let strip: HashSet<&str> = strip_params.iter().map(|s| s.as_ref()).collect();
    normalize_with(raw, &strip)
}

/// Per-run key normalizer. Caches outcomes by raw URL string; build a new
/// one for every run so a changed strip list never sees stale keys.
pub struct KeyNormalizer<'a> {
    strip: HashSet<&'a str>,
    cache: HashMap<String, Result<String, UrlError>>,
}

impl<'a> KeyNormalizer<'a> {
    pub fn new(strip_params: &'a [String]) -> Self {
        Self {
            strip: strip_params.iter().map(|s| s.as_str()).collect(),
            cache: HashMap::new(),
        }
    }

    pub fn normalize(&mut self, raw: &str) -> Result<String, UrlError> {
        if let Some(hit) = self.cache.get(raw) {
            return hit.clone();
        }
        let out = normalize_with(raw, &self.strip);
        self.cache.insert(raw.to_string(), out.clone());
        out
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn normalize_with(raw: &str, strip: &HashSet<&str>) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let explicit_scheme = has_scheme(trimmed);
    let parsed = if explicit_scheme {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{IMPLIED_SCHEME}{}", trimmed.trim_start_matches('/')))
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(e.to_string()))?;

    // Special schemes already come back lower-cased with default ports removed.
    let host = url.host_str().ok_or(UrlError::NoHost)?.to_string();
    let lowered = host.to_ascii_lowercase();
    if lowered != host {
        url.set_host(Some(&lowered))
            .map_err(|e| UrlError::Parse(e.to_string()))?;
    }

    let path = url.path().to_string();
    let stripped = path.trim_end_matches('/');
    let stripped = if stripped.is_empty() { "/" } else { stripped };
    if stripped != path {
        url.set_path(stripped);
    }

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !strip.contains(k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs.iter());
        }
    }

    url.set_fragment(None);

    let out = url.to_string();
    if explicit_scheme {
        Ok(out)
    } else {
        Ok(out
            .strip_prefix(IMPLIED_SCHEME)
            .map(str::to_string)
            .unwrap_or(out))
    }
}

/// True when `s` starts with `scheme://`.
fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &s[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
