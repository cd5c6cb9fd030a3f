//! URL canonicalization.
//!
//! Every page in the link graph is keyed by a [`NormalizedUrl`]. Two links
//! that normalize to the same string are the same page.

use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Query parameters removed by the default normalizer.
pub const DEFAULT_STRIPPED_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
];

/// An absolute http(s) URL in canonical form: lowercase scheme and host,
/// no default port, no fragment, no trailing slash (except the bare `/`
/// path) and no tracking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Parse an absolute URL with the default normalizer.
    ///
    /// Unlike [`normalize`], this reports why the input was rejected, which
    /// is what configuration validation needs.
    pub fn parse(raw: &str) -> Result<Self> {
        UrlNormalizer::default().normalize_absolute(raw)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Host of the URL. Normalized URLs always have one.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn same_host(&self, other: &NormalizedUrl) -> bool {
        self.host().eq_ignore_ascii_case(other.host())
    }

    /// `scheme://host[:port]/<path>` on the same origin as this URL.
    pub fn origin_path(&self, path: &str) -> Option<NormalizedUrl> {
        let joined = self.0.join(path).ok()?;
        UrlNormalizer::default().canonicalize(joined)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for NormalizedUrl {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self> {
        NormalizedUrl::parse(&value)
    }
}

impl From<NormalizedUrl> for String {
    fn from(value: NormalizedUrl) -> Self {
        value.0.into()
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Resolves and canonicalizes links.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    stripped_params: HashSet<String>,
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::with_stripped_params(DEFAULT_STRIPPED_PARAMS.iter().copied())
    }
}

impl UrlNormalizer {
    pub fn with_stripped_params<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stripped_params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve `raw` against `base` and canonicalize it.
    ///
    /// Returns `None` for anything that is not a followable link: malformed
    /// input, non-http(s) schemes (`mailto:`, `javascript:`, ...) or URLs
    /// without a host.
    pub fn normalize(&self, raw: &str, base: &Url) -> Option<NormalizedUrl> {
        let raw = raw.trim();
        let resolved = base.join(raw).ok()?;
        self.canonicalize(resolved)
    }

    /// Canonicalize an absolute URL, reporting why it was rejected.
    pub fn normalize_absolute(&self, raw: &str) -> Result<NormalizedUrl> {
        let parsed = Url::parse(raw.trim())
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", raw, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScanError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ScanError::MissingHost(raw.to_string()));
        }

        self.canonicalize(parsed)
            .ok_or_else(|| ScanError::InvalidUrl(raw.to_string()))
    }

    fn canonicalize(&self, mut url: Url) -> Option<NormalizedUrl> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if url.host_str().is_none_or(str::is_empty) {
            return None;
        }

        url.set_fragment(None);
        self.filter_query(&mut url);

        // Strip every trailing slash so that normalizing twice is a no-op.
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
            url.set_path(&trimmed);
        }

        Some(NormalizedUrl(url))
    }

    fn filter_query(&self, url: &mut Url) {
        let Some(query) = url.query() else {
            return;
        };
        if query.is_empty() {
            url.set_query(None);
            return;
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let kept: Vec<&(String, String)> = pairs
            .iter()
            .filter(|(k, _)| !self.stripped_params.contains(k.as_str()))
            .collect();

        if kept.len() == pairs.len() {
            return;
        }
        if kept.is_empty() {
            url.set_query(None);
            return;
        }

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}

/// Resolve and canonicalize `raw` against `base` with the default
/// normalizer. `None` means "not a followable link", never a crawl error.
pub fn normalize(raw: &str, base: &Url) -> Option<NormalizedUrl> {
    UrlNormalizer::default().normalize(raw, base)
}
