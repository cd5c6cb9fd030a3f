use crate::error::{Result, ScanError};
use crate::extractor::{DEFAULT_EXCLUDED_SELECTORS, LinkExtractor};
use crate::fetcher::DEFAULT_USER_AGENT;
use crate::normalize::{DEFAULT_STRIPPED_PARAMS, NormalizedUrl, UrlNormalizer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_PAGES: usize = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Everything that shapes a crawl. Loadable from JSON; unspecified fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub root_url: String,
    pub max_pages: usize,
    pub max_depth: Option<u32>,
    pub timeout_secs: u64,
    /// Pause before each fetch (before each batch when concurrent).
    pub delay_ms: u64,
    pub excluded_selectors: Vec<String>,
    pub respect_robots: bool,
    pub use_sitemap: bool,
    pub concurrency: usize,
    pub max_duration_secs: Option<u64>,
    pub user_agent: String,
    pub max_redirects: usize,
    pub strip_query_params: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            delay_ms: 0,
            excluded_selectors: DEFAULT_EXCLUDED_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            respect_robots: false,
            use_sitemap: false,
            concurrency: 1,
            max_duration_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            strip_query_params: DEFAULT_STRIPPED_PARAMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CrawlConfig {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ScanError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Check everything that can be checked before the first request and
    /// return the canonical root URL.
    pub fn validate(&self) -> Result<NormalizedUrl> {
        if self.root_url.trim().is_empty() {
            return Err(ScanError::InvalidConfig("a root URL is required".into()));
        }
        let root = self.normalizer().normalize_absolute(&self.root_url)?;

        if self.max_pages == 0 {
            return Err(ScanError::InvalidConfig("max_pages must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ScanError::InvalidConfig("timeout must be at least 1 second".into()));
        }
        // Surfaces bad selectors now rather than at the first page.
        self.extractor()?;

        Ok(root)
    }

    pub fn normalizer(&self) -> UrlNormalizer {
        UrlNormalizer::with_stripped_params(self.strip_query_params.iter().cloned())
    }

    pub fn extractor(&self) -> Result<LinkExtractor> {
        LinkExtractor::new(&self.excluded_selectors, self.normalizer())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}
