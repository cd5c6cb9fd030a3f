use crate::config::CrawlConfig;
use crate::error::Result;
use crate::extractor::LinkExtractor;
use crate::fetcher::{Fetch, HttpFetcher};
use crate::graph::{PageState, SiteGraph};
use crate::normalize::NormalizedUrl;
use crate::result::FetchResult;
use crate::robots::{RobotsRules, RobotsTxt};
use crate::sitemap::SitemapSeeder;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Called with `(pages_started, url)` right before a page is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Decides whether the link `source -> target` is kept. Rejected links are
/// neither recorded nor followed.
pub type LinkFilter = Arc<dyn Fn(&NormalizedUrl, &NormalizedUrl) -> bool + Send + Sync>;

/// Why a crawl stopped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// The frontier emptied without the page limit turning anything away.
    Completed,
    /// The page limit kept at least one discovered page out of the frontier.
    LimitReached,
    Cancelled,
    DeadlineExceeded,
}

impl CrawlOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlOutcome::Completed => "completed",
            CrawlOutcome::LimitReached => "limit_reached",
            CrawlOutcome::Cancelled => "cancelled",
            CrawlOutcome::DeadlineExceeded => "deadline_exceeded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(CrawlOutcome::Completed),
            "limit_reached" => Some(CrawlOutcome::LimitReached),
            "cancelled" => Some(CrawlOutcome::Cancelled),
            "deadline_exceeded" => Some(CrawlOutcome::DeadlineExceeded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub outcome: CrawlOutcome,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub pages_disallowed: usize,
    /// Pages that were linked to but never fetched.
    pub pages_unfetched: usize,
    pub links: usize,
    /// Wall-clock start of the crawl, in seconds since the Unix epoch.
    pub started_at: i64,
    pub elapsed: Duration,
}

/// State of one crawl invocation. Owned exclusively by that invocation and
/// handed to the caller when it ends.
#[derive(Debug)]
pub struct CrawlSession {
    pub root: NormalizedUrl,
    pub graph: SiteGraph,
    pub summary: CrawlSummary,
    frontier: VecDeque<(NormalizedUrl, u32)>,
    visited: HashSet<NormalizedUrl>,
    max_pages: usize,
    page_limit_hit: bool,
}

impl CrawlSession {
    fn new(root: NormalizedUrl, max_pages: usize) -> Self {
        let started_at = chrono::Utc::now().timestamp();
        Self {
            root,
            graph: SiteGraph::new(),
            summary: CrawlSummary {
                outcome: CrawlOutcome::Completed,
                pages_fetched: 0,
                pages_failed: 0,
                pages_disallowed: 0,
                pages_unfetched: 0,
                links: 0,
                started_at,
                elapsed: Duration::ZERO,
            },
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            max_pages,
            page_limit_hit: false,
        }
    }

    /// Whether the page was ever admitted to the frontier.
    pub fn is_admitted(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn admitted_count(&self) -> usize {
        self.visited.len()
    }

    /// Frontier entries left unfetched when the crawl stopped early.
    pub fn remaining_frontier(&self) -> impl Iterator<Item = &NormalizedUrl> {
        self.frontier.iter().map(|(url, _)| url)
    }

    fn has_room(&self) -> bool {
        self.visited.len() < self.max_pages
    }

    /// Mark `url` discovered at `depth` and queue it.
    fn admit(&mut self, url: NormalizedUrl, depth: u32) {
        debug!("Queuing {} at depth {}", url, depth);
        self.graph.insert_page(url.clone(), depth);
        self.visited.insert(url.clone());
        self.frontier.push_back((url, depth));
    }

    /// Record a page a limit kept out of the frontier. It stays `Discovered`.
    fn record_unadmitted(&mut self, url: NormalizedUrl, depth: u32) {
        self.graph.insert_page(url, depth);
    }

    fn finish(&mut self, outcome: CrawlOutcome, elapsed: Duration) {
        let mut summary = CrawlSummary {
            outcome,
            pages_fetched: 0,
            pages_failed: 0,
            pages_disallowed: 0,
            pages_unfetched: 0,
            links: self.graph.edge_count(),
            started_at: self.summary.started_at,
            elapsed,
        };
        for page in self.graph.nodes() {
            match page.state {
                PageState::Expanded => summary.pages_fetched += 1,
                PageState::FetchFailed => summary.pages_failed += 1,
                PageState::Disallowed => summary.pages_disallowed += 1,
                PageState::Discovered | PageState::Fetching => summary.pages_unfetched += 1,
            }
        }
        self.summary = summary;
    }
}

/// Breadth-first, same-host crawler.
///
/// Pages are fetched in strict FIFO order. With `concurrency > 1` up to that
/// many pages from the front of the frontier are fetched at once, but their
/// results are committed one page at a time in dequeue order, so the graph
/// is the same as a sequential crawl produces.
pub struct Crawler {
    fetcher: Arc<dyn Fetch>,
    extractor: LinkExtractor,
    robots: Option<Arc<dyn RobotsRules>>,
    seeds: Vec<NormalizedUrl>,
    max_pages: usize,
    max_depth: Option<u32>,
    delay: Duration,
    concurrency: usize,
    max_duration: Option<Duration>,
    progress_callback: Option<ProgressCallback>,
    link_filter: Option<LinkFilter>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            extractor: LinkExtractor::default(),
            robots: None,
            seeds: Vec::new(),
            max_pages: crate::config::DEFAULT_MAX_PAGES,
            max_depth: None,
            delay: Duration::ZERO,
            concurrency: 1,
            max_duration: None,
            progress_callback: None,
            link_filter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Build an HTTP crawler from `config`. Loads robots.txt and sitemap
    /// seeds when the config asks for them; those lookups never fail the
    /// crawl.
    pub async fn from_config(config: &CrawlConfig, root: &NormalizedUrl) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.timeout(), config.max_redirects)?;

        let robots = if config.respect_robots || config.use_sitemap {
            Some(RobotsTxt::fetch(fetcher.client(), root, &config.user_agent).await)
        } else {
            None
        };

        let seeds = match (&robots, config.use_sitemap) {
            (Some(robots), true) => {
                let normalizer = config.normalizer();
                SitemapSeeder::new(fetcher.client(), &normalizer)
                    .seed(root, robots)
                    .await
            }
            _ => Vec::new(),
        };

        let mut crawler = Self::new(Arc::new(fetcher))
            .with_extractor(config.extractor()?)
            .with_max_pages(config.max_pages)
            .with_delay(config.delay())
            .with_concurrency(config.concurrency)
            .with_seeds(seeds);
        crawler.max_depth = config.max_depth;
        crawler.max_duration = config.max_duration();

        if config.respect_robots
            && let Some(robots) = robots
        {
            crawler = crawler.with_robots(Arc::new(robots));
        }

        Ok(crawler)
    }

    pub fn with_extractor(mut self, extractor: LinkExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_robots(mut self, robots: Arc<dyn RobotsRules>) -> Self {
        self.robots = Some(robots);
        self
    }

    /// Extra depth-0 roots, queued after the main root.
    pub fn with_seeds(mut self, seeds: Vec<NormalizedUrl>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_link_filter(mut self, filter: LinkFilter) -> Self {
        self.link_filter = Some(filter);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the crawl at the next dequeue when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn crawl(&self, root: &NormalizedUrl) -> Result<CrawlSession> {
        info!(
            "Starting crawl of {} (max pages {}, max depth {:?}, concurrency {})",
            root, self.max_pages, self.max_depth, self.concurrency
        );
        let start = Instant::now();
        let mut session = CrawlSession::new(root.clone(), self.max_pages);
        session.admit(root.clone(), 0);

        for seed in &self.seeds {
            if session.is_admitted(seed) || !seed.same_host(root) {
                continue;
            }
            if session.has_room() {
                session.admit(seed.clone(), 0);
            } else {
                session.page_limit_hit = true;
                session.record_unadmitted(seed.clone(), 0);
            }
        }

        let mut started = 0usize;
        let outcome = loop {
            if started > 0 && !self.delay.is_zero() && !session.frontier.is_empty() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            if self.cancel.is_cancelled() {
                info!("Crawl cancelled with {} pages queued", session.frontier.len());
                break CrawlOutcome::Cancelled;
            }
            if self.max_duration.is_some_and(|limit| start.elapsed() >= limit) {
                info!("Crawl deadline reached with {} pages queued", session.frontier.len());
                break CrawlOutcome::DeadlineExceeded;
            }
            if session.frontier.is_empty() {
                break if session.page_limit_hit {
                    CrawlOutcome::LimitReached
                } else {
                    CrawlOutcome::Completed
                };
            }

            let batch = self.next_batch(&mut session, &mut started)?;
            if batch.is_empty() {
                continue;
            }

            let results: Vec<FetchResult> = stream::iter(
                batch.iter().map(|(url, _)| self.fetcher.fetch(url)),
            )
            .buffered(self.concurrency)
            .collect()
            .await;

            for ((url, depth), result) in batch.into_iter().zip(results) {
                self.commit(&mut session, &url, depth, result)?;
            }
        };

        session.finish(outcome, start.elapsed());
        let summary = &session.summary;
        info!(
            "Crawl {}: {} fetched, {} failed, {} unfetched, {} links in {:.2?}",
            outcome.as_str(),
            summary.pages_fetched,
            summary.pages_failed,
            summary.pages_unfetched,
            summary.links,
            summary.elapsed
        );
        Ok(session)
    }

    /// Pop up to `concurrency` fetchable pages off the frontier, skipping
    /// pages robots.txt disallows.
    fn next_batch(
        &self,
        session: &mut CrawlSession,
        started: &mut usize,
    ) -> Result<Vec<(NormalizedUrl, u32)>> {
        let mut batch = Vec::with_capacity(self.concurrency);
        while batch.len() < self.concurrency {
            let Some((url, depth)) = session.frontier.pop_front() else {
                break;
            };

            if let Some(robots) = &self.robots
                && !robots.can_fetch(&url)
            {
                info!("Skipping {} (disallowed by robots.txt)", url);
                session.graph.set_state(&url, PageState::Disallowed)?;
                continue;
            }

            session.graph.set_state(&url, PageState::Fetching)?;
            *started += 1;
            if let Some(callback) = &self.progress_callback {
                callback(*started, url.to_string());
            }
            batch.push((url, depth));
        }
        Ok(batch)
    }

    /// Apply one fetch result to the session. This is the only place the
    /// graph, frontier and visited set change after start-up.
    fn commit(
        &self,
        session: &mut CrawlSession,
        url: &NormalizedUrl,
        depth: u32,
        result: FetchResult,
    ) -> Result<()> {
        session.graph.record_fetch(url, &result)?;

        if !result.status.is_success() {
            warn!(
                "Fetch failed for {}: {}{}",
                url,
                result.status.as_str(),
                result
                    .status_code
                    .map(|c| format!(" (HTTP {})", c))
                    .unwrap_or_default()
            );
            return Ok(());
        }
        let Some(body) = result.body.as_deref() else {
            return Ok(());
        };
        if !result.is_html() {
            debug!("Not parsing {} ({:?})", url, result.content_type);
            return Ok(());
        }

        let base = match result.final_url.as_deref().map(Url::parse) {
            Some(Ok(final_url)) => {
                if !final_url
                    .host_str()
                    .is_some_and(|h| h.eq_ignore_ascii_case(session.root.host()))
                {
                    debug!("{} redirected off-site to {}; not following its links", url, final_url);
                    return Ok(());
                }
                final_url
            }
            _ => url.as_url().clone(),
        };

        let links = self.extractor.extract_links(body, &base);
        debug!("{} links on {}", links.len(), url);
        let child_depth = depth + 1;

        for target in links {
            if !target.same_host(&session.root) || target == *url {
                continue;
            }
            if let Some(filter) = &self.link_filter
                && !filter(url, &target)
            {
                continue;
            }

            if !session.is_admitted(&target) {
                let depth_ok = self.max_depth.is_none_or(|max| child_depth <= max);
                let room = session.has_room();
                if depth_ok && room {
                    session.admit(target.clone(), child_depth);
                } else {
                    if !room {
                        session.page_limit_hit = true;
                    }
                    debug!("Not queuing {} (depth ok: {}, room: {})", target, depth_ok, room);
                    session.record_unadmitted(target.clone(), child_depth);
                }
            }

            session.graph.add_edge(url, &target)?;
        }

        Ok(())
    }
}
