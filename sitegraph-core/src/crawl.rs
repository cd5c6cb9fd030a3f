use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_scanner::config::CrawlConfig;
use sitegraph_scanner::crawler::{CrawlSession, Crawler, ProgressCallback};
use sitegraph_scanner::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub config: CrawlConfig,
    pub show_progress_bars: bool,
    /// Stops the crawl between pages when cancelled. Partial results are kept.
    pub cancel: Option<CancellationToken>,
}

impl CrawlOptions {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            show_progress_bars: false,
            cancel: None,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Validate the configuration, then crawl. Fails only on invalid
/// configuration; page-level failures end up in the returned graph.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSession> {
    let CrawlOptions {
        config,
        show_progress_bars,
        cancel,
    } = options;

    let root = config.validate()?;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Preparing crawl of {}...", root));
        Some(pb)
    } else {
        None
    };

    if let Some(ref callback) = progress_callback
        && (config.respect_robots || config.use_sitemap)
    {
        callback(format!("Reading robots.txt and sitemaps for {}", root));
    }

    let mut crawler = Crawler::from_config(&config, &root).await?;
    if let Some(token) = cancel {
        crawler = crawler.with_cancellation(token);
    }

    let pb_clone = progress_bar.clone();
    let user_callback = progress_callback.clone();
    let internal_callback: ProgressCallback = Arc::new(move |count: usize, url: String| {
        if let Some(ref pb) = pb_clone {
            pb.set_message(format!("Crawling... {} pages processed ({})", count, url));
        }
        if let Some(ref callback) = user_callback {
            callback(format!("[{}] {}", count, url));
        }
    });
    crawler = crawler.with_progress_callback(internal_callback);

    let session = crawler.crawl(&root).await?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl {}! {} pages fetched, {} links mapped",
            session.summary.outcome.as_str().replace('_', " "),
            session.summary.pages_fetched,
            session.summary.links
        ));
    }
    info!(
        "Crawl of {} finished with {} pages",
        root,
        session.graph.node_count()
    );

    Ok(session)
}
