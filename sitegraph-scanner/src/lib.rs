pub mod config;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod graph;
pub mod normalize;
pub mod result;
pub mod robots;
pub mod sitemap;

pub use config::CrawlConfig;
pub use crawler::{CrawlOutcome, CrawlSession, CrawlSummary, Crawler};
pub use error::ScanError;
pub use extractor::LinkExtractor;
pub use fetcher::{Fetch, HttpFetcher};
pub use graph::{Link, Page, PageState, SiteGraph};
pub use normalize::{NormalizedUrl, UrlNormalizer, normalize};
pub use result::{FetchResult, FetchStatus};
pub use robots::{RobotsRules, RobotsTxt};
