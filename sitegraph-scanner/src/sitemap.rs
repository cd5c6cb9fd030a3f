// Seeds extra crawl roots from the site's XML sitemaps.

use crate::normalize::{NormalizedUrl, UrlNormalizer};
use crate::robots::RobotsTxt;
use reqwest::Client;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use tracing::{debug, info};

const MAX_SITEMAP_FILES: usize = 16;

pub struct SitemapSeeder<'a> {
    client: &'a Client,
    normalizer: &'a UrlNormalizer,
}

impl<'a> SitemapSeeder<'a> {
    pub fn new(client: &'a Client, normalizer: &'a UrlNormalizer) -> Self {
        Self { client, normalizer }
    }

    /// Same-host page URLs listed in the sitemaps declared by `robots`, or in
    /// `/sitemap.xml` when none are declared. Sitemap indexes are followed up
    /// to a fixed number of files.
    pub async fn seed(&self, root: &NormalizedUrl, robots: &RobotsTxt) -> Vec<NormalizedUrl> {
        let mut pending: VecDeque<String> = robots.sitemaps().into();
        if pending.is_empty()
            && let Some(default) = root.origin_path("/sitemap.xml")
        {
            pending.push_back(default.to_string());
        }

        let mut fetched_files = HashSet::new();
        let mut seen = HashSet::new();
        let mut pages = Vec::new();

        while let Some(sitemap_url) = pending.pop_front() {
            if fetched_files.len() >= MAX_SITEMAP_FILES {
                debug!("Sitemap file limit reached, skipping {}", sitemap_url);
                break;
            }
            if !fetched_files.insert(sitemap_url.clone()) {
                continue;
            }

            let Some(xml) = self.fetch(&sitemap_url).await else {
                continue;
            };
            let (urls, nested) = parse_sitemap(&xml);
            debug!("Parsed {}: {} URLs, {} nested sitemaps", sitemap_url, urls.len(), nested.len());
            pending.extend(nested);

            for raw in urls {
                let Some(url) = self.normalizer.normalize(&raw, root.as_url()) else {
                    continue;
                };
                if url.same_host(root) && seen.insert(url.clone()) {
                    pages.push(url);
                }
            }
        }

        info!("Sitemaps listed {} same-host pages", pages.len());
        pages
    }

    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                response.bytes().await.ok().map(|b| b.to_vec())
            }
            Ok(response) => {
                debug!("Sitemap {} returned HTTP {}", url, response.status());
                None
            }
            Err(e) => {
                debug!("Could not fetch sitemap {}: {}", url, e);
                None
            }
        }
    }
}

/// Split a sitemap document into page URLs and nested sitemap URLs.
pub fn parse_sitemap(xml: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut urls = Vec::new();
    let mut nested = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    nested.push(url.to_string());
                }
            }
            SiteMapEntity::Err(e) => debug!("Skipping malformed sitemap entry: {:?}", e),
        }
    }

    (urls, nested)
}
