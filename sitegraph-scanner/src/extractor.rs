use crate::error::{Result, ScanError};
use crate::normalize::{NormalizedUrl, UrlNormalizer};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Regions treated as site chrome. Links inside them repeat on every page
/// and would swamp in-degree counts.
pub const DEFAULT_EXCLUDED_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "[role=navigation]",
    "[role=banner]",
    "[role=contentinfo]",
];

const LINK_SELECTOR: &str = "a[href], area[href]";

/// Pulls same-host content links out of an HTML document.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    links: Selector,
    base_tag: Selector,
    excluded: Vec<Selector>,
    normalizer: UrlNormalizer,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        // The built-in selectors are known to parse.
        Self::new(DEFAULT_EXCLUDED_SELECTORS, UrlNormalizer::default())
            .expect("default selectors are valid")
    }
}

impl LinkExtractor {
    pub fn new<S: AsRef<str>>(excluded: &[S], normalizer: UrlNormalizer) -> Result<Self> {
        Ok(Self {
            links: parse_selector(LINK_SELECTOR)?,
            base_tag: parse_selector("base[href]")?,
            excluded: excluded
                .iter()
                .map(|s| parse_selector(s.as_ref()))
                .collect::<Result<Vec<_>>>()?,
            normalizer,
        })
    }

    pub fn normalizer(&self) -> &UrlNormalizer {
        &self.normalizer
    }

    /// Extract the distinct same-host links of `body`, resolved against
    /// `base`, in document order.
    ///
    /// Links inside excluded regions, cross-host links, links that fail to
    /// normalize and links back to the page itself are dropped.
    pub fn extract_links(&self, body: &str, base: &Url) -> Vec<NormalizedUrl> {
        let document = Html::parse_document(body);
        let Some(base_host) = base.host_str() else {
            return Vec::new();
        };

        // A <base href> on the same host overrides the document URL.
        let resolve_base = document
            .select(&self.base_tag)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .filter(|b| b.host_str().is_some_and(|h| h.eq_ignore_ascii_case(base_host)))
            .unwrap_or_else(|| base.clone());

        let excluded_roots: HashSet<_> = self
            .excluded
            .iter()
            .flat_map(|selector| document.select(selector))
            .map(|el| el.id())
            .collect();

        let this_page = self.normalizer.normalize("", base);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.links) {
            let in_chrome = excluded_roots.contains(&element.id())
                || element.ancestors().any(|a| excluded_roots.contains(&a.id()));
            if in_chrome {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(target) = self.normalizer.normalize(href, &resolve_base) else {
                debug!("Dropping unfollowable link {:?} on {}", href, base);
                continue;
            };
            if !target.host().eq_ignore_ascii_case(base_host) {
                continue;
            }
            if this_page.as_ref() == Some(&target) {
                continue;
            }
            if seen.insert(target.clone()) {
                links.push(target);
            }
        }

        links
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn strs(links: &[NormalizedUrl]) -> Vec<&str> {
        links.iter().map(|l| l.as_str()).collect()
    }

    #[test]
    fn test_duplicates_and_external_links_dropped() {
        let html = r#"<html><body><main>
            <a href="/a">A</a>
            <a href="/b">B</a>
            <a href="/b">B again</a>
            <a href="https://other.org/c">C</a>
        </main></body></html>"#;

        let links = LinkExtractor::default().extract_links(html, &base());

        assert_eq!(
            strs(&links),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_chrome_regions_excluded() {
        let html = r#"<html><body>
            <header><a href="/logo">Home</a></header>
            <nav><ul><li><a href="/menu">Menu</a></li></ul></nav>
            <div role="navigation"><a href="/side">Side</a></div>
            <article><a href="/content">Content</a></article>
            <footer><a href="/legal">Legal</a></footer>
        </body></html>"#;

        let links = LinkExtractor::default().extract_links(html, &base());

        assert_eq!(strs(&links), vec!["https://example.com/content"]);
    }

    #[test]
    fn test_custom_exclusions() {
        let html = r#"<body>
            <div class="sidebar"><a href="/side">Side</a></div>
            <nav><a href="/menu">Menu</a></nav>
        </body>"#;

        let extractor = LinkExtractor::new(&[".sidebar"], UrlNormalizer::default()).unwrap();
        let links = extractor.extract_links(html, &base());

        assert_eq!(strs(&links), vec!["https://example.com/menu"]);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let err = LinkExtractor::new(&["[[nope"], UrlNormalizer::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidSelector { .. }));
    }

    #[test]
    fn test_relative_links_resolved_against_page() {
        let html = r#"<body><a href="intro">Intro</a><a href="../up">Up</a></body>"#;
        let page = Url::parse("https://example.com/docs/guide/").unwrap();

        let links = LinkExtractor::default().extract_links(html, &page);

        assert_eq!(
            strs(&links),
            vec![
                "https://example.com/docs/guide/intro",
                "https://example.com/docs/up"
            ]
        );
    }

    #[test]
    fn test_base_tag_respected() {
        let html = r#"<html><head><base href="/blog/"></head>
            <body><a href="post-1">Post</a></body></html>"#;

        let links = LinkExtractor::default().extract_links(html, &base());

        assert_eq!(strs(&links), vec!["https://example.com/blog/post-1"]);
    }

    #[test]
    fn test_self_links_and_fragments_dropped() {
        let html = r##"<body>
            <a href="#top">Top</a>
            <a href="/docs#intro">Docs</a>
            <a href="/docs/">Docs again</a>
        </body>"##;
        let page = Url::parse("https://example.com/docs").unwrap();

        let links = LinkExtractor::default().extract_links(html, &page);

        assert!(links.is_empty());
    }

    #[test]
    fn test_non_http_links_dropped() {
        let html = r#"<body>
            <a href="mailto:a@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:123">Call</a>
            <map><area href="/region"></map>
        </body>"#;

        let links = LinkExtractor::default().extract_links(html, &base());

        assert_eq!(strs(&links), vec!["https://example.com/region"]);
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        let html = r#"<body><a href="https://EXAMPLE.com/x">X</a></body>"#;
        let links = LinkExtractor::default().extract_links(html, &base());
        assert_eq!(strs(&links), vec!["https://example.com/x"]);
    }
}
