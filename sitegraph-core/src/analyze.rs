// Structural checks over a finished crawl graph

use serde::{Deserialize, Serialize};
use sitegraph_scanner::graph::{Link, Page, PageState, SiteGraph};
use sitegraph_scanner::normalize::NormalizedUrl;
use std::collections::BTreeMap;

/// Pages nobody links to, in discovery order. The root is never an orphan.
pub fn find_orphans<'g>(graph: &'g SiteGraph, root: &NormalizedUrl) -> Vec<&'g Page> {
    graph
        .nodes()
        .filter(|page| &page.url != root)
        .filter(|page| graph.in_degree(&page.url) == Some(0))
        .collect()
}

/// Links whose target failed to fetch. Targets a limit left unfetched are
/// unexplored, not broken.
pub fn find_broken(graph: &SiteGraph) -> Vec<Link> {
    graph
        .edges()
        .filter(|link| graph.page(&link.target).is_some_and(Page::is_failed))
        .collect()
}

/// A failed page and every page linking to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenTarget {
    pub url: String,
    pub status_code: Option<u16>,
    pub reason: String,
    pub referrers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub root: String,
    pub total_pages: usize,
    pub total_links: usize,
    pub pages_by_state: BTreeMap<String, usize>,
    pub max_depth: u32,
    /// Pages not reachable from the root by following links.
    pub unreachable: usize,
    pub orphans: Vec<String>,
    pub broken_links: usize,
    pub broken_targets: Vec<BrokenTarget>,
}

impl Analysis {
    pub fn has_problems(&self) -> bool {
        !self.orphans.is_empty() || self.broken_links > 0
    }
}

pub fn analyze(graph: &SiteGraph, root: &NormalizedUrl) -> Analysis {
    let mut pages_by_state = BTreeMap::new();
    for page in graph.nodes() {
        *pages_by_state.entry(page.state.as_str().to_string()).or_insert(0) += 1;
    }

    let orphans = find_orphans(graph, root)
        .into_iter()
        .map(|p| p.url.to_string())
        .collect();

    let broken = find_broken(graph);
    let mut broken_targets: Vec<BrokenTarget> = Vec::new();
    for link in &broken {
        match broken_targets.iter_mut().find(|t| t.url == link.target.as_str()) {
            Some(target) => target.referrers.push(link.source.to_string()),
            None => {
                let page = graph.page(&link.target);
                broken_targets.push(BrokenTarget {
                    url: link.target.to_string(),
                    status_code: page.and_then(|p| p.status_code),
                    reason: page.map(failure_reason).unwrap_or_default(),
                    referrers: vec![link.source.to_string()],
                });
            }
        }
    }

    let reachable = graph.reachable_from(root);

    Analysis {
        root: root.to_string(),
        total_pages: graph.node_count(),
        total_links: graph.edge_count(),
        pages_by_state,
        max_depth: graph.nodes().map(|p| p.depth).max().unwrap_or(0),
        unreachable: graph.node_count().saturating_sub(reachable.len()),
        orphans,
        broken_links: broken.len(),
        broken_targets,
    }
}

fn failure_reason(page: &Page) -> String {
    match (page.state, page.status_code, &page.fetch_status) {
        (PageState::FetchFailed, Some(code), _) => format!("HTTP {}", code),
        (PageState::FetchFailed, None, Some(status)) => match &page.error {
            Some(error) => format!("{}: {}", status.as_str(), error),
            None => status.as_str().to_string(),
        },
        _ => page.state.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegraph_scanner::result::{FetchResult, FetchStatus};

    fn url(path: &str) -> NormalizedUrl {
        NormalizedUrl::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_failure_reason_prefers_status_code() {
        let mut graph = SiteGraph::new();
        graph.insert_page(url("/a"), 1);
        graph.insert_page(url("/b"), 1);
        graph
            .record_fetch(&url("/a"), &FetchResult::http_failure("https://example.com/a".into(), 503))
            .unwrap();
        graph
            .record_fetch(
                &url("/b"),
                &FetchResult::with_error(
                    "https://example.com/b".into(),
                    FetchStatus::Timeout,
                    "deadline elapsed".into(),
                ),
            )
            .unwrap();

        assert_eq!(failure_reason(graph.page(&url("/a")).unwrap()), "HTTP 503");
        assert_eq!(
            failure_reason(graph.page(&url("/b")).unwrap()),
            "timeout: deadline elapsed"
        );
    }
}
