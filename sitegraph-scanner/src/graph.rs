//! Directed link graph of one crawl session.

use crate::error::{Result, ScanError};
use crate::normalize::NormalizedUrl;
use crate::result::{FetchResult, FetchStatus};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Lifecycle of a page: `Discovered -> Fetching -> Expanded | FetchFailed`.
///
/// Pages blocked by robots.txt end in `Disallowed`. Pages left behind by a
/// limit stay `Discovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Discovered,
    Fetching,
    Expanded,
    FetchFailed,
    Disallowed,
}

impl PageState {
    pub fn as_str(self) -> &'static str {
        match self {
            PageState::Discovered => "discovered",
            PageState::Fetching => "fetching",
            PageState::Expanded => "expanded",
            PageState::FetchFailed => "fetch_failed",
            PageState::Disallowed => "disallowed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(PageState::Discovered),
            "fetching" => Some(PageState::Fetching),
            "expanded" => Some(PageState::Expanded),
            "fetch_failed" => Some(PageState::FetchFailed),
            "disallowed" => Some(PageState::Disallowed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: NormalizedUrl,
    pub state: PageState,
    /// BFS distance from the crawl root.
    pub depth: u32,
    /// Position in discovery order.
    pub order: usize,
    pub status_code: Option<u16>,
    pub fetch_status: Option<FetchStatus>,
    pub error: Option<String>,
}

impl Page {
    fn new(url: NormalizedUrl, depth: u32, order: usize) -> Self {
        Self {
            url,
            state: PageState::Discovered,
            depth,
            order,
            status_code: None,
            fetch_status: None,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == PageState::FetchFailed
    }
}

/// A directed link. Repeated links between the same pair collapse into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub source: NormalizedUrl,
    pub target: NormalizedUrl,
}

#[derive(Debug, Clone, Copy, Default)]
struct Degree {
    inbound: usize,
    outbound: usize,
}

/// Pages and links of one crawl. Every link endpoint is a page of the graph.
#[derive(Debug, Clone, Default)]
pub struct SiteGraph {
    graph: DiGraph<Page, ()>,
    index: HashMap<NormalizedUrl, NodeIndex>,
    edge_set: HashSet<(NodeIndex, NodeIndex)>,
    degrees: Vec<Degree>,
}

impl SiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `Discovered` page. Returns `false` (and changes nothing) if the
    /// URL is already a page.
    pub fn insert_page(&mut self, url: NormalizedUrl, depth: u32) -> bool {
        if self.index.contains_key(&url) {
            return false;
        }
        let order = self.graph.node_count();
        let idx = self.graph.add_node(Page::new(url.clone(), depth, order));
        self.index.insert(url, idx);
        self.degrees.push(Degree::default());
        true
    }

    pub fn contains(&self, url: &NormalizedUrl) -> bool {
        self.index.contains_key(url)
    }

    pub fn page(&self, url: &NormalizedUrl) -> Option<&Page> {
        self.index.get(url).map(|idx| &self.graph[*idx])
    }

    pub fn page_mut(&mut self, url: &NormalizedUrl) -> Result<&mut Page> {
        let idx = self.node(url)?;
        Ok(&mut self.graph[idx])
    }

    pub fn set_state(&mut self, url: &NormalizedUrl, state: PageState) -> Result<()> {
        self.page_mut(url)?.state = state;
        Ok(())
    }

    /// Store a fetch outcome on its page: `Expanded` on success,
    /// `FetchFailed` otherwise.
    pub fn record_fetch(&mut self, url: &NormalizedUrl, result: &FetchResult) -> Result<()> {
        let page = self.page_mut(url)?;
        page.status_code = result.status_code;
        page.fetch_status = Some(result.status);
        page.error = result.error.clone();
        page.state = if result.status.is_success() {
            PageState::Expanded
        } else {
            PageState::FetchFailed
        };
        Ok(())
    }

    /// Add the link `source -> target`. Both pages must exist. Returns
    /// `false` if the link was already present.
    pub fn add_edge(&mut self, source: &NormalizedUrl, target: &NormalizedUrl) -> Result<bool> {
        let src = self.node(source)?;
        let dst = self.node(target)?;
        if !self.edge_set.insert((src, dst)) {
            return Ok(false);
        }
        self.graph.add_edge(src, dst, ());
        self.degrees[src.index()].outbound += 1;
        self.degrees[dst.index()].inbound += 1;
        Ok(true)
    }

    pub fn has_edge(&self, source: &NormalizedUrl, target: &NormalizedUrl) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(src), Some(dst)) => self.edge_set.contains(&(*src, *dst)),
            _ => false,
        }
    }

    /// Pages in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Page> {
        self.graph.node_weights()
    }

    /// Links in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Link> + '_ {
        self.graph.raw_edges().iter().map(|edge| Link {
            source: self.graph[edge.source()].url.clone(),
            target: self.graph[edge.target()].url.clone(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn in_degree(&self, url: &NormalizedUrl) -> Option<usize> {
        self.index.get(url).map(|idx| self.degrees[idx.index()].inbound)
    }

    pub fn out_degree(&self, url: &NormalizedUrl) -> Option<usize> {
        self.index.get(url).map(|idx| self.degrees[idx.index()].outbound)
    }

    /// Pages linking to `url`.
    pub fn predecessors(&self, url: &NormalizedUrl) -> Vec<&Page> {
        let Some(&idx) = self.index.get(url) else {
            return Vec::new();
        };
        let mut pages: Vec<&Page> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| &self.graph[n])
            .collect();
        pages.sort_by_key(|p| p.order);
        pages
    }

    /// Every page reachable from `start` by following links, `start` included.
    pub fn reachable_from(&self, start: &NormalizedUrl) -> HashSet<NormalizedUrl> {
        let Some(&idx) = self.index.get(start) else {
            return HashSet::new();
        };
        let mut bfs = Bfs::new(&self.graph, idx);
        let mut reached = HashSet::new();
        while let Some(node) = bfs.next(&self.graph) {
            reached.insert(self.graph[node].url.clone());
        }
        reached
    }

    /// The underlying petgraph graph, for renderers.
    pub fn as_petgraph(&self) -> &DiGraph<Page, ()> {
        &self.graph
    }

    fn node(&self, url: &NormalizedUrl) -> Result<NodeIndex> {
        self.index
            .get(url)
            .copied()
            .ok_or_else(|| ScanError::UnknownPage(url.to_string()))
    }
}
