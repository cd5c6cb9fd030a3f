// Graph serialization for external visualizers

use petgraph::dot::{Config, Dot};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::ScanError;
use sitegraph_scanner::graph::{PageState, SiteGraph};
use sitegraph_scanner::normalize::NormalizedUrl;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid edge record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `[{source, target}]`, the minimal format.
    EdgeList,
    /// `{nodes, links}` for force-directed renderers.
    ForceGraph,
    Dot,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "edges" | "edge-list" | "json" => Ok(ExportFormat::EdgeList),
            "graph" | "force-graph" | "d3" => Ok(ExportFormat::ForceGraph),
            "dot" | "graphviz" => Ok(ExportFormat::Dot),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// One link. `depth` and `status` describe the target page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub depth: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// Edge records in link insertion order. With `with_metadata` each record
/// also carries the target's depth and state.
pub fn to_edge_list(graph: &SiteGraph, with_metadata: bool) -> Vec<EdgeRecord> {
    graph
        .edges()
        .map(|link| {
            let target = graph.page(&link.target).filter(|_| with_metadata);
            EdgeRecord {
                source: link.source.to_string(),
                target: link.target.to_string(),
                depth: target.map(|p| p.depth),
                status: target.map(|p| p.state.as_str().to_string()),
            }
        })
        .collect()
}

/// Rebuild a graph from edge records. Pages are created in order of first
/// appearance; depth and status are applied when present.
pub fn from_edge_list(records: &[EdgeRecord]) -> Result<SiteGraph> {
    let mut graph = SiteGraph::new();

    for (index, record) in records.iter().enumerate() {
        let invalid = |e: ScanError| ExportError::InvalidRecord {
            index,
            reason: e.to_string(),
        };
        let source = NormalizedUrl::parse(&record.source).map_err(invalid)?;
        let target = NormalizedUrl::parse(&record.target).map_err(invalid)?;

        graph.insert_page(source.clone(), 0);
        if graph.insert_page(target.clone(), record.depth.unwrap_or(0))
            && let Some(status) = &record.status
        {
            let state = PageState::parse(status).ok_or_else(|| ExportError::InvalidRecord {
                index,
                reason: format!("unknown status '{}'", status),
            })?;
            graph.set_state(&target, state).map_err(invalid)?;
        }
        graph.add_edge(&source, &target).map_err(invalid)?;
    }

    debug!(
        "Imported {} pages and {} links from {} records",
        graph.node_count(),
        graph.edge_count(),
        records.len()
    );
    Ok(graph)
}

pub fn to_force_graph(graph: &SiteGraph) -> ForceGraph {
    let nodes = graph
        .nodes()
        .map(|page| GraphNode {
            id: page.url.to_string(),
            depth: page.depth,
            status: page.state.as_str().to_string(),
            status_code: page.status_code,
            in_degree: graph.in_degree(&page.url).unwrap_or(0),
            out_degree: graph.out_degree(&page.url).unwrap_or(0),
        })
        .collect();
    let links = graph
        .edges()
        .map(|link| GraphLink {
            source: link.source.to_string(),
            target: link.target.to_string(),
        })
        .collect();
    ForceGraph { nodes, links }
}

pub fn to_dot(graph: &SiteGraph) -> String {
    let labelled = graph
        .as_petgraph()
        .map(|_, page| page.url.to_string(), |_, _| "");
    format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
}

/// Render `graph` in `format`. JSON output is pretty-printed.
pub fn render(graph: &SiteGraph, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::EdgeList => serde_json::to_string_pretty(&to_edge_list(graph, true))?,
        ExportFormat::ForceGraph => serde_json::to_string_pretty(&to_force_graph(graph))?,
        ExportFormat::Dot => to_dot(graph),
    })
}

pub fn write_export(graph: &SiteGraph, format: ExportFormat, path: &Path) -> Result<()> {
    let content = render(graph, format)?;
    fs::write(path, content)?;
    debug!("Wrote {:?} export to {}", format, path.display());
    Ok(())
}

pub fn read_edge_list(path: &Path) -> Result<SiteGraph> {
    let content = fs::read_to_string(path)?;
    let records: Vec<EdgeRecord> = serde_json::from_str(&content)?;
    from_edge_list(&records)
}
