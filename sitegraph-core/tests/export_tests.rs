// Tests for graph export and import

use sitegraph_core::export::{
    EdgeRecord, ExportError, ExportFormat, from_edge_list, read_edge_list, render, to_dot,
    to_edge_list, to_force_graph, write_export,
};
use sitegraph_scanner::graph::{PageState, SiteGraph};
use sitegraph_scanner::normalize::NormalizedUrl;
use sitegraph_scanner::result::FetchResult;
use std::collections::HashSet;
use tempfile::TempDir;

fn url(path: &str) -> NormalizedUrl {
    NormalizedUrl::parse(&format!("https://example.com{}", path)).unwrap()
}

fn sample_graph() -> SiteGraph {
    let mut graph = SiteGraph::new();
    graph.insert_page(url("/"), 0);
    graph.insert_page(url("/a"), 1);
    graph.insert_page(url("/b"), 1);
    graph.insert_page(url("/c"), 2);

    graph
        .record_fetch(&url("/"), &FetchResult::success(url("/").to_string(), 200, String::new()))
        .unwrap();
    graph
        .record_fetch(&url("/b"), &FetchResult::http_failure(url("/b").to_string(), 404))
        .unwrap();

    graph.add_edge(&url("/"), &url("/a")).unwrap();
    graph.add_edge(&url("/"), &url("/b")).unwrap();
    graph.add_edge(&url("/a"), &url("/c")).unwrap();
    graph.add_edge(&url("/c"), &url("/")).unwrap();
    graph
}

fn node_set(graph: &SiteGraph) -> HashSet<String> {
    graph.nodes().map(|p| p.url.to_string()).collect()
}

fn edge_set(graph: &SiteGraph) -> HashSet<(String, String)> {
    graph
        .edges()
        .map(|l| (l.source.to_string(), l.target.to_string()))
        .collect()
}

// ============================================================================
// Edge List Tests
// ============================================================================

#[test]
fn test_edge_list_minimal_format() {
    let records = to_edge_list(&sample_graph(), false);
    let json = serde_json::to_value(&records).unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(
        json[0],
        serde_json::json!({"source": "https://example.com/", "target": "https://example.com/a"})
    );
}

#[test]
fn test_edge_list_with_metadata_describes_target() {
    let records = to_edge_list(&sample_graph(), true);

    let to_b = records.iter().find(|r| r.target.ends_with("/b")).unwrap();
    assert_eq!(to_b.depth, Some(1));
    assert_eq!(to_b.status.as_deref(), Some("fetch_failed"));
}

#[test]
fn test_edge_list_round_trip() {
    let graph = sample_graph();
    let rebuilt = from_edge_list(&to_edge_list(&graph, false)).unwrap();

    assert_eq!(node_set(&graph), node_set(&rebuilt));
    assert_eq!(edge_set(&graph), edge_set(&rebuilt));
}

#[test]
fn test_round_trip_keeps_metadata_when_present() {
    let graph = sample_graph();
    let rebuilt = from_edge_list(&to_edge_list(&graph, true)).unwrap();

    let b = rebuilt.page(&url("/b")).unwrap();
    assert_eq!(b.state, PageState::FetchFailed);
    assert_eq!(rebuilt.page(&url("/c")).unwrap().depth, 2);
}

#[test]
fn test_import_normalizes_and_dedups() {
    let records = vec![
        EdgeRecord {
            source: "https://Example.com/".into(),
            target: "https://example.com/a/#top".into(),
            depth: None,
            status: None,
        },
        EdgeRecord {
            source: "https://example.com".into(),
            target: "https://example.com/a".into(),
            depth: None,
            status: None,
        },
    ];

    let graph = from_edge_list(&records).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_import_rejects_bad_records() {
    let records = vec![EdgeRecord {
        source: "https://example.com/".into(),
        target: "mailto:someone@example.com".into(),
        depth: None,
        status: None,
    }];
    assert!(matches!(
        from_edge_list(&records),
        Err(ExportError::InvalidRecord { index: 0, .. })
    ));

    let records = vec![EdgeRecord {
        source: "https://example.com/".into(),
        target: "https://example.com/a".into(),
        depth: Some(1),
        status: Some("exploded".into()),
    }];
    assert!(from_edge_list(&records).is_err());
}

// ============================================================================
// Force Graph and DOT Tests
// ============================================================================

#[test]
fn test_force_graph_document() {
    let doc = to_force_graph(&sample_graph());

    assert_eq!(doc.nodes.len(), 4);
    assert_eq!(doc.links.len(), 4);

    let root = &doc.nodes[0];
    assert_eq!(root.id, "https://example.com/");
    assert_eq!(root.status, "expanded");
    assert_eq!(root.status_code, Some(200));
    assert_eq!(root.in_degree, 1);
    assert_eq!(root.out_degree, 2);
}

#[test]
fn test_dot_output() {
    let dot = to_dot(&sample_graph());

    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains("https://example.com/a"));
    assert_eq!(dot.matches("->").count(), 4);
}

#[test]
fn test_format_names() {
    assert_eq!("edges".parse::<ExportFormat>().unwrap(), ExportFormat::EdgeList);
    assert_eq!("GRAPH".parse::<ExportFormat>().unwrap(), ExportFormat::ForceGraph);
    assert_eq!("dot".parse::<ExportFormat>().unwrap(), ExportFormat::Dot);
    assert!(matches!(
        "png".parse::<ExportFormat>(),
        Err(ExportError::UnknownFormat(name)) if name == "png"
    ));
}

// ============================================================================
// File Tests
// ============================================================================

#[test]
fn test_write_and_read_edge_list_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("edges.json");
    let graph = sample_graph();

    write_export(&graph, ExportFormat::EdgeList, &path).unwrap();
    let rebuilt = read_edge_list(&path).unwrap();

    assert_eq!(edge_set(&graph), edge_set(&rebuilt));
}

#[test]
fn test_render_force_graph_is_json() {
    let rendered = render(&sample_graph(), ExportFormat::ForceGraph).unwrap();
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    assert!(value["nodes"].is_array());
    assert!(value["links"].is_array());
}

#[test]
fn test_read_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = read_edge_list(&temp_dir.path().join("nope.json"));
    assert!(matches!(result, Err(ExportError::Io(_))));
}
