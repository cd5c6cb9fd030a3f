// Tests for report generation

use sitegraph_core::analyze::analyze;
use sitegraph_core::report::{ReportHeader, format_timestamp, generate_crawl_report, page_listing};
use sitegraph_scanner::graph::SiteGraph;
use sitegraph_scanner::normalize::NormalizedUrl;
use sitegraph_scanner::result::FetchResult;
use std::time::Duration;

fn url(path: &str) -> NormalizedUrl {
    NormalizedUrl::parse(&format!("https://example.com{}", path)).unwrap()
}

fn sample_graph() -> SiteGraph {
    let mut graph = SiteGraph::new();
    graph.insert_page(url("/"), 0);
    graph.insert_page(url("/orphan"), 0);
    graph.insert_page(url("/docs"), 1);
    graph.insert_page(url("/broken"), 1);

    for path in ["/", "/orphan", "/docs"] {
        graph
            .record_fetch(&url(path), &FetchResult::success(url(path).to_string(), 200, String::new()))
            .unwrap();
    }
    graph
        .record_fetch(&url("/broken"), &FetchResult::http_failure(url("/broken").to_string(), 404))
        .unwrap();

    graph.add_edge(&url("/"), &url("/docs")).unwrap();
    graph.add_edge(&url("/"), &url("/broken")).unwrap();
    graph.add_edge(&url("/docs"), &url("/broken")).unwrap();
    graph
}

fn plain() {
    colored::control::set_override(false);
}

// ============================================================================
// Crawl Report Tests
// ============================================================================

#[test]
fn test_report_sections() {
    plain();
    let graph = sample_graph();
    let analysis = analyze(&graph, &url("/"));
    let header = ReportHeader {
        session_id: Some("abc-123".into()),
        status: Some("completed".into()),
        started_at: Some(0),
        elapsed: Some(Duration::from_millis(1500)),
    };

    let report = generate_crawl_report(&graph, &analysis, &header);

    assert!(report.contains("SITEGRAPH CRAWL REPORT"));
    assert!(report.contains("Root:         https://example.com/"));
    assert!(report.contains("Session ID:   abc-123"));
    assert!(report.contains("Outcome:      Completed"));
    assert!(report.contains("Duration:     1.50s"));
    assert!(report.contains("Pages discovered: 4"));
    assert!(report.contains("Links: 3"));
    assert!(report.contains("# Orphan pages: 1"));
    assert!(report.contains("https://example.com/orphan"));
    assert!(report.contains("# Broken links: 2 (1 targets)"));
    assert!(report.contains("404 https://example.com/broken"));
    assert!(report.contains("<- https://example.com/docs"));
}

#[test]
fn test_report_without_header_fields() {
    plain();
    let graph = sample_graph();
    let analysis = analyze(&graph, &url("/"));

    let report = generate_crawl_report(&graph, &analysis, &ReportHeader::default());

    assert!(!report.contains("Session ID:"));
    assert!(!report.contains("Outcome:"));
    assert!(report.contains("# Summary:"));
}

#[test]
fn test_page_listing_grouped_by_depth() {
    plain();
    let listing = page_listing(&sample_graph());

    let depth0 = listing.find("## Depth 0").unwrap();
    let depth1 = listing.find("## Depth 1").unwrap();
    assert!(depth0 < depth1);
    assert!(listing.contains("200 /docs"));
    assert!(listing.contains("404 /broken fetch_failed"));
}

#[test]
fn test_unfetched_pages_marked() {
    plain();
    let mut graph = SiteGraph::new();
    graph.insert_page(url("/"), 0);
    graph.insert_page(url("/later"), 1);
    graph.add_edge(&url("/"), &url("/later")).unwrap();

    let listing = page_listing(&graph);
    assert!(listing.contains("--- /later discovered"));
}

#[test]
fn test_format_timestamp() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
}
