// Human-readable crawl reports

use crate::analyze::Analysis;
use chrono::{DateTime, Utc};
use colored::Colorize;
use sitegraph_scanner::graph::{Page, PageState, SiteGraph};
use std::collections::BTreeMap;
use std::time::Duration;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Where a report's graph came from.
#[derive(Debug, Clone, Default)]
pub struct ReportHeader {
    pub session_id: Option<String>,
    /// Crawl outcome, e.g. `completed` or `limit_reached`.
    pub status: Option<String>,
    pub started_at: Option<i64>,
    pub elapsed: Option<Duration>,
}

pub fn generate_crawl_report(graph: &SiteGraph, analysis: &Analysis, header: &ReportHeader) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("                          SITEGRAPH CRAWL REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Root:         {}\n", analysis.root));
    if let Some(ref id) = header.session_id {
        report.push_str(&format!("Session ID:   {}\n", id));
    }
    if let Some(ref status) = header.status {
        report.push_str(&format!("Outcome:      {}\n", format_status(status)));
    }
    if let Some(started) = header.started_at {
        report.push_str(&format!("Started:      {}\n", format_timestamp(started)));
    }
    if let Some(elapsed) = header.elapsed {
        report.push_str(&format!("Duration:     {:.2}s\n", elapsed.as_secs_f64()));
    }
    report.push('\n');

    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages discovered: {}\n", analysis.total_pages));
    for (state, count) in &analysis.pages_by_state {
        report.push_str(&format!("    {:<14} {}\n", state, count));
    }
    report.push_str(&format!("  Links: {}\n", analysis.total_links));
    report.push_str(&format!("  Deepest page: {}\n", analysis.max_depth));
    report.push_str(&format!("  Unreachable from root: {}\n", analysis.unreachable));
    report.push('\n');

    report.push_str(&format!("# Orphan pages: {}\n", analysis.orphans.len()));
    for orphan in &analysis.orphans {
        report.push_str(&format!("  {} {}\n", "○".yellow(), orphan));
    }
    report.push('\n');

    report.push_str(&format!(
        "# Broken links: {} ({} targets)\n",
        analysis.broken_links,
        analysis.broken_targets.len()
    ));
    for target in &analysis.broken_targets {
        let status = match target.status_code {
            Some(code) => color_status(code),
            None => "ERR".red().to_string(),
        };
        report.push_str(&format!("  {} {}  {}\n", status, target.url, target.reason.dimmed()));
        for referrer in &target.referrers {
            report.push_str(&format!("      <- {}\n", referrer));
        }
    }
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");
    report.push_str(&page_listing(graph));

    report
}

/// Every page grouped by depth, in discovery order within each depth.
pub fn page_listing(graph: &SiteGraph) -> String {
    let mut by_depth: BTreeMap<u32, Vec<&Page>> = BTreeMap::new();
    for page in graph.nodes() {
        by_depth.entry(page.depth).or_default().push(page);
    }

    let mut listing = String::new();
    for (depth, pages) in by_depth {
        listing.push_str(&format!("## Depth {}\n", depth));
        listing.push_str(&format!("  {} pages\n\n", pages.len()));

        for page in pages {
            let status = match (page.state, page.status_code) {
                (_, Some(code)) => color_status(code),
                (PageState::Disallowed, None) => "ROB".magenta().to_string(),
                (PageState::FetchFailed, None) => "ERR".red().to_string(),
                (_, None) => "---".dimmed().to_string(),
            };
            let mut line = format!("  {} {}", status, page.url.path());
            if page.state != PageState::Expanded {
                line.push_str(&format!(" {}", page.state.as_str().bright_black()));
            }
            listing.push_str(&line);
            listing.push('\n');
        }
        listing.push('\n');
    }

    listing
}

fn color_status(code: u16) -> String {
    let text = code.to_string();
    match code {
        100..=199 => text.white().to_string(),
        200..=299 => text.green().to_string(),
        300..=399 => text.cyan().to_string(),
        400..=499 => text.yellow().to_string(),
        500..=599 => text.red().to_string(),
        _ => text,
    }
}

fn format_status(status: &str) -> String {
    match status {
        "completed" => "Completed".green().to_string(),
        "limit_reached" => "Page limit reached".yellow().to_string(),
        "cancelled" => "Cancelled".yellow().to_string(),
        "deadline_exceeded" => "Deadline exceeded".yellow().to_string(),
        "running" => "Running".to_string(),
        "failed" => "Failed".red().to_string(),
        other => other.to_string(),
    }
}

pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
