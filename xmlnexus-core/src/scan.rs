use crate::discover;
use crate::stream::{EventSink, StreamEvent};
use colored::Colorize;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use xmlnexus_scanner::fetch::USER_AGENT;
use xmlnexus_scanner::scanner::{
    DEFAULT_CONCURRENT_FETCHES, DEFAULT_MAX_DEPTH, DEFAULT_MAX_URLS, DEFAULT_TIMEOUT_SECS,
};
use xmlnexus_scanner::{ScanResult, SitemapNode, SitemapScanner};

/// Options for one scan invocation.
pub struct ScanOptions {
    pub url: String,
    pub max_depth: usize,
    pub max_urls: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl ScanOptions {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_urls: DEFAULT_MAX_URLS,
            concurrency: DEFAULT_CONCURRENT_FETCHES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// A completed scan plus the root sitemap URLs it started from.
pub struct ScanOutcome {
    pub roots: Vec<String>,
    pub result: ScanResult,
}

/// Prepend `https://` when the target was given without a scheme.
pub fn ensure_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Key used by the history store: scheme and trailing slash stripped.
pub fn normalize_site_url(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped.trim_end_matches('/').to_string()
}

/// Discover root sitemaps for a target site and run a full scan, narrating
/// progress into the event sink. A scan that produced zero nodes and at
/// least one diagnostic is surfaced as a failure even though the engine
/// itself never aborts.
pub async fn execute_scan(options: ScanOptions, events: EventSink) -> Result<ScanOutcome, String> {
    let target_url = ensure_scheme(&options.url);

    events(StreamEvent::Info {
        message: "Checking robots.txt...".to_string(),
    });

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let mut roots = discover::fetch_robots_sitemaps(&client, &target_url).await;
    if roots.is_empty() {
        events(StreamEvent::Info {
            message: "No robots.txt directives, probing common sitemap paths...".to_string(),
        });
        roots = discover::probe_common_paths(&client, &target_url).await;
    }

    if roots.is_empty() {
        let message = "No sitemaps found via robots.txt or heuristics.".to_string();
        events(StreamEvent::Error {
            error: message.clone(),
        });
        return Err(message);
    }

    info!("Discovered {} root sitemap(s) for {}", roots.len(), target_url);
    events(StreamEvent::Info {
        message: format!("Scanning {} sitemap(s)...", roots.len()),
    });

    let scanner = build_scanner(&options, events.clone());
    let result = scanner.scan(&roots).await;
    finish(result, events).map(|result| ScanOutcome { roots, result })
}

/// Content-mode entry point: the supplied text stands in for fetching the
/// base URL, so no discovery runs.
pub async fn execute_content_scan(
    content: &str,
    options: ScanOptions,
    events: EventSink,
) -> Result<ScanResult, String> {
    let base_url = ensure_scheme(&options.url);
    let scanner = build_scanner(&options, events.clone());
    let result = scanner.scan_content(content, &base_url).await;
    finish(result, events)
}

fn build_scanner(options: &ScanOptions, events: EventSink) -> SitemapScanner {
    SitemapScanner::with_timeout(options.timeout_secs)
        .with_max_depth(options.max_depth)
        .with_max_urls(options.max_urls)
        .with_concurrency(options.concurrency)
        .with_progress_callback(Arc::new(move |node: SitemapNode| {
            events(StreamEvent::Node { data: node });
        }))
}

fn finish(result: ScanResult, events: EventSink) -> Result<ScanResult, String> {
    if result.is_failure() {
        for error in &result.errors {
            events(StreamEvent::Error {
                error: error.clone(),
            });
        }
        return Err(format!("Scan failed: {}", result.errors.join("; ")));
    }

    events(StreamEvent::Complete {
        result: result.clone(),
    });
    Ok(result)
}

/// Render a scan result as a human-readable report: summary counts, any
/// diagnostics, then the discovered hierarchy as an indented tree.
pub fn generate_scan_report(result: &ScanResult) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Sitemap documents: {}\n", result.total_sitemaps));
    report.push_str(&format!("  URLs discovered:   {}\n", result.total_urls));
    report.push_str(&format!("  Errors:            {}\n", result.errors.len()));

    if !result.errors.is_empty() {
        report.push_str("\n# Diagnostics:\n");
        for error in &result.errors {
            report.push_str(&format!("  {} {}\n", "!".yellow(), error));
        }
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Hierarchy:\n");
    for node in &result.nodes {
        render_node(node, &mut report);
    }

    report
}

fn render_node(node: &SitemapNode, report: &mut String) {
    let indent = "  ".repeat(node.depth + 1);
    match node.kind {
        xmlnexus_scanner::NodeKind::Sitemap => {
            report.push_str(&format!(
                "{}{} {} ({} children)\n",
                indent,
                "▸".cyan(),
                node.url.bright_white(),
                node.children.len()
            ));
        }
        xmlnexus_scanner::NodeKind::Url => {
            let mut line = format!("{}{}", indent, node.url);
            if let Some(ref lastmod) = node.lastmod {
                line.push_str(&format!(" {}", lastmod.dimmed()));
            }
            line.push('\n');
            report.push_str(&line);
        }
    }
    for child in &node.children {
        render_node(child, report);
    }
}
