use crate::error::ScanError;
use crate::fetch::Fetcher;
use crate::model::{ScanResult, SitemapNode};
use crate::parse::{self, Dialect};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Invoked for every successfully materialized node, with the subtree
/// stripped. Containers arrive after their children (post-order); leaves
/// arrive in document order as they are discovered.
pub type ProgressCallback = Arc<dyn Fn(SitemapNode) + Send + Sync>;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_URLS: usize = 10_000;
pub const DEFAULT_CONCURRENT_FETCHES: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Owns the running counters and the error list for one scan, and freezes
/// them into the returned result. Mutated only behind the scan state's
/// mutex, so counters never overshoot their ceilings under concurrent
/// branches.
#[derive(Default)]
struct Aggregator {
    total_urls: usize,
    total_sitemaps: usize,
    errors: Vec<String>,
}

impl Aggregator {
    fn record_error(&mut self, error: &ScanError) {
        self.errors.push(error.to_string());
    }

    fn count_sitemap(&mut self) {
        self.total_sitemaps += 1;
    }

    fn count_url(&mut self) {
        self.total_urls += 1;
    }

    fn url_ceiling_reached(&self, max_urls: usize) -> bool {
        self.total_urls >= max_urls
    }

    fn finalize(self, nodes: Vec<SitemapNode>) -> ScanResult {
        ScanResult {
            nodes,
            total_urls: self.total_urls,
            total_sitemaps: self.total_sitemaps,
            errors: self.errors,
        }
    }
}

/// Per-call scan state. Created fresh inside every `scan`/`scan_content`
/// invocation so a configured scanner can be reused without visited-set or
/// counter bleed between calls.
struct ScanState {
    visited: Mutex<HashSet<String>>,
    totals: Mutex<Aggregator>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            totals: Mutex::new(Aggregator::default()),
        }
    }

    fn finalize(self, nodes: Vec<SitemapNode>) -> ScanResult {
        self.totals.into_inner().finalize(nodes)
    }
}

/// Bounded-depth, deduplicating sitemap traversal: walks sitemap-index
/// references down to leaf URL sets, fanning child documents out
/// concurrently under a fetch semaphore.
pub struct SitemapScanner {
    fetcher: Fetcher,
    max_depth: usize,
    max_urls: usize,
    fetch_permits: Arc<Semaphore>,
    progress_callback: Option<ProgressCallback>,
}

impl SitemapScanner {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            fetcher: Fetcher::new(Duration::from_secs(timeout_secs)),
            max_depth: DEFAULT_MAX_DEPTH,
            max_urls: DEFAULT_MAX_URLS,
            fetch_permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_FETCHES)),
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    pub fn with_concurrency(mut self, concurrent_fetches: usize) -> Self {
        self.fetch_permits = Arc::new(Semaphore::new(concurrent_fetches.max(1)));
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Walk every root URL in order and return the frozen result.
    pub async fn scan(&self, root_urls: &[String]) -> ScanResult {
        info!("Starting scan of {} root sitemap(s)", root_urls.len());

        let state = ScanState::new();
        let mut nodes = Vec::new();
        for url in root_urls {
            if let Some(node) = self.process_url(&state, url.clone(), 0, None).await {
                nodes.push(node);
            }
        }

        let result = state.finalize(nodes);
        info!(
            "Scan complete: {} urls across {} sitemap documents, {} errors",
            result.total_urls,
            result.total_sitemaps,
            result.errors.len()
        );
        result
    }

    /// Content-mode entry point for manual-paste workflows: the supplied
    /// text stands in for the fetch of `base_url`; nested references are
    /// still fetched normally.
    pub async fn scan_content(&self, content: &str, base_url: &str) -> ScanResult {
        let state = ScanState::new();
        let mut nodes = Vec::new();
        if let Some(node) = self
            .process_url(&state, base_url.to_string(), 0, Some(content.to_string()))
            .await
        {
            nodes.push(node);
        }
        state.finalize(nodes)
    }

    fn process_url<'a>(
        &'a self,
        state: &'a ScanState,
        url: String,
        depth: usize,
        content: Option<String>,
    ) -> BoxFuture<'a, Option<SitemapNode>> {
        async move {
            // already-seen URLs, depth overruns and a full URL count are
            // silent stops, not errors
            {
                let mut visited = state.visited.lock().await;
                if !visited.insert(url.clone()) {
                    return None;
                }
            }
            if depth > self.max_depth {
                debug!("Skipping {} (depth {} past ceiling)", url, depth);
                return None;
            }
            if state.totals.lock().await.url_ceiling_reached(self.max_urls) {
                return None;
            }

            debug!("Scanning {} (depth {})", url, depth);

            let text = match content {
                Some(text) => text,
                None => {
                    let fetched = {
                        // permit covers only the network call, so a parent
                        // never starves the children it is waiting on
                        let _permit = self
                            .fetch_permits
                            .acquire()
                            .await
                            .expect("fetch semaphore closed");
                        self.fetcher.fetch(&url).await
                    };
                    match fetched {
                        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                        Err(e) => {
                            warn!("{}", e);
                            state.totals.lock().await.record_error(&e);
                            return None;
                        }
                    }
                }
            };

            let dialect = match parse::parse_sitemap(&url, &text) {
                Ok(dialect) => dialect,
                Err(e) => {
                    warn!("{}", e);
                    state.totals.lock().await.record_error(&e);
                    return None;
                }
            };

            match dialect {
                Dialect::Index { entries, lastmod } => {
                    state.totals.lock().await.count_sitemap();

                    // fan out in listing order; completion order is up to
                    // the network
                    let child_futures: Vec<_> = entries
                        .iter()
                        .map(|entry| self.process_url(state, entry.loc.clone(), depth + 1, None))
                        .collect();
                    let results = future::join_all(child_futures).await;

                    let mut children = Vec::new();
                    for (entry, result) in entries.into_iter().zip(results) {
                        if let Some(mut child) = result {
                            if child.lastmod.is_none() {
                                child.lastmod = entry.lastmod;
                            }
                            children.push(child);
                        }
                    }

                    let mut node = SitemapNode::sitemap(url, depth);
                    node.lastmod = lastmod;
                    node.children = children;
                    self.emit(&node);
                    Some(node)
                }
                Dialect::UrlSet { entries, lastmod } => {
                    let mut children = Vec::new();
                    {
                        let mut totals = state.totals.lock().await;
                        totals.count_sitemap();
                        for entry in entries {
                            if totals.url_ceiling_reached(self.max_urls) {
                                break;
                            }
                            totals.count_url();
                            let mut leaf = SitemapNode::leaf(entry.loc, depth + 1);
                            leaf.lastmod = entry.lastmod;
                            leaf.changefreq = entry.changefreq;
                            leaf.priority = entry.priority;
                            self.emit(&leaf);
                            children.push(leaf);
                        }
                    }

                    let mut node = SitemapNode::sitemap(url, depth);
                    node.lastmod = lastmod;
                    node.children = children;
                    self.emit(&node);
                    Some(node)
                }
                Dialect::LegacyExport { urls } => {
                    let mut children = Vec::new();
                    {
                        let mut totals = state.totals.lock().await;
                        totals.count_sitemap();
                        for leaf_url in urls {
                            if totals.url_ceiling_reached(self.max_urls) {
                                break;
                            }
                            totals.count_url();
                            let leaf = SitemapNode::leaf(leaf_url, depth + 1);
                            self.emit(&leaf);
                            children.push(leaf);
                        }
                    }

                    let mut node = SitemapNode::sitemap(url, depth);
                    node.children = children;
                    self.emit(&node);
                    Some(node)
                }
            }
        }
        .boxed()
    }

    fn emit(&self, node: &SitemapNode) {
        if let Some(ref callback) = self.progress_callback {
            callback(node.without_children());
        }
    }
}

impl Default for SitemapScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urlset(locs: &[&str]) -> String {
        let mut xml =
            String::from(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        for loc in locs {
            xml.push_str(&format!("<url><loc>{}</loc></url>", loc));
        }
        xml.push_str("</urlset>");
        xml
    }

    fn sitemapindex(locs: &[&str]) -> String {
        let mut xml =
            String::from(r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        for loc in locs {
            xml.push_str(&format!("<sitemap><loc>{}</loc></sitemap>", loc));
        }
        xml.push_str("</sitemapindex>");
        xml
    }

    async fn mount_xml(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/xml")
                    .set_body_bytes(body.into_bytes()),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn scan_content_counts_each_leaf() {
        let xml = urlset(&[
            "https://example.com/",
            "https://example.com/about",
            "https://example.com/contact",
        ]);

        let scanner = SitemapScanner::new();
        let result = scanner.scan_content(&xml, "https://example.com").await;

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].children.len(), 3);
        assert_eq!(result.total_urls, 3);
        assert_eq!(result.total_sitemaps, 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn scan_content_example_scenario() {
        let xml = "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n<url><loc>https://example.com/</loc></url>\n</urlset>";

        let scanner = SitemapScanner::new();
        let result = scanner.scan_content(xml, "https://example.com").await;

        assert_eq!(result.nodes.len(), 1);
        let root = &result.nodes[0];
        assert_eq!(root.kind, NodeKind::Sitemap);
        assert_eq!(root.depth, 0);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].url, "https://example.com/");
        assert_eq!(root.children[0].depth, 1);
        assert_eq!(result.total_urls, 1);
    }

    #[tokio::test]
    async fn scan_content_empty_input_is_invalid_xml() {
        let scanner = SitemapScanner::new();
        let result = scanner.scan_content("", "https://example.com").await;

        assert!(result.nodes.is_empty());
        assert!(result.errors.iter().any(|e| e.contains("Invalid XML")));
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn scan_content_html_document_is_unrecognized() {
        let scanner = SitemapScanner::new();
        let result = scanner
            .scan_content("<!DOCTYPE html><html></html>", "https://example.com")
            .await;

        assert!(result.nodes.is_empty());
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("Invalid Sitemap format") && e.contains("html"))
        );
    }

    #[tokio::test]
    async fn scan_content_truncated_markup_never_silently_succeeds_empty() {
        let scanner = SitemapScanner::new();
        let result = scanner
            .scan_content(
                "<urlset><url><loc>https://example.com/</loc>",
                "https://example.com",
            )
            .await;

        assert!(
            !result.nodes.is_empty() || !result.errors.is_empty(),
            "truncated markup must salvage entries or report diagnostics"
        );
        if let Some(root) = result.nodes.first() {
            assert_eq!(root.children[0].url, "https://example.com/");
        }
    }

    #[tokio::test]
    async fn url_ceiling_stops_mid_list() {
        let locs: Vec<String> = (0..10)
            .map(|i| format!("https://example.com/page{}", i))
            .collect();
        let refs: Vec<&str> = locs.iter().map(String::as_str).collect();
        let xml = urlset(&refs);

        let scanner = SitemapScanner::new().with_max_urls(3);
        let result = scanner.scan_content(&xml, "https://example.com").await;

        assert_eq!(result.total_urls, 3);
        assert_eq!(result.nodes[0].children.len(), 3);
        assert_eq!(result.nodes[0].children[2].url, "https://example.com/page2");
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn index_fans_out_to_child_url_sets() {
        let server = MockServer::start().await;
        let index = sitemapindex(&[
            &format!("{}/pages.xml", server.uri()),
            &format!("{}/posts.xml", server.uri()),
        ]);
        mount_xml(&server, "/sitemap.xml", index).await;
        mount_xml(
            &server,
            "/pages.xml",
            urlset(&["https://example.com/", "https://example.com/about"]),
        )
        .await;
        mount_xml(
            &server,
            "/posts.xml",
            urlset(&["https://example.com/blog/1"]),
        )
        .await;

        let scanner = SitemapScanner::new();
        let result = scanner
            .scan(&[format!("{}/sitemap.xml", server.uri())])
            .await;

        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
        assert_eq!(result.nodes.len(), 1);
        let root = &result.nodes[0];
        assert_eq!(root.children.len(), 2);
        // children come back in listing order regardless of completion order
        assert!(root.children[0].url.ends_with("/pages.xml"));
        assert!(root.children[1].url.ends_with("/posts.xml"));
        assert_eq!(root.children[0].depth, 1);
        assert_eq!(root.children[0].children[0].depth, 2);
        assert_eq!(result.total_sitemaps, 3);
        assert_eq!(result.total_urls, 3);
    }

    #[tokio::test]
    async fn duplicate_references_are_visited_once() {
        let server = MockServer::start().await;
        let child = format!("{}/pages.xml", server.uri());
        let index = sitemapindex(&[&child, &child]);
        mount_xml(&server, "/sitemap.xml", index).await;
        mount_xml(&server, "/pages.xml", urlset(&["https://example.com/"])).await;

        let scanner = SitemapScanner::new();
        let result = scanner
            .scan(&[format!("{}/sitemap.xml", server.uri())])
            .await;

        assert_eq!(result.nodes[0].children.len(), 1);
        assert_eq!(result.total_urls, 1);
        assert_eq!(result.total_sitemaps, 2);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn depth_ceiling_silently_stops_expansion() {
        let server = MockServer::start().await;
        // index chain: /level0.xml -> /level1.xml -> /level2.xml -> urlset
        mount_xml(
            &server,
            "/level0.xml",
            sitemapindex(&[&format!("{}/level1.xml", server.uri())]),
        )
        .await;
        mount_xml(
            &server,
            "/level1.xml",
            sitemapindex(&[&format!("{}/level2.xml", server.uri())]),
        )
        .await;
        mount_xml(
            &server,
            "/level2.xml",
            urlset(&["https://example.com/deep"]),
        )
        .await;

        let scanner = SitemapScanner::new().with_max_depth(1);
        let result = scanner.scan(&[format!("{}/level0.xml", server.uri())]).await;

        assert!(result.errors.is_empty());
        let root = &result.nodes[0];
        assert_eq!(root.children.len(), 1);
        // level2 sits past the ceiling: absent, not an error
        assert!(root.children[0].children.is_empty());
        assert_eq!(result.total_urls, 0);
    }

    #[tokio::test]
    async fn gzip_payload_scans_identically_to_plain() {
        let server = MockServer::start().await;
        let xml = urlset(&["https://example.com/", "https://example.com/about"]);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        mount_xml(&server, "/plain.xml", xml).await;
        Mock::given(method("GET"))
            .and(path("/compressed.xml.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/gzip")
                    .set_body_bytes(compressed),
            )
            .mount(&server)
            .await;

        let scanner = SitemapScanner::new();
        let plain = scanner.scan(&[format!("{}/plain.xml", server.uri())]).await;
        let gzipped = scanner
            .scan(&[format!("{}/compressed.xml.gz", server.uri())])
            .await;

        assert_eq!(plain.total_urls, gzipped.total_urls);
        assert!(gzipped.errors.is_empty());
        let plain_urls: Vec<_> = plain.nodes[0].children.iter().map(|c| &c.url).collect();
        let gzip_urls: Vec<_> = gzipped.nodes[0].children.iter().map(|c| &c.url).collect();
        assert_eq!(plain_urls, gzip_urls);
    }

    #[tokio::test]
    async fn fetch_failure_drops_node_but_scan_continues() {
        let server = MockServer::start().await;
        let index = sitemapindex(&[
            &format!("{}/missing.xml", server.uri()),
            &format!("{}/pages.xml", server.uri()),
        ]);
        mount_xml(&server, "/sitemap.xml", index).await;
        mount_xml(&server, "/pages.xml", urlset(&["https://example.com/"])).await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scanner = SitemapScanner::new();
        let result = scanner
            .scan(&[format!("{}/sitemap.xml", server.uri())])
            .await;

        let root = &result.nodes[0];
        assert_eq!(root.children.len(), 1);
        assert!(root.children[0].url.ends_with("/pages.xml"));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Failed to fetch"));
        assert!(result.errors[0].contains("404"));
        // the scan found nodes, so this is not a terminal failure
        assert!(!result.is_failure());
    }

    #[tokio::test]
    async fn leaves_are_emitted_before_their_container() {
        let emitted: Arc<StdMutex<Vec<SitemapNode>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = emitted.clone();

        let xml = urlset(&["https://example.com/", "https://example.com/about"]);
        let scanner =
            SitemapScanner::new().with_progress_callback(Arc::new(move |node: SitemapNode| {
                sink.lock().unwrap().push(node);
            }));
        scanner.scan_content(&xml, "https://example.com").await;

        let emitted = emitted.lock().unwrap();
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[0].kind, NodeKind::Url);
        assert_eq!(emitted[0].url, "https://example.com/");
        assert_eq!(emitted[1].url, "https://example.com/about");
        assert_eq!(emitted[2].kind, NodeKind::Sitemap);
        // streamed nodes carry no subtree
        assert!(emitted[2].children.is_empty());
    }

    #[tokio::test]
    async fn scanner_reuse_starts_from_fresh_state() {
        let xml = urlset(&["https://example.com/"]);
        let scanner = SitemapScanner::new();

        let first = scanner.scan_content(&xml, "https://example.com").await;
        let second = scanner.scan_content(&xml, "https://example.com").await;

        assert_eq!(first.total_urls, 1);
        assert_eq!(second.total_urls, 1);
        assert_eq!(second.nodes.len(), 1);
    }

    #[tokio::test]
    async fn legacy_export_content_yields_leaves() {
        let xml = r#"<exportroot generator="cms">
            <page meta='{"path":"/content/products/widget"}'/>
        </exportroot>"#;

        let scanner = SitemapScanner::new();
        let result = scanner
            .scan_content(xml, "https://example.com/export.xml")
            .await;

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(
            result.nodes[0].children[0].url,
            "https://example.com/products/widget.html"
        );
        assert_eq!(result.total_urls, 1);
    }
}
