use serde::{Deserialize, Serialize};

/// Whether a node is a sitemap document (expandable container) or a
/// terminal page URL. Serialized lowercase to match the wire format the
/// stream consumer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sitemap,
    Url,
}

/// One node in the discovered sitemap hierarchy.
///
/// `depth` counts sitemap-index hops from the scan root (root = 0), so a
/// node's children always sit at exactly `depth + 1`. Metadata fields are
/// copied verbatim from the source entry and omitted from JSON when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapNode {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SitemapNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl SitemapNode {
    pub fn sitemap(url: String, depth: usize) -> Self {
        Self {
            url,
            kind: NodeKind::Sitemap,
            depth,
            children: Vec::new(),
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }

    pub fn leaf(url: String, depth: usize) -> Self {
        Self {
            url,
            kind: NodeKind::Url,
            depth,
            children: Vec::new(),
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }

    /// Clone with the subtree stripped, for streaming a single node without
    /// dragging its whole subtree over the wire.
    pub fn without_children(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// The frozen outcome of one scan invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub nodes: Vec<SitemapNode>,
    #[serde(rename = "totalUrls")]
    pub total_urls: usize,
    #[serde(rename = "totalSitemaps")]
    pub total_sitemaps: usize,
    pub errors: Vec<String>,
}

impl ScanResult {
    /// The engine never aborts on per-URL errors, so callers use this to
    /// decide whether "nothing found plus diagnostics" should be presented
    /// as a failed scan.
    pub fn is_failure(&self) -> bool {
        self.nodes.is_empty() && !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_with_wire_names() {
        let mut node = SitemapNode::sitemap("https://example.com/sitemap.xml".to_string(), 0);
        node.children
            .push(SitemapNode::leaf("https://example.com/".to_string(), 1));

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "sitemap");
        assert_eq!(json["children"][0]["type"], "url");
        assert_eq!(json["children"][0]["depth"], 1);
        // absent metadata is omitted entirely
        assert!(json.get("lastmod").is_none());
    }

    #[test]
    fn without_children_strips_subtree_only() {
        let mut node = SitemapNode::sitemap("https://example.com/sitemap.xml".to_string(), 0);
        node.lastmod = Some("2024-01-01".to_string());
        node.children
            .push(SitemapNode::leaf("https://example.com/".to_string(), 1));

        let stripped = node.without_children();
        assert!(stripped.children.is_empty());
        assert_eq!(stripped.lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(node.children.len(), 1);
    }

    #[test]
    fn result_totals_use_camel_case() {
        let result = ScanResult {
            total_urls: 3,
            total_sitemaps: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalUrls"], 3);
        assert_eq!(json["totalSitemaps"], 1);
    }

    #[test]
    fn failure_requires_empty_nodes_and_errors() {
        let mut result = ScanResult::default();
        assert!(!result.is_failure());

        result.errors.push("Invalid XML at x".to_string());
        assert!(result.is_failure());

        result
            .nodes
            .push(SitemapNode::leaf("https://example.com/".to_string(), 0));
        assert!(!result.is_failure());
    }
}
