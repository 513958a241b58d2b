use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use xmlnexus_scanner::fetch::USER_AGENT;

const ANALYZE_TIMEOUT_SECS: u64 = 10;

/// SEO-relevant metadata scraped from a single page, independent of the
/// sitemap crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub status_code: u16,
    pub title: String,
    pub title_length: usize,
    pub description: String,
    pub description_length: usize,
    pub h1: String,
    pub canonical: String,
    pub robots: String,
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub word_count: usize,
}

/// Fetch one page and scrape its head/body metadata.
pub async fn analyze_page(url: &str) -> Result<PageMetadata, String> {
    debug!("Analyzing page {}", url);

    let client = Client::builder()
        .user_agent(format!("{} (SEO Analyzer)", USER_AGENT))
        .timeout(Duration::from_secs(ANALYZE_TIMEOUT_SECS))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?;

    let status_code = response.status().as_u16();
    let html = response
        .text()
        .await
        .map_err(|e| format!("Failed to read {}: {}", url, e))?;

    Ok(extract_metadata(status_code, &html))
}

fn extract_metadata(status_code: u16, html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = select_text(&document, "title");
    let description = select_attr(&document, r#"meta[name="description"]"#, "content");
    let h1 = select_text(&document, "h1");
    let canonical = select_attr(&document, r#"link[rel="canonical"]"#, "href");
    let robots = select_attr(&document, r#"meta[name="robots"]"#, "content");
    let og_title = select_attr(&document, r#"meta[property="og:title"]"#, "content");
    let og_description = select_attr(&document, r#"meta[property="og:description"]"#, "content");
    let og_image = select_attr(&document, r#"meta[property="og:image"]"#, "content");

    let body_text = select_text(&document, "body");
    let word_count = body_text.split_whitespace().count();

    PageMetadata {
        status_code,
        title_length: title.chars().count(),
        description_length: description.chars().count(),
        title,
        description,
        h1,
        canonical,
        robots,
        og_title,
        og_description,
        og_image,
        word_count,
    }
}

fn select_text(document: &Html, selector: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .unwrap_or_default()
        .to_string()
}
