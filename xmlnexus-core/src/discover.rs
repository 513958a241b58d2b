use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Conventional sitemap locations probed when robots.txt names none.
pub const COMMON_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-main.xml",
    "/wp-sitemap.xml",
];

/// Find candidate root sitemap URLs for a site: robots.txt directives
/// first, heuristic path probing as a fallback. May come back empty.
pub async fn discover_sitemaps(client: &Client, site_url: &str) -> Vec<String> {
    let sitemaps = fetch_robots_sitemaps(client, site_url).await;
    if !sitemaps.is_empty() {
        return sitemaps;
    }
    probe_common_paths(client, site_url).await
}

/// Fetch `/robots.txt` and collect the values of its `Sitemap:` directives.
/// Any failure along the way means "no directives", never a hard error.
pub async fn fetch_robots_sitemaps(client: &Client, site_url: &str) -> Vec<String> {
    let Some(robots_url) = join_path(site_url, "/robots.txt") else {
        return Vec::new();
    };
    debug!("Fetching robots.txt from {}", robots_url);

    match client.get(&robots_url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => extract_sitemap_directives(&body),
            Err(e) => {
                warn!("Failed to read robots.txt body: {}", e);
                Vec::new()
            }
        },
        Ok(response) => {
            debug!("robots.txt returned {}", response.status());
            Vec::new()
        }
        Err(e) => {
            warn!("Failed to fetch robots.txt: {}", e);
            Vec::new()
        }
    }
}

/// Pull `Sitemap:` directive values out of a robots.txt body. The split is
/// on the first colon only, so `https://` URLs survive intact; matching is
/// case-insensitive per the de facto robots convention.
pub fn extract_sitemap_directives(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let prefix = line.get(..8)?;
            if !prefix.eq_ignore_ascii_case("sitemap:") {
                return None;
            }
            let value = line[8..].trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        })
        .collect()
}

/// HEAD-check the conventional sitemap paths, keeping every candidate that
/// answers successfully with an XML-ish content type.
pub async fn probe_common_paths(client: &Client, site_url: &str) -> Vec<String> {
    let mut found = Vec::new();
    for candidate in COMMON_SITEMAP_PATHS {
        let Some(probe_url) = join_path(site_url, candidate) else {
            continue;
        };
        debug!("Probing {}", probe_url);
        match client.head(&probe_url).send().await {
            Ok(response) if response.status().is_success() => {
                let is_xml = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|ct| ct.contains("xml"))
                    .unwrap_or(false);
                if is_xml {
                    found.push(probe_url);
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Probe of {} failed: {}", probe_url, e),
        }
    }
    found
}

fn join_path(site_url: &str, path: &str) -> Option<String> {
    let base = Url::parse(site_url).ok()?;
    base.join(path).ok().map(|u| u.to_string())
}
