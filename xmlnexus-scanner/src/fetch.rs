use crate::error::{Result, ScanError};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Fixed identifying user agent sent with every request.
pub const USER_AGENT: &str = "XML-Nexus-Bot/1.0";

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// HTTP payload retrieval with a hard per-request timeout and transparent
/// gzip inflation. No retries: a single network failure surfaces to the
/// traversal engine, which treats it as non-fatal for the scan.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::FetchFailed {
                url: url.to_string(),
                reason: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ScanError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        maybe_gunzip(url, &body)
    }
}

/// Sniff for the gzip magic bytes and inflate when present. Sitemaps served
/// as `.xml.gz` files arrive without a Content-Encoding header, so the
/// client's own gzip handling never sees them.
pub fn maybe_gunzip(url: &str, bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ScanError::DecompressFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        return Ok(out);
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_bytes_pass_through() {
        let body = b"<urlset></urlset>";
        let out = maybe_gunzip("https://example.com/sitemap.xml", body).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn gzip_payload_is_inflated() {
        let body = b"<urlset><url><loc>https://example.com/</loc></url></urlset>";
        let compressed = gzip(body);
        assert_eq!(&compressed[..2], &GZIP_MAGIC);

        let out = maybe_gunzip("https://example.com/sitemap.xml.gz", &compressed).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn corrupt_gzip_reports_decompress_failure() {
        // the magic bytes alone promise a gzip stream that never arrives
        let bogus = vec![0x1F, 0x8B, 0xFF, 0x00, 0x12];
        let err = maybe_gunzip("https://example.com/sitemap.xml.gz", &bogus).unwrap_err();
        assert!(matches!(err, ScanError::DecompressFailed { .. }));
    }

    #[test]
    fn short_payloads_are_not_sniffed() {
        let out = maybe_gunzip("https://example.com/x", &[0x1F]).unwrap();
        assert_eq!(out, vec![0x1F]);
    }
}
