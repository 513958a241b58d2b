use thiserror::Error;

/// Per-URL scan failures. Every variant is non-fatal for the scan as a
/// whole: the diagnostic string is appended to the result's error list and
/// the offending node is dropped from the tree.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Failed to decompress {url}: {reason}")]
    DecompressFailed { url: String, reason: String },

    #[error("Invalid XML at {0}")]
    InvalidContent(String),

    #[error("Invalid Sitemap format at {url} (found <{root}>)")]
    UnrecognizedFormat { url: String, root: String },

    #[error("Parse error at {url}: {reason}")]
    ParseFailed { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;
