pub mod error;
pub mod fetch;
pub mod model;
pub mod parse;
pub mod scanner;

pub use error::ScanError;
pub use model::{NodeKind, ScanResult, SitemapNode};
pub use scanner::SitemapScanner;
