// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_content_from_file, resolve_db_path};

// Re-export scan orchestration from xmlnexus-core
pub use xmlnexus_core::scan::{
    ScanOptions, ScanOutcome, ensure_scheme, execute_content_scan, execute_scan,
    generate_scan_report, normalize_site_url,
};
