use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::Arc;
use xmlnexus_scanner::{ScanResult, SitemapNode};

/// One record of the newline-delimited JSON wire contract consumed by the
/// browser front end. `node` events carry a single node with its subtree
/// stripped; the `complete` event carries the authoritative final tree and
/// supersedes any state a consumer built from earlier `node` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Node { data: SitemapNode },
    Info { message: String },
    Error { error: String },
    Complete { result: ScanResult },
}

/// Destination for scan events, injected into the orchestration layer.
pub type EventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// A sink that discards every event.
pub fn null_sink() -> EventSink {
    Arc::new(|_| {})
}

/// Serialize one event as a single NDJSON line.
pub fn write_ndjson<W: Write>(writer: &mut W, event: &StreamEvent) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
