use crate::error::{Result, ScanError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use url::Url;

/// Prefix that certain content-management exports prepend to page paths.
const LEGACY_PATH_PREFIX: &str = "/content";
/// Extension appended to legacy paths that carry none.
const LEGACY_DEFAULT_EXTENSION: &str = ".html";

/// A generic attributed XML tree. Repeated siblings stay separate child
/// entries, so a single `<url>` and a list of them look the same to
/// callers.
#[derive(Debug, Default, Clone)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Ordered list of direct children with the given local name,
    /// regardless of how many there are.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.children_named(name).next().and_then(|c| {
            let text = c.text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        })
    }
}

/// Reference to a nested sitemap document inside a sitemap index.
#[derive(Debug, Clone)]
pub struct SitemapRef {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// One terminal page entry inside a URL set. Metadata is kept verbatim.
#[derive(Debug, Clone)]
pub struct UrlEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<String>,
}

/// The classified shape of a sitemap document.
#[derive(Debug, Clone)]
pub enum Dialect {
    /// A container of other sitemap documents.
    Index {
        entries: Vec<SitemapRef>,
        lastmod: Option<String>,
    },
    /// A container of terminal page URLs.
    UrlSet {
        entries: Vec<UrlEntry>,
        lastmod: Option<String>,
    },
    /// A non-standard export with page paths embedded in JSON attributes,
    /// already normalized to absolute URLs.
    LegacyExport { urls: Vec<String> },
}

/// Validate, parse, and classify one sitemap payload.
pub fn parse_sitemap(url: &str, text: &str) -> Result<Dialect> {
    if !looks_like_markup(text) {
        return Err(ScanError::InvalidContent(url.to_string()));
    }
    let root = parse_document(url, text)?;
    classify(url, &root)
}

fn looks_like_markup(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('<') || trimmed.contains('<')
}

/// Build the generic tree from raw text. Truncated documents are unwound
/// at the point the reader gives up, so entries read before the truncation
/// survive; a reader error with nothing salvageable is a `ParseFailed`.
pub fn parse_document(url: &str, text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e)),
            Ok(Event::Empty(e)) => {
                let element = element_from_start(&e);
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Eof) => {
                while let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
                break;
            }
            Err(e) => {
                if stack.is_empty() && root.is_none() {
                    return Err(ScanError::ParseFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
                // salvage whatever was read before the document broke
                while let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
                break;
            }
            Ok(_) => {}
        }
    }

    root.ok_or_else(|| ScanError::InvalidContent(url.to_string()))
}

fn element_from_start(e: &BytesStart) -> XmlElement {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        attributes.push((key, value));
    }
    XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    }
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

/// Classify a parsed root element, in priority order: sitemap index, URL
/// set, legacy export. A shape that yields no content at all is reported
/// as an unrecognized format naming the root actually found.
pub fn classify(url: &str, root: &XmlElement) -> Result<Dialect> {
    match root.name.as_str() {
        "sitemapindex" => {
            let entries: Vec<SitemapRef> = root
                .children_named("sitemap")
                .filter_map(|entry| {
                    Some(SitemapRef {
                        loc: entry.child_text("loc")?,
                        lastmod: entry.child_text("lastmod"),
                    })
                })
                .collect();
            if entries.is_empty() {
                return Err(unrecognized(url, root));
            }
            Ok(Dialect::Index {
                entries,
                lastmod: root.child_text("lastmod"),
            })
        }
        "urlset" => {
            let entries: Vec<UrlEntry> = root
                .children_named("url")
                .filter_map(|entry| {
                    Some(UrlEntry {
                        loc: entry.child_text("loc")?,
                        lastmod: entry.child_text("lastmod"),
                        changefreq: entry.child_text("changefreq"),
                        priority: entry.child_text("priority"),
                    })
                })
                .collect();
            if entries.is_empty() {
                return Err(unrecognized(url, root));
            }
            Ok(Dialect::UrlSet {
                entries,
                lastmod: root.child_text("lastmod"),
            })
        }
        _ => {
            let urls = extract_legacy_urls(root, url);
            if urls.is_empty() {
                Err(unrecognized(url, root))
            } else {
                Ok(Dialect::LegacyExport { urls })
            }
        }
    }
}

fn unrecognized(url: &str, root: &XmlElement) -> ScanError {
    ScanError::UnrecognizedFormat {
        url: url.to_string(),
        root: root.name.clone(),
    }
}

/// Best-effort deep walk over every attribute in the tree, collecting
/// JSON-encoded values that carry a string `path` field.
fn extract_legacy_urls(root: &XmlElement, base_url: &str) -> Vec<String> {
    let mut urls = Vec::new();
    walk(root, &mut |element| {
        for (_, value) in &element.attributes {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(value)
                && let Some(serde_json::Value::String(path)) = map.get("path")
                && let Some(url) = normalize_legacy_path(path, base_url)
            {
                urls.push(url);
            }
        }
    });
    urls
}

fn walk<'a>(element: &'a XmlElement, visit: &mut impl FnMut(&'a XmlElement)) {
    visit(element);
    for child in &element.children {
        walk(child, visit);
    }
}

fn normalize_legacy_path(path: &str, base_url: &str) -> Option<String> {
    let stripped = path.strip_prefix(LEGACY_PATH_PREFIX).unwrap_or(path);
    let mut normalized = if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    };
    let last_segment = normalized.rsplit('/').next().unwrap_or("");
    if !last_segment.contains('.') {
        normalized.push_str(LEGACY_DEFAULT_EXTENSION);
    }
    let base = Url::parse(base_url).ok()?;
    base.join(&normalized).ok().map(|u| u.to_string())
}
