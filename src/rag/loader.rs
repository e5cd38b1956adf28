//! Document loading: raw bytes in, normalized plain text out.
//!
//! Each supported format is reduced to plain text before chunking so the
//! rest of the pipeline never sees markup. Offsets produced downstream are
//! therefore offsets into the *extracted* text, not the raw source.

use crate::types::{ContentType, Document, RagError, Result};
use chrono::Utc;
use pulldown_cmark::{Event, Parser};
use scraper::Html;
use tracing::debug;
use uuid::Uuid;

/// Turns raw source bytes into normalized [`Document`]s.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }

    /// Load a document from raw bytes.
    ///
    /// Fails with `InvalidInput` for non-UTF-8 input, unsupported formats
    /// (PDF), or input that extracts to empty text.
    pub fn load(&self, origin: &str, content_type: ContentType, bytes: &[u8]) -> Result<Document> {
        if content_type == ContentType::Pdf {
            return Err(RagError::InvalidInput(format!(
                "PDF extraction is not supported (origin '{}')",
                origin
            )));
        }

        let raw = String::from_utf8(bytes.to_vec()).map_err(|_| {
            RagError::InvalidInput(format!("origin '{}' is not valid UTF-8", origin))
        })?;

        let content = match content_type {
            ContentType::PlainText => raw,
            ContentType::Markdown => extract_markdown(&raw),
            ContentType::Html => extract_html(&raw),
            ContentType::Json => extract_json(origin, &raw)?,
            ContentType::Pdf => unreachable!("rejected above"),
        };

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(RagError::InvalidInput(format!(
                "no text content extracted from origin '{}'",
                origin
            )));
        }

        debug!(
            origin,
            chars = content.chars().count(),
            ?content_type,
            "loaded document"
        );

        Ok(Document {
            id: Uuid::new_v4(),
            origin: origin.to_string(),
            content,
            content_type,
            ingested_at: Utc::now(),
        })
    }

    /// Load a document, guessing the content type from the origin's
    /// extension.
    pub fn load_auto(&self, origin: &str, bytes: &[u8]) -> Result<Document> {
        self.load(origin, ContentType::from_origin(origin), bytes)
    }
}

/// Reduce markdown to plain text by walking the event stream: text and
/// code spans are kept, block ends become newlines, everything else
/// (emphasis markers, link targets, heading levels) is dropped.
fn extract_markdown(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(_) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    out
}

/// Extract the text nodes of an HTML document, joined with newlines.
fn extract_html(html: &str) -> String {
    let parsed = Html::parse_document(html);
    let mut out = String::new();
    for text in parsed.root_element().text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(trimmed);
        }
    }
    out
}

/// Render a JSON document's scalar leaves one per line as `path: value`.
fn extract_json(origin: &str, raw: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        RagError::InvalidInput(format!("origin '{}' is not valid JSON: {}", origin, e))
    })?;
    let mut out = String::new();
    flatten_json(&value, "", &mut out);
    Ok(out)
}

fn flatten_json(value: &serde_json::Value, path: &str, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_json(child, &child_path, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_json(child, &format!("{}[{}]", path, i), out);
            }
        }
        serde_json::Value::Null => {}
        scalar => {
            if path.is_empty() {
                out.push_str(&scalar_text(scalar));
            } else {
                out.push_str(path);
                out.push_str(": ");
                out.push_str(&scalar_text(scalar));
            }
            out.push('\n');
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_plain_text() {
        let loader = DocumentLoader::new();
        let doc = loader
            .load("notes.txt", ContentType::PlainText, b"hello world")
            .unwrap();
        assert_eq!(doc.content, "hello world");
        assert_eq!(doc.origin, "notes.txt");
        assert_eq!(doc.content_type, ContentType::PlainText);
    }

    #[test]
    fn strips_markdown_markup() {
        let loader = DocumentLoader::new();
        let md = b"# Heading\n\nSome *emphasis* and `code` here.\n\n- item one\n- item two\n";
        let doc = loader.load("guide.md", ContentType::Markdown, md).unwrap();
        assert!(doc.content.contains("Heading"));
        assert!(doc.content.contains("Some emphasis and code here."));
        assert!(doc.content.contains("item one"));
        assert!(!doc.content.contains('#'));
        assert!(!doc.content.contains('*'));
        assert!(!doc.content.contains('`'));
    }

    #[test]
    fn extracts_html_text_nodes() {
        let loader = DocumentLoader::new();
        let html = b"<html><head><title>T</title></head>\
                     <body><h1>Title</h1><p>First paragraph.</p><p>Second.</p></body></html>";
        let doc = loader.load("page.html", ContentType::Html, html).unwrap();
        assert!(doc.content.contains("Title"));
        assert!(doc.content.contains("First paragraph."));
        assert!(doc.content.contains("Second."));
        assert!(!doc.content.contains("<p>"));
    }

    #[test]
    fn flattens_json_scalars() {
        let loader = DocumentLoader::new();
        let json = br#"{"name": "widget", "specs": {"weight": 3.5, "tags": ["a", "b"]}}"#;
        let doc = loader.load("data.json", ContentType::Json, json).unwrap();
        assert!(doc.content.contains("name: widget"));
        assert!(doc.content.contains("specs.weight: 3.5"));
        assert!(doc.content.contains("specs.tags[0]: a"));
    }

    #[test]
    fn rejects_pdf() {
        let loader = DocumentLoader::new();
        let err = loader
            .load("paper.pdf", ContentType::Pdf, b"%PDF-1.4")
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[test]
    fn rejects_empty_extraction() {
        let loader = DocumentLoader::new();
        let err = loader
            .load("blank.txt", ContentType::PlainText, b"   \n  ")
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let loader = DocumentLoader::new();
        let err = loader
            .load("bin.txt", ContentType::PlainText, &[0xff, 0xfe, 0x00])
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[test]
    fn load_auto_uses_extension() {
        let loader = DocumentLoader::new();
        let doc = loader.load_auto("readme.md", b"# Top\n\nBody text.").unwrap();
        assert_eq!(doc.content_type, ContentType::Markdown);
        assert!(doc.content.contains("Body text."));
    }
}
