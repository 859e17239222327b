//! Parsed article model.
//!
//! Turning raw wiki markup into a tree is the job of an external parser. This
//! module defines the shape that parser hands over: a [`Document`] with its
//! categories, sentence-segmented prose, an optional [`Infobox`] and any tables.
//! The [`MarkupParser`] trait is the seam between the two, and
//! [`PreparsedJson`] implements it for content that was already converted to
//! this shape.
//!
//! # Example
//!
//! ```rust
//! use chronicle_core::document::{MarkupParser, PreparsedJson};
//!
//! let json = r#"{
//!     "categories": ["Canon novels"],
//!     "sentences": [{"text": "Tarkin is a canon novel."}]
//! }"#;
//! let doc = PreparsedJson.parse("Tarkin (novel)", json).unwrap();
//! assert_eq!(doc.title, "Tarkin (novel)");
//! assert!(doc.has_category("Canon novels"));
//! assert_eq!(doc.sentence_text(0), "Tarkin is a canon novel.");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{ChronicleError, Result};

/// A node in a sentence or field tree.
///
/// `Note` and `List` never come out of the markup parser: they are produced by
/// the [AST normalizer](crate::ast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Text {
        text: String,
    },
    Link {
        page: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
    Template {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
    Note {
        text: String,
    },
    List {
        data: Vec<Vec<Node>>,
    },
}

impl Node {
    /// Creates a plain text node.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    /// Creates a link node without anchor or label.
    pub fn link(page: impl Into<String>) -> Self {
        Node::Link { page: page.into(), anchor: None, text: None, raw: None }
    }
}

/// A wiki link target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Link {
    pub fn new(page: impl Into<String>) -> Self {
        Self { page: page.into(), anchor: None, text: None }
    }

    /// Target page with the in-page anchor appended (`Title#Section`).
    pub fn page_with_anchor(&self) -> String {
        match self.anchor.as_deref() {
            Some(anchor) if !anchor.is_empty() => format!("{}#{}", self.page, anchor),
            _ => self.page.clone(),
        }
    }
}

/// One sentence of prose with its plain text and node tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ast: Vec<Node>,
}

impl Sentence {
    pub fn new(text: impl Into<String>, ast: Vec<Node>) -> Self {
        Self { text: text.into(), ast }
    }
}

/// An infobox or table cell value.
///
/// The same value is available as flattened text, as the original wikitext,
/// as the list of link targets, and as a node tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub wikitext: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub ast: Vec<Node>,
}

impl FieldValue {
    /// A value holding a single text node.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self { wikitext: text.clone(), ast: vec![Node::text(text.clone())], text, links: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A key/value metadata table embedded in an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Infobox {
    /// Template name in lower case, e.g. `television episode`.
    pub kind: String,
    /// Values keyed by normalized field name.
    #[serde(default, deserialize_with = "deserialize_fields")]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Infobox {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), fields: BTreeMap::new() }
    }

    /// Adds a field, normalizing the key the way lookups do.
    pub fn with_field(mut self, key: &str, value: FieldValue) -> Self {
        self.fields.insert(normalize_key(key), value);
        self
    }

    /// Looks up a field by name, ignoring case and underscores.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(&normalize_key(key))
    }

    /// Flattened text of a field, empty when absent.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).map(|v| v.text.as_str()).unwrap_or("")
    }

    /// Link targets of a field, empty when absent.
    pub fn links(&self, key: &str) -> &[Link] {
        self.get(key).map(|v| v.links.as_slice()).unwrap_or(&[])
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', " ")
}

fn deserialize_fields<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, FieldValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, FieldValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(key, value)| (normalize_key(&key), value)).collect())
}

/// A table row keyed by column header.
pub type TableRow = BTreeMap<String, FieldValue>;

/// A parsed article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
    #[serde(default)]
    pub infobox: Option<Infobox>,
    #[serde(default)]
    pub tables: Vec<Vec<TableRow>>,
    #[serde(default)]
    pub redirect_to: Option<Link>,
    #[serde(default)]
    pub disambiguation: bool,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn sentence(&self, n: usize) -> Option<&Sentence> {
        self.sentences.get(n)
    }

    /// Plain text of the n-th sentence, empty when the article is shorter.
    pub fn sentence_text(&self, n: usize) -> &str {
        self.sentence(n).map(|s| s.text.as_str()).unwrap_or("")
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect_to.is_some()
    }

    /// Redirect target page title.
    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect_to.as_ref().map(|l| l.page.as_str())
    }

    pub fn infobox(&self) -> Option<&Infobox> {
        self.infobox.as_ref()
    }

    /// Infobox template name, empty when there is no infobox.
    pub fn infobox_kind(&self) -> &str {
        self.infobox.as_ref().map(|i| i.kind.as_str()).unwrap_or("")
    }
}

/// Turns raw page content into a [`Document`].
pub trait MarkupParser {
    fn parse(&self, title: &str, content: &str) -> Result<Document>;
}

/// Parser for content that an external tool already converted to the
/// [`Document`] JSON shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreparsedJson;

impl MarkupParser for PreparsedJson {
    fn parse(&self, title: &str, content: &str) -> Result<Document> {
        let mut doc: Document =
            serde_json::from_str(content).map_err(|e| ChronicleError::MarkupError(format!("{}: {}", title, e)))?;
        if doc.title.is_empty() {
            doc.title = title.to_string();
        }
        Ok(doc)
    }
}

/// Decodes the HTML character references that survive in wiki text.
///
/// Handles the named entities editors actually use plus decimal and
/// hexadecimal numeric references. Unknown entities are left untouched.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "eacute" => 'é',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infobox_lookup_ignores_case() {
        let infobox = Infobox::new("book").with_field("Release_Date", FieldValue::from_text("2015"));
        assert_eq!(infobox.text("release date"), "2015");
        assert_eq!(infobox.text("RELEASE DATE"), "2015");
        assert_eq!(infobox.text("missing"), "");
        assert!(infobox.links("missing").is_empty());
    }

    #[test]
    fn test_infobox_keys_normalized_on_load() {
        let json = r#"{
            "infobox": {
                "kind": "book",
                "fields": {"Release date": {"text": "April 4, 2017"}, "Media_Type": {"text": "Hardcover"}}
            }
        }"#;
        let doc = PreparsedJson.parse("Thrawn (novel)", json).unwrap();
        let infobox = doc.infobox().unwrap();
        assert_eq!(infobox.text("release date"), "April 4, 2017");
        assert_eq!(infobox.text("Media type"), "Hardcover");
        assert!(infobox.fields.contains_key("media type"));
    }

    #[test]
    fn test_link_with_anchor() {
        let link = Link { page: "Star Wars Rebels".to_string(), anchor: Some("Season 1".to_string()), text: None };
        assert_eq!(link.page_with_anchor(), "Star Wars Rebels#Season 1");
        assert_eq!(Link::new("Andor").page_with_anchor(), "Andor");
    }

    #[test]
    fn test_sentence_text_out_of_range() {
        let doc = Document::new("Empty");
        assert_eq!(doc.sentence_text(3), "");
        assert!(!doc.is_redirect());
        assert_eq!(doc.infobox_kind(), "");
    }

    #[test]
    fn test_preparsed_json_redirect() {
        let doc = PreparsedJson.parse("Old", r#"{"redirect_to": {"page": "New"}}"#).unwrap();
        assert!(doc.is_redirect());
        assert_eq!(doc.redirect_target(), Some("New"));
    }

    #[test]
    fn test_preparsed_json_invalid() {
        let result = PreparsedJson.parse("Broken", "{not json");
        assert!(matches!(result, Err(ChronicleError::MarkupError(_))));
    }

    #[test]
    fn test_node_serialization() {
        let node = Node::link("Luke Skywalker");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "link");
        assert_eq!(json["page"], "Luke Skywalker");
        assert!(json.get("raw").is_none());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Han &amp; Chewie"), "Han & Chewie");
        assert_eq!(decode_entities("&quot;Rogue&quot;"), "\"Rogue\"");
        assert_eq!(decode_entities("&#233;&#xE9;"), "éé");
        assert_eq!(decode_entities("R&D; no"), "R&D; no");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed(_)));
    }
}
