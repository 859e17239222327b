//! Sentence and field tree normalization.
//!
//! The upstream markup parser leaves bullet lists and `((...))` annotations
//! embedded inside flat text nodes. [`normalize`] reifies them: lists become
//! [`Node::List`] entries whose items are node sequences, and annotations become
//! sibling [`Node::Note`] nodes.
//!
//! # Example
//!
//! ```rust
//! use chronicle_core::ast::{FieldData, normalize};
//! use chronicle_core::document::Node;
//!
//! let nodes = vec![Node::text("*a\n*b\nc")];
//! let Some(FieldData::Nodes(out)) = normalize(&nodes) else { panic!() };
//! assert_eq!(
//!     out,
//!     vec![
//!         Node::List { data: vec![vec![Node::text("a")], vec![Node::text("b")]] },
//!         Node::text("c"),
//!     ]
//! );
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{Node, decode_entities};

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'{2,}").unwrap());
static NOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\((.*?)\)\)").unwrap());
static LEADING_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*+ *").unwrap());

/// A normalized value: the bare text when the tree is a single text node,
/// otherwise the node sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldData {
    Text(String),
    Nodes(Vec<Node>),
}

impl FieldData {
    /// True for an empty string or an empty sequence.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldData::Text(text) => text.is_empty(),
            FieldData::Nodes(nodes) => nodes.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldData::Text(text) => Some(text),
            FieldData::Nodes(_) => None,
        }
    }
}

impl From<&str> for FieldData {
    fn from(text: &str) -> Self {
        FieldData::Text(text.to_string())
    }
}

/// Output under construction: the top-level sequence and, while inside a list
/// item, the index of the list that owns it.
#[derive(Default)]
struct Builder {
    out: Vec<Node>,
    open_list: Option<usize>,
    in_item: bool,
}

impl Builder {
    fn push(&mut self, nodes: Vec<Node>) {
        if self.in_item
            && let Some(idx) = self.open_list
            && let Some(Node::List { data }) = self.out.get_mut(idx)
            && let Some(item) = data.last_mut()
        {
            item.extend(nodes);
        } else {
            self.out.extend(nodes);
        }
    }

    /// Starts a fresh list at the top level. Lists never nest.
    fn open_list(&mut self) {
        self.out.push(Node::List { data: vec![Vec::new()] });
        self.open_list = Some(self.out.len() - 1);
        self.in_item = true;
    }

    fn bullet(&mut self) {
        if !self.in_item {
            self.open_list();
            return;
        }
        if let Some(idx) = self.open_list
            && let Some(Node::List { data }) = self.out.get_mut(idx)
        {
            data.push(Vec::new());
        }
    }

    fn close_list(&mut self) {
        self.in_item = false;
    }

    fn finish(self) -> FieldData {
        if let [Node::Text { text }] = self.out.as_slice() {
            return FieldData::Text(text.clone());
        }
        FieldData::Nodes(self.out)
    }
}

/// Normalizes a node sequence, returning `None` for an empty input.
pub fn normalize(ast: &[Node]) -> Option<FieldData> {
    if ast.is_empty() {
        return None;
    }

    let mut builder = Builder::default();

    for (i, node) in ast.iter().enumerate() {
        let text = match node {
            Node::Text { text } => text,
            other => {
                builder.push(vec![clean_node(other)]);
                continue;
            }
        };

        let mut text = strip_emphasis(&decode_entities(text));

        // A list at the very start is not preceded by a newline.
        if i == 0 && text.starts_with('*') {
            builder.open_list();
            text = text.trim_start_matches('*').trim_start_matches(' ').to_string();
        }

        let mut lines = text.split('\n');
        let Some(first) = lines.next() else { continue };
        let mut preceding = first.to_string();

        for line in lines {
            builder.push(split_notes(&preceding));
            if line.starts_with('*') {
                builder.bullet();
            } else {
                builder.close_list();
            }
            preceding = LEADING_BULLET.replace(line, "").into_owned();
        }
        builder.push(split_notes(&preceding));
    }

    Some(builder.finish())
}

/// Removes paired-quote emphasis markup (`''italic''`, `'''bold'''`).
pub fn strip_emphasis(text: &str) -> String {
    EMPHASIS.replace_all(text, "").into_owned()
}

/// Splits `((x))` annotations out of a text into sibling note nodes.
///
/// Empty pieces are dropped, so `"(())"` yields no nodes at all.
pub fn split_notes(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut last = 0;

    for caps in NOTE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        if whole.start() > last {
            nodes.push(Node::text(&text[last..whole.start()]));
        }
        if !inner.as_str().is_empty() {
            nodes.push(Node::Note { text: inner.as_str().to_string() });
        }
        last = whole.end();
    }
    if last < text.len() {
        nodes.push(Node::text(&text[last..]));
    }

    nodes
}

/// Copies a non-text node without its cosmetic `raw` markup.
fn clean_node(node: &Node) -> Node {
    match node {
        Node::Link { page, anchor, text, .. } => Node::Link {
            page: decode_entities(page).into_owned(),
            anchor: anchor.clone(),
            text: text.as_deref().map(|t| decode_entities(t).into_owned()),
            raw: None,
        },
        Node::Template { name, value, .. } => Node::Template {
            name: name.clone(),
            value: value.as_deref().map(|v| decode_entities(v).into_owned()),
            raw: None,
        },
        other => other.clone(),
    }
}
