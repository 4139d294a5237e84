use serde::{Deserialize, Serialize};
use tracing::debug;

/// A structured rich text node as emitted by the content source.
///
/// The vocabulary belongs to the upstream authoring system and grows over
/// time, so anything unrecognised deserializes to [`RichTextNode::Unknown`]
/// instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RichTextNode {
    #[serde(rename = "paragraph")]
    Paragraph(TextBlock),
    #[serde(rename = "heading1")]
    Heading1(TextBlock),
    #[serde(rename = "heading2")]
    Heading2(TextBlock),
    #[serde(rename = "heading3")]
    Heading3(TextBlock),
    #[serde(rename = "heading4")]
    Heading4(TextBlock),
    #[serde(rename = "heading5")]
    Heading5(TextBlock),
    #[serde(rename = "heading6")]
    Heading6(TextBlock),
    #[serde(rename = "preformatted")]
    Preformatted(TextBlock),
    #[serde(rename = "list-item")]
    ListItem(TextBlock),
    #[serde(rename = "o-list-item")]
    OrderedListItem(TextBlock),
    #[serde(rename = "image")]
    Image(ImageBlock),
    #[serde(rename = "embed")]
    Embed(EmbedBlock),
    #[serde(other)]
    Unknown,
}

impl RichTextNode {
    /// Narrows one raw node. Nodes that do not fit the known shapes degrade to
    /// `Unknown` rather than failing.
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<RichTextNode>(value) {
            Ok(node) => node,
            Err(e) => {
                debug!("Treating unrecognised rich text node as unknown: {}", e);
                RichTextNode::Unknown
            }
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        RichTextNode::Paragraph(TextBlock::plain(text))
    }

    /// The text of text-bearing nodes.
    pub fn text(&self) -> Option<&str> {
        match self {
            RichTextNode::Paragraph(block)
            | RichTextNode::Heading1(block)
            | RichTextNode::Heading2(block)
            | RichTextNode::Heading3(block)
            | RichTextNode::Heading4(block)
            | RichTextNode::Heading5(block)
            | RichTextNode::Heading6(block)
            | RichTextNode::Preformatted(block)
            | RichTextNode::ListItem(block)
            | RichTextNode::OrderedListItem(block) => Some(&block.text),
            RichTextNode::Image(_) | RichTextNode::Embed(_) | RichTextNode::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl TextBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.spans.push(span);
        self
    }
}

/// Inline formatting over a character range of a [`TextBlock`].
///
/// Offsets count UTF-16 code units. `kind` stays a string so span kinds
/// added upstream pass through as plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Span {
    pub fn new(start: usize, end: usize, kind: impl Into<String>) -> Self {
        Self {
            start,
            end,
            kind: kind.into(),
            data: None,
        }
    }

    pub fn hyperlink(start: usize, end: usize, url: impl Into<String>) -> Self {
        Self {
            start,
            end,
            kind: "hyperlink".to_string(),
            data: Some(serde_json::json!({ "url": url.into() })),
        }
    }

    pub(crate) fn data_str(&self, field: &str) -> Option<&str> {
        self.data.as_ref()?.get(field)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedBlock {
    pub oembed: OEmbed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OEmbed {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_node_deserializes() {
        let node = RichTextNode::from_value(json!({
            "type": "paragraph",
            "text": "Hello",
            "spans": [{ "start": 0, "end": 5, "type": "strong" }]
        }));
        match node {
            RichTextNode::Paragraph(block) => {
                assert_eq!(block.text, "Hello");
                assert_eq!(block.spans.len(), 1);
                assert_eq!(block.spans[0].kind, "strong");
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_becomes_unknown() {
        let node = RichTextNode::from_value(json!({ "type": "carousel", "slides": [] }));
        assert_eq!(node, RichTextNode::Unknown);
    }

    #[test]
    fn test_malformed_known_kind_becomes_unknown() {
        let node = RichTextNode::from_value(json!({ "type": "image" }));
        assert_eq!(node, RichTextNode::Unknown);

        let node = RichTextNode::from_value(json!("just a string"));
        assert_eq!(node, RichTextNode::Unknown);
    }

    #[test]
    fn test_missing_spans_default_to_empty() {
        let node = RichTextNode::from_value(json!({ "type": "list-item", "text": "one" }));
        assert_eq!(node, RichTextNode::ListItem(TextBlock::plain("one")));
    }
}
