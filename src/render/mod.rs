//! Rich text rendering and derived content.
//!
//! Everything here is a pure function of the source payload: the same nodes
//! always produce the same markup, plain text and reading time.

mod nodes;
mod reading_time;
mod spans;

pub use nodes::{EmbedBlock, ImageBlock, OEmbed, RichTextNode, Span, TextBlock};
pub use reading_time::{WORDS_PER_MINUTE, count_words, estimate_minutes, estimate_minutes_at};

use crate::posts::{ContentBlock, RenderedSection};

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

/// Renders nodes to HTML.
///
/// Consecutive list items are grouped into one `<ul>` or `<ol>`. Unknown
/// nodes render nothing.
pub fn to_markup(nodes: &[RichTextNode]) -> String {
    let mut out = String::new();
    let mut open_list: Option<ListKind> = None;

    for node in nodes {
        let list_kind = match node {
            RichTextNode::ListItem(_) => Some(ListKind::Unordered),
            RichTextNode::OrderedListItem(_) => Some(ListKind::Ordered),
            _ => None,
        };

        if open_list != list_kind {
            if let Some(kind) = open_list {
                close_list(kind, &mut out);
            }
            if let Some(kind) = list_kind {
                out.push_str(match kind {
                    ListKind::Unordered => "<ul>",
                    ListKind::Ordered => "<ol>",
                });
            }
            open_list = list_kind;
        }

        render_node(node, &mut out);
    }

    if let Some(kind) = open_list {
        close_list(kind, &mut out);
    }

    out
}

/// The text of every text-bearing node, separated by single spaces.
pub fn to_plain_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .filter_map(RichTextNode::text)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_sections(content: &[ContentBlock]) -> Vec<RenderedSection> {
    content
        .iter()
        .map(|block| RenderedSection {
            heading: block.heading.clone(),
            html: to_markup(&block.body),
        })
        .collect()
}

fn close_list(kind: ListKind, out: &mut String) {
    out.push_str(match kind {
        ListKind::Unordered => "</ul>",
        ListKind::Ordered => "</ol>",
    });
}

fn render_node(node: &RichTextNode, out: &mut String) {
    let (tag, block) = match node {
        RichTextNode::Paragraph(block) => ("p", block),
        RichTextNode::Heading1(block) => ("h1", block),
        RichTextNode::Heading2(block) => ("h2", block),
        RichTextNode::Heading3(block) => ("h3", block),
        RichTextNode::Heading4(block) => ("h4", block),
        RichTextNode::Heading5(block) => ("h5", block),
        RichTextNode::Heading6(block) => ("h6", block),
        RichTextNode::Preformatted(block) => ("pre", block),
        RichTextNode::ListItem(block) | RichTextNode::OrderedListItem(block) => ("li", block),
        RichTextNode::Image(image) => {
            out.push_str("<p class=\"block-img\"><img src=\"");
            html_escape::encode_double_quoted_attribute_to_string(&image.url, out);
            out.push_str("\" alt=\"");
            html_escape::encode_double_quoted_attribute_to_string(
                image.alt.as_deref().unwrap_or_default(),
                out,
            );
            out.push_str("\" /></p>");
            return;
        }
        RichTextNode::Embed(embed) => {
            render_embed(embed, out);
            return;
        }
        RichTextNode::Unknown => return,
    };

    out.push('<');
    out.push_str(tag);
    out.push('>');
    spans::render_spans(&block.text, &block.spans, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

// Embed HTML comes from the source's oEmbed resolution and is emitted as-is.
fn render_embed(embed: &EmbedBlock, out: &mut String) {
    let oembed = &embed.oembed;
    out.push_str("<div data-oembed=\"");
    html_escape::encode_double_quoted_attribute_to_string(
        oembed.embed_url.as_deref().unwrap_or_default(),
        out,
    );
    out.push_str("\" data-oembed-type=\"");
    html_escape::encode_double_quoted_attribute_to_string(
        oembed.kind.as_deref().unwrap_or_default(),
        out,
    );
    out.push_str("\" data-oembed-provider=\"");
    html_escape::encode_double_quoted_attribute_to_string(
        oembed.provider_name.as_deref().unwrap_or_default(),
        out,
    );
    out.push_str("\">");
    out.push_str(oembed.html.as_deref().unwrap_or_default());
    out.push_str("</div>");
}
