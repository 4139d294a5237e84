use super::nodes::Span;

/// Renders `text` with its inline spans applied.
///
/// Span offsets are UTF-16 code units, as the authoring API emits them.
/// Spans are clamped to the text, empty spans are dropped, and a span that
/// crosses the end of an enclosing span is cut at that end so the output is
/// always properly nested.
pub(crate) fn render_spans(text: &str, spans: &[Span], out: &mut String) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    // UTF-16 offset at which each char starts.
    let utf16_starts: Vec<usize> = chars
        .iter()
        .scan(0, |offset, c| {
            let start = *offset;
            *offset += c.len_utf16();
            Some(start)
        })
        .collect();
    let to_char_index = |offset: usize| utf16_starts.partition_point(|&start| start < offset);

    let mut spans: Vec<Span> = spans
        .iter()
        .map(|span| Span {
            start: to_char_index(span.start),
            end: to_char_index(span.end),
            kind: span.kind.clone(),
            data: span.data.clone(),
        })
        .map(|span| clip(&span, 0, len))
        .filter(|span| span.start < span.end)
        .collect();
    sort_spans(&mut spans);

    render_range(&chars, 0, len, &spans, out);
}

fn render_range(chars: &[char], start: usize, end: usize, spans: &[Span], out: &mut String) {
    let mut cursor = start;
    let mut i = 0;

    while i < spans.len() {
        let span_start = spans[i].start.max(cursor);
        let span_end = spans[i].end.min(end);

        if span_start >= span_end {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < spans.len() && spans[j].start < span_end {
            j += 1;
        }

        let mut children: Vec<Span> = spans[i + 1..j]
            .iter()
            .map(|child| clip(child, span_start, span_end))
            .filter(|child| child.start < child.end)
            .collect();
        sort_spans(&mut children);

        push_text(out, &chars[cursor..span_start]);
        open_tag(&spans[i], out);
        render_range(chars, span_start, span_end, &children, out);
        close_tag(&spans[i], out);

        cursor = span_end;
        i = j;
    }

    push_text(out, &chars[cursor..end]);
}

fn clip(span: &Span, lower: usize, upper: usize) -> Span {
    Span {
        start: span.start.clamp(lower, upper),
        end: span.end.clamp(lower, upper),
        kind: span.kind.clone(),
        data: span.data.clone(),
    }
}

// Outer spans first: earlier start, then longer.
fn sort_spans(spans: &mut [Span]) {
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
}

fn push_text(out: &mut String, chars: &[char]) {
    let text: String = chars.iter().collect();
    let mut lines = text.split('\n');
    if let Some(first) = lines.next() {
        html_escape::encode_text_to_string(first, out);
    }
    for line in lines {
        out.push_str("<br />");
        html_escape::encode_text_to_string(line, out);
    }
}

fn open_tag(span: &Span, out: &mut String) {
    match span.kind.as_str() {
        "strong" => out.push_str("<strong>"),
        "em" => out.push_str("<em>"),
        "hyperlink" => {
            out.push_str("<a href=\"");
            html_escape::encode_double_quoted_attribute_to_string(
                span.data_str("url").unwrap_or_default(),
                out,
            );
            out.push('"');
            if let Some(target) = span.data_str("target") {
                out.push_str(" target=\"");
                html_escape::encode_double_quoted_attribute_to_string(target, out);
                out.push_str("\" rel=\"noopener noreferrer\"");
            }
            out.push('>');
        }
        "label" => {
            out.push_str("<span class=\"");
            html_escape::encode_double_quoted_attribute_to_string(
                span.data_str("label").unwrap_or_default(),
                out,
            );
            out.push_str("\">");
        }
        _ => {}
    }
}

fn close_tag(span: &Span, out: &mut String) {
    match span.kind.as_str() {
        "strong" => out.push_str("</strong>"),
        "em" => out.push_str("</em>"),
        "hyperlink" => out.push_str("</a>"),
        "label" => out.push_str("</span>"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str, spans: &[Span]) -> String {
        let mut out = String::new();
        render_spans(text, spans, &mut out);
        out
    }

    #[test]
    fn test_no_spans_escapes_text() {
        assert_eq!(render("a < b & c", &[]), "a &lt; b &amp; c");
    }

    #[test]
    fn test_single_span() {
        let spans = [Span::new(6, 11, "strong")];
        assert_eq!(render("Hello world!", &spans), "Hello <strong>world</strong>!");
    }

    #[test]
    fn test_nested_spans() {
        let spans = [Span::new(0, 4, "em"), Span::new(0, 11, "strong")];
        assert_eq!(
            render("bold italic", &spans),
            "<strong><em>bold</em> italic</strong>"
        );
    }

    #[test]
    fn test_crossing_spans_are_cut() {
        let spans = [Span::new(0, 5, "strong"), Span::new(3, 8, "em")];
        assert_eq!(render("abcdefgh", &spans), "<strong>abc<em>de</em></strong>fgh");
    }

    #[test]
    fn test_out_of_range_spans_are_clamped() {
        let spans = [Span::new(2, 99, "em"), Span::new(50, 60, "strong")];
        assert_eq!(render("abcd", &spans), "ab<em>cd</em>");
    }

    #[test]
    fn test_hyperlink_with_target() {
        let mut span = Span::hyperlink(0, 4, "https://example.com/?a=1&b=\"2\"");
        if let Some(data) = span.data.as_mut() {
            data["target"] = serde_json::json!("_blank");
        }
        assert_eq!(
            render("link", &[span]),
            "<a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\" target=\"_blank\" rel=\"noopener noreferrer\">link</a>"
        );
    }

    #[test]
    fn test_unknown_span_passes_text_through() {
        let spans = [Span::new(0, 3, "sparkle")];
        assert_eq!(render("abc", &spans), "abc");
    }

    #[test]
    fn test_offsets_count_characters() {
        let spans = [Span::new(0, 4, "em")];
        assert_eq!(render("ação!", &spans), "<em>ação</em>!");
    }

    #[test]
    fn test_offsets_are_utf16_units() {
        // The emoji is two UTF-16 units, so "bold" starts at 3.
        let spans = [Span::new(3, 7, "strong")];
        assert_eq!(render("😀 bold", &spans), "😀 <strong>bold</strong>");

        let spans = [Span::new(0, 2, "em"), Span::new(4, 6, "strong")];
        assert_eq!(
            render("😀 b😀d!", &spans),
            "<em>😀</em> b<strong>😀</strong>d!"
        );
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(render("one\ntwo", &[]), "one<br />two");
    }
}
