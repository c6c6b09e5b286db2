//! Inline emphasis tokenizer (`**bold**`, `*italic*`, `` `code` ``, `~~strike~~`).

use crate::segment::{push_merged, Emphasis, Segment};

/// Markers in priority order; earlier entries win when two matches start at
/// the same byte.
const MARKERS: &[(&str, Emphasis)] = &[
    ("**", Emphasis::Bold),
    ("__", Emphasis::Bold),
    ("~~", Emphasis::Strike),
    ("``", Emphasis::Code),
    ("*", Emphasis::Italic),
    ("_", Emphasis::Italic),
    ("`", Emphasis::Code),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MarkerMatch {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
    emphasis: Emphasis,
}

/// Tokenizes one line of inline markup into styled segments.
///
/// Nested markup accumulates flags (`**a *b* c**` yields a bold-italic `b`),
/// and adjacent segments with identical attributes are merged.
pub fn tokenize(text: &str) -> Vec<Segment> {
    let mut raw = Vec::new();
    tokenize_into(text, &Segment::default(), &mut raw);

    let mut out = Vec::with_capacity(raw.len());
    for segment in raw {
        push_merged(&mut out, segment);
    }
    out
}

fn tokenize_into(text: &str, style: &Segment, out: &mut Vec<Segment>) {
    let mut rest = text;
    while !rest.is_empty() {
        let Some(m) = earliest_match(rest) else {
            out.push(style.with_text(rest));
            return;
        };
        if m.start > 0 {
            out.push(style.with_text(&rest[..m.start]));
        }
        let nested = style.clone().with_emphasis(m.emphasis);
        tokenize_into(&rest[m.inner_start..m.inner_end], &nested, out);
        rest = &rest[m.end..];
    }
}

fn earliest_match(text: &str) -> Option<MarkerMatch> {
    let mut best: Option<MarkerMatch> = None;
    for &(marker, emphasis) in MARKERS {
        let Some(found) = first_match(text, marker, emphasis) else {
            continue;
        };
        if best.is_none_or(|b| found.start < b.start) {
            best = Some(found);
        }
    }
    best
}

/// Leftmost lazy match of `marker(.+?)marker` with no newline in the inner text.
fn first_match(text: &str, marker: &str, emphasis: Emphasis) -> Option<MarkerMatch> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(marker) {
        let start = search_from + offset;
        let inner_start = start + marker.len();
        search_from = start + 1;

        let tail = &text[inner_start..];
        let Some(first) = tail.chars().next() else {
            return None;
        };
        if first == '\n' {
            continue;
        }
        let line_end = tail.find('\n').unwrap_or(tail.len());
        let body_from = first.len_utf8();
        if let Some(close) = tail[body_from..line_end].find(marker) {
            let inner_end = inner_start + body_from + close;
            return Some(MarkerMatch {
                start,
                inner_start,
                inner_end,
                end: inner_end + marker.len(),
                emphasis,
            });
        }
    }
    None
}
