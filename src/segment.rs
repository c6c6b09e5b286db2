//! Styled text segments shared by the parser, layout, and compositor.

/// Inline emphasis flag carried by a [`Segment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emphasis {
    Bold,
    Italic,
    Code,
    Strike,
}

/// Atomic unit of styled text.
///
/// Style flags come from inline markup, line attributes from the block the
/// text belongs to (heading, quote, code block, rule), and list attributes
/// from list markers or flattened tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    /// Visible text. Empty for rules and line-break markers.
    pub text: String,
    /// One emoji cluster rendered as a bitmap.
    pub is_emoji: bool,
    /// Must be placed whole on one physical line.
    pub no_wrap: bool,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
    /// Heading level, `0` when the line is not a heading.
    pub heading_level: u8,
    pub is_quote: bool,
    pub is_code_block: bool,
    pub is_horizontal_rule: bool,
    pub is_list_item: bool,
    pub is_ordered: bool,
    /// Nesting depth; two leading spaces per level.
    pub indent_level: usize,
    /// Ordered list number, `0` for unordered items.
    pub ordinal: u32,
    /// Set on every physical line of a list item after the first.
    pub is_continuation: bool,
}

impl Segment {
    /// Plain unstyled text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A single emoji cluster.
    pub fn emoji(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_emoji: true,
            ..Self::default()
        }
    }

    /// Text that must not be split across lines.
    pub fn atomic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            no_wrap: true,
            ..Self::default()
        }
    }

    /// Whole-line horizontal rule marker.
    pub fn horizontal_rule() -> Self {
        Self {
            is_horizontal_rule: true,
            ..Self::default()
        }
    }

    /// Marker separating a flushed table from the line that interrupted it.
    pub fn line_break() -> Self {
        Self::default()
    }

    /// Buffered fenced code block joined with `\n`.
    pub fn code_block(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            no_wrap: true,
            is_code_block: true,
            ..Self::default()
        }
    }

    pub fn is_line_break(&self) -> bool {
        self.text.is_empty() && *self == Self::default()
    }

    /// Emoji, separator runs, and code-block text are placed as one unit.
    pub fn is_atomic(&self) -> bool {
        self.is_emoji || self.no_wrap || self.is_code_block
    }

    pub fn has(&self, emphasis: Emphasis) -> bool {
        match emphasis {
            Emphasis::Bold => self.bold,
            Emphasis::Italic => self.italic,
            Emphasis::Code => self.code,
            Emphasis::Strike => self.strike,
        }
    }

    /// Returns a copy with `emphasis` added to the existing flags.
    pub fn with_emphasis(mut self, emphasis: Emphasis) -> Self {
        match emphasis {
            Emphasis::Bold => self.bold = true,
            Emphasis::Italic => self.italic = true,
            Emphasis::Code => self.code = true,
            Emphasis::Strike => self.strike = true,
        }
        self
    }

    pub fn with_heading(mut self, level: u8) -> Self {
        self.heading_level = level;
        self
    }

    pub fn with_quote(mut self) -> Self {
        self.is_quote = true;
        self
    }

    /// Stamps list attributes. `ordinal` is ignored for unordered items.
    pub fn with_list_item(mut self, ordered: bool, indent_level: usize, ordinal: u32) -> Self {
        self.is_list_item = true;
        self.is_ordered = ordered;
        self.indent_level = indent_level;
        self.ordinal = if ordered { ordinal } else { 0 };
        self
    }

    pub fn with_continuation(mut self, continuation: bool) -> Self {
        self.is_continuation = continuation;
        self
    }

    /// Copy of this segment's attributes carrying different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    /// True when every attribute except the text matches.
    pub fn same_attributes(&self, other: &Self) -> bool {
        self.is_emoji == other.is_emoji
            && self.no_wrap == other.no_wrap
            && self.bold == other.bold
            && self.italic == other.italic
            && self.code == other.code
            && self.strike == other.strike
            && self.heading_level == other.heading_level
            && self.is_quote == other.is_quote
            && self.is_code_block == other.is_code_block
            && self.is_horizontal_rule == other.is_horizontal_rule
            && self.is_list_item == other.is_list_item
            && self.is_ordered == other.is_ordered
            && self.indent_level == other.indent_level
            && self.ordinal == other.ordinal
            && self.is_continuation == other.is_continuation
    }

    /// Whether `other` can be appended to this segment without changing how
    /// either renders.
    pub fn can_merge(&self, other: &Self) -> bool {
        !self.text.is_empty()
            && !other.text.is_empty()
            && !self.is_emoji
            && !other.is_emoji
            && !self.no_wrap
            && !other.no_wrap
            && self.same_attributes(other)
    }
}

/// Appends `segment`, merging it into the previous one when attributes match.
pub(crate) fn push_merged(out: &mut Vec<Segment>, segment: Segment) {
    if let Some(last) = out.last_mut() {
        if last.can_merge(&segment) {
            last.text.push_str(&segment.text);
            return;
        }
    }
    out.push(segment);
}

/// One table cell: raw text plus its tokenized segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    pub segments: Vec<Segment>,
}

impl TableCell {
    /// Visible text of the tokenized content.
    pub fn visible_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Buffered table row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub is_header: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_is_accumulated_without_clearing_existing_flags() {
        let seg = Segment::plain("x")
            .with_emphasis(Emphasis::Bold)
            .with_emphasis(Emphasis::Italic);
        assert!(seg.has(Emphasis::Bold));
        assert!(seg.has(Emphasis::Italic));
        assert!(!seg.has(Emphasis::Code));
    }

    #[test]
    fn line_break_marker_is_distinct_from_rule() {
        assert!(Segment::line_break().is_line_break());
        assert!(!Segment::horizontal_rule().is_line_break());
        assert!(!Segment::plain("a").is_line_break());
    }

    #[test]
    fn unordered_items_drop_ordinal() {
        let seg = Segment::plain("a").with_list_item(false, 2, 7);
        assert_eq!(seg.ordinal, 0);
        assert_eq!(seg.indent_level, 2);
        let seg = Segment::plain("a").with_list_item(true, 0, 7);
        assert_eq!(seg.ordinal, 7);
    }

    #[test]
    fn merge_rules_exclude_atomic_and_empty_segments() {
        let a = Segment::plain("a");
        assert!(a.can_merge(&Segment::plain("b")));
        assert!(!a.can_merge(&Segment::emoji("😀")));
        assert!(!a.can_merge(&Segment::atomic("---")));
        assert!(!a.can_merge(&Segment::plain("")));
        assert!(!a.can_merge(&Segment::plain("b").with_emphasis(Emphasis::Bold)));
    }

    #[test]
    fn push_merged_joins_matching_neighbors() {
        let mut out = Vec::new();
        push_merged(&mut out, Segment::plain("ab"));
        push_merged(&mut out, Segment::plain("cd"));
        push_merged(&mut out, Segment::emoji("😀"));
        push_merged(&mut out, Segment::plain("e"));
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text, "abcd");
    }
}
