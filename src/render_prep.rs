//! Text-to-block preparation for the layout stage.
//!
//! [`RenderPrep`] drives the line parser over raw input and turns its events
//! into [`Block`]s: emoji and separator runs are split out of every textual
//! segment, fenced code is cut back into one block per source line, and tables
//! are either flattened into list items or kept whole for card rendering.

use std::borrow::Cow;

use crate::emoji::segment_text;
use crate::markdown::{self, LineEvent, LineParseState};
use crate::segment::{Segment, TableRow};
use crate::table;

/// How buffered tables reach the layout stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// One list item per `label：value` pair.
    #[default]
    List,
    /// One [`Block::Table`] per table, painted as cards.
    Cards,
}

/// Preparation options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrepOptions {
    pub table_style: TableStyle,
    /// Treat literal `\n` escapes as line breaks when the text has no real
    /// newline.
    pub unescape_literal_newlines: bool,
}

impl Default for PrepOptions {
    fn default() -> Self {
        Self {
            table_style: TableStyle::List,
            unescape_literal_newlines: true,
        }
    }
}

impl PrepOptions {
    pub fn with_table_style(mut self, table_style: TableStyle) -> Self {
        self.table_style = table_style;
        self
    }

    pub fn with_unescape_literal_newlines(mut self, enabled: bool) -> Self {
        self.unescape_literal_newlines = enabled;
        self
    }
}

/// One prepared unit for the layout stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// One logical line of wrapped text.
    Text(Vec<Segment>),
    /// One source line of a fenced code block.
    CodeLine(Vec<Segment>),
    Blank,
    Rule,
    /// Whole table, only produced with [`TableStyle::Cards`].
    Table(Vec<TableRow>),
}

/// Replaces literal `\n` / `\r\n` escapes with real newlines when the text
/// contains escapes but no actual newline.
pub fn normalize_literal_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains("\\n") || text.contains('\n') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\\r\\n", "\n").replace("\\n", "\n"))
}

/// Splits emoji clusters and separator runs out of parsed segments while
/// keeping each source segment's attributes.
pub fn refine_segments(segments: &[Segment]) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.text.is_empty() {
            continue;
        }
        for piece in segment_text(&segment.text) {
            let mut refined = segment.with_text(piece.text);
            refined.is_emoji = piece.is_emoji;
            refined.no_wrap = segment.no_wrap || piece.no_wrap;
            if piece.is_emoji {
                refined.code = false;
            }
            out.push(refined);
        }
    }
    out
}

/// Segments for one line of fenced code. Emoji become ordinary emoji
/// segments so they are drawn as bitmaps instead of monospace text.
pub fn code_line_segments(line: &str) -> Vec<Segment> {
    segment_text(line)
        .into_iter()
        .map(|piece| {
            if piece.is_emoji {
                Segment::emoji(piece.text)
            } else {
                Segment::code_block(piece.text)
            }
        })
        .collect()
}

/// Streaming text-to-block builder.
#[derive(Clone, Debug, Default)]
pub struct RenderPrep {
    options: PrepOptions,
    state: LineParseState,
    blocks: Vec<Block>,
}

impl RenderPrep {
    pub fn new(options: PrepOptions) -> Self {
        Self {
            options,
            state: LineParseState::new(),
            blocks: Vec::new(),
        }
    }

    pub fn options(&self) -> PrepOptions {
        self.options
    }

    /// Prepares a whole input text.
    pub fn prepare(text: &str, options: PrepOptions) -> Vec<Block> {
        let text = if options.unescape_literal_newlines {
            normalize_literal_newlines(text)
        } else {
            Cow::Borrowed(text)
        };
        let mut prep = Self::new(options);
        for line in text.split('\n') {
            prep.push_line(line.strip_suffix('\r').unwrap_or(line));
        }
        prep.finish()
    }

    /// Feeds one logical line (without its newline).
    pub fn push_line(&mut self, line: &str) {
        let events = markdown::parse_line_events(line, &mut self.state);
        self.push_events(events);
    }

    /// Flushes open fences and tables and returns all blocks.
    pub fn finish(mut self) -> Vec<Block> {
        let events = markdown::finish(&mut self.state);
        self.push_events(events);
        self.blocks
    }

    fn push_events(&mut self, events: Vec<LineEvent>) {
        for event in events {
            match event {
                LineEvent::Segments(segments) => {
                    let refined = refine_segments(&segments);
                    if !refined.is_empty() {
                        self.blocks.push(Block::Text(refined));
                    }
                }
                LineEvent::Blank => self.blocks.push(Block::Blank),
                LineEvent::Rule => self.blocks.push(Block::Rule),
                LineEvent::CodeBlock { language, lines } => {
                    log::debug!(
                        "code block lang={:?} lines={}",
                        language,
                        lines.len()
                    );
                    self.blocks.extend(
                        lines
                            .iter()
                            .map(|line| Block::CodeLine(code_line_segments(line))),
                    );
                }
                LineEvent::Table(rows) => self.push_table(rows),
                // Blocks already end at every logical line.
                LineEvent::Break => {}
            }
        }
    }

    fn push_table(&mut self, rows: Vec<TableRow>) {
        match self.options.table_style {
            TableStyle::Cards => self.blocks.push(Block::Table(rows)),
            TableStyle::List => {
                for item in table::flatten_items(&rows) {
                    self.blocks.push(Block::Text(refine_segments(&item)));
                }
            }
        }
    }
}
