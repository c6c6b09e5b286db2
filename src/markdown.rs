//! Line-oriented markdown parser with cross-line fence and table state.
//!
//! Input is fed one logical line at a time. Fenced code blocks and tables are
//! buffered in [`LineParseState`] and surface as a single event when they
//! close, either explicitly or because a later line interrupts them. Call
//! [`finish`] after the last line to flush anything still open.

use core::mem;

use crate::inline::tokenize;
use crate::segment::{Segment, TableCell, TableRow};
use crate::table;

const FENCE: &str = "```";
const MAX_HEADING_LEVEL: usize = 6;
const MIN_RULE_CHARS: usize = 3;

/// Parser mode carried between lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ParserMode {
    #[default]
    Plain,
    /// Inside a fenced code block; raw lines are buffered verbatim.
    InFence { language: String, lines: Vec<String> },
    /// Inside a table; rows are buffered until a non-table line arrives.
    InTable {
        rows: Vec<TableRow>,
        header_parsed: bool,
    },
}

/// Per-render parser state. Create one per input text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineParseState {
    mode: ParserMode,
}

impl LineParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &ParserMode {
        &self.mode
    }

    pub fn is_in_fence(&self) -> bool {
        matches!(self.mode, ParserMode::InFence { .. })
    }

    pub fn is_in_table(&self) -> bool {
        matches!(self.mode, ParserMode::InTable { .. })
    }
}

/// Structured result of parsing one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// Styled content of one logical line.
    Segments(Vec<Segment>),
    /// Empty input line outside tables.
    Blank,
    /// Horizontal rule.
    Rule,
    /// A fenced code block closed (or was flushed at end of input).
    CodeBlock {
        language: String,
        lines: Vec<String>,
    },
    /// A buffered table closed.
    Table(Vec<TableRow>),
    /// Separates a flushed table from the line that interrupted it.
    Break,
}

impl LineEvent {
    /// Flat segment form of this event.
    pub fn into_segments(self) -> Vec<Segment> {
        match self {
            Self::Segments(segments) => segments,
            Self::Blank => Vec::new(),
            Self::Rule => vec![Segment::horizontal_rule()],
            Self::CodeBlock { lines, .. } => vec![Segment::code_block(lines.join("\n"))],
            Self::Table(rows) => table::flatten(&rows),
            Self::Break => vec![Segment::line_break()],
        }
    }
}

/// Parses one line into flat segments, updating `state`.
///
/// Returns nothing while a fence or table is buffering.
pub fn parse_line(line: &str, state: &mut LineParseState) -> Vec<Segment> {
    parse_line_events(line, state)
        .into_iter()
        .flat_map(LineEvent::into_segments)
        .collect()
}

/// Parses one line into structured events, updating `state`.
pub fn parse_line_events(line: &str, state: &mut LineParseState) -> Vec<LineEvent> {
    if state.is_in_fence() {
        if line.trim() == FENCE {
            return close_fence(state).into_iter().collect();
        }
        if let ParserMode::InFence { lines, .. } = &mut state.mode {
            lines.push(line.to_string());
        }
        return Vec::new();
    }

    if line.is_empty() {
        if state.is_in_table() {
            return Vec::new();
        }
        return vec![LineEvent::Blank];
    }

    if let Some(language) = fence_language(line) {
        let events = flush_table(state);
        state.mode = ParserMode::InFence {
            language: language.to_string(),
            lines: Vec::new(),
        };
        return events;
    }

    if is_rule(line) {
        if state.is_in_table() {
            // The rule only terminates the table.
            return flush_table(state);
        }
        return vec![LineEvent::Rule];
    }

    if let Some(cells) = table_cells(line) {
        push_table_row(state, &cells);
        return Vec::new();
    }

    if state.is_in_table() {
        let mut events = flush_table(state);
        let segments = parse_content_line(line);
        if !segments.is_empty() {
            if !events.is_empty() {
                events.push(LineEvent::Break);
            }
            events.push(LineEvent::Segments(segments));
        }
        return events;
    }

    let segments = parse_content_line(line);
    if segments.is_empty() {
        return Vec::new();
    }
    vec![LineEvent::Segments(segments)]
}

/// Flushes an unterminated fence or open table at end of input.
pub fn finish(state: &mut LineParseState) -> Vec<LineEvent> {
    if let ParserMode::InFence { lines, .. } = &state.mode {
        log::warn!(
            "unterminated code fence at end of input ({} buffered lines)",
            lines.len()
        );
        return close_fence(state).into_iter().collect();
    }
    flush_table(state)
}

fn close_fence(state: &mut LineParseState) -> Option<LineEvent> {
    match mem::take(&mut state.mode) {
        ParserMode::InFence { language, lines } => Some(LineEvent::CodeBlock { language, lines }),
        other => {
            state.mode = other;
            None
        }
    }
}

fn flush_table(state: &mut LineParseState) -> Vec<LineEvent> {
    match mem::take(&mut state.mode) {
        ParserMode::InTable { rows, .. } if rows.is_empty() => Vec::new(),
        ParserMode::InTable { rows, .. } => {
            log::debug!("flushing table with {} rows", rows.len());
            vec![LineEvent::Table(rows)]
        }
        other => {
            state.mode = other;
            Vec::new()
        }
    }
}

fn push_table_row(state: &mut LineParseState, cells: &[&str]) {
    if !state.is_in_table() {
        state.mode = ParserMode::InTable {
            rows: Vec::new(),
            header_parsed: false,
        };
    }
    let ParserMode::InTable {
        rows,
        header_parsed,
    } = &mut state.mode
    else {
        return;
    };

    if is_separator_row(cells) {
        *header_parsed = true;
        return;
    }

    let is_header = !*header_parsed && rows.is_empty();
    let cells = cells
        .iter()
        .map(|text| TableCell {
            text: (*text).to_string(),
            segments: tokenize(text),
        })
        .collect();
    rows.push(TableRow { cells, is_header });
}

/// Headings, quotes, lists, and plain inline text.
fn parse_content_line(line: &str) -> Vec<Segment> {
    if let Some((level, content)) = heading(line) {
        return tokenize(content)
            .into_iter()
            .map(|s| s.with_heading(level))
            .collect();
    }

    if let Some(quoted) = line.strip_prefix('>') {
        return tokenize(quoted.trim_start())
            .into_iter()
            .map(Segment::with_quote)
            .collect();
    }

    if let Some(item) = list_item(line) {
        return tokenize(item.content)
            .into_iter()
            .map(|s| {
                s.with_list_item(
                    item.ordinal.is_some(),
                    item.indent_level,
                    item.ordinal.unwrap_or(0),
                )
            })
            .collect();
    }

    tokenize(line)
}

/// Language tag of an opening fence (```` ```rust ````), if `line` is one.
fn fence_language(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(FENCE)?;
    let tag_end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (tag, trailing) = rest.split_at(tag_end);
    trailing.chars().all(char::is_whitespace).then_some(tag)
}

fn is_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= MIN_RULE_CHARS
        && trimmed
            .chars()
            .all(|c| c.is_whitespace() || matches!(c, '-' | '*' | '_'))
}

/// Trimmed cells of a `| a | b |` row.
fn table_cells(line: &str) -> Option<Vec<&str>> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_prefix('|')?.strip_suffix('|')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.split('|').map(str::trim).collect())
}

fn is_separator_row(cells: &[&str]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            !cell.is_empty()
                && cell
                    .chars()
                    .all(|c| c.is_whitespace() || c == '-' || c == ':')
        })
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let content = rest.trim_start();
    if content.is_empty() {
        return None;
    }
    Some((hashes as u8, content))
}

struct ListItem<'a> {
    indent_level: usize,
    ordinal: Option<u32>,
    content: &'a str,
}

fn list_item(line: &str) -> Option<ListItem<'_>> {
    let body = line.trim_start();
    let indent = line[..line.len() - body.len()].chars().count();

    let (ordinal, after_marker) = if let Some(rest) = body.strip_prefix(['*', '+', '-']) {
        (None, rest)
    } else {
        let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let rest = body[digits..].strip_prefix('.')?;
        let ordinal = body[..digits].parse::<u32>().unwrap_or(u32::MAX);
        (Some(ordinal), rest)
    };

    if !after_marker.starts_with(char::is_whitespace) {
        return None;
    }
    let content = after_marker.trim_start();
    if content.is_empty() {
        return None;
    }
    Some(ListItem {
        indent_level: indent / 2,
        ordinal,
        content,
    })
}
