//! Markdown-flavored text parsing for raster text cards.
//!
//! This crate turns raw text into styled [`Segment`]s: it tracks fenced code
//! blocks and tables across lines, tokenizes inline emphasis, splits emoji
//! clusters and decorative separator runs, and flattens tables into labeled
//! list items. Layout and painting live in `text2image-render`.
//!
//! ```
//! use text2image::{parse_line, LineParseState};
//!
//! let mut state = LineParseState::new();
//! let segments = parse_line("# Hello **world**", &mut state);
//! assert_eq!(segments.len(), 2);
//! assert!(segments.iter().all(|s| s.heading_level == 1));
//! assert!(segments[1].bold);
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod emoji;
pub mod inline;
pub mod markdown;
pub mod render_prep;
pub mod segment;
pub mod table;

pub use emoji::{codepoint_keys, contains_emoji, is_separator_char, segment_text};
pub use inline::tokenize;
pub use markdown::{finish, parse_line, parse_line_events, LineEvent, LineParseState, ParserMode};
pub use render_prep::{normalize_literal_newlines, Block, PrepOptions, RenderPrep, TableStyle};
pub use segment::{Emphasis, Segment, TableCell, TableRow};
pub use table::{column_labels, data_rows, flatten, flatten_items};
