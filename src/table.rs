//! Flattens buffered table rows into labeled list items.
//!
//! Tables are not laid out as grids. Every data cell becomes a `label：value`
//! pair rendered as an unordered list item, with labels taken from the first
//! header row.

use crate::segment::{Segment, TableRow};

/// Separator appended to every label (fullwidth colon).
pub const LABEL_SUFFIX: char = '：';

/// Default label for a 0-based column index.
pub fn default_label(column: usize) -> String {
    format!("Field {}", column + 1)
}

/// Column labels: the first header row's cell texts, or `Field 1..n` up to
/// the widest row when no header exists.
pub fn column_labels(rows: &[TableRow]) -> Vec<String> {
    if let Some(header) = rows.iter().find(|row| row.is_header) {
        return header.cells.iter().map(|cell| cell.text.clone()).collect();
    }
    let columns = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
    (0..columns).map(default_label).collect()
}

/// Rows other than the first header row. When only header rows exist, every
/// row is treated as data.
pub fn data_rows(rows: &[TableRow]) -> Vec<&TableRow> {
    let header_index = rows.iter().position(|row| row.is_header);
    let data: Vec<&TableRow> = rows
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != header_index)
        .map(|(_, row)| row)
        .collect();
    if data.is_empty() {
        return rows.iter().collect();
    }
    data
}

/// Label text for `column`, falling back to the default when the row is wider
/// than the header.
pub fn label_for(labels: &[String], column: usize) -> String {
    labels
        .get(column)
        .cloned()
        .unwrap_or_else(|| default_label(column))
}

fn stamp(segment: Segment) -> Segment {
    segment.with_list_item(false, 0, 0)
}

/// One segment list per `label：value` pair, in row-major order.
pub fn flatten_items(rows: &[TableRow]) -> Vec<Vec<Segment>> {
    let labels = column_labels(rows);
    let mut items = Vec::new();
    for row in data_rows(rows) {
        for (column, cell) in row.cells.iter().enumerate() {
            let label = format!("{}{}", label_for(&labels, column), LABEL_SUFFIX);
            let mut item = vec![stamp(Segment::plain(label))];
            if !cell.visible_text().is_empty() {
                item.extend(cell.segments.iter().cloned().map(stamp));
            }
            items.push(item);
        }
    }
    items
}

/// Flat segment sequence of all label/value pairs.
pub fn flatten(rows: &[TableRow]) -> Vec<Segment> {
    flatten_items(rows).into_iter().flatten().collect()
}
