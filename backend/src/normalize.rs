//! Flatten a [`Table`] into the canonical text form.
//!
//! ```text
//! name,age,city        name$age$city
//! John,,New York  ──▶  John$ $New York
//! ```
//!
//! No escaping is applied: a value containing `$` or a newline cannot be
//! told apart from a separator in the output.

use crate::decode::Table;

/// Separator between rows.
pub const ROW_DELIMITER: char = '\n';

/// Separator between fields of one row.
pub const FIELD_DELIMITER: char = '$';

/// Emitted in place of an empty field.
pub const EMPTY_FIELD_PLACEHOLDER: &str = " ";

/// Render `table` as rows joined by `\n` and fields joined by `$`.
///
/// No trailing newline. An empty table yields an empty string.
pub fn normalize(table: &Table) -> String {
    let mut text = String::new();

    for (i, row) in table.rows().iter().enumerate() {
        if i > 0 {
            text.push(ROW_DELIMITER);
        }
        for (j, field) in row.iter().enumerate() {
            if j > 0 {
                text.push(FIELD_DELIMITER);
            }
            if field.is_empty() {
                text.push_str(EMPTY_FIELD_PLACEHOLDER);
            } else {
                text.push_str(field);
            }
        }
    }

    text
}
