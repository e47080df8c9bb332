//! CSV decoding.
//!
//! Comma-delimited, `"`-quoted, no header row: every record becomes a
//! [`Row`]. Rows may differ in length. Blank lines are skipped.

use csv::ReaderBuilder;

use crate::acquire::RawContent;
use crate::encoding::decode_text;
use crate::error::{PipelineError, PipelineResult};

/// One CSV record, fields in source order.
pub type Row = Vec<String>;

/// A decoded dataset snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row, in fields.
    pub fn max_width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for Table {
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        Table::new(
            iter.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// Decode acquired content.
pub fn decode(raw: RawContent) -> PipelineResult<Table> {
    decode_bytes(&raw.bytes)
}

/// Decode raw bytes (any supported text encoding).
pub fn decode_bytes(bytes: &[u8]) -> PipelineResult<Table> {
    let (text, _encoding) = decode_text(bytes);
    decode_str(&text)
}

/// Decode CSV text. Entry point for inline string uploads.
pub fn decode_str(content: &str) -> PipelineResult<Table> {
    check_quoting(content)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(rows))
}

#[derive(Clone, Copy)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Reject unbalanced or misplaced quotes.
///
/// The `csv` reader accepts these silently and would swallow the rest of
/// the input into one field.
fn check_quoting(content: &str) -> PipelineResult<()> {
    let mut state = QuoteState::FieldStart;
    let mut line: u64 = 1;
    let mut quote_opened_at: u64 = 1;

    for b in content.bytes() {
        state = match (state, b) {
            (QuoteState::FieldStart, b'"') => {
                quote_opened_at = line;
                QuoteState::Quoted
            }
            (QuoteState::FieldStart, b',' | b'\r' | b'\n') => QuoteState::FieldStart,
            (QuoteState::FieldStart, _) => QuoteState::Unquoted,

            (QuoteState::Unquoted, b'"') => {
                return Err(PipelineError::malformed(line, "bare \" in non-quoted field"));
            }
            (QuoteState::Unquoted, b',' | b'\r' | b'\n') => QuoteState::FieldStart,
            (QuoteState::Unquoted, _) => QuoteState::Unquoted,

            (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,

            (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, b',' | b'\r' | b'\n') => QuoteState::FieldStart,
            (QuoteState::QuoteInQuoted, _) => {
                return Err(PipelineError::malformed(
                    line,
                    "extraneous or missing \" in quoted field",
                ));
            }
        };

        if b == b'\n' {
            line += 1;
        }
    }

    if let QuoteState::Quoted = state {
        return Err(PipelineError::malformed(
            quote_opened_at,
            "unterminated quoted field",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::Provenance;

    fn rows(content: &str) -> Vec<Row> {
        decode_str(content).unwrap().into_rows()
    }

    #[test]
    fn test_simple_csv() {
        let csv = "name,age,city\nJohn,30,New York\nAlice,25,Los Angeles\nBob,35,Chicago";
        assert_eq!(
            rows(csv),
            vec![
                vec!["name", "age", "city"],
                vec!["John", "30", "New York"],
                vec!["Alice", "25", "Los Angeles"],
                vec!["Bob", "35", "Chicago"],
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let table = decode_str("").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.max_width(), 0);
    }

    #[test]
    fn test_first_row_is_data() {
        let table = decode_str("only,one,row").unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ragged_rows() {
        let table = decode_str("a,b,c\n1\n2,3").unwrap();
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.rows()[1].len(), 1);
        assert_eq!(table.rows()[2].len(), 2);
        assert_eq!(table.max_width(), 3);
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let csv = "id,note\n1,\"Hello, World\"\n2,\"line one\nline two\"\n3,\"say \"\"hi\"\"\"";
        let rows = rows(csv);
        assert_eq!(rows[1], vec!["1", "Hello, World"]);
        assert_eq!(rows[2], vec!["2", "line one\nline two"]);
        assert_eq!(rows[3], vec!["3", "say \"hi\""]);
    }

    #[test]
    fn test_empty_fields_preserved() {
        assert_eq!(rows("a,,c\n,,"), vec![vec!["a", "", "c"], vec!["", "", ""]]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        assert_eq!(
            rows("a,b\r\n\r\nc,d\r\n"),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let err = decode_str("a,b\n1,\"never closed\n2,3").unwrap_err();
        match err {
            PipelineError::MalformedCsv { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("unterminated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bare_quote() {
        let err = decode_str("a,b\nx,ab\"c\n").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedCsv { line: 2, .. }));
    }

    #[test]
    fn test_text_after_closing_quote() {
        let err = decode_str("\"ab\"c,d").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedCsv { line: 1, .. }));
    }

    #[test]
    fn test_decode_raw_content() {
        let raw = RawContent::new(b"x,y\n1,2\n".to_vec(), Provenance::LocalFile);
        assert_eq!(
            decode(raw).unwrap(),
            Table::from_iter(vec![vec!["x", "y"], vec!["1", "2"]])
        );
    }

    #[test]
    fn test_decode_latin1_bytes() {
        let table = decode_bytes(b"city\nMontr\xe9al\n").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows()[1][0].starts_with("Montr"));
    }
}
