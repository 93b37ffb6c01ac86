//! Lexical rules for parsing and printing rows.
//!
//! A [`Dialect`] is built once from the validated configuration and shared
//! read-only by every operation. Parsing and printing go through the `csv`
//! crate; this module only maps the configured options onto it and wraps
//! the results into [`Row`]s.

use crate::error::{CoreError, CoreResult};
use crate::record::Row;
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// When fields are quoted on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    /// Quote only fields that need it.
    Minimal,
    /// Quote every field.
    All,
    /// Quote every field that is not a number.
    NonNumeric,
    /// Never quote.
    None,
}

impl QuoteMode {
    /// Every supported mode, in the order used by error messages.
    pub const ALL_MODES: [QuoteMode; 4] = [
        QuoteMode::All,
        QuoteMode::Minimal,
        QuoteMode::NonNumeric,
        QuoteMode::None,
    ];

    /// Returns the configuration name of the mode.
    pub const fn name(self) -> &'static str {
        match self {
            QuoteMode::Minimal => "MINIMAL",
            QuoteMode::All => "ALL",
            QuoteMode::NonNumeric => "NON_NUMERIC",
            QuoteMode::None => "NONE",
        }
    }

    fn style(self) -> csv::QuoteStyle {
        match self {
            QuoteMode::Minimal => csv::QuoteStyle::Necessary,
            QuoteMode::All => csv::QuoteStyle::Always,
            QuoteMode::NonNumeric => csv::QuoteStyle::NonNumeric,
            QuoteMode::None => csv::QuoteStyle::Never,
        }
    }
}

impl FromStr for QuoteMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_MODES
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let supported: Vec<&str> = Self::ALL_MODES.iter().map(|m| m.name()).collect();
                CoreError::configuration(format!(
                    "quote mode '{s}' is not supported, supported values: [{}]",
                    supported.join(",")
                ))
            })
    }
}

impl fmt::Display for QuoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Line terminator written after every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSeparator {
    /// `\r\n` on output; `\r`, `\n` or `\r\n` accepted on input.
    Crlf,
    /// `\n` on output; `\r`, `\n` or `\r\n` accepted on input.
    Lf,
    /// Any other single byte.
    Byte(u8),
}

impl RecordSeparator {
    fn read_terminator(self) -> csv::Terminator {
        match self {
            RecordSeparator::Crlf | RecordSeparator::Lf => csv::Terminator::CRLF,
            RecordSeparator::Byte(b) => csv::Terminator::Any(b),
        }
    }

    fn write_terminator(self) -> csv::Terminator {
        match self {
            RecordSeparator::Crlf => csv::Terminator::CRLF,
            RecordSeparator::Lf => csv::Terminator::Any(b'\n'),
            RecordSeparator::Byte(b) => csv::Terminator::Any(b),
        }
    }
}

impl FromStr for RecordSeparator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            b"\r\n" => Ok(RecordSeparator::Crlf),
            b"\n" => Ok(RecordSeparator::Lf),
            [b] => Ok(RecordSeparator::Byte(*b)),
            _ => Err(CoreError::configuration(format!(
                "record separator {s:?} is not supported, use \"\\r\\n\", \"\\n\" or a single character"
            ))),
        }
    }
}

/// Immutable description of the text encoding of the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Field delimiter.
    pub field_delimiter: u8,
    /// Quote character.
    pub quote: u8,
    /// Escape character.
    pub escape: u8,
    /// Lines starting with this byte are skipped.
    pub comment_marker: u8,
    /// Line terminator.
    pub record_separator: RecordSeparator,
    /// Output quoting policy.
    pub quote_mode: QuoteMode,
    /// Separator between values of a multi-valued cell.
    pub multivalue_delimiter: Option<String>,
    /// Whether the first non-blank row is a header.
    pub header_exists: bool,
    /// Trim whitespace around every field.
    pub trim: bool,
    /// Skip rows whose cells are all blank.
    pub ignore_empty_lines: bool,
    /// Ignore spaces around quoted fields.
    pub ignore_surrounding_spaces: bool,
    /// Every row ends with a field delimiter.
    pub trailing_delimiter: bool,
    /// Match unique attribute values ignoring case.
    pub ignore_identifier_case: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            field_delimiter: b';',
            quote: b'"',
            escape: b'\\',
            comment_marker: b'#',
            record_separator: RecordSeparator::Crlf,
            quote_mode: QuoteMode::Minimal,
            multivalue_delimiter: None,
            header_exists: true,
            trim: false,
            ignore_empty_lines: true,
            ignore_surrounding_spaces: false,
            trailing_delimiter: false,
            ignore_identifier_case: false,
        }
    }
}

impl Dialect {
    /// Returns a row iterator over `input`.
    pub fn rows<R: Read>(&self, input: R) -> RowReader<R> {
        let trim = if self.trim || self.ignore_surrounding_spaces {
            csv::Trim::All
        } else {
            csv::Trim::None
        };
        let inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.field_delimiter)
            .quote(self.quote)
            .escape(Some(self.escape))
            .double_quote(true)
            .comment(Some(self.comment_marker))
            .terminator(self.record_separator.read_terminator())
            .trim(trim)
            .from_reader(input);

        RowReader {
            records: inner.into_records(),
            trailing_delimiter: self.trailing_delimiter,
        }
    }

    /// Returns the data rows of `input`, skipping blank rows and the header.
    pub fn data_rows<'a, R: Read + 'a>(
        &'a self,
        input: R,
    ) -> impl Iterator<Item = CoreResult<Row>> + 'a {
        let mut header_pending = self.header_exists;
        self.rows(input).filter(move |row| match row {
            Ok(row) if self.is_blank(row) => false,
            Ok(_) if header_pending => {
                header_pending = false;
                false
            }
            _ => true,
        })
    }

    /// Returns a writer collecting rows into an in-memory buffer.
    pub fn writer(&self) -> RowWriter {
        let inner = csv::WriterBuilder::new()
            .flexible(true)
            .delimiter(self.field_delimiter)
            .quote(self.quote)
            .quote_style(self.quote_mode.style())
            .double_quote(true)
            .escape(self.escape)
            .comment(Some(self.comment_marker))
            .terminator(self.record_separator.write_terminator())
            .from_writer(Vec::new());

        RowWriter {
            inner,
            trailing_delimiter: self.trailing_delimiter,
            rows: 0,
        }
    }

    /// Returns true if the row only holds blank cells and blank rows are ignored.
    pub fn is_blank(&self, row: &Row) -> bool {
        self.ignore_empty_lines && row.cells().iter().all(|cell| cell.trim().is_empty())
    }

    /// Compares two unique attribute values under the configured case policy.
    pub fn uid_matches(&self, left: &str, right: &str) -> bool {
        self.uid_key(left) == self.uid_key(right)
    }

    /// Form of a unique attribute value under which equal identifiers
    /// collide: lowercased when identifier case is ignored.
    pub fn uid_key<'a>(&self, uid: &'a str) -> Cow<'a, str> {
        if self.ignore_identifier_case {
            Cow::Owned(uid.to_lowercase())
        } else {
            Cow::Borrowed(uid)
        }
    }

    /// Splits a raw cell into its values, dropping empty fragments.
    pub fn split_values(&self, raw: &str) -> Vec<String> {
        if raw.is_empty() {
            return Vec::new();
        }
        match self.multivalue_delimiter.as_deref() {
            Some(delimiter) => raw
                .split(delimiter)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![raw.to_string()],
        }
    }

    /// Joins values into one raw cell. `None` when there is nothing to write.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when several values are given and no
    /// multi-value delimiter is configured.
    pub fn join_values(&self, values: &[String]) -> CoreResult<Option<String>> {
        match (values.len(), self.multivalue_delimiter.as_deref()) {
            (0, _) => Ok(None),
            (1, _) => Ok(Some(values[0].clone())),
            (_, Some(delimiter)) => Ok(Some(values.join(delimiter))),
            (_, None) => Err(CoreError::configuration(
                "multivalue delimiter not defined in configuration",
            )),
        }
    }
}

/// Iterator over the rows of one input.
pub struct RowReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    trailing_delimiter: bool,
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = CoreResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        let line = record.position().map_or(0, csv::Position::line);
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        if self.trailing_delimiter && cells.len() > 1 && cells.last().is_some_and(String::is_empty) {
            cells.pop();
        }
        Some(Ok(Row::new(line, cells)))
    }
}

/// Buffered writer producing the bytes of a whole file.
pub struct RowWriter {
    inner: csv::Writer<Vec<u8>>,
    trailing_delimiter: bool,
    rows: usize,
}

impl RowWriter {
    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be printed.
    pub fn write(&mut self, cells: &[String]) -> CoreResult<()> {
        if self.trailing_delimiter {
            self.inner
                .write_record(cells.iter().map(String::as_str).chain(std::iter::once("")))?;
        } else {
            self.inner.write_record(cells)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Returns the number of rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and returns the file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be flushed.
    pub fn finish(self) -> CoreResult<Vec<u8>> {
        self.inner
            .into_inner()
            .map_err(|e| CoreError::Io(e.into_error()))
    }
}
