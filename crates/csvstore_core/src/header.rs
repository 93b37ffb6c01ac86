//! Header inference.
//!
//! The column map is computed once when a store is opened, from the first
//! non-blank row of the backing file.

use crate::dialect::Dialect;
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::io::Read;

/// Prefix of synthesized column names.
pub const DEFAULT_COLUMN_PREFIX: &str = "col";

/// A column of the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header text as written in the file, if any.
    pub display_name: Option<String>,
    /// Zero-based position in a row.
    pub ordinal: usize,
}

/// Ordered mapping from unique column keys to columns.
///
/// Keys are unique and compared case-sensitively. Ordinals are dense and
/// follow insertion order.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    entries: Vec<(String, Column)>,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    /// Creates an empty column map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from header cells, uniquifying keys as needed.
    pub fn from_header<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for (ordinal, cell) in cells.into_iter().enumerate() {
            let text = cell.as_ref();
            let (name, display_name) = if text.trim().is_empty() {
                (format!("{DEFAULT_COLUMN_PREFIX}{ordinal}"), None)
            } else {
                (text.to_string(), Some(text.to_string()))
            };
            let key = map.available_key(&name);
            map.insert(key, display_name);
        }
        map
    }

    /// Builds a map of `width` synthesized columns `col0..colN-1`.
    pub fn synthesized(width: usize) -> Self {
        let mut map = Self::new();
        for ordinal in 0..width {
            map.insert(format!("{DEFAULT_COLUMN_PREFIX}{ordinal}"), None);
        }
        map
    }

    fn available_key(&self, name: &str) -> String {
        if !self.index.contains_key(name) {
            return name.to_string();
        }
        (1..)
            .map(|suffix| format!("{name}{suffix}"))
            .find(|candidate| !self.index.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn insert(&mut self, key: String, display_name: Option<String>) -> usize {
        let ordinal = self.entries.len();
        self.index.insert(key.clone(), ordinal);
        self.entries.push((
            key,
            Column {
                display_name,
                ordinal,
            },
        ));
        ordinal
    }

    /// Appends a new column after the last one and returns its ordinal.
    ///
    /// If the key is already present its existing ordinal is returned.
    pub fn push(&mut self, key: &str) -> usize {
        match self.index.get(key) {
            Some(&ordinal) => ordinal,
            None => self.insert(key.to_string(), Some(key.to_string())),
        }
    }

    /// Returns the column stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Column> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Returns the first column whose key equals `key` ignoring ASCII case.
    pub fn find_ignore_case(&self, key: &str) -> Option<(&str, &Column)> {
        self.iter()
            .find(|(k, _)| *k == key)
            .or_else(|| self.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
    }

    /// Returns the key of the column at `ordinal`.
    pub fn key_at(&self, ordinal: usize) -> Option<&str> {
        self.entries.get(ordinal).map(|(key, _)| key.as_str())
    }

    /// Iterates over `(key, column)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.entries.iter().map(|(key, column)| (key.as_str(), column))
    }

    /// Iterates over keys in ordinal order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no column is known yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for ColumnMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, column)| other.get(key) == Some(column))
    }
}

impl Eq for ColumnMap {}

/// Infers the column map of a file.
///
/// `input` is `None` when the file does not exist yet; the result is then
/// an empty map and schema checks are deferred to the first write.
///
/// # Errors
///
/// Returns a configuration error if the file exists but holds no
/// non-blank row, or a parse error if the first rows are malformed.
pub fn infer_header<R: Read>(dialect: &Dialect, input: Option<R>) -> CoreResult<ColumnMap> {
    let Some(input) = input else {
        tracing::debug!("no backing file, deferring header");
        return Ok(ColumnMap::new());
    };

    let mut first = None;
    for row in dialect.rows(input) {
        let row = row?;
        if !dialect.is_blank(&row) {
            first = Some(row);
            break;
        }
    }

    let Some(row) = first else {
        return Err(CoreError::configuration(
            "couldn't initialize header, nothing in the backing file",
        ));
    };

    let map = if dialect.header_exists {
        ColumnMap::from_header(row.cells())
    } else {
        ColumnMap::synthesized(row.len())
    };
    tracing::debug!(columns = map.len(), "inferred header");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(dialect: &Dialect, text: &str) -> CoreResult<ColumnMap> {
        infer_header(dialect, Some(text.as_bytes()))
    }

    #[test]
    fn duplicate_titles_get_suffixes() {
        let map = infer(&Dialect::default(), "id;name;id\r\n").unwrap();
        assert_eq!(map.get("id").unwrap().ordinal, 0);
        assert_eq!(map.get("name").unwrap().ordinal, 1);
        assert_eq!(map.get("id1").unwrap().ordinal, 2);
        assert_eq!(map.get("id1").unwrap().display_name.as_deref(), Some("id"));
    }

    #[test]
    fn suffixes_keep_counting() {
        let map = ColumnMap::from_header(["a", "a", "a", "a1"]);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["a", "a1", "a2", "a11"]);
    }

    #[test]
    fn blank_header_cells_are_synthesized() {
        let map = infer(&Dialect::default(), "id;;mail\r\n").unwrap();
        let column = map.get("col1").unwrap();
        assert_eq!(column.ordinal, 1);
        assert_eq!(column.display_name, None);
    }

    #[test]
    fn whitespace_header_cells_count_as_blank() {
        let map = infer(&Dialect::default(), "id; ;mail\r\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["id", "col1", "mail"]);
        assert!(map.get(" ").is_none());
    }

    #[test]
    fn blank_leading_rows_are_skipped() {
        let map = infer(&Dialect::default(), " ; \r\n\r\nid;mail\r\n1;x\r\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["id", "mail"]);
    }

    #[test]
    fn headerless_files_synthesize_names() {
        let dialect = Dialect {
            header_exists: false,
            ..Dialect::default()
        };
        let map = infer(&dialect, "1;a;b\r\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["col0", "col1", "col2"]);
    }

    #[test]
    fn missing_file_defers_header() {
        let map = infer_header::<&[u8]>(&Dialect::default(), None).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn empty_file_is_a_configuration_error() {
        let err = infer(&Dialect::default(), "").unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));

        let err = infer(&Dialect::default(), "\r\n ; \r\n").unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn push_appends_after_last() {
        let mut map = ColumnMap::new();
        assert_eq!(map.push("id"), 0);
        assert_eq!(map.push("mail"), 1);
        assert_eq!(map.push("id"), 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.key_at(1), Some("mail"));
    }

    #[test]
    fn case_insensitive_lookup() {
        let map = ColumnMap::from_header(["Id", "Mail"]);
        let (key, column) = map.find_ignore_case("mail").unwrap();
        assert_eq!(key, "Mail");
        assert_eq!(column.ordinal, 1);
        assert!(map.get("mail").is_none());
    }

    #[test]
    fn equality_ignores_construction_path() {
        let mut built = ColumnMap::new();
        built.push("a");
        built.push("b");
        assert_eq!(built, ColumnMap::from_header(["a", "b"]));
        assert_ne!(built, ColumnMap::from_header(["b", "a"]));
    }
}
