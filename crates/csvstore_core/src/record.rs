//! Conversion between raw rows and typed objects.

use crate::dialect::Dialect;
use crate::error::{CoreError, CoreResult};
use crate::schema::{ColumnRole, RecordLayout};
use crate::value::{self, Attribute, Secret, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, UID_ATTRIBUTE};
use std::collections::BTreeMap;

/// One parsed row of the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: u64,
    cells: Vec<String>,
}

impl Row {
    /// Creates a row read from `line` (1-based, 0 when unknown).
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    /// Line number the row started on.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Cells in column order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Consumes the row and returns its cells.
    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }

    /// Cell at `ordinal`, if the row is long enough.
    pub fn cell(&self, ordinal: usize) -> Option<&str> {
        self.cells.get(ordinal).map(String::as_str)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A record decoded from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreObject {
    /// Unique identifier.
    pub uid: String,
    /// Display name; equals `uid` when the name cell is empty.
    pub name: String,
    /// Plain attributes keyed by column.
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Password, if the row has one.
    pub password: Option<Secret>,
}

impl StoreObject {
    /// Values of a plain attribute.
    pub fn get(&self, column: &str) -> Option<&[String]> {
        self.attributes.get(column).map(Vec::as_slice)
    }
}

/// Codec between rows and [`StoreObject`]s for one layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec<'a> {
    layout: &'a RecordLayout,
    dialect: &'a Dialect,
    read_only: bool,
}

impl<'a> RecordCodec<'a> {
    /// Creates a codec. Read-only codecs require rows to match the header width.
    pub fn new(layout: &'a RecordLayout, dialect: &'a Dialect, read_only: bool) -> Self {
        Self {
            layout,
            dialect,
            read_only,
        }
    }

    /// Extracts the unique identifier of a row, `None` if the cell is empty.
    pub fn uid_of<'r>(&self, row: &'r Row) -> Option<&'r str> {
        self.layout
            .uid_ordinal()
            .and_then(|ordinal| row.cell(ordinal))
            .filter(|uid| !uid.is_empty())
    }

    /// Decodes a row.
    ///
    /// # Errors
    ///
    /// Fails with `RecordShape` when a read-only store sees a row whose width
    /// differs from the header, and with `MissingKey` when the unique cell is
    /// empty.
    pub fn decode(&self, row: &Row) -> CoreResult<StoreObject> {
        let expected = self.layout.width();
        if self.read_only && row.len() != expected {
            return Err(CoreError::RecordShape {
                row: row.line(),
                expected,
                actual: row.len(),
            });
        }

        let mut uid = None;
        let mut name = None;
        let mut password = None;
        let mut attributes = BTreeMap::new();

        for (ordinal, cell) in row.cells().iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let (Some(role), Some(key)) = (self.layout.role(ordinal), self.layout.columns().key_at(ordinal)) else {
                continue;
            };
            match role {
                ColumnRole::Uid { doubles_as_name } => {
                    uid = Some(cell.clone());
                    if doubles_as_name {
                        name = Some(cell.clone());
                    } else {
                        attributes.insert(key.to_string(), vec![cell.clone()]);
                    }
                }
                ColumnRole::Name => name = Some(cell.clone()),
                ColumnRole::Password => password = Some(Secret::text(cell.as_str())),
                ColumnRole::Plain { .. } => {
                    let values = self.dialect.split_values(cell);
                    if !values.is_empty() {
                        attributes.insert(key.to_string(), values);
                    }
                }
            }
        }

        let uid = uid.ok_or(CoreError::MissingKey { row: row.line() })?;
        Ok(StoreObject {
            name: name.unwrap_or_else(|| uid.clone()),
            uid,
            attributes,
            password,
        })
    }

    /// Encodes normalized attributes into a new row of header width.
    ///
    /// # Errors
    ///
    /// Fails when a single-valued field carries several values, or when
    /// several values must be joined without a multi-value delimiter.
    pub fn encode(&self, attributes: &[Attribute]) -> CoreResult<Vec<String>> {
        let names = self.layout.names();
        let name = match value::find(attributes, NAME_ATTRIBUTE) {
            Some(attribute) => attribute.single_raw()?,
            None => None,
        };
        let uid = match value::find(attributes, &names.unique).or_else(|| value::find(attributes, UID_ATTRIBUTE)) {
            Some(attribute) => attribute.single_raw()?,
            None => None,
        };

        let mut cells = vec![String::new(); self.layout.width()];
        for (key, column) in self.layout.columns().iter() {
            let role = self.layout.role(column.ordinal);
            let cell = match role {
                Some(ColumnRole::Password) => self.join(value::find(attributes, PASSWORD_ATTRIBUTE))?,
                Some(ColumnRole::Name) | Some(ColumnRole::Uid { doubles_as_name: true }) if name.is_some() => {
                    name.clone()
                }
                Some(ColumnRole::Uid { .. }) if uid.is_some() => uid.clone(),
                _ => self.join(value::find(attributes, key))?,
            };
            if let Some(cell) = cell {
                cells[column.ordinal] = cell;
            }
        }
        Ok(cells)
    }

    fn join(&self, attribute: Option<&Attribute>) -> CoreResult<Option<String>> {
        match attribute {
            Some(attribute) => self.dialect.join_values(&attribute.raw_values()),
            None => Ok(None),
        }
    }

    fn target(&self, attribute: &Attribute) -> CoreResult<usize> {
        self.layout
            .resolve_target(attribute.name())
            .ok_or_else(|| CoreError::unknown_attribute(attribute.name()))
    }

    /// Overwrites the columns named by `attributes` in an existing row.
    ///
    /// # Errors
    ///
    /// Fails when an attribute has no column or its values cannot be joined.
    pub fn apply_update(&self, cells: &mut Vec<String>, attributes: &[Attribute]) -> CoreResult<()> {
        cells.resize(cells.len().max(self.layout.width()), String::new());
        for attribute in attributes {
            let ordinal = self.target(attribute)?;
            cells[ordinal] = self.join(Some(attribute))?.unwrap_or_default();
        }
        Ok(())
    }

    /// Adds values to, or removes values from, the columns named by `attributes`.
    ///
    /// Adding yields the union of stored and given values, keeping the
    /// first occurrence of each; removing drops every occurrence of the
    /// given values.
    ///
    /// # Errors
    ///
    /// Fails when the unique column would end up with other than exactly one
    /// value, or when the values cannot be joined.
    pub fn apply_delta(&self, cells: &mut Vec<String>, attributes: &[Attribute], add: bool) -> CoreResult<()> {
        cells.resize(cells.len().max(self.layout.width()), String::new());
        for attribute in attributes {
            let ordinal = self.target(attribute)?;
            let stored = self.dialect.split_values(&cells[ordinal]);
            let given = attribute.raw_values();
            let mut current: Vec<String> = Vec::with_capacity(stored.len() + given.len());
            if add {
                for value in stored.into_iter().chain(given) {
                    if !current.contains(&value) {
                        current.push(value);
                    }
                }
            } else {
                current.extend(stored.into_iter().filter(|value| !given.contains(value)));
            }

            if matches!(self.layout.role(ordinal), Some(ColumnRole::Uid { .. })) && current.len() != 1 {
                return Err(CoreError::invalid_argument(format!(
                    "unique attribute '{}' must contain single value",
                    attribute.name()
                )));
            }
            cells[ordinal] = self.dialect.join_values(&current)?.unwrap_or_default();
        }
        Ok(())
    }
}
