//! Whole-file create, update and delete.
//!
//! Every write parses the current file, streams each row into a fresh
//! buffer (changing only the rows it targets), and publishes the buffer by
//! replacing the blob. The layout grows on a private copy which is
//! committed only after the upload succeeded.

use crate::dialect::RowWriter;
use crate::error::{CoreError, CoreResult};
use crate::processor::Processor;
use crate::record::{RecordCodec, Row};
use crate::schema::RecordLayout;
use crate::value::{self, is_reserved, Attribute, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE};
use csvstore_storage::BlobReader;

/// What to do with an existing data row.
enum RowAction {
    Keep,
    Replace(Vec<String>),
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modification {
    Update,
    AddValues,
    RemoveValues,
}

impl Modification {
    const fn name(self) -> &'static str {
        match self {
            Modification::Update => "update",
            Modification::AddValues => "add attribute values",
            Modification::RemoveValues => "remove attribute values",
        }
    }
}

struct Rewritten {
    writer: RowWriter,
    header_seen: bool,
}

/// Prepares write input against `layout`, growing it with unknown columns.
///
/// When the unique and name attributes share a column, a missing one of the
/// pair is synthesized from the other.
fn normalize(
    layout: &mut RecordLayout,
    read_only: bool,
    mut attributes: Vec<Attribute>,
) -> CoreResult<Vec<Attribute>> {
    let names = layout.names().clone();

    if names.unique_is_name() {
        let name = value::find(&attributes, NAME_ATTRIBUTE)
            .map(Attribute::single_raw)
            .transpose()?
            .flatten();
        let uid = value::find(&attributes, &names.unique)
            .map(Attribute::single_raw)
            .transpose()?
            .flatten();
        match (uid, name) {
            (Some(uid), None) if value::find(&attributes, NAME_ATTRIBUTE).is_none() => {
                attributes.push(Attribute::name_value(uid));
            }
            (None, Some(name)) if value::find(&attributes, &names.unique).is_none() => {
                attributes.push(Attribute::plain(names.unique.as_str(), name));
            }
            (Some(uid), Some(name)) if uid != name => {
                return Err(CoreError::conflict(format!(
                    "unique attribute value '{uid}' doesn't match name attribute value '{name}'"
                )));
            }
            _ => {}
        }
    }

    for attribute in &attributes {
        let name = attribute.name();
        if is_reserved(name) {
            continue;
        }
        if layout.columns().find_ignore_case(name).is_none() {
            if read_only {
                return Err(CoreError::unknown_attribute(name));
            }
            layout.add_column(name);
        }
        if !names.unique_is_name() && names.is_name(name) {
            return Err(CoreError::invalid_argument(format!(
                "column '{name}' is used as {NAME_ATTRIBUTE} attribute"
            )));
        }
    }

    if !read_only {
        if layout.uid_ordinal().is_none() {
            layout.add_column(&names.unique);
        }
        if layout.name_ordinal().is_none() && value::find(&attributes, NAME_ATTRIBUTE).is_some() {
            layout.add_column(&names.name);
        }
        if let Some(password) = names.password.as_deref() {
            if layout.password_ordinal().is_none() && value::find(&attributes, PASSWORD_ATTRIBUTE).is_some() {
                layout.add_column(password);
            }
        }
    }

    Ok(attributes)
}

/// Header cells extended with the keys of columns added since the file was written.
fn extend_header(cells: &[String], layout: &RecordLayout) -> Vec<String> {
    let mut header = cells.to_vec();
    for ordinal in cells.len()..layout.width() {
        if let Some(key) = layout.columns().key_at(ordinal) {
            header.push(key.to_string());
        }
    }
    header
}

impl Processor {
    fn ensure_writable(&self, operation: &'static str) -> CoreResult<()> {
        if self.config.read_only {
            return Err(CoreError::ReadOnly { operation });
        }
        Ok(())
    }

    fn rewrite<F>(&self, layout: &RecordLayout, reader: Option<BlobReader>, mut visit: F) -> CoreResult<Rewritten>
    where
        F: FnMut(&RecordCodec<'_>, &Row) -> CoreResult<RowAction>,
    {
        let dialect = &self.config.dialect;
        let codec = RecordCodec::new(layout, dialect, self.config.read_only);
        let mut writer = dialect.writer();
        let mut header_seen = false;

        let Some(reader) = reader else {
            return Ok(Rewritten { writer, header_seen });
        };

        for row in dialect.rows(reader) {
            let row = row?;
            if dialect.is_blank(&row) {
                writer.write(row.cells())?;
                continue;
            }
            if dialect.header_exists && !header_seen {
                header_seen = true;
                writer.write(&extend_header(row.cells(), layout))?;
                continue;
            }
            match visit(&codec, &row)? {
                RowAction::Keep => writer.write(row.cells())?,
                RowAction::Replace(cells) => writer.write(&cells)?,
                RowAction::Drop => {}
            }
        }
        Ok(Rewritten { writer, header_seen })
    }

    fn publish(&self, writer: RowWriter, layout: RecordLayout) -> CoreResult<()> {
        let rows = writer.rows();
        let data = writer.finish()?;
        self.store.write_all(&self.config.locator, &data)?;
        *self.layout.write() = layout;
        tracing::debug!(file = %self.config.locator, rows, bytes = data.len(), "published file");
        Ok(())
    }

    /// Appends a new record and returns its identifier.
    ///
    /// # Errors
    ///
    /// Fails with `MissingAttribute` when the unique attribute has no value,
    /// `DuplicateKey` when a record with the same identifier exists, and
    /// `ReadOnly` or `UnknownAttribute` for read-only stores.
    pub fn create(&self, attributes: Vec<Attribute>) -> CoreResult<String> {
        let _guard = self.section.enter();
        let mut layout = self.layout();
        let attributes = normalize(&mut layout, self.config.read_only, attributes)?;
        self.ensure_writable("create")?;

        let unique = layout.names().unique.clone();
        let uid = value::find(&attributes, &unique)
            .map(Attribute::single_raw)
            .transpose()?
            .flatten()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| CoreError::missing_attribute(unique.as_str()))?;

        let dialect = &self.config.dialect;
        let reader = self.open_file()?;
        let Rewritten {
            mut writer,
            header_seen,
        } = self.rewrite(&layout, reader, |codec, row| match codec.uid_of(row) {
            Some(existing) if dialect.uid_matches(&uid, existing) => Err(CoreError::duplicate_key(uid.as_str())),
            _ => Ok(RowAction::Keep),
        })?;

        if dialect.header_exists && !header_seen {
            let header: Vec<String> = layout.columns().keys().map(str::to_string).collect();
            tracing::debug!(columns = header.len(), "writing header for new file");
            writer.write(&header)?;
        }
        let record = RecordCodec::new(&layout, dialect, false).encode(&attributes)?;
        writer.write(&record)?;

        self.publish(writer, layout)?;
        tracing::info!(object_class = %self.config.object_class, uid = %uid, "created record");
        Ok(uid)
    }

    /// Removes every record whose identifier matches `uid`.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when no record matches and `ReadOnly` for
    /// read-only stores.
    pub fn delete(&self, uid: &str) -> CoreResult<()> {
        self.ensure_writable("delete")?;
        let _guard = self.section.enter();
        let layout = self.layout();
        let Some(reader) = self.open_file()? else {
            return Err(CoreError::not_found(uid));
        };

        let dialect = &self.config.dialect;
        let mut removed = 0usize;
        let Rewritten { writer, .. } = self.rewrite(&layout, Some(reader), |codec, row| match codec.uid_of(row) {
            Some(existing) if dialect.uid_matches(uid, existing) => {
                removed += 1;
                Ok(RowAction::Drop)
            }
            _ => Ok(RowAction::Keep),
        })?;

        if removed == 0 {
            return Err(CoreError::not_found(uid));
        }
        self.publish(writer, layout)?;
        tracing::info!(object_class = %self.config.object_class, uid, removed, "deleted record");
        Ok(())
    }

    /// Replaces the given attributes of one record and returns its
    /// identifier, which changes when the unique attribute is updated.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when no record matches, `DuplicateKey` when
    /// several do, and with the normalization errors of [`Processor::create`].
    pub fn update(&self, uid: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        self.modify(Modification::Update, uid, attributes)
    }

    /// Adds values to attributes of one record, skipping values already
    /// present.
    ///
    /// # Errors
    ///
    /// See [`Processor::update`]; additionally fails with `InvalidArgument`
    /// when the unique attribute would hold more than one value.
    pub fn add_attribute_values(&self, uid: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        self.modify(Modification::AddValues, uid, attributes)
    }

    /// Removes values from attributes of one record.
    ///
    /// # Errors
    ///
    /// See [`Processor::add_attribute_values`].
    pub fn remove_attribute_values(&self, uid: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        self.modify(Modification::RemoveValues, uid, attributes)
    }

    fn modify(&self, modification: Modification, uid: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        if modification != Modification::Update && attributes.is_empty() {
            return Ok(uid.to_string());
        }

        let _guard = self.section.enter();
        let mut layout = self.layout();
        let attributes = normalize(&mut layout, self.config.read_only, attributes)?;
        self.ensure_writable(modification.name())?;

        let Some(reader) = self.open_file()? else {
            return Err(CoreError::not_found(uid));
        };

        let dialect = &self.config.dialect;
        let uid_ordinal = layout.uid_ordinal();
        let mut matched = 0usize;
        let mut new_uid = uid.to_string();
        let Rewritten { writer, .. } = self.rewrite(&layout, Some(reader), |codec, row| {
            match codec.uid_of(row) {
                Some(existing) if dialect.uid_matches(uid, existing) => {}
                _ => return Ok(RowAction::Keep),
            }
            matched += 1;
            if matched > 1 {
                return Err(CoreError::duplicate_key(uid));
            }

            let mut cells = row.cells().to_vec();
            match modification {
                Modification::Update => codec.apply_update(&mut cells, &attributes)?,
                Modification::AddValues => codec.apply_delta(&mut cells, &attributes, true)?,
                Modification::RemoveValues => codec.apply_delta(&mut cells, &attributes, false)?,
            }
            if let Some(ordinal) = uid_ordinal {
                new_uid = cells[ordinal].clone();
            }
            if new_uid.is_empty() {
                return Err(CoreError::invalid_argument("unique attribute value must not be empty"));
            }
            Ok(RowAction::Replace(cells))
        })?;

        if matched == 0 {
            return Err(CoreError::not_found(uid));
        }
        self.publish(writer, layout)?;
        tracing::info!(
            object_class = %self.config.object_class,
            uid = %new_uid,
            operation = modification.name(),
            "modified record"
        );
        Ok(new_uid)
    }
}
