//! Schema validation and the per-column dispatch table.

use crate::error::{CoreError, CoreResult};
use crate::header::ColumnMap;
use crate::value::{NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, UID_ATTRIBUTE};
use serde::Serialize;

/// Resolved attribute names of one object class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    /// Column holding the unique identifier.
    pub unique: String,
    /// Column holding the display name. Defaults to `unique`.
    pub name: String,
    /// Column holding the password, if any.
    pub password: Option<String>,
    /// Columns holding several values.
    pub multi_valued: Vec<String>,
}

impl AttributeNames {
    /// Creates names where the display name is the unique attribute.
    pub fn new(unique: impl Into<String>) -> Self {
        let unique = unique.into();
        Self {
            name: unique.clone(),
            unique,
            password: None,
            multi_valued: Vec::new(),
        }
    }

    /// Returns true if the unique and name attributes are the same column.
    pub fn unique_is_name(&self) -> bool {
        self.unique.eq_ignore_ascii_case(&self.name)
    }

    /// Returns true if `column` names the unique attribute.
    pub fn is_unique(&self, column: &str) -> bool {
        self.unique.eq_ignore_ascii_case(column)
    }

    /// Returns true if `column` names the display-name attribute.
    pub fn is_name(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
    }

    /// Returns true if `column` names the password attribute.
    pub fn is_password(&self, column: &str) -> bool {
        self.password
            .as_deref()
            .is_some_and(|password| password.eq_ignore_ascii_case(column))
    }

    /// Returns true if `column` is configured as multi-valued.
    pub fn is_multi_valued(&self, column: &str) -> bool {
        self.multi_valued
            .iter()
            .any(|name| name.eq_ignore_ascii_case(column))
    }
}

/// What a column means to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Unique identifier column.
    Uid {
        /// The column also holds the display name.
        doubles_as_name: bool,
    },
    /// Display name column, distinct from the unique column.
    Name,
    /// Password column.
    Password,
    /// Any other column.
    Plain {
        /// Cells are split on the multi-value delimiter.
        multi_valued: bool,
    },
}

/// Type of an exported attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Plain text.
    Plain,
    /// Guarded secret.
    Secret,
}

/// Exported description of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInfo {
    /// Name the attribute is exported under.
    pub exported_name: String,
    /// Column key in the backing file.
    pub native_name: String,
    /// Value type.
    pub value_type: ValueType,
    /// Holds several values.
    pub multi_valued: bool,
    /// Must be present on create.
    pub required: bool,
}

impl AttributeInfo {
    fn plain(exported_name: &str, native_name: &str) -> Self {
        Self {
            exported_name: exported_name.to_string(),
            native_name: native_name.to_string(),
            value_type: ValueType::Plain,
            multi_valued: false,
            required: false,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Exported description of one object class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectClassInfo {
    /// Object class name.
    pub name: String,
    /// The class is a container.
    pub container: bool,
    /// The class is auxiliary.
    pub auxiliary: bool,
    /// Exported attributes, in column order.
    pub attributes: Vec<AttributeInfo>,
}

/// Column map plus the role of every column.
///
/// Built once per store from the inferred header; the write path works on a
/// clone that may grow new plain columns.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    columns: ColumnMap,
    roles: Vec<ColumnRole>,
    uid: Option<usize>,
    name: Option<usize>,
    password: Option<usize>,
    names: AttributeNames,
}

impl RecordLayout {
    /// Validates `columns` against `names` and classifies every column.
    ///
    /// An empty column map is accepted; validation is deferred until the
    /// first write creates the file.
    ///
    /// # Errors
    ///
    /// Returns a schema error if a non-empty map lacks the unique column or
    /// a configured password column.
    pub fn new(columns: ColumnMap, names: AttributeNames) -> CoreResult<Self> {
        if !columns.is_empty() {
            if columns.find_ignore_case(&names.unique).is_none() {
                return Err(CoreError::schema(format!(
                    "header doesn't contain unique attribute '{}' as defined in configuration",
                    names.unique
                )));
            }
            if let Some(password) = names.password.as_deref() {
                if columns.find_ignore_case(password).is_none() {
                    return Err(CoreError::schema(format!(
                        "header doesn't contain password attribute '{password}' as defined in configuration"
                    )));
                }
            }
        }

        let mut layout = Self {
            columns: ColumnMap::new(),
            roles: Vec::with_capacity(columns.len()),
            uid: None,
            name: None,
            password: None,
            names,
        };
        for key in columns.keys() {
            layout.classify(key);
        }
        layout.columns = columns;
        Ok(layout)
    }

    fn classify(&mut self, key: &str) {
        let ordinal = self.roles.len();
        let role = if self.uid.is_none() && self.names.is_unique(key) {
            self.uid = Some(ordinal);
            let doubles_as_name = self.names.unique_is_name();
            if doubles_as_name {
                self.name = Some(ordinal);
            }
            ColumnRole::Uid { doubles_as_name }
        } else if self.name.is_none() && !self.names.unique_is_name() && self.names.is_name(key) {
            self.name = Some(ordinal);
            ColumnRole::Name
        } else if self.password.is_none() && self.names.is_password(key) {
            self.password = Some(ordinal);
            ColumnRole::Password
        } else {
            ColumnRole::Plain {
                multi_valued: self.names.is_multi_valued(key),
            }
        };
        self.roles.push(role);
    }

    /// Appends a column and returns its ordinal.
    pub fn add_column(&mut self, key: &str) -> usize {
        if let Some(column) = self.columns.get(key) {
            return column.ordinal;
        }
        let ordinal = self.columns.push(key);
        self.classify(key);
        tracing::debug!(column = key, ordinal, "added column");
        ordinal
    }

    /// The column map.
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// The configured attribute names.
    pub fn names(&self) -> &AttributeNames {
        &self.names
    }

    /// Role of the column at `ordinal`.
    pub fn role(&self, ordinal: usize) -> Option<ColumnRole> {
        self.roles.get(ordinal).copied()
    }

    /// Ordinal of the unique column.
    pub fn uid_ordinal(&self) -> Option<usize> {
        self.uid
    }

    /// Ordinal of the display name column.
    pub fn name_ordinal(&self) -> Option<usize> {
        self.name
    }

    /// Ordinal of the password column.
    pub fn password_ordinal(&self) -> Option<usize> {
        self.password
    }

    /// Number of cells in a row written against this layout.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Maps an attribute name to the column it writes.
    ///
    /// Reserved names resolve through the role table, anything else by a
    /// case-insensitive key lookup.
    pub fn resolve_target(&self, attribute: &str) -> Option<usize> {
        if attribute.eq_ignore_ascii_case(UID_ATTRIBUTE) {
            self.uid
        } else if attribute.eq_ignore_ascii_case(NAME_ATTRIBUTE) {
            self.name
        } else if attribute.eq_ignore_ascii_case(PASSWORD_ATTRIBUTE) {
            self.password
        } else {
            self.columns
                .find_ignore_case(attribute)
                .map(|(_, column)| column.ordinal)
        }
    }

    /// Exported attribute list, in column order.
    pub fn attribute_info(&self) -> Vec<AttributeInfo> {
        let mut infos = Vec::with_capacity(self.columns.len() + 1);
        for (key, column) in self.columns.iter() {
            match self.roles[column.ordinal] {
                ColumnRole::Uid { doubles_as_name } => {
                    infos.push(AttributeInfo::plain(UID_ATTRIBUTE, key));
                    if doubles_as_name {
                        infos.push(AttributeInfo::plain(NAME_ATTRIBUTE, key).required());
                    } else {
                        infos.push(AttributeInfo::plain(key, key).required());
                    }
                }
                ColumnRole::Name => infos.push(AttributeInfo::plain(NAME_ATTRIBUTE, key)),
                ColumnRole::Password => infos.push(AttributeInfo {
                    value_type: ValueType::Secret,
                    ..AttributeInfo::plain(PASSWORD_ATTRIBUTE, key)
                }),
                ColumnRole::Plain { multi_valued } => infos.push(AttributeInfo {
                    multi_valued,
                    ..AttributeInfo::plain(key, key)
                }),
            }
        }
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(unique: &str, name: &str, password: Option<&str>) -> AttributeNames {
        AttributeNames {
            unique: unique.to_string(),
            name: name.to_string(),
            password: password.map(str::to_string),
            multi_valued: vec!["groups".to_string()],
        }
    }

    #[test]
    fn missing_unique_column_is_rejected() {
        let columns = ColumnMap::from_header(["mail", "name"]);
        let err = RecordLayout::new(columns, names("id", "id", None)).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }

    #[test]
    fn missing_password_column_is_rejected() {
        let columns = ColumnMap::from_header(["id", "mail"]);
        let err = RecordLayout::new(columns, names("id", "id", Some("pwd"))).unwrap_err();
        assert!(err.to_string().contains("pwd"));
    }

    #[test]
    fn empty_map_defers_validation() {
        let layout = RecordLayout::new(ColumnMap::new(), names("id", "id", Some("pwd"))).unwrap();
        assert_eq!(layout.uid_ordinal(), None);
    }

    #[test]
    fn roles_are_matched_ignoring_case() {
        let columns = ColumnMap::from_header(["ID", "Login", "PWD", "groups", "mail"]);
        let layout = RecordLayout::new(columns, names("id", "login", Some("pwd"))).unwrap();
        assert_eq!(layout.role(0), Some(ColumnRole::Uid { doubles_as_name: false }));
        assert_eq!(layout.role(1), Some(ColumnRole::Name));
        assert_eq!(layout.role(2), Some(ColumnRole::Password));
        assert_eq!(layout.role(3), Some(ColumnRole::Plain { multi_valued: true }));
        assert_eq!(layout.role(4), Some(ColumnRole::Plain { multi_valued: false }));
    }

    #[test]
    fn only_first_duplicate_gets_the_role() {
        let columns = ColumnMap::from_header(["id", "name", "id"]);
        let layout = RecordLayout::new(columns, names("id", "id", None)).unwrap();
        assert_eq!(layout.uid_ordinal(), Some(0));
        assert_eq!(layout.role(2), Some(ColumnRole::Plain { multi_valued: false }));
    }

    #[test]
    fn resolve_target_maps_reserved_names() {
        let columns = ColumnMap::from_header(["id", "login", "pwd", "mail"]);
        let layout = RecordLayout::new(columns, names("id", "login", Some("pwd"))).unwrap();
        assert_eq!(layout.resolve_target(UID_ATTRIBUTE), Some(0));
        assert_eq!(layout.resolve_target(NAME_ATTRIBUTE), Some(1));
        assert_eq!(layout.resolve_target(PASSWORD_ATTRIBUTE), Some(2));
        assert_eq!(layout.resolve_target("MAIL"), Some(3));
        assert_eq!(layout.resolve_target("phone"), None);
    }

    #[test]
    fn export_with_distinct_name_column() {
        let columns = ColumnMap::from_header(["id", "login", "pwd", "groups"]);
        let layout = RecordLayout::new(columns, names("id", "login", Some("pwd"))).unwrap();
        let infos = layout.attribute_info();
        let exported: Vec<&str> = infos.iter().map(|i| i.exported_name.as_str()).collect();
        assert_eq!(exported, vec![UID_ATTRIBUTE, "id", NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, "groups"]);
        assert!(infos[1].required);
        assert!(!infos[2].required);
        assert_eq!(infos[3].value_type, ValueType::Secret);
        assert!(!infos[3].required);
        assert!(infos[4].multi_valued);
    }

    #[test]
    fn export_with_shared_name_column() {
        let columns = ColumnMap::from_header(["id", "mail"]);
        let layout = RecordLayout::new(columns, names("id", "id", None)).unwrap();
        let infos = layout.attribute_info();
        assert_eq!(infos[0].exported_name, UID_ATTRIBUTE);
        assert_eq!(infos[1].exported_name, NAME_ATTRIBUTE);
        assert!(infos[1].required);
        assert_eq!(infos[1].native_name, "id");
        assert_eq!(infos[2].exported_name, "mail");
    }

    #[test]
    fn added_columns_are_classified() {
        let mut layout = RecordLayout::new(ColumnMap::new(), names("id", "id", None)).unwrap();
        assert_eq!(layout.add_column("id"), 0);
        assert_eq!(layout.add_column("groups"), 1);
        assert_eq!(layout.add_column("id"), 0);
        assert_eq!(layout.uid_ordinal(), Some(0));
        assert_eq!(layout.role(1), Some(ColumnRole::Plain { multi_valued: true }));
    }
}
