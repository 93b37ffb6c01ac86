//! Store configuration.
//!
//! A [`StoreConfig`] describes one object class: where its file lives, how
//! the file is encoded and which columns play the identifier, display name
//! and password roles. It is validated once, before any I/O, into a
//! [`ValidatedConfig`].

use crate::dialect::{Dialect, QuoteMode, RecordSeparator};
use crate::error::{CoreError, CoreResult};
use crate::schema::AttributeNames;
use csvstore_storage::Locator;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Object class used when none is configured.
pub const DEFAULT_OBJECT_CLASS: &str = "__ACCOUNT__";

/// Configuration of one object class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Object class served by the store.
    pub object_class: String,
    /// Blob container holding the file.
    pub container_name: String,
    /// Key of the file inside the container.
    pub file_name: String,
    /// Text encoding of the file. Only UTF-8 is supported.
    pub encoding: String,
    /// Field delimiter, one character.
    pub field_delimiter: String,
    /// Escape character, one character.
    pub escape: String,
    /// Comment marker, one character.
    pub comment_marker: String,
    /// Quote character, one character.
    pub quote: String,
    /// One of `MINIMAL`, `ALL`, `NON_NUMERIC`, `NONE`.
    pub quote_mode: String,
    /// `\r\n`, `\n` or a single character.
    pub record_separator: String,
    /// Separator of values inside a multi-valued cell.
    pub multivalue_delimiter: Option<String>,
    /// Columns holding several values.
    pub multivalue_attributes: Vec<String>,
    /// The first non-blank row is a header.
    pub header_exists: bool,
    /// Trim whitespace around fields.
    pub trim: bool,
    /// Skip rows whose cells are all blank.
    pub ignore_empty_lines: bool,
    /// Ignore spaces around quoted fields.
    pub ignore_surrounding_spaces: bool,
    /// Rows end with a field delimiter.
    pub trailing_delimiter: bool,
    /// Match unique attribute values ignoring case.
    pub ignore_identifier_case: bool,
    /// Column holding the unique identifier.
    pub unique_attribute: String,
    /// Column holding the display name; defaults to the unique attribute.
    pub name_attribute: Option<String>,
    /// Column holding the password.
    pub password_attribute: Option<String>,
    /// Reject every write.
    pub read_only: bool,
    /// The object class is a container.
    pub container: bool,
    /// The object class is auxiliary.
    pub auxiliary: bool,
    /// Directory for sync snapshots; the OS temp directory when unset.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            object_class: DEFAULT_OBJECT_CLASS.to_string(),
            container_name: String::new(),
            file_name: String::new(),
            encoding: "utf-8".to_string(),
            field_delimiter: ";".to_string(),
            escape: "\\".to_string(),
            comment_marker: "#".to_string(),
            quote: "\"".to_string(),
            quote_mode: QuoteMode::Minimal.name().to_string(),
            record_separator: "\r\n".to_string(),
            multivalue_delimiter: None,
            multivalue_attributes: Vec::new(),
            header_exists: true,
            trim: false,
            ignore_empty_lines: true,
            ignore_surrounding_spaces: false,
            trailing_delimiter: false,
            ignore_identifier_case: false,
            unique_attribute: String::new(),
            name_attribute: None,
            password_attribute: None,
            read_only: false,
            container: false,
            auxiliary: false,
            snapshot_dir: None,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for `file_name` inside `container_name`.
    #[must_use]
    pub fn new(container_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Sets the object class.
    #[must_use]
    pub fn object_class(mut self, value: impl Into<String>) -> Self {
        self.object_class = value.into();
        self
    }

    /// Sets the unique attribute.
    #[must_use]
    pub fn unique_attribute(mut self, value: impl Into<String>) -> Self {
        self.unique_attribute = value.into();
        self
    }

    /// Sets the name attribute.
    #[must_use]
    pub fn name_attribute(mut self, value: impl Into<String>) -> Self {
        self.name_attribute = Some(value.into());
        self
    }

    /// Sets the password attribute.
    #[must_use]
    pub fn password_attribute(mut self, value: impl Into<String>) -> Self {
        self.password_attribute = Some(value.into());
        self
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn field_delimiter(mut self, value: impl Into<String>) -> Self {
        self.field_delimiter = value.into();
        self
    }

    /// Sets the quote mode.
    #[must_use]
    pub fn quote_mode(mut self, value: impl Into<String>) -> Self {
        self.quote_mode = value.into();
        self
    }

    /// Sets the record separator.
    #[must_use]
    pub fn record_separator(mut self, value: impl Into<String>) -> Self {
        self.record_separator = value.into();
        self
    }

    /// Configures multi-valued columns and their value separator.
    #[must_use]
    pub fn multivalue<I, S>(mut self, delimiter: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multivalue_delimiter = Some(delimiter.into());
        self.multivalue_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub const fn header_exists(mut self, value: bool) -> Self {
        self.header_exists = value;
        self
    }

    /// Sets whether fields are trimmed.
    #[must_use]
    pub const fn trim(mut self, value: bool) -> Self {
        self.trim = value;
        self
    }

    /// Sets whether rows end with a field delimiter.
    #[must_use]
    pub const fn trailing_delimiter(mut self, value: bool) -> Self {
        self.trailing_delimiter = value;
        self
    }

    /// Sets whether unique values match ignoring case.
    #[must_use]
    pub const fn ignore_identifier_case(mut self, value: bool) -> Self {
        self.ignore_identifier_case = value;
        self
    }

    /// Sets whether writes are rejected.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets the snapshot directory.
    #[must_use]
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Checks every option and derives the dialect and attribute names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid option.
    pub fn validate(&self) -> CoreResult<ValidatedConfig> {
        if !matches!(
            self.encoding.to_ascii_lowercase().as_str(),
            "utf-8" | "utf8"
        ) {
            return Err(CoreError::configuration(format!(
                "encoding '{}' is not supported, use utf-8",
                self.encoding
            )));
        }
        require_non_empty("object class", &self.object_class)?;
        require_non_empty("container name", &self.container_name)?;
        require_non_empty("file name", &self.file_name)?;
        require_non_empty("unique attribute", &self.unique_attribute)?;

        let multivalue_delimiter = self
            .multivalue_delimiter
            .clone()
            .filter(|delimiter| !delimiter.is_empty());
        if !self.multivalue_attributes.is_empty() && multivalue_delimiter.is_none() {
            return Err(CoreError::configuration(
                "multivalue delimiter must be set when multivalue attributes are configured",
            ));
        }

        let dialect = Dialect {
            field_delimiter: single_byte("field delimiter", &self.field_delimiter)?,
            quote: single_byte("quote", &self.quote)?,
            escape: single_byte("escape", &self.escape)?,
            comment_marker: single_byte("comment marker", &self.comment_marker)?,
            record_separator: self.record_separator.parse::<RecordSeparator>()?,
            quote_mode: self.quote_mode.parse::<QuoteMode>()?,
            multivalue_delimiter,
            header_exists: self.header_exists,
            trim: self.trim,
            ignore_empty_lines: self.ignore_empty_lines,
            ignore_surrounding_spaces: self.ignore_surrounding_spaces,
            trailing_delimiter: self.trailing_delimiter,
            ignore_identifier_case: self.ignore_identifier_case,
        };

        let name = self
            .name_attribute
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.unique_attribute.clone());
        let names = AttributeNames {
            unique: self.unique_attribute.clone(),
            name,
            password: self
                .password_attribute
                .clone()
                .filter(|password| !password.is_empty()),
            multi_valued: self.multivalue_attributes.clone(),
        };

        Ok(ValidatedConfig {
            object_class: self.object_class.clone(),
            locator: Locator::new(self.container_name.as_str(), self.file_name.as_str()),
            dialect,
            names,
            read_only: self.read_only,
            container: self.container,
            auxiliary: self.auxiliary,
            snapshot_dir: self
                .snapshot_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn require_non_empty(option: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::configuration(format!("{option} must not be empty")));
    }
    Ok(())
}

fn single_byte(option: &str, value: &str) -> CoreResult<u8> {
    match value.as_bytes() {
        [b] => Ok(*b),
        [] => Err(CoreError::configuration(format!("{option} must not be empty"))),
        _ => Err(CoreError::configuration(format!(
            "{option} '{value}' must be a single character"
        ))),
    }
}

/// A configuration that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Object class served by the store.
    pub object_class: String,
    /// Location of the backing file.
    pub locator: Locator,
    /// Lexical rules of the file.
    pub dialect: Dialect,
    /// Resolved attribute names.
    pub names: AttributeNames,
    /// Reject every write.
    pub read_only: bool,
    /// The object class is a container.
    pub container: bool,
    /// The object class is auxiliary.
    pub auxiliary: bool,
    /// Directory for sync snapshots.
    pub snapshot_dir: PathBuf,
}

/// Configuration of every object class served by a connector.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// One entry per object class.
    pub object_classes: Vec<StoreConfig>,
}

impl ConnectorConfig {
    /// Creates a configuration serving the given object classes.
    pub fn new(object_classes: Vec<StoreConfig>) -> Self {
        Self { object_classes }
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::configuration(format!("invalid configuration document: {e}")))
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it is malformed.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StoreConfig {
        StoreConfig::new("accounts", "users.csv").unique_attribute("id")
    }

    #[test]
    fn defaults_match_the_documented_dialect() {
        let validated = base().validate().unwrap();
        let dialect = validated.dialect;
        assert_eq!(dialect.field_delimiter, b';');
        assert_eq!(dialect.escape, b'\\');
        assert_eq!(dialect.comment_marker, b'#');
        assert_eq!(dialect.quote, b'"');
        assert_eq!(dialect.quote_mode, QuoteMode::Minimal);
        assert_eq!(dialect.record_separator, RecordSeparator::Crlf);
        assert!(dialect.header_exists);
        assert!(dialect.ignore_empty_lines);
        assert_eq!(validated.object_class, DEFAULT_OBJECT_CLASS);
    }

    #[test]
    fn name_defaults_to_unique() {
        let names = base().validate().unwrap().names;
        assert_eq!(names.name, "id");
        assert!(names.unique_is_name());

        let names = base().name_attribute("").validate().unwrap().names;
        assert_eq!(names.name, "id");

        let names = base().name_attribute("login").validate().unwrap().names;
        assert_eq!(names.name, "login");
    }

    #[test]
    fn builder_pattern() {
        let config = base()
            .read_only(true)
            .trim(true)
            .multivalue(",", ["groups"])
            .snapshot_dir("/tmp/snapshots");
        assert!(config.read_only);
        assert!(config.trim);
        assert_eq!(config.multivalue_attributes, vec!["groups"]);
        assert_eq!(config.snapshot_dir, Some(PathBuf::from("/tmp/snapshots")));
    }

    #[test]
    fn rejects_unknown_quote_mode() {
        let err = base().quote_mode("ODD").validate().unwrap_err();
        assert!(err.to_string().contains("MINIMAL"));
    }

    #[test]
    fn rejects_multi_character_delimiter() {
        let err = base().field_delimiter(";;").validate().unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
        let err = base().field_delimiter("").validate().unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn rejects_missing_names() {
        assert!(StoreConfig::new("accounts", "users.csv").validate().is_err());
        assert!(StoreConfig::new("", "users.csv").unique_attribute("id").validate().is_err());
        assert!(StoreConfig::new("accounts", "").unique_attribute("id").validate().is_err());
    }

    #[test]
    fn rejects_multivalue_attributes_without_delimiter() {
        let mut config = base();
        config.multivalue_attributes = vec!["groups".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_other_encodings() {
        let mut config = base();
        config.encoding = "ISO-8859-2".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_camel_case_json() {
        let config = ConnectorConfig::from_json_str(
            r#"{
                "objectClasses": [
                    {
                        "containerName": "accounts",
                        "fileName": "users.csv",
                        "uniqueAttribute": "id",
                        "passwordAttribute": "pwd",
                        "multivalueDelimiter": ",",
                        "multivalueAttributes": ["groups"],
                        "readOnly": true
                    },
                    {
                        "objectClass": "group",
                        "containerName": "accounts",
                        "fileName": "groups.csv",
                        "uniqueAttribute": "name",
                        "fieldDelimiter": ","
                    }
                ]
            }"#,
        )
        .unwrap();

        let accounts = &config.object_classes[0];
        assert_eq!(accounts.object_class, DEFAULT_OBJECT_CLASS);
        assert!(accounts.read_only);
        assert_eq!(accounts.password_attribute.as_deref(), Some("pwd"));
        assert_eq!(accounts.field_delimiter, ";");

        let groups = config.object_classes[1].validate().unwrap();
        assert_eq!(groups.object_class, "group");
        assert_eq!(groups.dialect.field_delimiter, b',');
        assert_eq!(groups.locator, Locator::new("accounts", "groups.csv"));
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = ConnectorConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connector.json");
        std::fs::write(
            &path,
            r#"{"objectClasses":[{"containerName":"c","fileName":"f.csv","uniqueAttribute":"id"}]}"#,
        )
        .unwrap();
        let config = ConnectorConfig::from_path(&path).unwrap();
        assert_eq!(config.object_classes.len(), 1);
    }
}
