//! Attribute values supplied by and returned to the host.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use zeroize::Zeroizing;

/// Reserved attribute name for the unique identifier.
pub const UID_ATTRIBUTE: &str = "__UID__";
/// Reserved attribute name for the display name.
pub const NAME_ATTRIBUTE: &str = "__NAME__";
/// Reserved attribute name for the secret (password).
pub const PASSWORD_ATTRIBUTE: &str = "__PASSWORD__";

/// Returns true if `name` is one of the reserved attribute names.
pub(crate) fn is_reserved(name: &str) -> bool {
    [UID_ATTRIBUTE, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE]
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// A guarded secret. The backing memory is wiped on drop.
#[derive(Clone)]
pub enum Secret {
    /// Secret text.
    Text(Zeroizing<String>),
    /// Secret bytes, stored base64-encoded.
    Bytes(Zeroizing<Vec<u8>>),
}

impl Secret {
    /// Wraps secret text.
    pub fn text(value: impl Into<String>) -> Self {
        Secret::Text(Zeroizing::new(value.into()))
    }

    /// Wraps secret bytes.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Secret::Bytes(Zeroizing::new(value.into()))
    }

    /// Returns the raw cell text: the text itself, or base64 for bytes.
    pub fn expose(&self) -> String {
        match self {
            Secret::Text(text) => text.as_str().to_string(),
            Secret::Bytes(bytes) => STANDARD.encode(bytes.as_slice()),
        }
    }

    /// Returns the secret's bytes.
    pub fn expose_bytes(&self) -> &[u8] {
        match self {
            Secret::Text(text) => text.as_bytes(),
            Secret::Bytes(bytes) => bytes.as_slice(),
        }
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.expose_bytes().is_empty()
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose_bytes() == other.expose_bytes()
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text.
    Plain(String),
    /// Guarded secret.
    Secret(Secret),
    /// Several values of one attribute.
    List(Vec<Value>),
}

impl Value {
    /// Builds a list of plain values.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(values.into_iter().map(|v| Value::Plain(v.into())).collect())
    }

    /// Returns the raw text of every scalar value, flattening lists.
    pub fn raw_values(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_raw(&mut out);
        out
    }

    fn collect_raw(&self, out: &mut Vec<String>) {
        match self {
            Value::Plain(text) => out.push(text.clone()),
            Value::Secret(secret) => out.push(secret.expose()),
            Value::List(values) => values.iter().for_each(|v| v.collect_raw(out)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Plain(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Plain(value)
    }
}

impl From<Secret> for Value {
    fn from(value: Secret) -> Self {
        Value::Secret(value)
    }
}

/// A named attribute in an operation's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: Value,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a single-valued plain attribute.
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Plain(value.into()))
    }

    /// Creates a multi-valued plain attribute.
    pub fn multi<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, Value::list(values))
    }

    /// Creates the reserved unique identifier attribute.
    pub fn uid(value: impl Into<String>) -> Self {
        Self::plain(UID_ATTRIBUTE, value)
    }

    /// Creates the reserved display name attribute.
    pub fn name_value(value: impl Into<String>) -> Self {
        Self::plain(NAME_ATTRIBUTE, value)
    }

    /// Creates the reserved password attribute.
    pub fn password(secret: Secret) -> Self {
        Self::new(PASSWORD_ATTRIBUTE, secret)
    }

    /// Returns the attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if the attribute is called `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the raw text of every value.
    pub fn raw_values(&self) -> Vec<String> {
        self.value.raw_values()
    }

    /// Returns the only value, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the attribute carries several values.
    pub fn single_raw(&self) -> crate::CoreResult<Option<String>> {
        let mut values = self.raw_values();
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            n => Err(crate::CoreError::invalid_argument(format!(
                "attribute '{}' must be single-valued, got {n} values",
                self.name
            ))),
        }
    }
}

/// Finds the attribute called `name`, ignoring ASCII case.
pub(crate) fn find<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.is(name))
}
