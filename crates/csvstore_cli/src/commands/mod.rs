//! CLI command implementations.

pub mod modify;
pub mod query;
pub mod schema;
pub mod sync;

use csvstore_core::{Attribute, Connector, Secret, StoreObject, PASSWORD_ATTRIBUTE};
use serde::Serialize;
use std::collections::BTreeMap;

/// Result type of every command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Shared state of one invocation.
pub struct Context<'a> {
    /// Connector serving every configured object class.
    pub connector: &'a Connector,
    /// Object class the command operates on.
    pub object_class: &'a str,
    json: bool,
}

impl<'a> Context<'a> {
    /// Creates a context printing in `format` (`text` or `json`).
    pub fn new(connector: &'a Connector, object_class: &'a str, format: &str) -> Self {
        Self {
            connector,
            object_class,
            json: format == "json",
        }
    }

    /// Returns true if output is JSON.
    pub fn json(&self) -> bool {
        self.json
    }
}

/// Parses a `name=value` pair.
pub fn parse_attr(text: &str) -> Result<(String, String), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute '{text}', expected name=value"))?;
    if name.is_empty() {
        return Err(format!("invalid attribute '{text}', name is empty"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Groups `name=value` pairs into attributes, keeping first-seen order.
///
/// Repeated names become multi-valued attributes; the password attribute
/// is wrapped as a secret.
pub fn build_attributes(pairs: Vec<(String, String)>) -> Vec<Attribute> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in pairs {
        match grouped.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => values.push(value),
            None => grouped.push((name, vec![value])),
        }
    }

    grouped
        .into_iter()
        .map(|(name, mut values)| {
            if name.eq_ignore_ascii_case(PASSWORD_ATTRIBUTE) {
                Attribute::password(Secret::text(values.swap_remove(0)))
            } else if values.len() == 1 {
                Attribute::plain(name, values.swap_remove(0))
            } else {
                Attribute::multi(name, values)
            }
        })
        .collect()
}

/// Printable form of a record. Passwords are never printed.
#[derive(Debug, Serialize)]
pub struct ObjectView {
    /// Unique identifier.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Plain attributes.
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Whether the record has a password.
    pub has_password: bool,
}

impl From<StoreObject> for ObjectView {
    fn from(object: StoreObject) -> Self {
        Self {
            has_password: object.password.is_some(),
            uid: object.uid,
            name: object.name,
            attributes: object.attributes,
        }
    }
}

impl ObjectView {
    /// Prints the record as indented text lines.
    pub fn print_text(&self) {
        println!("{} ({})", self.uid, self.name);
        for (name, values) in &self.attributes {
            println!("  {name}: {}", values.join(", "));
        }
        if self.has_password {
            println!("  password: ***");
        }
    }
}

/// Prints a single value as text or as a JSON object `{ key: value }`.
pub fn print_value(ctx: &Context<'_>, key: &str, value: &str) -> CommandResult {
    if ctx.json() {
        let mut object = BTreeMap::new();
        object.insert(key, value);
        println!("{}", serde_json::to_string_pretty(&object)?);
    } else {
        println!("{value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use csvstore_core::Value;

    #[test]
    fn parse_attr_splits_on_first_equals() {
        assert_eq!(
            parse_attr("mail=a=b").unwrap(),
            ("mail".to_string(), "a=b".to_string())
        );
        assert!(parse_attr("mail").is_err());
        assert!(parse_attr("=x").is_err());
    }

    #[test]
    fn repeated_names_become_multi_valued() {
        let attributes = build_attributes(vec![
            ("id".into(), "u1".into()),
            ("groups".into(), "a".into()),
            ("groups".into(), "b".into()),
            ("__PASSWORD__".into(), "pw".into()),
        ]);
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].raw_values(), vec!["u1"]);
        assert_eq!(attributes[1].raw_values(), vec!["a", "b"]);
        assert!(matches!(attributes[2].value(), Value::Secret(_)));
    }
}
