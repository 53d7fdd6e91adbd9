//! Scalar properties and their value codec.
//!
//! # Responsibility
//! - Name every scalar attribute an entity can carry.
//! - Encode values to and decode values from their persisted text form.
//!
//! # Invariants
//! - `Value::decode(p.value_type(), &v.encode())` returns `v` for every
//!   value accepted by the validator.
//! - Text lists never contain commas; the validator enforces this for
//!   e-mail addresses, the only list-valued property.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Scalar attribute of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    Enabled,
    EmailAddresses,
    RealName,
    Login,
    DisplayName,
    Description,
    Timeout,
    RequireCommentOnStart,
    RequireCommentOnFinish,
    Completed,
    Start,
    Finish,
    Comment,
    OccurredAt,
    Summary,
}

/// Storage type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Text,
    /// UTC epoch milliseconds.
    Timestamp,
    /// Optional whole minutes.
    Minutes,
    TextList,
}

const ALL_PROPERTIES: &[Property] = &[
    Property::Enabled,
    Property::EmailAddresses,
    Property::RealName,
    Property::Login,
    Property::DisplayName,
    Property::Description,
    Property::Timeout,
    Property::RequireCommentOnStart,
    Property::RequireCommentOnFinish,
    Property::Completed,
    Property::Start,
    Property::Finish,
    Property::Comment,
    Property::OccurredAt,
    Property::Summary,
];

impl Property {
    /// Attribute / column name used by both persisted forms.
    pub fn name(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::EmailAddresses => "email-addresses",
            Self::RealName => "real-name",
            Self::Login => "login",
            Self::DisplayName => "display-name",
            Self::Description => "description",
            Self::Timeout => "timeout",
            Self::RequireCommentOnStart => "require-comment-on-start",
            Self::RequireCommentOnFinish => "require-comment-on-finish",
            Self::Completed => "completed",
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Comment => "comment",
            Self::OccurredAt => "occurred-at",
            Self::Summary => "summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PROPERTIES
            .iter()
            .copied()
            .find(|property| property.name() == name)
    }

    pub fn value_type(self) -> ValueType {
        match self {
            Self::Enabled
            | Self::RequireCommentOnStart
            | Self::RequireCommentOnFinish
            | Self::Completed => ValueType::Bool,
            Self::EmailAddresses => ValueType::TextList,
            Self::RealName
            | Self::Login
            | Self::DisplayName
            | Self::Description
            | Self::Comment
            | Self::Summary => ValueType::Text,
            Self::Timeout => ValueType::Minutes,
            Self::Start | Self::Finish | Self::OccurredAt => ValueType::Timestamp,
        }
    }

    /// Value assumed when a factory does not supply one.
    pub fn default_value(self) -> Value {
        match self {
            Self::Enabled => Value::Bool(true),
            _ => match self.value_type() {
                ValueType::Bool => Value::Bool(false),
                ValueType::Text => Value::Text(String::new()),
                ValueType::Timestamp => Value::Timestamp(0),
                ValueType::Minutes => Value::Minutes(None),
                ValueType::TextList => Value::TextList(Vec::new()),
            },
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Text(String),
    Timestamp(i64),
    Minutes(Option<u32>),
    TextList(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Text(_) => ValueType::Text,
            Self::Timestamp(_) => ValueType::Timestamp,
            Self::Minutes(_) => ValueType::Minutes,
            Self::TextList(_) => ValueType::TextList,
        }
    }

    /// Renders the persisted text form.
    pub fn encode(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Timestamp(value) => value.to_string(),
            Self::Minutes(Some(value)) => value.to_string(),
            Self::Minutes(None) => String::new(),
            Self::TextList(values) => values.join(","),
        }
    }

    /// Parses the persisted text form for the given type.
    pub fn decode(value_type: ValueType, text: &str) -> Result<Self, String> {
        match value_type {
            ValueType::Bool => match text {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                other => Err(format!("`{other}` is not a boolean")),
            },
            ValueType::Text => Ok(Self::Text(text.to_string())),
            ValueType::Timestamp => text
                .parse::<i64>()
                .map(Self::Timestamp)
                .map_err(|_| format!("`{text}` is not a timestamp")),
            ValueType::Minutes => {
                if text.is_empty() {
                    return Ok(Self::Minutes(None));
                }
                text.parse::<u32>()
                    .map(|minutes| Self::Minutes(Some(minutes)))
                    .map_err(|_| format!("`{text}` is not a minute count"))
            }
            ValueType::TextList => Ok(Self::TextList(
                text.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_minutes(&self) -> Option<Option<u32>> {
        match self {
            Self::Minutes(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::TextList(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Property, Value, ValueType};

    #[test]
    fn property_names_resolve_back() {
        for property in super::ALL_PROPERTIES {
            assert_eq!(Property::from_name(property.name()), Some(*property));
        }
        assert_eq!(Property::from_name("no-such-thing"), None);
    }

    #[test]
    fn optional_minutes_encode_as_empty_text() {
        assert_eq!(Value::Minutes(None).encode(), "");
        assert_eq!(
            Value::decode(ValueType::Minutes, "").unwrap(),
            Value::Minutes(None)
        );
        assert_eq!(
            Value::decode(ValueType::Minutes, "15").unwrap(),
            Value::Minutes(Some(15))
        );
    }

    #[test]
    fn text_list_skips_empty_items() {
        let decoded = Value::decode(ValueType::TextList, "a@x.org, ,b@y.org").unwrap();
        assert_eq!(
            decoded,
            Value::TextList(vec!["a@x.org".to_string(), "b@y.org".to_string()])
        );
        assert_eq!(
            Value::decode(ValueType::TextList, "").unwrap(),
            Value::TextList(Vec::new())
        );
    }

    #[test]
    fn malformed_scalars_are_rejected() {
        assert!(Value::decode(ValueType::Bool, "yes").is_err());
        assert!(Value::decode(ValueType::Timestamp, "12:00").is_err());
        assert!(Value::decode(ValueType::Minutes, "-5").is_err());
    }

    #[test]
    fn enabled_defaults_to_true() {
        assert_eq!(Property::Enabled.default_value(), Value::Bool(true));
        assert_eq!(Property::Completed.default_value(), Value::Bool(false));
    }
}
