//! Per-value and per-object validation rules.

use crate::error::PropertyValueError;
use crate::model::{EntityKind, Property, Value};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_DISPLAY_NAME_CHARS: usize = 127;
pub const MAX_DESCRIPTION_CHARS: usize = 1024;
pub const MAX_TIMEOUT_MINUTES: u32 = 24 * 60;

static LOGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]{0,127}$").expect("valid login regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s,]+@[^@\s,]+\.[^@\s,]+$").expect("valid email regex")
});

/// Checks one value in isolation, type included.
pub fn check_value(
    kind: EntityKind,
    property: Property,
    value: &Value,
) -> Result<(), PropertyValueError> {
    let reject = |reason: &str| -> Result<(), PropertyValueError> {
        Err(PropertyValueError::new(
            kind,
            property.name(),
            value.encode(),
            reason,
        ))
    };

    if value.value_type() != property.value_type() {
        return reject("value has the wrong type");
    }

    match (property, value) {
        (Property::DisplayName, Value::Text(name)) => {
            if name.trim().is_empty() {
                return reject("must not be empty");
            }
            if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
                return reject("must be at most 127 characters");
            }
            if name.chars().any(char::is_control) {
                return reject("must not contain control characters");
            }
        }
        (Property::Description, Value::Text(text)) => {
            if text.chars().count() > MAX_DESCRIPTION_CHARS {
                return reject("must be at most 1024 characters");
            }
        }
        (Property::Login, Value::Text(login)) => {
            if !LOGIN_RE.is_match(login) {
                return reject("must start with a letter or underscore and use [A-Za-z0-9_.-]");
            }
        }
        (Property::EmailAddresses, Value::TextList(addresses)) => {
            if let Some(bad) = addresses.iter().find(|address| !EMAIL_RE.is_match(address)) {
                return Err(PropertyValueError::new(
                    kind,
                    property.name(),
                    bad.clone(),
                    "not an e-mail address",
                ));
            }
        }
        (Property::Timeout, Value::Minutes(Some(minutes))) => {
            if !(1..=MAX_TIMEOUT_MINUTES).contains(minutes) {
                return reject("must be between 1 and 1440 minutes");
            }
        }
        (Property::RealName | Property::Summary, Value::Text(text)) => {
            if text.trim().is_empty() {
                return reject("must not be empty");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Checks rules that span several properties of one object.
pub fn check_object(
    kind: EntityKind,
    properties: &[(Property, Value)],
) -> Result<(), PropertyValueError> {
    if kind == EntityKind::Work {
        let lookup = |wanted: Property| {
            properties
                .iter()
                .find(|(property, _)| *property == wanted)
                .and_then(|(_, value)| value.as_timestamp())
        };
        if let (Some(start), Some(finish)) = (lookup(Property::Start), lookup(Property::Finish)) {
            if start > finish {
                return Err(PropertyValueError::new(
                    kind,
                    Property::Finish.name(),
                    finish.to_string(),
                    format!("must not be before start {start}"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_object, check_value};
    use crate::model::{EntityKind, Property, Value};

    #[test]
    fn display_name_rules() {
        let check = |name: &str| {
            check_value(EntityKind::Project, Property::DisplayName, &Value::from(name))
        };
        assert!(check("Website").is_ok());
        assert!(check("  ").is_err());
        assert!(check("tab\tinside").is_err());
        assert!(check("x".repeat(127).as_str()).is_ok());
        assert!(check("x".repeat(128).as_str()).is_err());
    }

    #[test]
    fn login_and_email_patterns() {
        let login = |value: &str| check_value(EntityKind::Account, Property::Login, &Value::from(value));
        assert!(login("ann.smith-2").is_ok());
        assert!(login("_svc").is_ok());
        assert!(login("2fast").is_err());
        assert!(login("").is_err());

        let emails = |values: &[&str]| {
            check_value(
                EntityKind::User,
                Property::EmailAddresses,
                &Value::TextList(values.iter().map(|v| v.to_string()).collect()),
            )
        };
        assert!(emails(&[]).is_ok());
        assert!(emails(&["ann@example.org"]).is_ok());
        let err = emails(&["ann@example.org", "nope"]).unwrap_err();
        assert_eq!(err.value, "nope");
    }

    #[test]
    fn timeout_bounds_and_type_mismatch() {
        let timeout = |value: Value| check_value(EntityKind::PublicTask, Property::Timeout, &value);
        assert!(timeout(Value::Minutes(None)).is_ok());
        assert!(timeout(Value::Minutes(Some(1440))).is_ok());
        assert!(timeout(Value::Minutes(Some(0))).is_err());
        assert!(timeout(Value::Minutes(Some(1441))).is_err());
        assert!(timeout(Value::Bool(true)).is_err());
    }

    #[test]
    fn work_interval_must_be_ordered() {
        let interval = |start: i64, finish: i64| {
            check_object(
                EntityKind::Work,
                &[
                    (Property::Start, Value::Timestamp(start)),
                    (Property::Finish, Value::Timestamp(finish)),
                ],
            )
        };
        assert!(interval(10, 10).is_ok());
        assert!(interval(11, 10).is_err());
    }
}
