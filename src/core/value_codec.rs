// Typed field-value codec. The store keeps every custom field value as a
// string column; in memory the value is a tagged scalar decided by the owning
// definition's declared type. Malformed stored data surfaces as a decode
// error instead of silently collapsing to a zero value.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::FieldType;

/// In-memory representation of one custom field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldScalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    StringList(Vec<String>),
    DateIso(String),
}

impl FieldScalar {
    /// Decode a stored string under the field's declared type. An empty
    /// stored string always decodes to `Null` regardless of type.
    pub fn decode(raw: &str, field_type: FieldType) -> AppResult<FieldScalar> {
        if raw.is_empty() {
            return Ok(FieldScalar::Null);
        }
        match field_type {
            FieldType::Number | FieldType::Currency => {
                raw.parse::<f64>().map(FieldScalar::Number).map_err(|_| {
                    AppError::DeserializationError(format!(
                        "Stored value {:?} is not a valid number",
                        raw
                    ))
                })
            }
            FieldType::Boolean => match raw {
                "true" => Ok(FieldScalar::Bool(true)),
                "false" => Ok(FieldScalar::Bool(false)),
                _ => Err(AppError::DeserializationError(format!(
                    "Stored value {:?} is not a valid boolean",
                    raw
                ))),
            },
            FieldType::MultiSelect | FieldType::Users => serde_json::from_str::<Vec<String>>(raw)
                .map(FieldScalar::StringList)
                .map_err(|_| {
                    AppError::DeserializationError(format!(
                        "Stored value {:?} is not a valid string list",
                        raw
                    ))
                }),
            // Date values are stored and returned as ISO-8601 strings.
            FieldType::Date | FieldType::DateTime => Ok(FieldScalar::DateIso(raw.to_string())),
            FieldType::Text
            | FieldType::Select
            | FieldType::Url
            | FieldType::Email
            | FieldType::Phone
            | FieldType::User => Ok(FieldScalar::Text(raw.to_string())),
        }
    }
}

/// Serialize one raw inbound value to its stored string form. Nulls become
/// the empty string; structured values are JSON-encoded.
pub fn encode_raw(raw: &serde_json::Value) -> AppResult<String> {
    match raw {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => serde_json::to_string(raw)
            .map_err(|e| AppError::SerializationError(format!("Failed to encode value: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_round_trip() {
        let stored = encode_raw(&serde_json::json!(42.5)).unwrap();
        assert_eq!(stored, "42.5");
        assert_eq!(
            FieldScalar::decode(&stored, FieldType::Number).unwrap(),
            FieldScalar::Number(42.5)
        );
    }

    #[test]
    fn booleans_decode_strictly() {
        assert_eq!(
            FieldScalar::decode("true", FieldType::Boolean).unwrap(),
            FieldScalar::Bool(true)
        );
        assert_eq!(
            FieldScalar::decode("false", FieldType::Boolean).unwrap(),
            FieldScalar::Bool(false)
        );
        assert!(FieldScalar::decode("yes", FieldType::Boolean).is_err());
    }

    #[test]
    fn string_lists_round_trip() {
        let stored = encode_raw(&serde_json::json!(["a", "b"])).unwrap();
        assert_eq!(
            FieldScalar::decode(&stored, FieldType::MultiSelect).unwrap(),
            FieldScalar::StringList(vec!["a".to_string(), "b".to_string()])
        );
        assert!(FieldScalar::decode("not json", FieldType::MultiSelect).is_err());
    }

    #[test]
    fn empty_string_decodes_to_null_for_every_type() {
        for field_type in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::MultiSelect,
            FieldType::Date,
        ] {
            assert_eq!(
                FieldScalar::decode("", field_type).unwrap(),
                FieldScalar::Null
            );
        }
    }

    #[test]
    fn dates_are_returned_verbatim() {
        assert_eq!(
            FieldScalar::decode("2026-03-01T10:00:00Z", FieldType::DateTime).unwrap(),
            FieldScalar::DateIso("2026-03-01T10:00:00Z".to_string())
        );
    }

    #[test]
    fn null_encodes_to_empty_string() {
        assert_eq!(encode_raw(&serde_json::Value::Null).unwrap(), "");
    }

    #[test]
    fn malformed_number_surfaces_decode_error() {
        assert!(FieldScalar::decode("4x", FieldType::Number).is_err());
        assert!(FieldScalar::decode("4x", FieldType::Currency).is_err());
    }
}
