// Custom field definitions and stored values (the EAV half of the platform).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{double_option, EntityKind};

/// Closed set of value types a custom field can declare. The declared type
/// drives serialization on write and coercion on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Date,
    DateTime,
    Boolean,
    Select,
    MultiSelect,
    Url,
    Email,
    Phone,
    User,
    Users,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multiselect",
            FieldType::Url => "url",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::User => "user",
            FieldType::Users => "users",
        }
    }

    pub fn parse(raw: &str) -> Result<FieldType, AppError> {
        match raw {
            "text" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "currency" => Ok(FieldType::Currency),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "boolean" => Ok(FieldType::Boolean),
            "select" => Ok(FieldType::Select),
            "multiselect" => Ok(FieldType::MultiSelect),
            "url" => Ok(FieldType::Url),
            "email" => Ok(FieldType::Email),
            "phone" => Ok(FieldType::Phone),
            "user" => Ok(FieldType::User),
            "users" => Ok(FieldType::Users),
            _ => Err(AppError::Validation(format!("Unknown field type: {}", raw))),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl TryFrom<String> for FieldType {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        FieldType::parse(&raw)
    }
}

/// One choice of a select/multiselect field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A custom attribute declared by a tenant for one entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: EntityKind,
    pub field_key: String,
    pub name: String,
    pub field_type: FieldType,
    pub options: Option<Vec<FieldOption>>,
    pub is_required: bool,
    pub validation: Option<FieldValidation>,
    pub default_value: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored value row. `value` is the string serialization; the owning
/// definition's `field_type` decides how it reads back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFieldValue {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub field_id: Uuid,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldDefinition {
    pub entity_type: EntityKind,
    pub name: String,
    pub field_key: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub validation: Option<FieldValidation>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// Partial update. Absent fields are left untouched; `options`, `validation`
/// and `default_value` may be set to an explicit null to clear them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinitionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub field_type: Option<FieldType>,
    #[serde(default, deserialize_with = "double_option")]
    pub options: Option<Option<Vec<FieldOption>>>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub validation: Option<Option<FieldValidation>>,
    #[serde(default, deserialize_with = "double_option")]
    pub default_value: Option<Option<String>>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A definition together with the raw value resolved for one entity:
/// stored value if present, else the definition default, else null.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValueEntry {
    pub definition: FieldDefinition,
    pub value: Option<String>,
}
