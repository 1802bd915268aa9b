// Domain model types for the tenant metadata platform.
// Records mirror the persisted tables; input/patch types carry the
// procedure-interface payloads.

pub mod fields;
pub mod relations;
pub mod views;

pub use fields::{
    FieldDefinition, FieldDefinitionPatch, FieldOption, FieldType, FieldValidation,
    FieldValueEntry, NewFieldDefinition, StoredFieldValue,
};
pub use relations::{
    EntityRelation, EntityRelationEntry, NewEntityRelation, NewRelationDefinition,
    RelationDefinition, RelationDefinitionEntry, RelationDefinitionPatch, RelationType,
};
pub use views::{
    NewViewConfiguration, SortOrder, ViewColumn, ViewConfiguration, ViewConfigurationPatch,
    ViewFilter, ViewType,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::AppError;

const GENERIC_PREFIX: &str = "generic:";

static GENERIC_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z][a-z0-9_-]*$").expect("static slug pattern"));

static FIELD_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z][a-z0-9_]*$").expect("static field key pattern"));

/// Validate the stable machine name of a field or relation definition.
pub fn validate_field_key(field_key: &str) -> Result<(), AppError> {
    if FIELD_KEY_RE.is_match(field_key) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid field key {:?}: expected lowercase letters, digits and underscores, \
             starting with a letter",
            field_key
        )))
    }
}

/// A kind of business object records can be attached to. Fixed kinds name the
/// collaborator tables; `Dynamic` covers tenant-invented object types, which
/// exist only in this platform and are addressed as `generic:<slug>`.
///
/// The storage layer keeps the string key either way, so new fixed kinds and
/// dynamic kinds share one representation on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EntityKind {
    Client,
    Project,
    Task,
    Proposal,
    Supplier,
    PurchaseOrder,
    Payment,
    Invoice,
    Dynamic(String),
}

impl EntityKind {
    /// Storage/wire key for this kind.
    pub fn key(&self) -> String {
        match self {
            EntityKind::Client => "client".to_string(),
            EntityKind::Project => "project".to_string(),
            EntityKind::Task => "task".to_string(),
            EntityKind::Proposal => "proposal".to_string(),
            EntityKind::Supplier => "supplier".to_string(),
            EntityKind::PurchaseOrder => "purchase_order".to_string(),
            EntityKind::Payment => "payment".to_string(),
            EntityKind::Invoice => "invoice".to_string(),
            EntityKind::Dynamic(slug) => format!("{}{}", GENERIC_PREFIX, slug),
        }
    }

    /// Parse a string key, validating at the boundary: bare names must match a
    /// known collaborator kind, dynamic kinds must carry a well-formed slug.
    pub fn parse(raw: &str) -> Result<EntityKind, AppError> {
        if let Some(slug) = raw.strip_prefix(GENERIC_PREFIX) {
            if !GENERIC_SLUG_RE.is_match(slug) {
                return Err(AppError::Validation(format!(
                    "Invalid dynamic entity type slug: {}",
                    raw
                )));
            }
            return Ok(EntityKind::Dynamic(slug.to_string()));
        }
        match raw {
            "client" => Ok(EntityKind::Client),
            "project" => Ok(EntityKind::Project),
            "task" => Ok(EntityKind::Task),
            "proposal" => Ok(EntityKind::Proposal),
            "supplier" => Ok(EntityKind::Supplier),
            "purchase_order" => Ok(EntityKind::PurchaseOrder),
            "payment" => Ok(EntityKind::Payment),
            "invoice" => Ok(EntityKind::Invoice),
            _ => Err(AppError::Validation(format!(
                "Unknown entity type: {}",
                raw
            ))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.key()
    }
}

impl TryFrom<String> for EntityKind {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        EntityKind::parse(&raw)
    }
}

/// Deserializes a present-but-null JSON field as `Some(None)`, so patch types
/// can tell "clear this column" apart from "leave it alone" (absent = `None`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
