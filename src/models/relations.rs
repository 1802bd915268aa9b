// Relation definitions and concrete entity-to-entity edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{double_option, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::OneToOne => "one_to_one",
            RelationType::OneToMany => "one_to_many",
            RelationType::ManyToMany => "many_to_many",
        }
    }

    pub fn parse(raw: &str) -> Result<RelationType, AppError> {
        match raw {
            "one_to_one" => Ok(RelationType::OneToOne),
            "one_to_many" => Ok(RelationType::OneToMany),
            "many_to_many" => Ok(RelationType::ManyToMany),
            _ => Err(AppError::Validation(format!(
                "Unknown relation type: {}",
                raw
            ))),
        }
    }
}

impl From<RelationType> for String {
    fn from(relation_type: RelationType) -> Self {
        relation_type.as_str().to_string()
    }
}

impl TryFrom<String> for RelationType {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        RelationType::parse(&raw)
    }
}

/// A named relationship declared from one entity kind toward one or more
/// target kinds. No per-relationship join table exists; every concrete edge
/// lives in the shared `entity_relations` table keyed by this definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinition {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub field_key: String,
    pub source_entity_type: EntityKind,
    pub target_entity_types: Vec<EntityKind>,
    pub relation_type: RelationType,
    pub is_bidirectional: bool,
    pub inverse_name: Option<String>,
    pub display_fields: Option<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One concrete edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub relation_def_id: Uuid,
    pub source_entity_type: EntityKind,
    pub source_entity_id: String,
    pub target_entity_type: EntityKind,
    pub target_entity_id: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelationDefinition {
    pub name: String,
    pub field_key: String,
    pub source_entity_type: EntityKind,
    pub target_entity_types: Vec<EntityKind>,
    pub relation_type: RelationType,
    #[serde(default)]
    pub is_bidirectional: bool,
    #[serde(default)]
    pub inverse_name: Option<String>,
    #[serde(default)]
    pub display_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinitionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_entity_types: Option<Vec<EntityKind>>,
    #[serde(default)]
    pub relation_type: Option<RelationType>,
    #[serde(default)]
    pub is_bidirectional: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub inverse_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_fields: Option<Option<Vec<String>>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntityRelation {
    pub relation_def_id: Uuid,
    pub source_entity_id: String,
    pub target_entity_type: EntityKind,
    pub target_entity_id: String,
}

/// A definition as seen from one entity kind. Inverse entries are
/// bidirectional definitions declared from the other side, re-oriented so the
/// caller's kind appears as the source; they exist only in listings, never in
/// storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinitionEntry {
    #[serde(flatten)]
    pub definition: RelationDefinition,
    pub is_inverse: bool,
}

impl RelationDefinitionEntry {
    pub fn direct(definition: RelationDefinition) -> Self {
        Self {
            definition,
            is_inverse: false,
        }
    }

    /// Re-orient a definition declared from the other side: the display name
    /// falls back `inverse_name` -> `name`, and the effective target becomes
    /// the original source kind.
    pub fn inverse(definition: &RelationDefinition, viewed_from: &EntityKind) -> Self {
        let mut inverted = definition.clone();
        inverted.name = definition
            .inverse_name
            .clone()
            .unwrap_or_else(|| definition.name.clone());
        inverted.source_entity_type = viewed_from.clone();
        inverted.target_entity_types = vec![definition.source_entity_type.clone()];
        Self {
            definition: inverted,
            is_inverse: true,
        }
    }
}

/// One related entity as seen from a fixed viewpoint entity. For inverse
/// entries the underlying edge points *at* the viewpoint; the other end is
/// presented as the target so callers render both directions uniformly.
/// `id` is always the stored edge row, so removal works from either side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelationEntry {
    pub id: Uuid,
    pub relation_def_id: Uuid,
    pub source_entity_type: EntityKind,
    pub source_entity_id: String,
    pub target_entity_type: EntityKind,
    pub target_entity_id: String,
    pub sort_order: i64,
    pub is_inverse: bool,
}

impl EntityRelationEntry {
    pub fn direct(edge: &EntityRelation) -> Self {
        Self {
            id: edge.id,
            relation_def_id: edge.relation_def_id,
            source_entity_type: edge.source_entity_type.clone(),
            source_entity_id: edge.source_entity_id.clone(),
            target_entity_type: edge.target_entity_type.clone(),
            target_entity_id: edge.target_entity_id.clone(),
            sort_order: edge.sort_order,
            is_inverse: false,
        }
    }

    pub fn inverse(edge: &EntityRelation) -> Self {
        Self {
            id: edge.id,
            relation_def_id: edge.relation_def_id,
            source_entity_type: edge.target_entity_type.clone(),
            source_entity_id: edge.target_entity_id.clone(),
            target_entity_type: edge.source_entity_type.clone(),
            target_entity_id: edge.source_entity_id.clone(),
            sort_order: edge.sort_order,
            is_inverse: true,
        }
    }
}
