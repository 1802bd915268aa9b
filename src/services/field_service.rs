// FieldService - custom field definitions and per-entity values.
// Definitions are authoritative on reads: values stored under an inactive or
// deleted definition never surface, even if rows still exist.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::core::{encode_raw, FieldScalar};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;
use crate::models::{
    validate_field_key, EntityKind, FieldDefinition, FieldDefinitionPatch, FieldValueEntry,
    NewFieldDefinition, StoredFieldValue,
};

#[derive(Clone)]
pub struct FieldService {
    db: Arc<Database>,
}

impl FieldService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create_field(
        &self,
        ctx: &RequestContext,
        input: NewFieldDefinition,
    ) -> AppResult<FieldDefinition> {
        validate_field_key(&input.field_key)?;

        let sort_order = match input.sort_order {
            Some(order) => order,
            None => {
                self.db
                    .max_field_sort_order(ctx.tenant_id, &input.entity_type)
                    .await?
                    + 1
            }
        };

        let now = Utc::now();
        let def = FieldDefinition {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            entity_type: input.entity_type,
            field_key: input.field_key,
            name: input.name,
            field_type: input.field_type,
            options: input.options,
            is_required: input.is_required,
            validation: input.validation,
            default_value: input.default_value,
            sort_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_field_definition(&def).await?;
        tracing::debug!(field_key = %def.field_key, entity_type = %def.entity_type, "created field definition");
        Ok(def)
    }

    pub async fn get_field(&self, ctx: &RequestContext, id: Uuid) -> AppResult<FieldDefinition> {
        self.db
            .get_field_definition(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Field definition {} not found", id)))
    }

    pub async fn update_field(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        patch: FieldDefinitionPatch,
    ) -> AppResult<FieldDefinition> {
        let mut def = self.get_field(ctx, id).await?;

        if let Some(name) = patch.name {
            def.name = name;
        }
        if let Some(field_type) = patch.field_type {
            def.field_type = field_type;
        }
        if let Some(options) = patch.options {
            def.options = options;
        }
        if let Some(is_required) = patch.is_required {
            def.is_required = is_required;
        }
        if let Some(validation) = patch.validation {
            def.validation = validation;
        }
        if let Some(default_value) = patch.default_value {
            def.default_value = default_value;
        }
        if let Some(sort_order) = patch.sort_order {
            def.sort_order = sort_order;
        }
        if let Some(is_active) = patch.is_active {
            def.is_active = is_active;
        }
        def.updated_at = Utc::now();

        if !self.db.update_field_definition(&def).await? {
            return Err(AppError::NotFound(format!(
                "Field definition {} not found",
                id
            )));
        }
        Ok(def)
    }

    /// Delete a definition and all of its stored values.
    pub async fn delete_field(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        if !self
            .db
            .delete_field_definition_cascade(ctx.tenant_id, id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Field definition {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Assign positions following the order of `ordered_ids`. Ids that do not
    /// belong to the `(tenant, entity_type)` scope are skipped by the batch.
    pub async fn reorder_fields(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        ordered_ids: &[Uuid],
    ) -> AppResult<()> {
        self.db
            .reorder_field_definitions(ctx.tenant_id, entity_type, ordered_ids)
            .await
    }

    pub async fn list_fields(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        active_only: bool,
    ) -> AppResult<Vec<FieldDefinition>> {
        self.db
            .list_field_definitions(ctx.tenant_id, entity_type, active_only)
            .await
    }

    /// Raw values for one entity: every active definition paired with its
    /// stored value, falling back to the definition default, else null.
    pub async fn get_values(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        entity_id: &str,
    ) -> AppResult<Vec<FieldValueEntry>> {
        let definitions = self.list_fields(ctx, entity_type, true).await?;
        let stored = self
            .db
            .list_field_values(ctx.tenant_id, entity_type, entity_id)
            .await?;
        let by_field: HashMap<Uuid, &StoredFieldValue> =
            stored.iter().map(|row| (row.field_id, row)).collect();

        Ok(definitions
            .into_iter()
            .map(|definition| {
                let value = by_field
                    .get(&definition.id)
                    .map(|row| row.value.clone())
                    .or_else(|| definition.default_value.clone());
                FieldValueEntry { definition, value }
            })
            .collect())
    }

    /// Store values keyed by field key. Keys that match no active definition
    /// are dropped; the surviving upserts apply as one atomic batch.
    pub async fn set_values(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        entity_id: &str,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> AppResult<()> {
        let definitions = self.list_fields(ctx, entity_type, true).await?;
        let by_key: HashMap<&str, &FieldDefinition> = definitions
            .iter()
            .map(|def| (def.field_key.as_str(), def))
            .collect();

        let mut batch = Vec::new();
        for (key, raw) in values {
            match by_key.get(key.as_str()) {
                Some(def) => batch.push((def.id, encode_raw(raw)?)),
                None => {
                    tracing::debug!(field_key = %key, entity_type = %entity_type, "dropping value for unknown field");
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.db
            .upsert_field_values(ctx.tenant_id, entity_type, entity_id, &batch)
            .await
    }

    /// Typed values for one entity, keyed by field key. Every active field is
    /// present; missing values decode to null.
    pub async fn get_values_map(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        entity_id: &str,
    ) -> AppResult<HashMap<String, FieldScalar>> {
        let entries = self.get_values(ctx, entity_type, entity_id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let value = decode_or_null(&entry.definition, entry.value.as_deref());
                (entry.definition.field_key, value)
            })
            .collect())
    }

    /// Typed values for many entities at once. Empty input returns an empty
    /// map without touching the store.
    pub async fn get_values_bulk(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        entity_ids: &[String],
    ) -> AppResult<HashMap<String, HashMap<String, FieldScalar>>> {
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let definitions = self.list_fields(ctx, entity_type, true).await?;
        let stored = self
            .db
            .list_field_values_bulk(ctx.tenant_id, entity_type, entity_ids)
            .await?;

        let mut by_entity: HashMap<&str, HashMap<Uuid, &StoredFieldValue>> = HashMap::new();
        for row in &stored {
            by_entity
                .entry(row.entity_id.as_str())
                .or_default()
                .insert(row.field_id, row);
        }

        let mut result = HashMap::new();
        for entity_id in entity_ids {
            let rows = by_entity.get(entity_id.as_str());
            let values = definitions
                .iter()
                .map(|def| {
                    let raw = rows
                        .and_then(|map| map.get(&def.id))
                        .map(|row| row.value.as_str())
                        .or(def.default_value.as_deref());
                    (def.field_key.clone(), decode_or_null(def, raw))
                })
                .collect();
            result.insert(entity_id.clone(), values);
        }
        Ok(result)
    }
}

/// Decode one stored value under its definition. A value that no longer
/// parses under the declared type is logged and read as null rather than
/// failing the whole listing.
fn decode_or_null(def: &FieldDefinition, raw: Option<&str>) -> FieldScalar {
    let Some(raw) = raw else {
        return FieldScalar::Null;
    };
    match FieldScalar::decode(raw, def.field_type) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                field_key = %def.field_key,
                field_type = %def.field_type.as_str(),
                "undecodable stored value read as null: {}", e
            );
            FieldScalar::Null
        }
    }
}
