// RelationService - relation definitions and the relation graph resolver.
// Edges are stored once, from the declaring side; the other direction is a
// read-time view computed from the definitions (see core::inverse_relations).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::core::{bidirectional_inverses_for, inverse_candidates_for, targets_include};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;
use crate::models::{
    validate_field_key, EntityKind, EntityRelation, EntityRelationEntry, NewEntityRelation,
    NewRelationDefinition, RelationDefinition, RelationDefinitionEntry, RelationDefinitionPatch,
};

#[derive(Clone)]
pub struct RelationService {
    db: Arc<Database>,
}

impl RelationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create_definition(
        &self,
        ctx: &RequestContext,
        input: NewRelationDefinition,
    ) -> AppResult<RelationDefinition> {
        validate_field_key(&input.field_key)?;
        if input.target_entity_types.is_empty() {
            return Err(AppError::Validation(
                "A relation definition needs at least one target entity type".to_string(),
            ));
        }

        let now = Utc::now();
        let def = RelationDefinition {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            name: input.name,
            field_key: input.field_key,
            source_entity_type: input.source_entity_type,
            target_entity_types: input.target_entity_types,
            relation_type: input.relation_type,
            is_bidirectional: input.is_bidirectional,
            inverse_name: input.inverse_name,
            display_fields: input.display_fields,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_relation_definition(&def).await?;
        tracing::debug!(field_key = %def.field_key, source = %def.source_entity_type, "created relation definition");
        Ok(def)
    }

    pub async fn get_definition(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> AppResult<RelationDefinition> {
        self.db
            .get_relation_definition(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Relation definition {} not found", id)))
    }

    pub async fn update_definition(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        patch: RelationDefinitionPatch,
    ) -> AppResult<RelationDefinition> {
        let mut def = self.get_definition(ctx, id).await?;

        if let Some(name) = patch.name {
            def.name = name;
        }
        if let Some(targets) = patch.target_entity_types {
            if targets.is_empty() {
                return Err(AppError::Validation(
                    "A relation definition needs at least one target entity type".to_string(),
                ));
            }
            def.target_entity_types = targets;
        }
        if let Some(relation_type) = patch.relation_type {
            def.relation_type = relation_type;
        }
        if let Some(is_bidirectional) = patch.is_bidirectional {
            def.is_bidirectional = is_bidirectional;
        }
        if let Some(inverse_name) = patch.inverse_name {
            def.inverse_name = inverse_name;
        }
        if let Some(display_fields) = patch.display_fields {
            def.display_fields = display_fields;
        }
        if let Some(is_active) = patch.is_active {
            def.is_active = is_active;
        }
        def.updated_at = Utc::now();

        if !self.db.update_relation_definition(&def).await? {
            return Err(AppError::NotFound(format!(
                "Relation definition {} not found",
                id
            )));
        }
        Ok(def)
    }

    /// Delete a definition together with every edge stored under it.
    pub async fn delete_definition(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        if !self
            .db
            .delete_relation_definition_cascade(ctx.tenant_id, id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Relation definition {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Definitions as seen from `source_entity_type`. Alongside directly
    /// declared definitions, bidirectional definitions declared from another
    /// kind that target this one are listed as re-oriented inverse entries,
    /// after the direct ones.
    pub async fn list_definitions(
        &self,
        ctx: &RequestContext,
        source_entity_type: Option<&EntityKind>,
        target_entity_type: Option<&EntityKind>,
        active_only: bool,
    ) -> AppResult<Vec<RelationDefinitionEntry>> {
        let direct = self
            .db
            .list_relation_definitions(ctx.tenant_id, source_entity_type, active_only)
            .await?;

        let mut entries: Vec<RelationDefinitionEntry> = direct
            .into_iter()
            .filter(|def| match target_entity_type {
                Some(kind) => targets_include(def, kind),
                None => true,
            })
            .map(RelationDefinitionEntry::direct)
            .collect();

        if let Some(viewed_from) = source_entity_type {
            let all_active = self
                .db
                .list_relation_definitions(ctx.tenant_id, None, true)
                .await?;
            for def in bidirectional_inverses_for(&all_active, viewed_from) {
                // The effective target of an inverse entry is the original
                // source kind.
                if let Some(kind) = target_entity_type {
                    if def.source_entity_type != *kind {
                        continue;
                    }
                }
                entries.push(RelationDefinitionEntry::inverse(def, viewed_from));
            }
        }

        Ok(entries)
    }

    /// Add one edge under a definition. The target kind must be declared by
    /// the definition; re-adding an existing `(definition, source, target)`
    /// triple returns the stored edge unchanged.
    pub async fn add_relation(
        &self,
        ctx: &RequestContext,
        input: NewEntityRelation,
    ) -> AppResult<EntityRelation> {
        let def = self.get_definition(ctx, input.relation_def_id).await?;
        if !targets_include(&def, &input.target_entity_type) {
            return Err(AppError::Forbidden(format!(
                "Entity type {} is not a declared target of relation {}",
                input.target_entity_type, def.field_key
            )));
        }

        if let Some(existing) = self
            .db
            .get_entity_relation_by_triple(
                ctx.tenant_id,
                def.id,
                &input.source_entity_id,
                &input.target_entity_id,
            )
            .await?
        {
            return Ok(existing);
        }

        let sort_order = self
            .db
            .max_relation_sort_order(ctx.tenant_id, def.id, &input.source_entity_id)
            .await?
            + 1;
        let edge = EntityRelation {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            relation_def_id: def.id,
            source_entity_type: def.source_entity_type.clone(),
            source_entity_id: input.source_entity_id,
            target_entity_type: input.target_entity_type,
            target_entity_id: input.target_entity_id,
            sort_order,
            created_at: Utc::now(),
        };
        self.db.insert_entity_relation_ignore(&edge).await?;

        // Re-read through the unique triple: if a concurrent add won the
        // insert, the stored row is the one to hand back.
        self.db
            .get_entity_relation_by_triple(
                ctx.tenant_id,
                edge.relation_def_id,
                &edge.source_entity_id,
                &edge.target_entity_id,
            )
            .await?
            .ok_or_else(|| AppError::Internal("Entity relation missing after insert".to_string()))
    }

    /// All entities related to `(source_entity_type, source_entity_id)`.
    /// Without a definition id only directly stored edges are returned;
    /// inverse inference needs a concrete definition to reason about.
    pub async fn list_relations(
        &self,
        ctx: &RequestContext,
        relation_def_id: Option<Uuid>,
        source_entity_type: &EntityKind,
        source_entity_id: &str,
    ) -> AppResult<Vec<EntityRelationEntry>> {
        let direct = self
            .db
            .list_entity_relations_from(
                ctx.tenant_id,
                source_entity_type,
                source_entity_id,
                relation_def_id,
            )
            .await?;

        let Some(def_id) = relation_def_id else {
            return Ok(direct.iter().map(EntityRelationEntry::direct).collect());
        };

        let current = self.get_definition(ctx, def_id).await?;
        let all_active = self
            .db
            .list_relation_definitions(ctx.tenant_id, None, true)
            .await?;
        let candidates = inverse_candidates_for(&all_active, &current);
        if candidates.is_empty() {
            return Ok(direct.iter().map(EntityRelationEntry::direct).collect());
        }

        let candidate_ids: Vec<Uuid> = candidates.iter().map(|def| def.id).collect();
        let inverse = self
            .db
            .list_entity_relations_to(
                ctx.tenant_id,
                &candidate_ids,
                source_entity_type,
                source_entity_id,
            )
            .await?;

        // Direct edges win; inverse rows that resolve to an already-listed
        // related entity are dropped.
        let mut seen_targets: HashSet<String> = HashSet::new();
        let mut entries: Vec<EntityRelationEntry> = Vec::with_capacity(direct.len());
        for edge in &direct {
            seen_targets.insert(edge.target_entity_id.clone());
            entries.push(EntityRelationEntry::direct(edge));
        }
        for edge in &inverse {
            // Presented target of an inverse row is the edge's source side.
            if seen_targets.insert(edge.source_entity_id.clone()) {
                entries.push(EntityRelationEntry::inverse(edge));
            }
        }
        Ok(entries)
    }

    /// Remove one stored edge. Inverse traversal is never materialized, so
    /// this works no matter which side the edge was originally added from.
    pub async fn remove_relation(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        if !self.db.delete_entity_relation(ctx.tenant_id, id).await? {
            return Err(AppError::NotFound(format!(
                "Entity relation {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Assign positions following the order of `ordered_ids`, scoped to one
    /// definition and source entity. Foreign ids are skipped by the batch.
    pub async fn reorder_relations(
        &self,
        ctx: &RequestContext,
        relation_def_id: Uuid,
        source_entity_id: &str,
        ordered_ids: &[Uuid],
    ) -> AppResult<()> {
        self.db
            .reorder_entity_relations(
                ctx.tenant_id,
                relation_def_id,
                source_entity_id,
                ordered_ids,
            )
            .await
    }
}
