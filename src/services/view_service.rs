// ViewService - saved list presentations and default-view resolution.
// A view is mutable only by its owner; ownerless rows are legacy shared
// records anyone in the tenant may manage. The default slot is exclusive per
// (user, entity type) and flipped inside a single transaction.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;
use crate::models::{
    EntityKind, NewViewConfiguration, ViewConfiguration, ViewConfigurationPatch,
};

#[derive(Clone)]
pub struct ViewService {
    db: Arc<Database>,
}

fn can_mutate(view: &ViewConfiguration, ctx: &RequestContext) -> bool {
    match view.user_id {
        Some(owner) => owner == ctx.user_id,
        None => true,
    }
}

fn visible_to(view: &ViewConfiguration, ctx: &RequestContext) -> bool {
    view.is_shared || can_mutate(view, ctx)
}

impl ViewService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create_view(
        &self,
        ctx: &RequestContext,
        input: NewViewConfiguration,
    ) -> AppResult<ViewConfiguration> {
        let now = Utc::now();
        let view = ViewConfiguration {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            user_id: Some(ctx.user_id),
            entity_type: input.entity_type,
            view_type: input.view_type,
            name: input.name,
            is_default: input.is_default,
            is_shared: input.is_shared,
            columns: input.columns,
            sort_by: input.sort_by,
            sort_order: input.sort_order,
            filters: input.filters,
            group_by: input.group_by,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_view(&view).await?;
        Ok(view)
    }

    async fn fetch_view(&self, ctx: &RequestContext, id: Uuid) -> AppResult<ViewConfiguration> {
        self.db
            .get_view(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("View {} not found", id)))
    }

    /// Read one view. Another user's private view stays invisible.
    pub async fn get_view(&self, ctx: &RequestContext, id: Uuid) -> AppResult<ViewConfiguration> {
        let view = self.fetch_view(ctx, id).await?;
        if !visible_to(&view, ctx) {
            return Err(AppError::NotFound(format!("View {} not found", id)));
        }
        Ok(view)
    }

    pub async fn list_views(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
    ) -> AppResult<Vec<ViewConfiguration>> {
        self.db
            .list_views(ctx.tenant_id, ctx.user_id, entity_type)
            .await
    }

    pub async fn update_view(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        patch: ViewConfigurationPatch,
    ) -> AppResult<ViewConfiguration> {
        let mut view = self.fetch_view(ctx, id).await?;
        if !can_mutate(&view, ctx) {
            return Err(AppError::Forbidden(format!(
                "View {} is owned by another user",
                id
            )));
        }

        let claims_default = patch.is_default == Some(true) && !view.is_default;
        if let Some(name) = patch.name {
            view.name = name;
        }
        if let Some(view_type) = patch.view_type {
            view.view_type = view_type;
        }
        if let Some(is_default) = patch.is_default {
            view.is_default = is_default;
        }
        if let Some(is_shared) = patch.is_shared {
            view.is_shared = is_shared;
        }
        if let Some(columns) = patch.columns {
            view.columns = columns;
        }
        if let Some(sort_by) = patch.sort_by {
            view.sort_by = sort_by;
        }
        if let Some(sort_order) = patch.sort_order {
            view.sort_order = sort_order;
        }
        if let Some(filters) = patch.filters {
            view.filters = filters;
        }
        if let Some(group_by) = patch.group_by {
            view.group_by = group_by;
        }
        view.updated_at = Utc::now();

        if !self.db.update_view(&view, claims_default).await? {
            return Err(AppError::NotFound(format!("View {} not found", id)));
        }
        Ok(view)
    }

    pub async fn delete_view(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        let view = self.fetch_view(ctx, id).await?;
        if !can_mutate(&view, ctx) {
            return Err(AppError::Forbidden(format!(
                "View {} is owned by another user",
                id
            )));
        }
        if !self.db.delete_view(ctx.tenant_id, id).await? {
            return Err(AppError::NotFound(format!("View {} not found", id)));
        }
        Ok(())
    }

    /// Copy an owned or shared view. The copy always starts as a private,
    /// non-default view of the caller.
    pub async fn duplicate_view(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        new_name: String,
    ) -> AppResult<ViewConfiguration> {
        let source = self.fetch_view(ctx, id).await?;
        if !source.is_shared && !can_mutate(&source, ctx) {
            return Err(AppError::Forbidden(format!(
                "View {} is owned by another user",
                id
            )));
        }

        let now = Utc::now();
        let copy = ViewConfiguration {
            id: Uuid::new_v4(),
            user_id: Some(ctx.user_id),
            name: new_name,
            is_default: false,
            is_shared: false,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.db.insert_view(&copy).await?;
        Ok(copy)
    }

    /// Make `view_id` the caller's default for `entity_type`, or clear the
    /// default when no id is given. Another user's shared view is cloned into
    /// a caller-owned copy instead of being mutated in place.
    pub async fn set_default_view(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
        view_id: Option<Uuid>,
    ) -> AppResult<Option<ViewConfiguration>> {
        let Some(view_id) = view_id else {
            self.db
                .clear_default_views(ctx.tenant_id, ctx.user_id, entity_type)
                .await?;
            return Ok(None);
        };

        let view = self.fetch_view(ctx, view_id).await?;
        if view.entity_type != *entity_type {
            return Err(AppError::Validation(format!(
                "View {} does not belong to entity type {}",
                view_id, entity_type
            )));
        }

        if view.user_id == Some(ctx.user_id) {
            if !self
                .db
                .mark_default_view(ctx.tenant_id, ctx.user_id, entity_type, view_id)
                .await?
            {
                return Err(AppError::NotFound(format!("View {} not found", view_id)));
            }
            return Ok(Some(self.fetch_view(ctx, view_id).await?));
        }

        if !view.is_shared && view.user_id.is_some() {
            return Err(AppError::Forbidden(format!(
                "View {} is owned by another user",
                view_id
            )));
        }

        // Shared (or ownerless) view: clone it for the caller and make the
        // clone the default, leaving the original untouched.
        let now = Utc::now();
        let clone = ViewConfiguration {
            id: Uuid::new_v4(),
            user_id: Some(ctx.user_id),
            is_default: true,
            is_shared: false,
            created_at: now,
            updated_at: now,
            ..view
        };
        self.db.insert_view(&clone).await?;
        Ok(Some(clone))
    }

    /// The view applied when the user opens a listing without choosing one:
    /// their own default, else a tenant-shared default, else none.
    pub async fn get_default_view(
        &self,
        ctx: &RequestContext,
        entity_type: &EntityKind,
    ) -> AppResult<Option<ViewConfiguration>> {
        if let Some(view) = self
            .db
            .get_user_default_view(ctx.tenant_id, ctx.user_id, entity_type)
            .await?
        {
            return Ok(Some(view));
        }
        self.db
            .get_shared_default_view(ctx.tenant_id, entity_type)
            .await
    }
}
