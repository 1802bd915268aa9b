mod common;

use common::{ctx, platform};

use entity_platform::context::RequestContext;
use entity_platform::error::AppError;
use entity_platform::models::{
    EntityKind, NewViewConfiguration, SortOrder, ViewColumn, ViewConfigurationPatch, ViewType,
};

fn new_view(entity_type: EntityKind, name: &str) -> NewViewConfiguration {
    NewViewConfiguration {
        entity_type,
        name: name.to_string(),
        view_type: ViewType::Table,
        is_default: false,
        is_shared: false,
        columns: None,
        sort_by: None,
        sort_order: None,
        filters: None,
        group_by: None,
    }
}

#[tokio::test]
async fn the_default_slot_is_exclusive_per_user_and_entity_type() {
    let p = platform().await;
    let ctx = ctx();

    let mut first = new_view(EntityKind::Client, "first");
    first.is_default = true;
    let first = p.views.create_view(&ctx, first).await.unwrap();

    let mut second = new_view(EntityKind::Client, "second");
    second.is_default = true;
    let second = p.views.create_view(&ctx, second).await.unwrap();

    let views = p.views.list_views(&ctx, &EntityKind::Client).await.unwrap();
    let defaults: Vec<_> = views.iter().filter(|v| v.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);
    assert!(!p.views.get_view(&ctx, first.id).await.unwrap().is_default);

    // A default on another entity type is untouched by the flip.
    let mut other = new_view(EntityKind::Project, "projects");
    other.is_default = true;
    let other = p.views.create_view(&ctx, other).await.unwrap();
    assert!(p.views.get_view(&ctx, other.id).await.unwrap().is_default);
}

#[tokio::test]
async fn set_default_view_flips_between_views() {
    let p = platform().await;
    let ctx = ctx();

    let v1 = p.views.create_view(&ctx, new_view(EntityKind::Task, "one")).await.unwrap();
    let v2 = p.views.create_view(&ctx, new_view(EntityKind::Task, "two")).await.unwrap();

    p.views.set_default_view(&ctx, &EntityKind::Task, Some(v1.id)).await.unwrap();
    p.views.set_default_view(&ctx, &EntityKind::Task, Some(v2.id)).await.unwrap();

    let views = p.views.list_views(&ctx, &EntityKind::Task).await.unwrap();
    let defaults: Vec<_> = views.iter().filter(|v| v.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, v2.id);

    // Clearing leaves no default at all.
    p.views.set_default_view(&ctx, &EntityKind::Task, None).await.unwrap();
    assert!(p.views.get_default_view(&ctx, &EntityKind::Task).await.unwrap().is_none());
}

#[tokio::test]
async fn default_resolution_prefers_own_over_shared() {
    let p = platform().await;
    let owner = ctx();
    let colleague = RequestContext::new(owner.tenant_id, uuid::Uuid::new_v4());

    let mut shared = new_view(EntityKind::Client, "team default");
    shared.is_default = true;
    shared.is_shared = true;
    let shared = p.views.create_view(&owner, shared).await.unwrap();

    // No own default yet: the tenant-shared default applies.
    let resolved = p.views.get_default_view(&colleague, &EntityKind::Client).await.unwrap().unwrap();
    assert_eq!(resolved.id, shared.id);

    let mut own = new_view(EntityKind::Client, "mine");
    own.is_default = true;
    let own = p.views.create_view(&colleague, own).await.unwrap();
    let resolved = p.views.get_default_view(&colleague, &EntityKind::Client).await.unwrap().unwrap();
    assert_eq!(resolved.id, own.id);

    // The owner still resolves to their shared view.
    let resolved = p.views.get_default_view(&owner, &EntityKind::Client).await.unwrap().unwrap();
    assert_eq!(resolved.id, shared.id);
}

#[tokio::test]
async fn no_view_resolves_when_nothing_is_configured() {
    let p = platform().await;
    let ctx = ctx();
    assert!(p.views.get_default_view(&ctx, &EntityKind::Payment).await.unwrap().is_none());
}

#[tokio::test]
async fn defaulting_a_shared_view_clones_it_for_the_caller() {
    let p = platform().await;
    let owner = ctx();
    let colleague = RequestContext::new(owner.tenant_id, uuid::Uuid::new_v4());

    let mut shared = new_view(EntityKind::Client, "team view");
    shared.is_shared = true;
    let shared = p.views.create_view(&owner, shared).await.unwrap();

    let clone = p
        .views
        .set_default_view(&colleague, &EntityKind::Client, Some(shared.id))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(clone.id, shared.id);
    assert_eq!(clone.user_id, Some(colleague.user_id));
    assert!(clone.is_default);
    assert!(!clone.is_shared);

    // The original row is never mutated on behalf of another user.
    let original = p.views.get_view(&owner, shared.id).await.unwrap();
    assert!(!original.is_default);
    assert_eq!(original.user_id, Some(owner.user_id));
}

#[tokio::test]
async fn only_the_owner_may_mutate_a_view() {
    let p = platform().await;
    let owner = ctx();
    let colleague = RequestContext::new(owner.tenant_id, uuid::Uuid::new_v4());

    let mut shared = new_view(EntityKind::Client, "team view");
    shared.is_shared = true;
    let shared = p.views.create_view(&owner, shared).await.unwrap();

    // Shared views are readable but not mutable for non-owners.
    p.views.get_view(&colleague, shared.id).await.unwrap();
    let patch = ViewConfigurationPatch { name: Some("renamed".to_string()), ..Default::default() };
    let err = p.views.update_view(&colleague, shared.id, patch).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = p.views.delete_view(&colleague, shared.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // A private view of another user is not even visible.
    let private = p.views.create_view(&owner, new_view(EntityKind::Client, "private")).await.unwrap();
    let err = p.views.get_view(&colleague, private.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn duplicating_requires_an_owned_or_shared_source() {
    let p = platform().await;
    let owner = ctx();
    let colleague = RequestContext::new(owner.tenant_id, uuid::Uuid::new_v4());

    let mut shared = new_view(EntityKind::Client, "team view");
    shared.is_shared = true;
    shared.is_default = true;
    shared.columns = Some(vec![ViewColumn {
        field_key: "name".to_string(),
        width: Some(200),
        visible: true,
        order: 0,
    }]);
    let shared = p.views.create_view(&owner, shared).await.unwrap();

    let copy = p
        .views
        .duplicate_view(&colleague, shared.id, "my copy".to_string())
        .await
        .unwrap();
    assert_eq!(copy.name, "my copy");
    assert_eq!(copy.user_id, Some(colleague.user_id));
    assert!(!copy.is_default);
    assert!(!copy.is_shared);
    assert_eq!(copy.columns, shared.columns);

    let private = p.views.create_view(&owner, new_view(EntityKind::Client, "private")).await.unwrap();
    let err = p
        .views
        .duplicate_view(&colleague, private.id, "nope".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn patch_updates_presentation_and_clears_on_null() {
    let p = platform().await;
    let ctx = ctx();

    let mut input = new_view(EntityKind::Client, "board");
    input.sort_by = Some("name".to_string());
    input.sort_order = Some(SortOrder::Asc);
    let view = p.views.create_view(&ctx, input).await.unwrap();

    let patch = ViewConfigurationPatch {
        view_type: Some(ViewType::Kanban),
        group_by: Some(Some("stage".to_string())),
        sort_by: Some(None),
        sort_order: Some(None),
        ..Default::default()
    };
    let updated = p.views.update_view(&ctx, view.id, patch).await.unwrap();
    assert_eq!(updated.view_type, ViewType::Kanban);
    assert_eq!(updated.group_by.as_deref(), Some("stage"));
    assert!(updated.sort_by.is_none());
    assert!(updated.sort_order.is_none());
    // Untouched fields survive.
    assert_eq!(updated.name, "board");
}

#[tokio::test]
async fn marking_default_through_update_clears_the_previous_one() {
    let p = platform().await;
    let ctx = ctx();

    let mut first = new_view(EntityKind::Client, "first");
    first.is_default = true;
    let first = p.views.create_view(&ctx, first).await.unwrap();
    let second = p.views.create_view(&ctx, new_view(EntityKind::Client, "second")).await.unwrap();

    let patch = ViewConfigurationPatch { is_default: Some(true), ..Default::default() };
    p.views.update_view(&ctx, second.id, patch).await.unwrap();

    assert!(!p.views.get_view(&ctx, first.id).await.unwrap().is_default);
    assert!(p.views.get_view(&ctx, second.id).await.unwrap().is_default);
}

#[tokio::test]
async fn set_default_rejects_a_view_of_another_entity_type() {
    let p = platform().await;
    let ctx = ctx();

    let view = p.views.create_view(&ctx, new_view(EntityKind::Client, "clients")).await.unwrap();
    let err = p
        .views
        .set_default_view(&ctx, &EntityKind::Project, Some(view.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn views_are_tenant_scoped() {
    let p = platform().await;
    let tenant_a = ctx();
    let tenant_b = ctx();

    let mut shared = new_view(EntityKind::Client, "a view");
    shared.is_shared = true;
    let view = p.views.create_view(&tenant_a, shared).await.unwrap();

    let err = p.views.get_view(&tenant_b, view.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(p.views.list_views(&tenant_b, &EntityKind::Client).await.unwrap().is_empty());
}
