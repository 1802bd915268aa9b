mod common;

use common::{ctx, platform};

use entity_platform::error::AppError;
use entity_platform::models::{
    EntityKind, NewEntityRelation, NewRelationDefinition, RelationDefinitionPatch, RelationType,
};

fn new_definition(
    key: &str,
    source: EntityKind,
    targets: Vec<EntityKind>,
    bidirectional: bool,
) -> NewRelationDefinition {
    NewRelationDefinition {
        name: key.to_string(),
        field_key: key.to_string(),
        source_entity_type: source,
        target_entity_types: targets,
        relation_type: RelationType::ManyToMany,
        is_bidirectional: bidirectional,
        inverse_name: None,
        display_fields: None,
    }
}

fn edge(def_id: uuid::Uuid, source: &str, target_type: EntityKind, target: &str) -> NewEntityRelation {
    NewEntityRelation {
        relation_def_id: def_id,
        source_entity_id: source.to_string(),
        target_entity_type: target_type,
        target_entity_id: target.to_string(),
    }
}

#[tokio::test]
async fn definitions_require_targets_and_unique_keys() {
    let p = platform().await;
    let ctx = ctx();

    let err = p
        .relations
        .create_definition(&ctx, new_definition("empty", EntityKind::Project, vec![], false))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    p.relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();
    let err = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same key from a different source type is a separate namespace.
    p.relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Task, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn undeclared_target_types_are_forbidden() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();

    let err = p
        .relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Client, "c1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn adding_the_same_edge_twice_is_idempotent() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();

    let first = p
        .relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();
    let second = p
        .relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let listed = p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Project, "p1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn edges_are_ordered_and_reorderable() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();

    let e1 = p.relations.add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1")).await.unwrap();
    let e2 = p.relations.add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s2")).await.unwrap();
    let e3 = p.relations.add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s3")).await.unwrap();
    assert_eq!((e1.sort_order, e2.sort_order, e3.sort_order), (0, 1, 2));

    p.relations
        .reorder_relations(&ctx, def.id, "p1", &[e3.id, e1.id, e2.id])
        .await
        .unwrap();
    let listed = p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Project, "p1")
        .await
        .unwrap();
    let targets: Vec<&str> = listed.iter().map(|e| e.target_entity_id.as_str()).collect();
    assert_eq!(targets, vec!["s3", "s1", "s2"]);
}

#[tokio::test]
async fn bidirectional_definitions_are_traversable_from_the_target_side() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], true),
        )
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    // No edge was ever written with Supplier as source.
    let listed = p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let entry = &listed[0];
    assert!(entry.is_inverse);
    assert_eq!(entry.source_entity_type, EntityKind::Supplier);
    assert_eq!(entry.source_entity_id, "s1");
    assert_eq!(entry.target_entity_type, EntityKind::Project);
    assert_eq!(entry.target_entity_id, "p1");
}

#[tokio::test]
async fn matching_pair_definitions_surface_the_return_trip() {
    let p = platform().await;
    let ctx = ctx();

    let outbound = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();
    let inbound = p
        .relations
        .create_definition(
            &ctx,
            new_definition("projects", EntityKind::Supplier, vec![EntityKind::Project], false),
        )
        .await
        .unwrap();

    p.relations
        .add_relation(&ctx, edge(outbound.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    let listed = p
        .relations
        .list_relations(&ctx, Some(inbound.id), &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_inverse);
    assert_eq!(listed[0].target_entity_id, "p1");
    assert_eq!(listed[0].relation_def_id, outbound.id);
}

#[tokio::test]
async fn direct_edges_win_over_inferred_inverse_rows() {
    let p = platform().await;
    let ctx = ctx();

    let outbound = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();
    let inbound = p
        .relations
        .create_definition(
            &ctx,
            new_definition("projects", EntityKind::Supplier, vec![EntityKind::Project], false),
        )
        .await
        .unwrap();

    // The same relationship declared from both ends.
    p.relations
        .add_relation(&ctx, edge(outbound.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(inbound.id, "s1", EntityKind::Project, "p1"))
        .await
        .unwrap();

    let listed = p
        .relations
        .list_relations(&ctx, Some(inbound.id), &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_inverse);
    assert_eq!(listed[0].target_entity_id, "p1");
}

#[tokio::test]
async fn inference_needs_a_concrete_definition() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], true),
        )
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    // Without a definition id only directly stored edges come back.
    let listed = p
        .relations
        .list_relations(&ctx, None, &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn disabling_bidirectionality_stops_inverse_traversal() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], true),
        )
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    let patch = RelationDefinitionPatch { is_bidirectional: Some(false), ..Default::default() };
    p.relations.update_definition(&ctx, def.id, patch).await.unwrap();

    let listed = p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn removing_a_direct_edge_removes_it_for_both_sides() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], true),
        )
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    // The inverse listing exposes the stored edge id; removing through it
    // removes the relationship everywhere.
    let from_supplier = p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Supplier, "s1")
        .await
        .unwrap();
    p.relations.remove_relation(&ctx, from_supplier[0].id).await.unwrap();

    assert!(p
        .relations
        .list_relations(&ctx, Some(def.id), &EntityKind::Project, "p1")
        .await
        .unwrap()
        .is_empty());
    let err = p.relations.remove_relation(&ctx, from_supplier[0].id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn deleting_a_definition_cascades_to_its_edges() {
    let p = platform().await;
    let ctx = ctx();

    let def = p
        .relations
        .create_definition(
            &ctx,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();
    p.relations
        .add_relation(&ctx, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap();

    p.relations.delete_definition(&ctx, def.id).await.unwrap();

    assert!(p
        .relations
        .list_relations(&ctx, None, &EntityKind::Project, "p1")
        .await
        .unwrap()
        .is_empty());
    let err = p.relations.get_definition(&ctx, def.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn listing_definitions_includes_virtual_inverse_entries() {
    let p = platform().await;
    let ctx = ctx();

    // Direct definition declared from the supplier side.
    p.relations
        .create_definition(
            &ctx,
            new_definition("contracts", EntityKind::Supplier, vec![EntityKind::Proposal], false),
        )
        .await
        .unwrap();
    // Bidirectional definition declared from the client side, targeting suppliers.
    let mut input = new_definition("preferred_suppliers", EntityKind::Client, vec![EntityKind::Supplier], true);
    input.inverse_name = Some("Preferred by".to_string());
    p.relations.create_definition(&ctx, input).await.unwrap();

    let entries = p
        .relations
        .list_definitions(&ctx, Some(&EntityKind::Supplier), None, true)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);

    // Direct entries come before virtual inverse ones.
    assert!(!entries[0].is_inverse);
    assert_eq!(entries[0].definition.field_key, "contracts");

    let inverse = &entries[1];
    assert!(inverse.is_inverse);
    assert_eq!(inverse.definition.name, "Preferred by");
    assert_eq!(inverse.definition.source_entity_type, EntityKind::Supplier);
    assert_eq!(inverse.definition.target_entity_types, vec![EntityKind::Client]);
}

#[tokio::test]
async fn definition_listing_filters_by_target_type() {
    let p = platform().await;
    let ctx = ctx();

    p.relations
        .create_definition(
            &ctx,
            new_definition("contracts", EntityKind::Supplier, vec![EntityKind::Proposal], false),
        )
        .await
        .unwrap();
    p.relations
        .create_definition(
            &ctx,
            new_definition("preferred_suppliers", EntityKind::Client, vec![EntityKind::Supplier], true),
        )
        .await
        .unwrap();

    // The inverse entry's effective target is the declaring side.
    let entries = p
        .relations
        .list_definitions(&ctx, Some(&EntityKind::Supplier), Some(&EntityKind::Client), true)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_inverse);

    let entries = p
        .relations
        .list_definitions(&ctx, Some(&EntityKind::Supplier), Some(&EntityKind::Task), true)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn relations_are_tenant_scoped() {
    let p = platform().await;
    let tenant_a = ctx();
    let tenant_b = ctx();

    let def = p
        .relations
        .create_definition(
            &tenant_a,
            new_definition("suppliers", EntityKind::Project, vec![EntityKind::Supplier], false),
        )
        .await
        .unwrap();

    let err = p
        .relations
        .add_relation(&tenant_b, edge(def.id, "p1", EntityKind::Supplier, "s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(p
        .relations
        .list_definitions(&tenant_b, Some(&EntityKind::Project), None, true)
        .await
        .unwrap()
        .is_empty());
}
