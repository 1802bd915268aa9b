// Unified metadata interface - the request/response surface of the platform.
// Collaborator routers and the generic listing UI call these procedures with
// an entity type key and entity ids; they never see row internals.

use axum::{
    extract::{Path as AxumPath, Query, State},
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    context::RequestContext,
    error::AppError,
    models::{
        EntityKind, FieldDefinitionPatch, NewEntityRelation, NewFieldDefinition,
        NewRelationDefinition, NewViewConfiguration, RelationDefinitionPatch,
        ViewConfigurationPatch,
    },
};

// HTTP request/query types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFieldsQuery {
    pub entity_type: EntityKind,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderFieldsRequest {
    pub entity_type: EntityKind,
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValuesRequest {
    pub values: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValuesRequest {
    pub entity_type: EntityKind,
    pub entity_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRelationDefinitionsQuery {
    #[serde(default)]
    pub source_entity_type: Option<EntityKind>,
    #[serde(default)]
    pub target_entity_type: Option<EntityKind>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRelationsQuery {
    #[serde(default)]
    pub relation_def_id: Option<Uuid>,
    pub source_entity_type: EntityKind,
    pub source_entity_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRelationsRequest {
    pub relation_def_id: Uuid,
    pub source_entity_id: String,
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewsQuery {
    pub entity_type: EntityKind,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateViewRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDefaultViewRequest {
    pub entity_type: EntityKind,
    #[serde(default)]
    pub view_id: Option<Uuid>,
}

// Field definition handlers

async fn create_field_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<NewFieldDefinition>,
) -> Result<Json<Value>, AppError> {
    let field = state.fields.create_field(&ctx, input).await?;
    Ok(Json(json!({ "field": field })))
}

async fn list_fields_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListFieldsQuery>,
) -> Result<Json<Value>, AppError> {
    let fields = state
        .fields
        .list_fields(&ctx, &query.entity_type, !query.include_inactive)
        .await?;
    Ok(Json(json!({ "fields": fields })))
}

async fn get_field_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let field = state.fields.get_field(&ctx, id).await?;
    Ok(Json(json!({ "field": field })))
}

async fn update_field_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<FieldDefinitionPatch>,
) -> Result<Json<Value>, AppError> {
    let field = state.fields.update_field(&ctx, id, patch).await?;
    Ok(Json(json!({ "field": field })))
}

async fn delete_field_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.fields.delete_field(&ctx, id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn reorder_fields_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ReorderFieldsRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .fields
        .reorder_fields(&ctx, &req.entity_type, &req.ordered_ids)
        .await?;
    Ok(Json(json!({ "reordered": true })))
}

// Field value handlers

async fn get_values_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath((entity_type, entity_id)): AxumPath<(EntityKind, String)>,
) -> Result<Json<Value>, AppError> {
    let values = state
        .fields
        .get_values(&ctx, &entity_type, &entity_id)
        .await?;
    Ok(Json(json!({ "values": values })))
}

async fn set_values_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath((entity_type, entity_id)): AxumPath<(EntityKind, String)>,
    Json(req): Json<SetValuesRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .fields
        .set_values(&ctx, &entity_type, &entity_id, &req.values)
        .await?;
    Ok(Json(json!({ "updated": true })))
}

async fn get_values_map_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath((entity_type, entity_id)): AxumPath<(EntityKind, String)>,
) -> Result<Json<Value>, AppError> {
    let values = state
        .fields
        .get_values_map(&ctx, &entity_type, &entity_id)
        .await?;
    Ok(Json(json!({ "values": values })))
}

async fn get_values_bulk_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<BulkValuesRequest>,
) -> Result<Json<Value>, AppError> {
    let entities = state
        .fields
        .get_values_bulk(&ctx, &req.entity_type, &req.entity_ids)
        .await?;
    Ok(Json(json!({ "entities": entities })))
}

// Relation definition handlers

async fn create_relation_definition_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<NewRelationDefinition>,
) -> Result<Json<Value>, AppError> {
    let definition = state.relations.create_definition(&ctx, input).await?;
    Ok(Json(json!({ "definition": definition })))
}

async fn list_relation_definitions_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListRelationDefinitionsQuery>,
) -> Result<Json<Value>, AppError> {
    let definitions = state
        .relations
        .list_definitions(
            &ctx,
            query.source_entity_type.as_ref(),
            query.target_entity_type.as_ref(),
            !query.include_inactive,
        )
        .await?;
    Ok(Json(json!({ "definitions": definitions })))
}

async fn get_relation_definition_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let definition = state.relations.get_definition(&ctx, id).await?;
    Ok(Json(json!({ "definition": definition })))
}

async fn update_relation_definition_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<RelationDefinitionPatch>,
) -> Result<Json<Value>, AppError> {
    let definition = state.relations.update_definition(&ctx, id, patch).await?;
    Ok(Json(json!({ "definition": definition })))
}

async fn delete_relation_definition_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.relations.delete_definition(&ctx, id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

// Entity relation handlers

async fn add_relation_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<NewEntityRelation>,
) -> Result<Json<Value>, AppError> {
    let relation = state.relations.add_relation(&ctx, input).await?;
    Ok(Json(json!({ "relation": relation })))
}

async fn list_relations_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListRelationsQuery>,
) -> Result<Json<Value>, AppError> {
    let relations = state
        .relations
        .list_relations(
            &ctx,
            query.relation_def_id,
            &query.source_entity_type,
            &query.source_entity_id,
        )
        .await?;
    Ok(Json(json!({ "relations": relations })))
}

async fn remove_relation_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.relations.remove_relation(&ctx, id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn reorder_relations_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ReorderRelationsRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .relations
        .reorder_relations(&ctx, req.relation_def_id, &req.source_entity_id, &req.ordered_ids)
        .await?;
    Ok(Json(json!({ "reordered": true })))
}

// View configuration handlers

async fn create_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<NewViewConfiguration>,
) -> Result<Json<Value>, AppError> {
    let view = state.views.create_view(&ctx, input).await?;
    Ok(Json(json!({ "view": view })))
}

async fn list_views_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListViewsQuery>,
) -> Result<Json<Value>, AppError> {
    let views = state.views.list_views(&ctx, &query.entity_type).await?;
    Ok(Json(json!({ "views": views })))
}

async fn get_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let view = state.views.get_view(&ctx, id).await?;
    Ok(Json(json!({ "view": view })))
}

async fn update_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<ViewConfigurationPatch>,
) -> Result<Json<Value>, AppError> {
    let view = state.views.update_view(&ctx, id, patch).await?;
    Ok(Json(json!({ "view": view })))
}

async fn delete_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.views.delete_view(&ctx, id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn duplicate_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<DuplicateViewRequest>,
) -> Result<Json<Value>, AppError> {
    let view = state.views.duplicate_view(&ctx, id, req.name).await?;
    Ok(Json(json!({ "view": view })))
}

async fn set_default_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<SetDefaultViewRequest>,
) -> Result<Json<Value>, AppError> {
    let view = state
        .views
        .set_default_view(&ctx, &req.entity_type, req.view_id)
        .await?;
    Ok(Json(json!({ "view": view })))
}

async fn get_default_view_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListViewsQuery>,
) -> Result<Json<Value>, AppError> {
    let view = state
        .views
        .get_default_view(&ctx, &query.entity_type)
        .await?;
    Ok(Json(json!({ "view": view })))
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

// Create unified router

pub fn create_metadata_router(state: AppState) -> Router {
    Router::new()
        // Custom field definitions
        .route("/fields", post(create_field_handler))
        .route("/fields", get(list_fields_handler))
        .route("/fields/reorder", post(reorder_fields_handler))
        .route("/fields/{id}", get(get_field_handler))
        .route("/fields/{id}", patch(update_field_handler))
        .route("/fields/{id}", delete(delete_field_handler))
        // Custom field values
        .route("/entities/{entity_type}/{entity_id}/values", get(get_values_handler))
        .route("/entities/{entity_type}/{entity_id}/values", put(set_values_handler))
        .route("/entities/{entity_type}/{entity_id}/values/map", get(get_values_map_handler))
        .route("/values/bulk", post(get_values_bulk_handler))
        // Relation definitions
        .route("/relations/definitions", post(create_relation_definition_handler))
        .route("/relations/definitions", get(list_relation_definitions_handler))
        .route("/relations/definitions/{id}", get(get_relation_definition_handler))
        .route("/relations/definitions/{id}", patch(update_relation_definition_handler))
        .route("/relations/definitions/{id}", delete(delete_relation_definition_handler))
        // Entity relations
        .route("/relations", post(add_relation_handler))
        .route("/relations", get(list_relations_handler))
        .route("/relations/reorder", post(reorder_relations_handler))
        .route("/relations/{id}", delete(remove_relation_handler))
        // View configurations
        .route("/views", post(create_view_handler))
        .route("/views", get(list_views_handler))
        .route("/views/default", put(set_default_view_handler))
        .route("/views/default", get(get_default_view_handler))
        .route("/views/{id}", get(get_view_handler))
        .route("/views/{id}", patch(update_view_handler))
        .route("/views/{id}", delete(delete_view_handler))
        .route("/views/{id}/duplicate", post(duplicate_view_handler))
        // Health
        .route("/health", get(health_handler))
        .with_state(state)
}
