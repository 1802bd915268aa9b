// Database - SQLite-backed persistence for the metadata platform.
// This layer owns every SQL statement; services above it never see rows.
// Multi-row mutations (cascading deletes, reorders, value batches, default
// flips) run inside a single transaction so partial application is never
// observable. Uniqueness invariants live in the schema, which turns
// check-then-insert races into deterministic conflicts.

use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    EntityKind, EntityRelation, FieldDefinition, FieldType, RelationDefinition, RelationType,
    SortOrder, StoredFieldValue, ViewConfiguration, ViewType,
};

pub struct Database {
    pool: SqlitePool,
}

fn db_err(what: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(format!("Failed to {}: {}", what, e))
}

/// Map an insert failure, converting schema-level unique violations into the
/// conflict the caller can act on.
fn insert_err(what: &str, conflict: &str, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return AppError::Conflict(conflict.to_string());
        }
    }
    db_err(what, e)
}

fn decode_json<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
    column: &str,
) -> AppResult<Option<T>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
            AppError::DeserializationError(format!("Corrupt {} column: {}", column, e))
        }),
    }
}

fn encode_json<T: serde::Serialize>(value: &Option<T>, column: &str) -> AppResult<Option<String>> {
    value
        .as_ref()
        .map(|v| {
            serde_json::to_string(v).map_err(|e| {
                AppError::SerializationError(format!("Failed to encode {}: {}", column, e))
            })
        })
        .transpose()
}

fn row_to_field_definition(row: &SqliteRow) -> AppResult<FieldDefinition> {
    Ok(FieldDefinition {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        entity_type: EntityKind::parse(&row.get::<String, _>("entity_type"))?,
        field_key: row.get("field_key"),
        name: row.get("name"),
        field_type: FieldType::parse(&row.get::<String, _>("field_type"))?,
        options: decode_json(row.get::<Option<String>, _>("options"), "options")?,
        is_required: row.get("is_required"),
        validation: decode_json(row.get::<Option<String>, _>("validation"), "validation")?,
        default_value: row.get("default_value"),
        sort_order: row.get("sort_order"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_stored_value(row: &SqliteRow) -> AppResult<StoredFieldValue> {
    Ok(StoredFieldValue {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        field_id: row.get("field_id"),
        entity_type: EntityKind::parse(&row.get::<String, _>("entity_type"))?,
        entity_id: row.get("entity_id"),
        value: row.get("value"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_relation_definition(row: &SqliteRow) -> AppResult<RelationDefinition> {
    let target_entity_types: Vec<EntityKind> = decode_json(
        row.get::<Option<String>, _>("target_entity_types"),
        "target_entity_types",
    )?
    .unwrap_or_default();
    Ok(RelationDefinition {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        field_key: row.get("field_key"),
        source_entity_type: EntityKind::parse(&row.get::<String, _>("source_entity_type"))?,
        target_entity_types,
        relation_type: RelationType::parse(&row.get::<String, _>("relation_type"))?,
        is_bidirectional: row.get("is_bidirectional"),
        inverse_name: row.get("inverse_name"),
        display_fields: decode_json(
            row.get::<Option<String>, _>("display_fields"),
            "display_fields",
        )?,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_entity_relation(row: &SqliteRow) -> AppResult<EntityRelation> {
    Ok(EntityRelation {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        relation_def_id: row.get("relation_def_id"),
        source_entity_type: EntityKind::parse(&row.get::<String, _>("source_entity_type"))?,
        source_entity_id: row.get("source_entity_id"),
        target_entity_type: EntityKind::parse(&row.get::<String, _>("target_entity_type"))?,
        target_entity_id: row.get("target_entity_id"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    })
}

fn row_to_view(row: &SqliteRow) -> AppResult<ViewConfiguration> {
    let sort_order = row
        .get::<Option<String>, _>("sort_order")
        .map(|raw| SortOrder::parse(&raw))
        .transpose()?;
    Ok(ViewConfiguration {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        user_id: row.get("user_id"),
        entity_type: EntityKind::parse(&row.get::<String, _>("entity_type"))?,
        view_type: ViewType::parse(&row.get::<String, _>("view_type"))?,
        name: row.get("name"),
        is_default: row.get("is_default"),
        is_shared: row.get("is_shared"),
        columns: decode_json(row.get::<Option<String>, _>("columns"), "columns")?,
        sort_by: row.get("sort_by"),
        sort_order,
        filters: decode_json(row.get::<Option<String>, _>("filters"), "filters")?,
        group_by: row.get("group_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const FIELD_DEFINITION_COLUMNS: &str = "id, tenant_id, entity_type, field_key, name, field_type, \
     options, is_required, validation, default_value, sort_order, is_active, created_at, updated_at";

const RELATION_DEFINITION_COLUMNS: &str = "id, tenant_id, name, field_key, source_entity_type, \
     target_entity_types, relation_type, is_bidirectional, inverse_name, display_fields, \
     is_active, created_at, updated_at";

const ENTITY_RELATION_COLUMNS: &str = "id, tenant_id, relation_def_id, source_entity_type, \
     source_entity_id, target_entity_type, target_entity_id, sort_order, created_at";

const VIEW_COLUMNS: &str = "id, tenant_id, user_id, entity_type, view_type, name, is_default, \
     is_shared, columns, sort_by, sort_order, filters, group_by, created_at, updated_at";

impl Database {
    pub async fn new(url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;
        Ok(Self { pool })
    }

    /// In-memory database for tests. A single pooled connection keeps every
    /// query on the same in-memory instance.
    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS field_definitions (
                id BLOB PRIMARY KEY,
                tenant_id BLOB NOT NULL,
                entity_type TEXT NOT NULL,
                field_key TEXT NOT NULL,
                name TEXT NOT NULL,
                field_type TEXT NOT NULL,
                options TEXT,
                is_required INTEGER NOT NULL DEFAULT 0,
                validation TEXT,
                default_value TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create field_definitions table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS field_values (
                id BLOB PRIMARY KEY,
                tenant_id BLOB NOT NULL,
                field_id BLOB NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create field_values table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relation_definitions (
                id BLOB PRIMARY KEY,
                tenant_id BLOB NOT NULL,
                name TEXT NOT NULL,
                field_key TEXT NOT NULL,
                source_entity_type TEXT NOT NULL,
                target_entity_types TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                is_bidirectional INTEGER NOT NULL DEFAULT 0,
                inverse_name TEXT,
                display_fields TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create relation_definitions table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_relations (
                id BLOB PRIMARY KEY,
                tenant_id BLOB NOT NULL,
                relation_def_id BLOB NOT NULL,
                source_entity_type TEXT NOT NULL,
                source_entity_id TEXT NOT NULL,
                target_entity_type TEXT NOT NULL,
                target_entity_id TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create entity_relations table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS view_configurations (
                id BLOB PRIMARY KEY,
                tenant_id BLOB NOT NULL,
                user_id BLOB,
                entity_type TEXT NOT NULL,
                view_type TEXT NOT NULL,
                name TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0,
                is_shared INTEGER NOT NULL DEFAULT 0,
                columns TEXT,
                sort_by TEXT,
                sort_order TEXT,
                filters TEXT,
                group_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create view_configurations table", e))?;

        let indexes = [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_field_defs_key \
             ON field_definitions(tenant_id, entity_type, field_key)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_field_values_field_entity \
             ON field_values(tenant_id, field_id, entity_id)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_relation_defs_key \
             ON relation_definitions(tenant_id, source_entity_type, field_key)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_entity_relations_triple \
             ON entity_relations(relation_def_id, source_entity_id, target_entity_id)",
            "CREATE INDEX IF NOT EXISTS idx_field_values_entity \
             ON field_values(tenant_id, entity_type, entity_id)",
            "CREATE INDEX IF NOT EXISTS idx_entity_relations_source \
             ON entity_relations(tenant_id, source_entity_type, source_entity_id)",
            "CREATE INDEX IF NOT EXISTS idx_entity_relations_target \
             ON entity_relations(tenant_id, target_entity_type, target_entity_id)",
            "CREATE INDEX IF NOT EXISTS idx_views_entity_type \
             ON view_configurations(tenant_id, entity_type)",
        ];
        for index in indexes {
            sqlx::query(index)
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("create index", e))?;
        }

        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("run health check", e))?;
        Ok(())
    }

    // ---- field definitions ----

    pub async fn insert_field_definition(&self, def: &FieldDefinition) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO field_definitions (id, tenant_id, entity_type, field_key, name, \
             field_type, options, is_required, validation, default_value, sort_order, is_active, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(def.id)
        .bind(def.tenant_id)
        .bind(def.entity_type.key())
        .bind(&def.field_key)
        .bind(&def.name)
        .bind(def.field_type.as_str())
        .bind(encode_json(&def.options, "options")?)
        .bind(def.is_required)
        .bind(encode_json(&def.validation, "validation")?)
        .bind(&def.default_value)
        .bind(def.sort_order)
        .bind(def.is_active)
        .bind(def.created_at)
        .bind(def.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            insert_err(
                "insert field definition",
                &format!(
                    "Field key {} already exists for entity type {}",
                    def.field_key, def.entity_type
                ),
                e,
            )
        })?;
        Ok(())
    }

    pub async fn get_field_definition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<FieldDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM field_definitions WHERE tenant_id = ? AND id = ?",
            FIELD_DEFINITION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get field definition", e))?;
        row.as_ref().map(row_to_field_definition).transpose()
    }

    pub async fn list_field_definitions(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
        active_only: bool,
    ) -> AppResult<Vec<FieldDefinition>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM field_definitions WHERE tenant_id = ",
            FIELD_DEFINITION_COLUMNS
        ));
        qb.push_bind(tenant_id);
        qb.push(" AND entity_type = ");
        qb.push_bind(entity_type.key());
        if active_only {
            qb.push(" AND is_active = 1");
        }
        qb.push(" ORDER BY sort_order ASC, created_at ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list field definitions", e))?;
        rows.iter().map(row_to_field_definition).collect()
    }

    pub async fn max_field_sort_order(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(sort_order), -1) AS max_order FROM field_definitions \
             WHERE tenant_id = ? AND entity_type = ?",
        )
        .bind(tenant_id)
        .bind(entity_type.key())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("get max field order", e))?;
        Ok(row.get("max_order"))
    }

    pub async fn update_field_definition(&self, def: &FieldDefinition) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE field_definitions SET name = ?, field_type = ?, options = ?, is_required = ?, \
             validation = ?, default_value = ?, sort_order = ?, is_active = ?, updated_at = ? \
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(&def.name)
        .bind(def.field_type.as_str())
        .bind(encode_json(&def.options, "options")?)
        .bind(def.is_required)
        .bind(encode_json(&def.validation, "validation")?)
        .bind(&def.default_value)
        .bind(def.sort_order)
        .bind(def.is_active)
        .bind(def.updated_at)
        .bind(def.tenant_id)
        .bind(def.id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update field definition", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Assign `sort_order = index` to each id in sequence. Ids outside the
    /// `(tenant, entity_type)` scope simply match no row.
    pub async fn reorder_field_definitions(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
        ordered_ids: &[Uuid],
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE field_definitions SET sort_order = ?, updated_at = ? \
                 WHERE tenant_id = ? AND entity_type = ? AND id = ?",
            )
            .bind(index as i64)
            .bind(now)
            .bind(tenant_id)
            .bind(entity_type.key())
            .bind(*id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("reorder field definitions", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(())
    }

    /// Delete a definition and every value stored under it as one unit of
    /// work. Value cleanup precedes the definition row.
    pub async fn delete_field_definition_cascade(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        sqlx::query("DELETE FROM field_values WHERE tenant_id = ? AND field_id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete field values", e))?;
        let result = sqlx::query("DELETE FROM field_definitions WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete field definition", e))?;
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- field values ----

    /// Upsert a batch of `(field_id, encoded value)` pairs for one entity,
    /// keyed by `(tenant_id, field_id, entity_id)`, as a single transaction.
    pub async fn upsert_field_values(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
        entity_id: &str,
        values: &[(Uuid, String)],
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        for (field_id, value) in values {
            sqlx::query(
                "INSERT INTO field_values (id, tenant_id, field_id, entity_type, entity_id, \
                 value, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(tenant_id, field_id, entity_id) \
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(*field_id)
            .bind(entity_type.key())
            .bind(entity_id)
            .bind(value)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert field value", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(())
    }

    pub async fn list_field_values(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
        entity_id: &str,
    ) -> AppResult<Vec<StoredFieldValue>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, field_id, entity_type, entity_id, value, created_at, \
             updated_at FROM field_values WHERE tenant_id = ? AND entity_type = ? AND entity_id = ?",
        )
        .bind(tenant_id)
        .bind(entity_type.key())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list field values", e))?;
        rows.iter().map(row_to_stored_value).collect()
    }

    pub async fn list_field_values_bulk(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
        entity_ids: &[String],
    ) -> AppResult<Vec<StoredFieldValue>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, tenant_id, field_id, entity_type, entity_id, value, created_at, \
             updated_at FROM field_values WHERE tenant_id = ",
        );
        qb.push_bind(tenant_id);
        qb.push(" AND entity_type = ");
        qb.push_bind(entity_type.key());
        qb.push(" AND entity_id IN (");
        let mut separated = qb.separated(",");
        for entity_id in entity_ids {
            separated.push_bind(entity_id.clone());
        }
        qb.push(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list field values in bulk", e))?;
        rows.iter().map(row_to_stored_value).collect()
    }

    // ---- relation definitions ----

    pub async fn insert_relation_definition(&self, def: &RelationDefinition) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO relation_definitions (id, tenant_id, name, field_key, \
             source_entity_type, target_entity_types, relation_type, is_bidirectional, \
             inverse_name, display_fields, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(def.id)
        .bind(def.tenant_id)
        .bind(&def.name)
        .bind(&def.field_key)
        .bind(def.source_entity_type.key())
        .bind(encode_json(&Some(&def.target_entity_types), "target_entity_types")?)
        .bind(def.relation_type.as_str())
        .bind(def.is_bidirectional)
        .bind(&def.inverse_name)
        .bind(encode_json(&def.display_fields, "display_fields")?)
        .bind(def.is_active)
        .bind(def.created_at)
        .bind(def.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            insert_err(
                "insert relation definition",
                &format!(
                    "Relation key {} already exists for source type {}",
                    def.field_key, def.source_entity_type
                ),
                e,
            )
        })?;
        Ok(())
    }

    pub async fn get_relation_definition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<RelationDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM relation_definitions WHERE tenant_id = ? AND id = ?",
            RELATION_DEFINITION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get relation definition", e))?;
        row.as_ref().map(row_to_relation_definition).transpose()
    }

    pub async fn list_relation_definitions(
        &self,
        tenant_id: Uuid,
        source_entity_type: Option<&EntityKind>,
        active_only: bool,
    ) -> AppResult<Vec<RelationDefinition>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM relation_definitions WHERE tenant_id = ",
            RELATION_DEFINITION_COLUMNS
        ));
        qb.push_bind(tenant_id);
        if let Some(kind) = source_entity_type {
            qb.push(" AND source_entity_type = ");
            qb.push_bind(kind.key());
        }
        if active_only {
            qb.push(" AND is_active = 1");
        }
        qb.push(" ORDER BY created_at ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list relation definitions", e))?;
        rows.iter().map(row_to_relation_definition).collect()
    }

    pub async fn update_relation_definition(&self, def: &RelationDefinition) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE relation_definitions SET name = ?, target_entity_types = ?, \
             relation_type = ?, is_bidirectional = ?, inverse_name = ?, display_fields = ?, \
             is_active = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(&def.name)
        .bind(encode_json(&Some(&def.target_entity_types), "target_entity_types")?)
        .bind(def.relation_type.as_str())
        .bind(def.is_bidirectional)
        .bind(&def.inverse_name)
        .bind(encode_json(&def.display_fields, "display_fields")?)
        .bind(def.is_active)
        .bind(def.updated_at)
        .bind(def.tenant_id)
        .bind(def.id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update relation definition", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a relation definition and every edge referencing it as one
    /// unit of work.
    pub async fn delete_relation_definition_cascade(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        sqlx::query("DELETE FROM entity_relations WHERE tenant_id = ? AND relation_def_id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete entity relations", e))?;
        let result = sqlx::query("DELETE FROM relation_definitions WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete relation definition", e))?;
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- entity relations ----

    pub async fn get_entity_relation_by_triple(
        &self,
        tenant_id: Uuid,
        relation_def_id: Uuid,
        source_entity_id: &str,
        target_entity_id: &str,
    ) -> AppResult<Option<EntityRelation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entity_relations WHERE tenant_id = ? AND relation_def_id = ? \
             AND source_entity_id = ? AND target_entity_id = ?",
            ENTITY_RELATION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(relation_def_id)
        .bind(source_entity_id)
        .bind(target_entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get entity relation", e))?;
        row.as_ref().map(row_to_entity_relation).transpose()
    }

    /// Insert an edge; an already-present `(definition, source, target)`
    /// triple is left untouched so concurrent duplicate adds stay idempotent.
    pub async fn insert_entity_relation_ignore(&self, edge: &EntityRelation) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO entity_relations (id, tenant_id, relation_def_id, \
             source_entity_type, source_entity_id, target_entity_type, target_entity_id, \
             sort_order, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(edge.id)
        .bind(edge.tenant_id)
        .bind(edge.relation_def_id)
        .bind(edge.source_entity_type.key())
        .bind(&edge.source_entity_id)
        .bind(edge.target_entity_type.key())
        .bind(&edge.target_entity_id)
        .bind(edge.sort_order)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert entity relation", e))?;
        Ok(())
    }

    pub async fn list_entity_relations_from(
        &self,
        tenant_id: Uuid,
        source_entity_type: &EntityKind,
        source_entity_id: &str,
        relation_def_id: Option<Uuid>,
    ) -> AppResult<Vec<EntityRelation>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM entity_relations WHERE tenant_id = ",
            ENTITY_RELATION_COLUMNS
        ));
        qb.push_bind(tenant_id);
        qb.push(" AND source_entity_type = ");
        qb.push_bind(source_entity_type.key());
        qb.push(" AND source_entity_id = ");
        qb.push_bind(source_entity_id.to_string());
        if let Some(def_id) = relation_def_id {
            qb.push(" AND relation_def_id = ");
            qb.push_bind(def_id);
        }
        qb.push(" ORDER BY sort_order ASC, created_at ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list entity relations", e))?;
        rows.iter().map(row_to_entity_relation).collect()
    }

    /// Edges under any of the given definitions whose *target* side is the
    /// given entity - the raw material for inverse traversal.
    pub async fn list_entity_relations_to(
        &self,
        tenant_id: Uuid,
        relation_def_ids: &[Uuid],
        target_entity_type: &EntityKind,
        target_entity_id: &str,
    ) -> AppResult<Vec<EntityRelation>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM entity_relations WHERE tenant_id = ",
            ENTITY_RELATION_COLUMNS
        ));
        qb.push_bind(tenant_id);
        qb.push(" AND target_entity_type = ");
        qb.push_bind(target_entity_type.key());
        qb.push(" AND target_entity_id = ");
        qb.push_bind(target_entity_id.to_string());
        qb.push(" AND relation_def_id IN (");
        let mut separated = qb.separated(",");
        for def_id in relation_def_ids {
            separated.push_bind(*def_id);
        }
        qb.push(") ORDER BY sort_order ASC, created_at ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list inverse entity relations", e))?;
        rows.iter().map(row_to_entity_relation).collect()
    }

    pub async fn max_relation_sort_order(
        &self,
        tenant_id: Uuid,
        relation_def_id: Uuid,
        source_entity_id: &str,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(sort_order), -1) AS max_order FROM entity_relations \
             WHERE tenant_id = ? AND relation_def_id = ? AND source_entity_id = ?",
        )
        .bind(tenant_id)
        .bind(relation_def_id)
        .bind(source_entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("get max relation order", e))?;
        Ok(row.get("max_order"))
    }

    pub async fn delete_entity_relation(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM entity_relations WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete entity relation", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn reorder_entity_relations(
        &self,
        tenant_id: Uuid,
        relation_def_id: Uuid,
        source_entity_id: &str,
        ordered_ids: &[Uuid],
    ) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE entity_relations SET sort_order = ? WHERE tenant_id = ? \
                 AND relation_def_id = ? AND source_entity_id = ? AND id = ?",
            )
            .bind(index as i64)
            .bind(tenant_id)
            .bind(relation_def_id)
            .bind(source_entity_id)
            .bind(*id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("reorder entity relations", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(())
    }

    // ---- view configurations ----

    /// Insert a view; when it claims the default slot the previous default of
    /// the same `(user, entity_type)` is cleared in the same transaction.
    pub async fn insert_view(&self, view: &ViewConfiguration) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        if view.is_default {
            sqlx::query(
                "UPDATE view_configurations SET is_default = 0 \
                 WHERE tenant_id = ? AND user_id IS ? AND entity_type = ?",
            )
            .bind(view.tenant_id)
            .bind(view.user_id)
            .bind(view.entity_type.key())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("clear default views", e))?;
        }
        sqlx::query(
            "INSERT INTO view_configurations (id, tenant_id, user_id, entity_type, view_type, \
             name, is_default, is_shared, columns, sort_by, sort_order, filters, group_by, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(view.id)
        .bind(view.tenant_id)
        .bind(view.user_id)
        .bind(view.entity_type.key())
        .bind(view.view_type.as_str())
        .bind(&view.name)
        .bind(view.is_default)
        .bind(view.is_shared)
        .bind(encode_json(&view.columns, "columns")?)
        .bind(&view.sort_by)
        .bind(view.sort_order.map(|order| order.as_str().to_string()))
        .bind(encode_json(&view.filters, "filters")?)
        .bind(&view.group_by)
        .bind(view.created_at)
        .bind(view.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("insert view configuration", e))?;
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(())
    }

    pub async fn get_view(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<ViewConfiguration>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM view_configurations WHERE tenant_id = ? AND id = ?",
            VIEW_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get view configuration", e))?;
        row.as_ref().map(row_to_view).transpose()
    }

    /// Views visible to one user for an entity type: their own, shared ones,
    /// and ownerless legacy rows.
    pub async fn list_views(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        entity_type: &EntityKind,
    ) -> AppResult<Vec<ViewConfiguration>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM view_configurations WHERE tenant_id = ? AND entity_type = ? \
             AND (user_id IS ? OR user_id IS NULL OR is_shared = 1) \
             ORDER BY created_at ASC",
            VIEW_COLUMNS
        ))
        .bind(tenant_id)
        .bind(entity_type.key())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list view configurations", e))?;
        rows.iter().map(row_to_view).collect()
    }

    pub async fn update_view(
        &self,
        view: &ViewConfiguration,
        clear_default_first: bool,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        if clear_default_first {
            sqlx::query(
                "UPDATE view_configurations SET is_default = 0 \
                 WHERE tenant_id = ? AND user_id IS ? AND entity_type = ?",
            )
            .bind(view.tenant_id)
            .bind(view.user_id)
            .bind(view.entity_type.key())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("clear default views", e))?;
        }
        let result = sqlx::query(
            "UPDATE view_configurations SET view_type = ?, name = ?, is_default = ?, \
             is_shared = ?, columns = ?, sort_by = ?, sort_order = ?, filters = ?, group_by = ?, \
             updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(view.view_type.as_str())
        .bind(&view.name)
        .bind(view.is_default)
        .bind(view.is_shared)
        .bind(encode_json(&view.columns, "columns")?)
        .bind(&view.sort_by)
        .bind(view.sort_order.map(|order| order.as_str().to_string()))
        .bind(encode_json(&view.filters, "filters")?)
        .bind(&view.group_by)
        .bind(view.updated_at)
        .bind(view.tenant_id)
        .bind(view.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("update view configuration", e))?;
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_view(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM view_configurations WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete view configuration", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_default_views(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        entity_type: &EntityKind,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE view_configurations SET is_default = 0 \
             WHERE tenant_id = ? AND user_id IS ? AND entity_type = ?",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(entity_type.key())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("clear default views", e))?;
        Ok(())
    }

    /// Clear the user's previous default for the entity type and mark the
    /// given view, in one transaction.
    pub async fn mark_default_view(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        entity_type: &EntityKind,
        view_id: Uuid,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin transaction", e))?;
        sqlx::query(
            "UPDATE view_configurations SET is_default = 0 \
             WHERE tenant_id = ? AND user_id IS ? AND entity_type = ?",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(entity_type.key())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("clear default views", e))?;
        let result = sqlx::query(
            "UPDATE view_configurations SET is_default = 1, updated_at = ? \
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(view_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("mark default view", e))?;
        tx.commit()
            .await
            .map_err(|e| db_err("commit transaction", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user_default_view(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        entity_type: &EntityKind,
    ) -> AppResult<Option<ViewConfiguration>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM view_configurations WHERE tenant_id = ? AND user_id IS ? \
             AND entity_type = ? AND is_default = 1 LIMIT 1",
            VIEW_COLUMNS
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(entity_type.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get user default view", e))?;
        row.as_ref().map(row_to_view).transpose()
    }

    pub async fn get_shared_default_view(
        &self,
        tenant_id: Uuid,
        entity_type: &EntityKind,
    ) -> AppResult<Option<ViewConfiguration>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM view_configurations WHERE tenant_id = ? AND entity_type = ? \
             AND is_shared = 1 AND is_default = 1 ORDER BY created_at ASC, id ASC LIMIT 1",
            VIEW_COLUMNS
        ))
        .bind(tenant_id)
        .bind(entity_type.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get shared default view", e))?;
        row.as_ref().map(row_to_view).transpose()
    }
}
