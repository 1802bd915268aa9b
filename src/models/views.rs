// Saved list presentations and default-view records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{double_option, EntityKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ViewType {
    #[default]
    Table,
    Kanban,
    Calendar,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Table => "table",
            ViewType::Kanban => "kanban",
            ViewType::Calendar => "calendar",
        }
    }

    pub fn parse(raw: &str) -> Result<ViewType, AppError> {
        match raw {
            "table" => Ok(ViewType::Table),
            "kanban" => Ok(ViewType::Kanban),
            "calendar" => Ok(ViewType::Calendar),
            _ => Err(AppError::Validation(format!("Unknown view type: {}", raw))),
        }
    }
}

impl From<ViewType> for String {
    fn from(view_type: ViewType) -> Self {
        view_type.as_str().to_string()
    }
}

impl TryFrom<String> for ViewType {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        ViewType::parse(&raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Result<SortOrder, AppError> {
        match raw {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(AppError::Validation(format!("Unknown sort order: {}", raw))),
        }
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        order.as_str().to_string()
    }
}

impl TryFrom<String> for SortOrder {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        SortOrder::parse(&raw)
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewColumn {
    pub field_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub order: i64,
}

/// One operator-based filter clause; operators are passed through verbatim,
/// the platform does not define a query language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFilter {
    pub field_key: String,
    pub operator: String,
    pub value: serde_json::Value,
}

/// A saved list presentation. `user_id` is the owner; an ownerless row is a
/// legacy tenant-shared record that any caller may manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfiguration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub entity_type: EntityKind,
    pub view_type: ViewType,
    pub name: String,
    pub is_default: bool,
    pub is_shared: bool,
    pub columns: Option<Vec<ViewColumn>>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub filters: Option<Vec<ViewFilter>>,
    pub group_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewViewConfiguration {
    pub entity_type: EntityKind,
    pub name: String,
    #[serde(default)]
    pub view_type: ViewType,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub columns: Option<Vec<ViewColumn>>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub filters: Option<Vec<ViewFilter>>,
    #[serde(default)]
    pub group_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfigurationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub view_type: Option<ViewType>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub is_shared: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub columns: Option<Option<Vec<ViewColumn>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sort_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sort_order: Option<Option<SortOrder>>,
    #[serde(default, deserialize_with = "double_option")]
    pub filters: Option<Option<Vec<ViewFilter>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub group_by: Option<Option<String>>,
}
