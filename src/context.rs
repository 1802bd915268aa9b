// Request context - tenant and user identity threaded through every operation.
// Collaborator routers resolve authentication upstream and forward the
// resolved identifiers as headers; the platform never sees credentials.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Identity scope for a single platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self { tenant_id, user_id }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?;
    Uuid::parse_str(raw).map_err(|_| AppError::Unauthorized(format!("Invalid {} header", name)))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext {
            tenant_id: header_uuid(parts, TENANT_HEADER)?,
            user_id: header_uuid(parts, USER_HEADER)?,
        })
    }
}
