// Services - tenant-scoped business logic over the storage layer.

pub mod field_service;
pub mod relation_service;
pub mod view_service;

pub use field_service::FieldService;
pub use relation_service::RelationService;
pub use view_service::ViewService;
