use std::sync::Arc;

use uuid::Uuid;

use entity_platform::context::RequestContext;
use entity_platform::infrastructure::Database;
use entity_platform::services::{FieldService, RelationService, ViewService};

#[allow(dead_code)]
pub struct TestPlatform {
    pub db: Arc<Database>,
    pub fields: FieldService,
    pub relations: RelationService,
    pub views: ViewService,
}

#[allow(dead_code)]
pub async fn platform() -> TestPlatform {
    let db = Arc::new(Database::new_in_memory().await.unwrap());
    db.init().await.unwrap();
    TestPlatform {
        fields: FieldService::new(db.clone()),
        relations: RelationService::new(db.clone()),
        views: ViewService::new(db.clone()),
        db,
    }
}

#[allow(dead_code)]
pub fn ctx() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), Uuid::new_v4())
}
