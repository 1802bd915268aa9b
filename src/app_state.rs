use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::Database,
    services::{FieldService, RelationService, ViewService},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub fields: FieldService,
    pub relations: RelationService,
    pub views: ViewService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = Database::new(&config.database.url).await?;
        database.init().await?;
        let database = Arc::new(database);

        Ok(Self {
            fields: FieldService::new(database.clone()),
            relations: RelationService::new(database.clone()),
            views: ViewService::new(database.clone()),
            db: database,
            config,
        })
    }
}
