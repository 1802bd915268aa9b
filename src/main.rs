// Entity Platform Server - tenant metadata procedure interface

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use entity_platform::{
    app_state::AppState, config::Config, platform_interface::create_metadata_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Build main application router
    let app = Router::new()
        .nest("/api/v1/metadata", create_metadata_router(app_state))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    println!("🚀 Entity Platform Server starting on http://{}", addr);
    println!("📋 API Documentation:");
    println!("  POST   /api/v1/metadata/fields                       - Create field definition");
    println!("  GET    /api/v1/metadata/fields?entityType=...        - List field definitions");
    println!("  PUT    /api/v1/metadata/entities/{{type}}/{{id}}/values  - Set custom field values");
    println!("  GET    /api/v1/metadata/entities/{{type}}/{{id}}/values  - Get custom field values");
    println!("  POST   /api/v1/metadata/relations/definitions        - Create relation definition");
    println!("  GET    /api/v1/metadata/relations?sourceEntityType=... - List entity relations");
    println!("  PUT    /api/v1/metadata/views/default                - Set default view");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
