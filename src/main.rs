use axum::{Router, routing::get};
use chatlink_relay::{AppState, db, profiles, relay::Relay, rooms, ws};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatlink_relay=debug,info")),
        )
        .init();

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(dotenv::var("DATABASE_URL")?.as_str())
        .await?;
    db::init(&db_pool).await?;

    let app_state = AppState {
        db_pool,
        relay: Relay::spawn(),
    };

    let app = Router::new()
        .route("/ws", get(ws::relay_ws))
        .nest("/rooms", rooms::router())
        .nest("/profiles", profiles::router())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("relay listening on {bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
