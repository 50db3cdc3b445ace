use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dicebattle::{
    api,
    auth::ValidationPolicy,
    email::EmailConfig,
    state::AppState,
    store::MemoryStore,
    types::GameConfig,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dicebattle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Dicee Battle...");

    let store_path = std::env::var("STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dicebattle-store.json"));
    let store = match MemoryStore::with_snapshot(store_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return;
        }
    };

    let email_config = EmailConfig::from_env();
    if email_config.api_url.is_none() {
        tracing::warn!("No mail relay configured (MAIL_API_URL unset) - password reset emails will not be delivered");
    }

    let validation = ValidationPolicy::from_env();
    tracing::info!("Input validation policy: {:?}", validation);

    let state = Arc::new(
        AppState::new(store)
            .with_email(&email_config)
            .with_validation(validation)
            .with_game_config(GameConfig::from_env()),
    );

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
