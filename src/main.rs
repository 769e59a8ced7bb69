use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use clap::Parser;
use rusqlite::params;
use serde_json::json;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use bandhan::auth::session;
use bandhan::config::{Cli, Config};
use bandhan::db;
use bandhan::error::AppResult;
use bandhan::ids::UserId;
use bandhan::routes;
use bandhan::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());

    // Test-only seed endpoint: creates a user + session, returns the token
    let mut app = routes::build_router(state.clone());
    if std::env::var("BANDHAN_TEST_SEED").is_ok() {
        tracing::warn!("Test seed endpoint enabled");
        app = app.merge(
            Router::new()
                .route("/test/seed", post(test_seed))
                .with_state(state),
        );
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Test-only: seed a user + session. Only mounted when BANDHAN_TEST_SEED is set.
async fn test_seed(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let user_id = UserId::generate();
    state.db.get()?.execute(
        "INSERT INTO users (id, full_name) VALUES (?1, 'Test User')",
        params![user_id.as_str()],
    )?;

    let token = session::create_session(&state.db, &user_id, state.config.auth.session_hours)?;
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/",
        state.config.auth.cookie_name, token
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "user_id": user_id, "token": token })),
    ))
}
