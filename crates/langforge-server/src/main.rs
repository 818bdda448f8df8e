//! Binary entrypoint for the langforge HTTP server.
//!
//! Reads configuration from environment variables (see
//! [`langforge_server::config::ServerConfig::from_env`]), resumes any runs
//! interrupted by a previous shutdown, and serves the API.

use langforge_server::config::ServerConfig;
use langforge_server::router::build_router;
use langforge_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let state = AppState::new(&config).expect("Failed to initialize application state");

    match state.resume_incomplete_runs().await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "resumed interrupted runs"),
        Err(err) => tracing::error!(error = %err, "failed to resume interrupted runs"),
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("langforge server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
