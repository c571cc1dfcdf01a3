mod canvas;
mod config;
mod frame;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env()?;
    let port = config.port;
    let state = state::AppState::new(config);

    // Spawn background lease sweeper.
    let _sweeper = services::lease::spawn_lease_sweeper(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "collabcanvas listening");
    axum::serve(listener, app).await?;
    Ok(())
}
