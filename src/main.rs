// src/main.rs
use load_planner::api;
use load_planner::config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_max_level(app_config.log.level())
        .with_target(false)
        .init();

    tracing::info!("🚀 Load planner starting...");
    if let Err(err) = api::start_api_server(app_config.api, app_config.planner).await {
        tracing::error!("❌ Server stopped: {}", err);
        std::process::exit(1);
    }
}
