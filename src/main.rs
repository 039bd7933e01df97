// src/main.rs
use std::process::ExitCode;
use std::sync::Arc;

use pack_it_now::api;
use pack_it_now::config::AppConfig;
use pack_it_now::model::PackSizeConfiguration;
use pack_it_now::registry::PackSizeRegistry;
use pack_it_now::service::PackService;
use pack_it_now::store::JsonFileStore;
use tracing_subscriber::EnvFilter;

fn build_service(config: &AppConfig) -> Result<PackService, Box<dyn std::error::Error>> {
    let settings = config.optimizer.settings();
    let defaults = config.sizes.defaults();

    let service = match config.sizes.store_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "persisting pack sizes");
            PackService::restore(Arc::new(JsonFileStore::new(path)), defaults, settings)?
        }
        None => {
            let initial =
                PackSizeConfiguration::with_limit(defaults.iter().copied(), settings.max_graph_nodes)?;
            PackService::new(
                PackSizeRegistry::with_limit(initial, settings.max_graph_nodes),
                settings,
            )
        }
    };
    Ok(service)
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    let service = match build_service(&app_config) {
        Ok(service) => Arc::new(service),
        Err(err) => {
            tracing::error!("Could not initialize pack sizes: {}", err);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(sizes = ?service.get_configuration(), "pack service starting");
    if let Err(err) = api::start_api_server(app_config.api.clone(), service).await {
        tracing::error!("API server terminated with an error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
