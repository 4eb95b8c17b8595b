use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{Condition, DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use film_degradation_api::{routes, Config, ModelStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("🚀 Starting film degradation risk API");

    let config = Config::from_env().context("reading configuration")?;

    let store = match ModelStore::load(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("❌ {:#}", e);
            return Err(e);
        }
    };
    let model_data = web::Data::new(store);

    let bind_address = config.bind_address();
    let cors_enabled = config.cors_enabled;
    let json_limit = config.json_limit;

    info!("🌐 Listening on http://{}", bind_address);
    info!("👷 Workers: {}", config.workers);
    let cors_mode = if cors_enabled {
        "any origin"
    } else {
        "disabled"
    };
    info!("🔧 CORS: {}", cors_mode);
    info!("   POST /predict     - single sample prediction");
    info!("   GET  /health      - liveness");
    info!("   GET  /model-info  - loaded model metadata");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Condition::new(cors_enabled, cors))
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .app_data(model_data.clone())
            .app_data(routes::json_config(json_limit))
            .configure(routes::configure)
            .default_service(web::route().to(routes::not_found))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("binding {bind_address}"))?
    .run()
    .await
    .context("running HTTP server")
}
