use std::sync::Arc;
use std::time::Instant;

use actix_web::{error, web, HttpResponse, Responder};
use log::{info, warn};

use crate::error::PredictError;
use crate::inference::ModelStore;
use crate::models::{HealthStatus, PredictResponse, SampleFeatures};

pub async fn predict(
    store: web::Data<Arc<ModelStore>>,
    input: web::Json<SampleFeatures>,
) -> impl Responder {
    let start_time = Instant::now();
    let store = store.get_ref().clone();
    let features = input.into_inner();

    let result = match web::block(move || store.predict(&features)).await {
        Ok(result) => result,
        Err(e) => Err(PredictError::Worker(e.to_string())),
    };

    match &result {
        Ok(prediction) => info!(
            "Prediction: risk_level={} degradation_percent={} ({} us)",
            prediction.risk_level,
            prediction.degradation_percent,
            start_time.elapsed().as_micros()
        ),
        Err(e) => warn!("Prediction failed [{}]: {}", e.kind(), e),
    }

    // Failures are reported in the body with the success status.
    HttpResponse::Ok().json(PredictResponse::from(result))
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthStatus::ok())
}

pub async fn model_info(store: web::Data<Arc<ModelStore>>) -> impl Responder {
    HttpResponse::Ok().json(store.describe())
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(PredictResponse::error("endpoint not found"))
}

/// Body limit plus a handler that turns undecodable bodies into the same
/// `{"error": ...}` shape the handler produces.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            warn!("Rejected request body: {}", err);
            let response = HttpResponse::Ok().json(PredictResponse::error(err.to_string()));
            error::InternalError::from_response(err, response).into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/predict", web::post().to(predict))
        .route("/health", web::get().to(health_check))
        .route("/model-info", web::get().to(model_info));
}
