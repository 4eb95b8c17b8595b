use thiserror::Error;

/// Failures on the `/predict` path.
///
/// Kinds stay distinct for logging; clients only ever see the message.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("unknown film_type '{0}' (expected one of: PBAT, PLA, Starch Blend)")]
    UnknownFilmType(String),
    #[error("unknown soil_type '{0}' (expected one of: Loamy, Sandy, Clay)")]
    UnknownSoilType(String),
    #[error("model inference failed: {0}")]
    Inference(String),
    #[error("y contains previously unseen labels: [{code}] (encoder knows {classes} classes)")]
    Decode { code: i64, classes: usize },
    #[error("prediction job failed: {0}")]
    Worker(String),
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::UnknownFilmType(_) => "unknown_film_type",
            PredictError::UnknownSoilType(_) => "unknown_soil_type",
            PredictError::Inference(_) => "inference",
            PredictError::Decode { .. } => "decode",
            PredictError::Worker(_) => "worker",
        }
    }
}
