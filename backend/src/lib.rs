//! Degradation risk prediction for biodegradable films.
//!
//! A classifier and its label encoder are loaded once at startup
//! ([`inference::ModelStore`]); `POST /predict` encodes one sample, runs the
//! classifier, and returns the decoded risk level with a degradation estimate.

pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod routes;

pub use config::Config;
pub use error::PredictError;
pub use inference::{Classifier, LabelDecoder, LabelEncoder, ModelStore, OnnxClassifier};
pub use models::{
    FeatureRow, FilmType, PredictResponse, PredictionResult, SampleFeatures, SoilType,
};
