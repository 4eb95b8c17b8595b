use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;

use crate::config::Config;
use crate::error::PredictError;
use crate::models::{FeatureRow, PredictionResult, SampleFeatures, FEATURE_NAMES};

/// Maps one encoded sample to the integer class code the model was trained on.
pub trait Classifier: Send + Sync {
    fn predict(&self, row: &FeatureRow) -> Result<i64, PredictError>;
}

impl<F> Classifier for F
where
    F: Fn(&FeatureRow) -> Result<i64, PredictError> + Send + Sync,
{
    fn predict(&self, row: &FeatureRow) -> Result<i64, PredictError> {
        self(row)
    }
}

/// Inverse of the label encoding applied to the risk target at training time.
pub trait LabelDecoder: Send + Sync {
    fn inverse_transform(&self, code: i64) -> Result<String, PredictError>;

    fn classes(&self) -> &[String];
}

/// Classifier exported to ONNX (`skl2onnx`, `zipmap=False`) and run with tract.
///
/// The first graph output must hold the predicted label; any numeric dtype is
/// accepted and cast to `i64`.
pub struct OnnxClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> TractResult<Self> {
        Self::from_model(tract_onnx::onnx().model_for_path(model_path)?)
    }

    /// Builds the classifier from an already decoded ONNX model.
    pub fn from_proto(proto: &tract_onnx::pb::ModelProto) -> TractResult<Self> {
        Self::from_model(tract_onnx::onnx().model_for_proto_model(proto)?)
    }

    fn from_model(model: InferenceModel) -> TractResult<Self> {
        let model = model
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_NAMES.len())),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { model })
    }

    fn run(&self, row: &FeatureRow) -> TractResult<i64> {
        let input_tensor = Tensor::from_shape(&[1, FEATURE_NAMES.len()], row.as_slice())?;
        let outputs = self.model.run(tvec!(input_tensor.into()))?;

        let labels = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("model produced no outputs"))?
            .cast_to::<i64>()?;
        labels
            .as_slice::<i64>()?
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("model produced an empty label tensor"))
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, row: &FeatureRow) -> Result<i64, PredictError> {
        self.run(row).map_err(|e| PredictError::Inference(e.to_string()))
    }
}

/// Label encoder exported as `{"classes": [...]}`, the `classes_` of the fitted
/// encoder. Code `i` decodes to `classes[i]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        LabelEncoder { classes }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading label encoder {}", path.display()))?;
        let encoder: LabelEncoder = serde_json::from_str(&raw)
            .with_context(|| format!("parsing label encoder {}", path.display()))?;
        ensure!(
            !encoder.classes.is_empty(),
            "label encoder {} has no classes",
            path.display()
        );
        Ok(encoder)
    }
}

impl LabelDecoder for LabelEncoder {
    fn inverse_transform(&self, code: i64) -> Result<String, PredictError> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .cloned()
            .ok_or(PredictError::Decode {
                code,
                classes: self.classes.len(),
            })
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub input_shape: Vec<usize>,
    pub features: Vec<String>,
    pub risk_levels: Vec<String>,
    pub model_path: Option<String>,
    pub encoder_path: Option<String>,
    pub version: String,
}

/// Classifier and decoder loaded once at startup and shared read-only by every
/// worker.
pub struct ModelStore {
    classifier: Box<dyn Classifier>,
    decoder: Box<dyn LabelDecoder>,
    model_path: Option<PathBuf>,
    encoder_path: Option<PathBuf>,
}

impl ModelStore {
    pub fn new(
        classifier: impl Classifier + 'static,
        decoder: impl LabelDecoder + 'static,
    ) -> Self {
        ModelStore {
            classifier: Box::new(classifier),
            decoder: Box::new(decoder),
            model_path: None,
            encoder_path: None,
        }
    }

    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let classifier = OnnxClassifier::load(&config.model_path)
            .with_context(|| format!("loading model {}", config.model_path.display()))?;
        info!("Model loaded from {}", config.model_path.display());

        let decoder = LabelEncoder::from_path(&config.encoder_path)?;
        info!(
            "Label encoder loaded from {} ({} classes)",
            config.encoder_path.display(),
            decoder.classes().len()
        );

        Ok(ModelStore {
            classifier: Box::new(classifier),
            decoder: Box::new(decoder),
            model_path: Some(config.model_path.clone()),
            encoder_path: Some(config.encoder_path.clone()),
        })
    }

    pub fn predict(&self, features: &SampleFeatures) -> Result<PredictionResult, PredictError> {
        let row = features.encode()?;
        debug!("Encoded feature row: {:?}", row.0);

        let code = self.classifier.predict(&row)?;
        let degradation_percent = features.degradation_percent();
        let risk_level = self.decoder.inverse_transform(code)?;

        Ok(PredictionResult {
            degradation_percent,
            risk_level,
        })
    }

    pub fn describe(&self) -> ModelInfo {
        ModelInfo {
            input_shape: vec![1, FEATURE_NAMES.len()],
            features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            risk_levels: self.decoder.classes().to_vec(),
            model_path: self.model_path.as_ref().map(|p| p.display().to_string()),
            encoder_path: self.encoder_path.as_ref().map(|p| p.display().to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
