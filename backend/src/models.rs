use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Column names of the feature row, in the order the classifier was trained on.
pub const FEATURE_NAMES: [&str; 7] = [
    "Film_Type",
    "Soil_pH",
    "Soil_Type",
    "Moisture_Level",
    "Temperature",
    "UV_Exposure",
    "Duration",
];

/// Film materials known to the trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilmType {
    Pbat,
    Pla,
    StarchBlend,
}

impl FilmType {
    pub const ALL: [FilmType; 3] = [FilmType::Pbat, FilmType::Pla, FilmType::StarchBlend];

    pub fn code(self) -> u8 {
        match self {
            FilmType::Pbat => 0,
            FilmType::Pla => 1,
            FilmType::StarchBlend => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilmType::Pbat => "PBAT",
            FilmType::Pla => "PLA",
            FilmType::StarchBlend => "Starch Blend",
        }
    }
}

impl FromStr for FilmType {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilmType::ALL
            .into_iter()
            .find(|film| film.as_str() == s)
            .ok_or_else(|| PredictError::UnknownFilmType(s.to_string()))
    }
}

/// Soil classes known to the trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoilType {
    Loamy,
    Sandy,
    Clay,
}

impl SoilType {
    pub const ALL: [SoilType; 3] = [SoilType::Loamy, SoilType::Sandy, SoilType::Clay];

    pub fn code(self) -> u8 {
        match self {
            SoilType::Loamy => 0,
            SoilType::Sandy => 1,
            SoilType::Clay => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SoilType::Loamy => "Loamy",
            SoilType::Sandy => "Sandy",
            SoilType::Clay => "Clay",
        }
    }
}

impl FromStr for SoilType {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoilType::ALL
            .into_iter()
            .find(|soil| soil.as_str() == s)
            .ok_or_else(|| PredictError::UnknownSoilType(s.to_string()))
    }
}

/// Request body of `POST /predict`.
///
/// Categorical fields stay strings on the wire so an unknown material or soil
/// is reported in the response body instead of failing deserialization.
/// Numeric fields also accept numeric strings, and `duration` accepts floats
/// without a fractional part.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SampleFeatures {
    pub film_type: String,
    #[serde(deserialize_with = "lax_float")]
    pub soil_ph: f64,
    pub soil_type: String,
    #[serde(deserialize_with = "lax_float")]
    pub moisture: f64,
    #[serde(deserialize_with = "lax_float")]
    pub temperature: f64,
    #[serde(deserialize_with = "lax_float")]
    pub uv_exposure: f64,
    #[serde(deserialize_with = "lax_integer")]
    pub duration: i64,
}

fn lax_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    deserializer.deserialize_any(LaxFloat)
}

fn lax_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(LaxInteger)
}

struct LaxFloat;

impl<'de> Visitor<'de> for LaxFloat {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        v.trim()
            .parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

struct LaxInteger;

impl<'de> Visitor<'de> for LaxInteger {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, a float without fractional part, or an integer string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            Ok(v as i64)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        v.trim()
            .parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl SampleFeatures {
    pub fn encode(&self) -> Result<FeatureRow, PredictError> {
        let film: FilmType = self.film_type.parse()?;
        let soil: SoilType = self.soil_type.parse()?;

        Ok(FeatureRow([
            f32::from(film.code()),
            self.soil_ph as f32,
            f32::from(soil.code()),
            self.moisture as f32,
            self.temperature as f32,
            self.uv_exposure as f32,
            self.duration as f32,
        ]))
    }

    /// Placeholder heuristic, independent of the classifier output.
    pub fn degradation_percent(&self) -> f64 {
        degradation_percent(self.duration)
    }
}

/// `round(clamp(100 - duration * 0.3, 0, 100), 2)`
pub fn degradation_percent(duration: i64) -> f64 {
    let raw = 100.0 - duration as f64 * 0.3;
    let clamped = raw.clamp(0.0, 100.0);
    (clamped * 100.0).round() / 100.0
}

/// One encoded sample, laid out as [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow(pub [f32; 7]);

impl FeatureRow {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub degradation_percent: f64,
    pub risk_level: String,
}

/// Body of every `/predict` response. Failures share the success status code.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PredictResponse {
    Success(PredictionResult),
    Error { error: String },
}

impl PredictResponse {
    pub fn error(message: impl Into<String>) -> Self {
        PredictResponse::Error {
            error: message.into(),
        }
    }
}

impl From<Result<PredictionResult, PredictError>> for PredictResponse {
    fn from(result: Result<PredictionResult, PredictError>) -> Self {
        match result {
            Ok(prediction) => PredictResponse::Success(prediction),
            Err(e) => PredictResponse::error(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn sample(film: &str, soil: &str, duration: i64) -> SampleFeatures {
        SampleFeatures {
            film_type: film.to_string(),
            soil_ph: 6.5,
            soil_type: soil.to_string(),
            moisture: 40.0,
            temperature: 25.0,
            uv_exposure: 5.0,
            duration,
        }
    }

    #[test]
    fn encodes_in_training_column_order() {
        let row = sample("PLA", "Sandy", 100).encode().unwrap();
        assert_eq!(row.0, [1.0, 6.5, 1.0, 40.0, 25.0, 5.0, 100.0]);
    }

    #[test]
    fn category_codes_match_training_mapping() {
        let films: Vec<u8> = ["PBAT", "PLA", "Starch Blend"]
            .iter()
            .map(|s| s.parse::<FilmType>().unwrap().code())
            .collect();
        assert_eq!(films, vec![0, 1, 2]);

        let soils: Vec<u8> = ["Loamy", "Sandy", "Clay"]
            .iter()
            .map(|s| s.parse::<SoilType>().unwrap().code())
            .collect();
        assert_eq!(soils, vec![0, 1, 2]);
    }

    #[test]
    fn category_lookup_is_case_sensitive() {
        assert!("pla".parse::<FilmType>().is_err());
        assert!("Starch blend".parse::<FilmType>().is_err());
        assert!("clay".parse::<SoilType>().is_err());
    }

    #[test]
    fn unknown_film_type_is_rejected() {
        let err = sample("Cotton", "Sandy", 10).encode().unwrap_err();
        assert!(matches!(err, PredictError::UnknownFilmType(ref v) if v == "Cotton"));
    }

    #[test]
    fn unknown_soil_type_is_rejected() {
        let err = sample("PBAT", "Peat", 10).encode().unwrap_err();
        assert!(matches!(err, PredictError::UnknownSoilType(ref v) if v == "Peat"));
    }

    #[test]
    fn degradation_follows_linear_formula() {
        assert_eq!(degradation_percent(0), 100.0);
        assert_eq!(degradation_percent(100), 70.0);
        assert_eq!(degradation_percent(1), 99.7);
        assert_eq!(degradation_percent(333), 0.1);
    }

    #[test]
    fn degradation_is_clamped() {
        assert_eq!(degradation_percent(1000), 0.0);
        assert_eq!(degradation_percent(334), 0.0);
        assert_eq!(degradation_percent(-50), 100.0);
        for duration in [i64::MIN, -1, i64::MAX, 10_000_000] {
            let value = degradation_percent(duration);
            assert!((0.0..=100.0).contains(&value), "{duration} -> {value}");
        }
    }

    #[test]
    fn degradation_is_rounded_to_two_decimals() {
        for duration in 0..=400 {
            let value = degradation_percent(duration);
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-9);
        }
    }

    fn parse_body(overrides: Value) -> Result<SampleFeatures, serde_json::Error> {
        let mut body = json!({
            "film_type": "PLA",
            "soil_ph": 6.5,
            "soil_type": "Sandy",
            "moisture": 40,
            "temperature": 25,
            "uv_exposure": 5,
            "duration": 100
        });
        for (key, value) in overrides.as_object().unwrap() {
            body[key] = value.clone();
        }
        serde_json::from_value(body)
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let parsed = parse_body(json!({
            "soil_ph": "6.5",
            "moisture": " 40 ",
            "duration": "100"
        }))
        .unwrap();
        assert_eq!(parsed.soil_ph, 6.5);
        assert_eq!(parsed.moisture, 40.0);
        assert_eq!(parsed.duration, 100);
    }

    #[test]
    fn integral_float_duration_is_accepted() {
        let parsed = parse_body(json!({ "duration": 100.0 })).unwrap();
        assert_eq!(parsed.duration, 100);

        let parsed = parse_body(json!({ "duration": -3.0 })).unwrap();
        assert_eq!(parsed.duration, -3);
    }

    #[test]
    fn non_integral_duration_is_rejected() {
        for duration in [json!(10.5), json!("10.5"), json!(1e300), json!(u64::MAX)] {
            let result = parse_body(json!({ "duration": duration }));
            assert!(result.is_err());
        }
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        assert!(parse_body(json!({ "moisture": "wet" })).is_err());
        assert!(parse_body(json!({ "soil_ph": true })).is_err());
        assert!(parse_body(json!({ "temperature": null })).is_err());
    }

    #[test]
    fn error_response_has_only_error_key() {
        let body = serde_json::to_value(PredictResponse::error("boom")).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "boom" }));
    }

    #[test]
    fn success_response_is_flat() {
        let body = serde_json::to_value(PredictResponse::Success(PredictionResult {
            degradation_percent: 70.0,
            risk_level: "Medium".to_string(),
        }))
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "degradation_percent": 70.0, "risk_level": "Medium" })
        );
    }
}
