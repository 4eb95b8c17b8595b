use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

pub const DEFAULT_MODEL_PATH: &str = "model.onnx";
pub const DEFAULT_ENCODER_PATH: &str = "risk_label_encoder.json";

/// Server settings, read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub encoder_path: PathBuf,
    pub cors_enabled: bool,
    pub json_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            encoder_path: PathBuf::from(DEFAULT_ENCODER_PATH),
            cors_enabled: true,
            json_limit: 64 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            workers: parse_var(&lookup, "WORKERS")?
                .filter(|&w| w > 0)
                .unwrap_or(defaults.workers),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            encoder_path: lookup("ENCODER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.encoder_path),
            cors_enabled: parse_var(&lookup, "CORS_ENABLED")?.unwrap_or(defaults.cors_enabled),
            json_limit: parse_var(&lookup, "JSON_LIMIT")?.unwrap_or(defaults.json_limit),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))
        })
        .transpose()
}
