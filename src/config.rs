use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::Scoring;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("SKETCHRS_CONFIG_PATH").unwrap_or("/usr/local/etc/sketchrs/config.toml"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory backing the image store.
    pub store_root: PathBuf,
    /// Store prefix under which gallery photos live.
    pub photo_prefix: String,
    /// `.onnx` export or state-dict artifact.
    pub model_path: PathBuf,
    pub listen: String,
    /// Extensions (without dot) of files picked up as gallery photos.
    pub extensions: Vec<String>,
    pub scoring: Scoring,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("/var/lib/sketchrs"),
            photo_prefix: "Photos/".to_string(),
            model_path: PathBuf::from("/usr/local/share/sketchrs/cite_model.bin"),
            listen: "127.0.0.1:5000".to_string(),
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            scoring: Scoring::Relative,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
