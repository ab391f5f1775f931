//! Persisted defaults for the CLI.
//!
//! One small JSON file; anything missing falls back to the built-in
//! defaults, and a corrupted file is treated as absent rather than fatal.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_out_lang: String,
    pub cache_dir: PathBuf,
    pub include_pos: bool,
    pub try_fix_inflections: bool,
    /// Comma-separated extra input languages merged into every build.
    pub merge_in_langs: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_out_lang: "English".to_string(),
            cache_dir: home_dir().join(".cache").join("wtk"),
            include_pos: false,
            try_fix_inflections: true,
            merge_in_langs: String::new(),
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    home_dir().join(".config").join("wtk").join("config.json")
}

pub fn load_config() -> Config {
    let path = config_path();
    match fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!("ignoring corrupted config {}: {e}", path.display());
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_partial_configs() {
        let config: Config = serde_json::from_str(r#"{"default_out_lang":"Russian"}"#).unwrap();
        assert_eq!(config.default_out_lang, "Russian");
        assert!(config.try_fix_inflections);
        assert!(!config.include_pos);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = Config {
            default_out_lang: "German".to_string(),
            merge_in_langs: "Croatian".to_string(),
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(back.default_out_lang, "German");
        assert_eq!(back.merge_in_langs, "Croatian");
    }
}
