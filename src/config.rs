// config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_auth_url() -> String {
    "http://localhost:9999".to_string()
}

/// Client configuration. Base URLs come from the config file and can be
/// overridden per run with `LISTO_API_URL` / `LISTO_AUTH_URL`.
/// `remember_email` holds the last login email when "remember me" is on.
#[derive(Clone, Serialize, Deserialize)]
pub struct ListoConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default)]
    pub remember_email: Option<String>,
}

impl Default for ListoConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            remember_email: None,
        }
    }
}

pub fn config_dir() -> PathBuf {
    let dir = ProjectDirs::from("", "", "ListoTUI")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    create_dir_all(&dir).ok();
    dir
}

pub fn config_path() -> PathBuf {
    config_dir().join("listo.json")
}

pub fn load_config() -> ListoConfig {
    let mut cfg: ListoConfig = File::open(config_path())
        .ok()
        .and_then(|file| serde_json::from_reader(BufReader::new(file)).ok())
        .unwrap_or_default();
    if let Ok(url) = std::env::var("LISTO_API_URL") {
        if !url.trim().is_empty() {
            cfg.api_url = url.trim().to_string();
        }
    }
    if let Ok(url) = std::env::var("LISTO_AUTH_URL") {
        if !url.trim().is_empty() {
            cfg.auth_url = url.trim().to_string();
        }
    }
    cfg
}

pub fn save_config(cfg: &ListoConfig) -> Result<(), String> {
    let file = File::create(config_path())
        .map_err(|e| format!("Open listo config failed: {}", e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, cfg).map_err(|e| format!("Write listo config failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: ListoConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.api_url, "http://localhost:8080");
        assert_eq!(cfg.auth_url, "http://localhost:9999");
        assert!(cfg.remember_email.is_none());
    }

    #[test]
    fn round_trips_remembered_email() {
        let cfg = ListoConfig {
            remember_email: Some("ana@example.com".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ListoConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.remember_email.as_deref(), Some("ana@example.com"));
    }
}
