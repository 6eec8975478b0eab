use crate::models::TargetId;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InspectorConfig {
    pub inspection: InspectionOptions,
    pub mqtt: MqttConf,
    pub collector: CollectorConf,
    pub http: HttpConf,
    /// Cibles enregistrées au démarrage (les sondes peuvent aussi s'annoncer)
    pub targets: Vec<TargetId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InspectionOptions {
    pub startup_delay_ms: u64,
    pub interval_ms: u64,
}

impl Default for InspectionOptions {
    fn default() -> Self {
        Self { startup_delay_ms: 5000, interval_ms: 5000 }
    }
}

impl InspectionOptions {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "symbion-inspector".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CollectorConf {
    pub url: String, // ex: "http://collector.lan:7070/reports"
    pub timeout_ms: u64,
}

impl Default for CollectorConf {
    fn default() -> Self {
        Self {
            url: "http://localhost:7070/reports".into(),
            timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
    /// Si présent, header x-api-key exigé sur toutes les routes sauf /health
    pub api_key: Option<String>,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8090".into(), api_key: None }
    }
}

/// Lecture stricte d'un fichier de config ; fichier vide = défauts
pub async fn load_config_from<P: AsRef<Path>>(path: P) -> Result<InspectorConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(InspectorConfig::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

/// Charge la config depuis SYMBION_INSPECTOR_CONFIG (défaut: inspector.yaml),
/// retombe sur les défauts si absente ou invalide
pub async fn load_config() -> InspectorConfig {
    let path = std::env::var("SYMBION_INSPECTOR_CONFIG").unwrap_or_else(|_| "inspector.yaml".into());
    if !Path::new(&path).exists() {
        warn!(path = %path, "no config file, using defaults");
        return InspectorConfig::default();
    }
    load_config_from(&path).await.unwrap_or_else(|e| {
        warn!(path = %path, error = %e, "invalid config, using defaults");
        InspectorConfig::default()
    })
}
