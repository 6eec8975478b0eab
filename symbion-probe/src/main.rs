//! Symbion Probe - host metrics probe
//!
//! Answers inspection requests with the host CPU and RAM usage ratios.

use anyhow::Result;
use gethostname::gethostname;
use serde_json::{json, Value};
use symbion_probe::{run_probe, ProbeConfig, StateSource};
use sysinfo::System;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CPU / RAM snapshot of the local host
struct HostMetrics {
    sys: System,
}

impl HostMetrics {
    fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl StateSource for HostMetrics {
    fn collect(&mut self) -> Value {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        // ratios 0..1
        let cpu = self.sys.global_cpu_info().cpu_usage() / 100.0;
        let total = self.sys.total_memory() as f32;
        let used = self.sys.used_memory() as f32;
        let ram = if total > 0.0 { used / total } else { 0.0 };

        json!({ "cpu": cpu, "ram": ram })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("symbion_probe=info")),
        )
        .init();

    let hostname = gethostname().to_string_lossy().to_string();
    let config = ProbeConfig::from_env(&hostname);
    info!("Symbion probe {} -> {}:{}", config.target_id, config.mqtt_host, config.mqtt_port);

    run_probe(config, HostMetrics::new()).await;
    Ok(())
}
