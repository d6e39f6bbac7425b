use crate::query::QueryService;
use crate::registry::ConnectionRegistry;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayHealth {
    pub uptime_seconds: u64,
    pub connections: u32,
    pub devices: u32,
    pub observers: u32,
    /// None si le stockage ne répond pas
    pub samples_stored: Option<u64>,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn get_health(&self, registry: &ConnectionRegistry, queries: &QueryService) -> RelayHealth {
        let counts = registry.role_counts();
        let samples_stored = match queries.stored_count() {
            Ok(count) => Some(count as u64),
            Err(e) => {
                log::warn!("[health] store did not answer: {}", e);
                None
            }
        };

        RelayHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            connections: (counts.devices + counts.observers) as u32,
            devices: counts.devices as u32,
            observers: counts.observers as u32,
            samples_stored,
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    0.0
}
