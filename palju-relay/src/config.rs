use crate::router::RouterSettings;
use crate::segment::SessionPolicy;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Journal JSON lines des échantillons
    pub data_file: PathBuf,
    pub heartbeat_interval_secs: u64,
    pub session_gap_secs: i64,
    pub min_session_points: usize,
    pub history_limit: usize,
    pub recent_window_secs: i64,
    /// Jeton `Sec-WebSocket-Protocol` qui désigne un observer
    pub observer_protocol: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            data_file: PathBuf::from("./data/palju.jsonl"),
            heartbeat_interval_secs: 10,
            session_gap_secs: 6 * 60 * 60,
            min_session_points: 100,
            history_limit: 50,
            recent_window_secs: 60 * 60,
            observer_protocol: "observer".into(),
        }
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            gap_secs: self.session_gap_secs,
            min_points: self.min_session_points,
        }
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            history_limit: self.history_limit,
            recent_window_secs: self.recent_window_secs,
        }
    }
}

pub async fn load_config() -> RelayConfig {
    let path = std::env::var("PALJU_RELAY_CONFIG").unwrap_or_else(|_| "relay.yaml".into());
    let mut cfg = load_config_from(&path).await;

    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(port) => cfg.port = port,
            Err(e) => log::warn!("[relay] ignoring PORT={port}: {e}"),
        }
    }
    cfg
}

async fn load_config_from<P: AsRef<Path>>(path: P) -> RelayConfig {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("[relay] no {:?}, using default config", path);
        return RelayConfig::default();
    }

    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return RelayConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        log::warn!("[relay] invalid config {:?}: {e}", path);
        RelayConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.bind_addr().port(), 3000);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(cfg.session_policy(), SessionPolicy::default());
        assert_eq!(cfg.router_settings(), RouterSettings::default());
        assert_eq!(cfg.observer_protocol, "observer");
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.yaml");
        std::fs::write(&path, "port: 8081\nobserver_protocol: mobile\nhistory_limit: 20\n").unwrap();

        let cfg = load_config_from(&path).await;
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.observer_protocol, "mobile");
        assert_eq!(cfg.history_limit, 20);
        assert_eq!(cfg.session_gap_secs, 21_600);
    }

    #[tokio::test]
    async fn test_missing_empty_or_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_config_from(dir.path().join("absent.yaml")).await, RelayConfig::default());

        let empty = dir.path().join("empty.yaml");
        std::fs::write(&empty, "  \n").unwrap();
        assert_eq!(load_config_from(&empty).await, RelayConfig::default());

        let invalid = dir.path().join("invalid.yaml");
        std::fs::write(&invalid, "port: [not, a, port]\n").unwrap();
        assert_eq!(load_config_from(&invalid).await, RelayConfig::default());
    }
}
