use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

use crate::sfu::{ErrorPolicy, RelayConfig, RoomConfig, DEFAULT_BUFFER_SIZE, DEFAULT_PLI_INTERVAL};
use crate::signaling::queue::DEFAULT_CAPACITY;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Serve over TLS when both are set
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub stun_servers: Vec<String>,
    pub asset_dir: PathBuf,
    pub index_template: PathBuf,
    pub request_queue_capacity: usize,
    pub pli_interval: Duration,
    pub relay_buffer_size: usize,
    pub ice_gathering_timeout: Option<Duration>,
    pub relay_track_timeout: Option<Duration>,
    pub error_policy: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls_cert_path: None,
            tls_key_path: None,
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            asset_dir: PathBuf::from("./asset"),
            index_template: PathBuf::from("./index.html"),
            request_queue_capacity: DEFAULT_CAPACITY,
            pli_interval: DEFAULT_PLI_INTERVAL,
            relay_buffer_size: DEFAULT_BUFFER_SIZE,
            ice_gathering_timeout: None,
            relay_track_timeout: None,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_address = lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address);

        let tls_cert_path = lookup("TLS_CERT_PATH").map(PathBuf::from);
        let tls_key_path = lookup("TLS_KEY_PATH").map(PathBuf::from);
        if tls_cert_path.is_some() != tls_key_path.is_some() {
            tracing::warn!("Only one of TLS_CERT_PATH / TLS_KEY_PATH is set, serving plain HTTP");
        }

        let stun_servers = lookup("STUN_SERVERS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.stun_servers);
        anyhow::ensure!(
            !stun_servers.is_empty(),
            "STUN_SERVERS: at least one STUN server URL is required"
        );

        let asset_dir = lookup("ASSET_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.asset_dir);
        let index_template = lookup("INDEX_TEMPLATE")
            .map(PathBuf::from)
            .unwrap_or(defaults.index_template);

        let request_queue_capacity = match lookup("REQUEST_QUEUE_CAPACITY") {
            Some(v) => v
                .parse()
                .with_context(|| format!("REQUEST_QUEUE_CAPACITY: invalid value '{}'", v))?,
            None => defaults.request_queue_capacity,
        };

        let relay_buffer_size = match lookup("RELAY_BUFFER_SIZE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("RELAY_BUFFER_SIZE: invalid value '{}'", v))?,
            None => defaults.relay_buffer_size,
        };
        anyhow::ensure!(relay_buffer_size > 0, "RELAY_BUFFER_SIZE: must be greater than zero");

        let pli_interval =
            parse_millis(&lookup, "PLI_INTERVAL_MS")?.unwrap_or(defaults.pli_interval);
        anyhow::ensure!(!pli_interval.is_zero(), "PLI_INTERVAL_MS: must be greater than zero");
        let ice_gathering_timeout = parse_millis(&lookup, "ICE_GATHERING_TIMEOUT_MS")?;
        let relay_track_timeout = parse_millis(&lookup, "RELAY_TRACK_TIMEOUT_MS")?;

        let error_policy = match lookup("ERROR_POLICY") {
            Some(v) => v
                .parse()
                .map_err(|e: String| anyhow::anyhow!("ERROR_POLICY: {}", e))?,
            None => defaults.error_policy,
        };

        Ok(Config {
            bind_address,
            tls_cert_path,
            tls_key_path,
            stun_servers,
            asset_dir,
            index_template,
            request_queue_capacity,
            pli_interval,
            relay_buffer_size,
            ice_gathering_timeout,
            relay_track_timeout,
            error_policy,
        })
    }

    /// Certificate and key paths, when TLS is fully configured
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.tls_cert_path.as_ref().zip(self.tls_key_path.as_ref())
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            error_policy: self.error_policy,
            ice_gathering_timeout: self.ice_gathering_timeout,
            relay_track_timeout: self.relay_track_timeout,
            relay: RelayConfig {
                buffer_size: self.relay_buffer_size,
                pli_interval: self.pli_interval,
            },
        }
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<Duration>> {
    lookup(key)
        .map(|v| {
            v.parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("{}: invalid millisecond value '{}'", key, v))
        })
        .transpose()
}
