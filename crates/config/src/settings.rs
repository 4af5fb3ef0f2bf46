use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub engine: EngineSettings,
    pub state_store: StateStoreSettings,
    pub credentials: CredentialSettings,
    pub adapter: AdapterSettings,
    pub call_manager: CallManagerSettings,
    pub ice_servers: Vec<IceServerSettings>,
    pub resilience: ResilienceSettings,
    pub transport: TransportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TlsSettings {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsSettings>,
}

/// mediasoup worker/router tuning (`engine`).
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub num_workers: u32,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub listen_ips: Vec<String>,
    pub announced_ip: Option<String>,
    pub initial_available_outgoing_bitrate: u32,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    pub enable_sctp: bool,
}

/// Remote state-store connection (implementation E).
#[derive(Debug, Deserialize, Clone)]
pub struct StateStoreSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub enabled: bool,
}

/// Bearer-token verification material . No issuance config here;
/// minting tokens is explicitly out of scope.
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialSettings {
    pub api_key: String,
    pub api_secret: String,
    pub expires_in: u64,
}

/// Media-engine adapter sweeper tuning (orphan sweep, `T_sweep`/`T_maxAge`).
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterSettings {
    pub enable_auto_cleanup: bool,
    pub cleanup_interval_ms: u64,
    pub resource_max_age_secs: u64,
    /// `T_close`: per-operation timeout while cascading a transport close.
    pub close_timeout_secs: u64,
}

/// Call-manager garbage collection (, `T_callgc`/`T_callmax`).
#[derive(Debug, Deserialize, Clone)]
pub struct CallManagerSettings {
    pub allow_multiple_calls: bool,
    pub enable_auto_cleanup: bool,
    pub cleanup_interval_ms: u64,
    pub cleanup_max_age_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IceServerSettings {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Circuit breaker and retry tunables .
#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceSettings {
    /// `N_fail`: consecutive state-store failures before the breaker opens.
    pub n_fail: u32,
    /// `W_monitor`, seconds: window over which `n_fail` is counted.
    pub w_monitor_secs: u64,
    /// `T_reset`, seconds: time the breaker stays open before a half-open trial.
    pub t_reset_secs: u64,
    /// `N_trial`: consecutive successes in half-open needed to close again.
    pub n_trial: u32,
    /// `T_base`, milliseconds: base reconnect backoff delay.
    pub t_base_ms: u64,
    /// Backoff cap, milliseconds (spec: 30s).
    pub backoff_cap_ms: u64,
    /// `N_bad`: malformed-intent threshold within `w_bad_secs` before the connection is closed.
    pub n_bad: u32,
    pub w_bad_secs: u64,
    /// Handler-level deadline, seconds (default 30s).
    pub handler_deadline_secs: u64,
}

/// Signaling transport tuning (/§4.10/§5).
#[derive(Debug, Deserialize, Clone)]
pub struct TransportSettings {
    /// `T_ping`, seconds: heartbeat interval.
    pub t_ping_secs: u64,
    /// `Q_max`: outbound send-queue depth before a slow consumer is evicted.
    pub q_max: usize,
    /// `Q_in`: inbound intent queue depth before reads are paused.
    pub q_in: usize,
    /// `M_data` for `kind: reliable`, bytes.
    pub m_data_reliable_bytes: usize,
    /// `M_data` for `kind: lossy` (signaling-relayed fallback), bytes.
    pub m_data_lossy_bytes: usize,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::default().separator("__").prefix("SFUNET"))
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("server.tls", None::<String>)?
        .set_default("engine.num_workers", 2)?
        .set_default("engine.rtc_min_port", 40000)?
        .set_default("engine.rtc_max_port", 49999)?
        .set_default("engine.listen_ips", vec!["0.0.0.0".to_string()])?
        .set_default("engine.announced_ip", None::<String>)?
        .set_default("engine.initial_available_outgoing_bitrate", 1_000_000)?
        .set_default("engine.enable_udp", true)?
        .set_default("engine.enable_tcp", true)?
        .set_default("engine.prefer_udp", true)?
        .set_default("engine.enable_sctp", true)?
        .set_default("state_store.host", "127.0.0.1")?
        .set_default("state_store.port", 6379)?
        .set_default("state_store.password", None::<String>)?
        .set_default("state_store.db", 0)?
        .set_default("state_store.enabled", false)?
        .set_default("credentials.api_key", "change-me-in-production")?
        .set_default("credentials.api_secret", "change-me-in-production")?
        .set_default("credentials.expires_in", 3600)?
        .set_default("adapter.enable_auto_cleanup", true)?
        .set_default("adapter.cleanup_interval_ms", 300_000)?
        .set_default("adapter.resource_max_age_secs", 3600)?
        .set_default("adapter.close_timeout_secs", 10)?
        .set_default("call_manager.allow_multiple_calls", false)?
        .set_default("call_manager.enable_auto_cleanup", true)?
        .set_default("call_manager.cleanup_interval_ms", 60_000)?
        .set_default("call_manager.cleanup_max_age_secs", 3600)?
        .set_default("ice_servers", Vec::<String>::new())?
        .set_default("resilience.n_fail", 5)?
        .set_default("resilience.w_monitor_secs", 10)?
        .set_default("resilience.t_reset_secs", 60)?
        .set_default("resilience.n_trial", 2)?
        .set_default("resilience.t_base_ms", 1000)?
        .set_default("resilience.backoff_cap_ms", 30_000)?
        .set_default("resilience.n_bad", 20)?
        .set_default("resilience.w_bad_secs", 60)?
        .set_default("resilience.handler_deadline_secs", 30)?
        .set_default("transport.t_ping_secs", 30)?
        .set_default("transport.q_max", 512)?
        .set_default("transport.q_in", 256)?
        .set_default("transport.m_data_reliable_bytes", 262_144)?
        .set_default("transport.m_data_lossy_bytes", 16_384)?
        .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("failed to load default settings")
    }
}
