use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 30;
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub engine: EngineConfig,
}

/// Settings the engine consults while serving requests.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub app_origin: String,
    pub cache_max_age: Duration,
    pub session_max_age: Duration,
    pub sample_fallback: bool,
    pub stripe_publishable_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_origin: DEFAULT_APP_ORIGIN.into(),
            cache_max_age: Duration::from_secs(DEFAULT_CACHE_MAX_AGE_SECS),
            session_max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_SECS),
            sample_fallback: true,
            stripe_publishable_key: None,
        }
    }
}

impl Config {
    /// Reads configuration from the environment, after loading `.env` if one exists.
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let supabase_url = env::var("SUPABASE_URL")?.trim_end_matches('/').to_string();
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.into())
            .parse::<SocketAddr>()
            .map_err(|_| Error::invalid_input_error("BIND_ADDR is not a socket address"))?;

        let request_timeout = Duration::from_secs(env_parse_u64(
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));

        let engine = EngineConfig {
            app_origin: env::var("APP_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_APP_ORIGIN.into())
                .trim_end_matches('/')
                .to_string(),
            cache_max_age: Duration::from_secs(env_parse_u64(
                "CACHE_MAX_AGE_SECS",
                DEFAULT_CACHE_MAX_AGE_SECS,
            )),
            session_max_age: Duration::from_secs(env_parse_u64(
                "SESSION_MAX_AGE_SECS",
                DEFAULT_SESSION_MAX_AGE_SECS,
            )),
            sample_fallback: parse_flag(env::var("SAMPLE_FALLBACK").ok().as_deref(), true),
            stripe_publishable_key: env::var("STRIPE_PUBLISHABLE_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        };

        tracing::info!(
            "configured for {} (sample fallback: {})",
            supabase_url,
            engine.sample_fallback
        );

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            bind_addr,
            request_timeout,
            engine,
        })
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[test]
fn parse_flag_test() {
    assert!(parse_flag(None, true));
    assert!(!parse_flag(None, false));
    assert!(parse_flag(Some("TRUE"), false));
    assert!(parse_flag(Some(" on "), false));
    assert!(!parse_flag(Some("0"), true));
    assert!(!parse_flag(Some("off"), true));
    assert!(parse_flag(Some("maybe"), true));
}

#[test]
fn default_engine_config_test() {
    let config = EngineConfig::default();

    assert_eq!(config.app_origin, "http://localhost:5173");
    assert_eq!(config.cache_max_age, Duration::from_secs(30));
    assert_eq!(config.session_max_age, Duration::from_secs(300));
    assert!(config.sample_fallback);
    assert!(config.stripe_publishable_key.is_none());
}
