//! Environment-driven configuration for the API binary.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration as StdDuration;

use chrono::Duration;
use ipnet::IpNet;
use thiserror::Error;

use lessonbay_infra::RateLimitRule;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_ROOM_SECRET: &str = "dev-room-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub otp_rule: RateLimitRule,
    pub signup_rule: RateLimitRule,
    pub otp_ttl: Duration,
    /// Period of the expiry sweep over kicks, limiter buckets and one-time codes.
    /// `None` disables it.
    pub moderation_sweep: Option<StdDuration>,
    pub room_url: String,
    /// Signs room join grants. Never the same key as `jwt_secret`.
    pub room_secret: String,
    pub room_token_ttl: Duration,
    /// Peers whose `X-Forwarded-For` hops are believed when keying rate limits.
    pub trusted_proxies: Vec<IpNet>,
    pub persistent_stores: bool,
    pub database_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            otp_rule: RateLimitRule::one_time_code(),
            signup_rule: RateLimitRule::signup(),
            otp_ttl: Duration::minutes(10),
            moderation_sweep: Some(StdDuration::from_secs(60)),
            room_url: "ws://localhost:7880".to_string(),
            room_secret: DEV_ROOM_SECRET.to_string(),
            room_token_ttl: Duration::hours(2),
            trusted_proxies: Vec::new(),
            persistent_stores: false,
            database_url: None,
        }
    }
}

impl ApiConfig {
    /// Defaults with a given signing secret; convenient for tests.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr.parse().map_err(|e| invalid("BIND_ADDR", e))?;
        }

        match get("JWT_SECRET") {
            Some(secret) => config.jwt_secret = secret,
            None => tracing::warn!("JWT_SECRET not set; using insecure dev default"),
        }

        if let Some(rule) = get("OTP_RATE_LIMIT") {
            config.otp_rule = rule.parse().map_err(|e| invalid("OTP_RATE_LIMIT", e))?;
        }
        if let Some(rule) = get("SIGNUP_RATE_LIMIT") {
            config.signup_rule = rule.parse().map_err(|e| invalid("SIGNUP_RATE_LIMIT", e))?;
        }

        if let Some(secs) = get("OTP_TTL_SECS") {
            config.otp_ttl = positive_secs("OTP_TTL_SECS", &secs)?;
        }

        if let Some(secs) = get("MODERATION_SWEEP_SECS") {
            let secs: u64 = secs.parse().map_err(|e| invalid("MODERATION_SWEEP_SECS", e))?;
            config.moderation_sweep = (secs > 0).then(|| StdDuration::from_secs(secs));
        }

        if let Some(url) = get("ROOM_URL") {
            config.room_url = url;
        }
        match get("ROOM_SECRET") {
            Some(secret) => config.room_secret = secret,
            None => tracing::warn!("ROOM_SECRET not set; using insecure dev default"),
        }
        if config.room_secret == config.jwt_secret {
            return Err(invalid("ROOM_SECRET", "must differ from JWT_SECRET"));
        }
        if let Some(secs) = get("ROOM_TOKEN_TTL_SECS") {
            config.room_token_ttl = positive_secs("ROOM_TOKEN_TTL_SECS", &secs)?;
        }

        if let Some(list) = get("TRUSTED_PROXIES") {
            config.trusted_proxies = list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(parse_ip_or_cidr)
                .collect::<Result<_, _>>()?;
        }

        if let Some(flag) = get("USE_PERSISTENT_STORES") {
            config.persistent_stores = flag.parse().map_err(|e| invalid("USE_PERSISTENT_STORES", e))?;
        }
        config.database_url = get("DATABASE_URL");
        if config.persistent_stores && config.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        message: e.to_string(),
    }
}

/// `10.0.0.0/8` or a bare address, which becomes a single-host network.
fn parse_ip_or_cidr(entry: &str) -> Result<IpNet, ConfigError> {
    entry
        .parse::<IpNet>()
        .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
        .map_err(|e| invalid("TRUSTED_PROXIES", format!("{entry:?}: {e}")))
}

fn positive_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: i64 = raw.parse().map_err(|e| invalid(var, e))?;
    if secs <= 0 {
        return Err(invalid(var, "must be positive"));
    }
    Duration::try_seconds(secs).ok_or_else(|| invalid(var, "out of range"))
}
