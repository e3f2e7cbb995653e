// src/config.rs
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::session::gateway::GatewayConfig;
use crate::session::reconnect::ExponentialBackoff;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth_dir: String,
    pub cors_origin: Option<String>,
    pub send_timeout: Duration,
    pub gateway: GatewayConfig,
    pub reconnect: ExponentialBackoff,
}

impl Config {
    pub fn from_env() -> Self {
        let gateway = GatewayConfig {
            base_url: var_or("WA_GATEWAY_URL", "http://localhost:8080"),
            api_key: var_or("WA_GATEWAY_KEY", ""),
            instance: var_or("WA_INSTANCE", "absensi"),
            poll_interval: Duration::from_millis(parse_or("WA_POLL_INTERVAL_MS", 2000)),
            request_timeout: Duration::from_secs(parse_or("WA_REQUEST_TIMEOUT_SECS", 15)),
        };

        if gateway.api_key.is_empty() {
            log::warn!("WA_GATEWAY_KEY kosong, request ke gateway tanpa API key");
        }

        let reconnect = ExponentialBackoff::new(
            Duration::from_millis(parse_or("RECONNECT_BASE_MS", 1000)),
            Duration::from_millis(parse_or("RECONNECT_MAX_MS", 30_000)),
            env::var("RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
        );

        Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 4000),
            auth_dir: var_or("AUTH_DIR", "auth_info"),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.trim().is_empty()),
            send_timeout: Duration::from_secs(parse_or("SEND_TIMEOUT_SECS", 30)),
            gateway,
            reconnect,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Nilai {key} tidak valid ({e}), pakai default {default}");
            default
        }),
        Err(_) => default,
    }
}
