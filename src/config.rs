use std::{env, str::FromStr};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub stability_api_key: Option<String>,
    pub stability_api_base: String,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub connect_timeout_secs: u64,
    pub attempt_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

trait FromEnvWithDefault: Sized {
    fn from_env_or_default(key: &str, default: Self) -> Self;
}

impl FromEnvWithDefault for u16 {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}

impl FromEnvWithDefault for u32 {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}

impl FromEnvWithDefault for u64 {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}

impl FromEnvWithDefault for String {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key).unwrap_or(default)
    }
}

impl<T> FromEnvWithDefault for Option<T>
where
    T: FromStr,
{
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .or(default)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: String::from_env_or_default("HOST", "0.0.0.0".into()),
            port: u16::from_env_or_default("PORT", 8080),
            // an empty key is as good as no key
            stability_api_key: Option::<String>::from_env_or_default("STABILITY_KEY", None)
                .filter(|key| !key.trim().is_empty()),
            stability_api_base: String::from_env_or_default(
                "STABILITY__API_BASE",
                "https://api.stability.ai".into(),
            ),
            max_attempts: u32::from_env_or_default("STABILITY__MAX_ATTEMPTS", 3),
            backoff_ms: u64::from_env_or_default("STABILITY__BACKOFF_MS", 1000),
            connect_timeout_secs: u64::from_env_or_default("STABILITY__CONNECT_TIMEOUT_SECS", 30),
            attempt_timeout_secs: u64::from_env_or_default("STABILITY__ATTEMPT_TIMEOUT_SECS", 90),
            request_timeout_secs: u64::from_env_or_default("REQUEST_TIMEOUT_SECS", 300),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            stability_api_key: None,
            stability_api_base: "https://api.stability.ai".into(),
            max_attempts: 3,
            backoff_ms: 1000,
            connect_timeout_secs: 30,
            attempt_timeout_secs: 90,
            request_timeout_secs: 300,
        }
    }
}
