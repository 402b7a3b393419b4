use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:6689";
pub(crate) const DEFAULT_ROOT_ID: &str = "root";
pub(crate) const DEFAULT_RETRY_MS: i32 = 2000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Local,
    Remote,
}

impl StoreBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "local" => Some(Self::Local),
            "remote" | "http" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Runtime settings, read from `window.ENV` at startup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_url: String,
    pub root_id: String,
    pub store: StoreBackend,
    /// Interval of the repair pass for failed store writes.
    pub retry_ms: i32,
}

impl EnvConfig {
    pub fn new() -> Self {
        let Some(env) = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object())
        else {
            return Self::from_lookup(|_| None);
        };

        Self::from_lookup(|key| {
            js_sys::Reflect::get(&env, &key.into())
                .ok()
                .and_then(|v| v.as_string().or_else(|| v.as_f64().map(|n| n.to_string())))
        })
    }

    /// Build from a key lookup. Both `API_URL` and `api_url` spellings are accepted.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = get("API_URL")
            .or_else(|| get("api_url"))
            .filter(|s| !s.trim().is_empty());

        let store = get("STORE")
            .as_deref()
            .and_then(StoreBackend::parse)
            .unwrap_or(StoreBackend::Local);

        let root_id = get("ROOT_ID")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOT_ID.to_string());

        let retry_ms = get("RETRY_MS")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|n| n as i32)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RETRY_MS);

        Self {
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            root_id,
            store,
            retry_ms,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let c = EnvConfig::from_lookup(|_| None);
        assert_eq!(c.api_url, DEFAULT_API_URL);
        assert_eq!(c.root_id, "root");
        assert_eq!(c.store, StoreBackend::Local);
        assert_eq!(c.retry_ms, 2000);
    }

    #[test]
    fn test_api_url_prefers_upper_case_key() {
        let c = EnvConfig::from_lookup(lookup(&[("API_URL", "https://a"), ("api_url", "https://b")]));
        assert_eq!(c.api_url, "https://a");

        let c = EnvConfig::from_lookup(lookup(&[("api_url", "https://b")]));
        assert_eq!(c.api_url, "https://b");
    }

    #[test]
    fn test_store_and_retry_parsing() {
        let c = EnvConfig::from_lookup(lookup(&[("STORE", " Remote "), ("RETRY_MS", "500")]));
        assert_eq!(c.store, StoreBackend::Remote);
        assert_eq!(c.retry_ms, 500);

        let c = EnvConfig::from_lookup(lookup(&[("STORE", "bogus"), ("RETRY_MS", "-1")]));
        assert_eq!(c.store, StoreBackend::Local);
        assert_eq!(c.retry_ms, DEFAULT_RETRY_MS);
    }

    #[test]
    fn test_blank_root_id_falls_back() {
        let c = EnvConfig::from_lookup(lookup(&[("ROOT_ID", "  ")]));
        assert_eq!(c.root_id, DEFAULT_ROOT_ID);
    }
}
