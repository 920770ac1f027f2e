use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 45;
const MAX_TIMEOUT_SECS: u64 = 300;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    /// Primary provider. `None` when no key is set.
    pub gemini: Option<GeminiSettings>,
    /// Secondary provider. `None` when no key is set.
    pub openai: Option<OpenAiSettings>,
    pub provider_timeout: Duration,
    pub probe_secondary: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(addr) => addr
                .parse()
                .map_err(|e| anyhow::anyhow!("Failed to parse BIND_ADDR '{}': {}", addr, e))?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let max_file_size = match get("MAX_FILE_SIZE") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Failed to parse MAX_FILE_SIZE '{}': {}", raw, e))?,
            None => default_max_file_size(),
        };

        let timeout_secs = match get("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Failed to parse PROVIDER_TIMEOUT_SECS '{}': {}", raw, e))?
                .clamp(1, MAX_TIMEOUT_SECS),
            None => DEFAULT_TIMEOUT_SECS,
        };

        let probe_secondary = get("PROBE_SECONDARY")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiSettings {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAiSettings {
            api_key,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        Ok(Config {
            bind_addr,
            max_file_size,
            gemini,
            openai,
            provider_timeout: Duration::from_secs(timeout_secs),
            probe_secondary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_keys() {
        let config = config_from(&[]).unwrap();
        assert!(config.gemini.is_none());
        assert!(config.openai.is_none());
        assert_eq!(config.provider_timeout, Duration::from_secs(45));
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(!config.probe_secondary);
        assert_eq!(config.bind_addr.port(), 3000);
    }

    #[test]
    fn blank_keys_count_as_absent() {
        let config = config_from(&[("GEMINI_API_KEY", "   "), ("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert!(config.gemini.is_none());
        let openai = config.openai.unwrap();
        assert_eq!(openai.model, "gpt-4o-mini");
    }

    #[test]
    fn timeout_is_clamped_and_probe_flag_parsed() {
        let config = config_from(&[
            ("PROVIDER_TIMEOUT_SECS", "0"),
            ("PROBE_SECONDARY", "TRUE"),
            ("GEMINI_API_KEY", "g-key"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
        ])
        .unwrap();
        assert_eq!(config.provider_timeout, Duration::from_secs(1));
        assert!(config.probe_secondary);
        assert_eq!(config.gemini.unwrap().base_url, "http://localhost:9000");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(config_from(&[("MAX_FILE_SIZE", "lots")]).is_err());
        assert!(config_from(&[("BIND_ADDR", "nowhere")]).is_err());
    }
}
