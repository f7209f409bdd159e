use std::collections::HashMap;

use anyhow::{bail, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_THINKING_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_EVIDENCE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_THINKING_BUDGET: u32 = 32768;

/// Full application configuration.
/// The API key is the only required value; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,

    // Remote model
    pub gemini_base_url: String,
    pub search_model: String,
    pub thinking_model: String,
    pub evidence_model: String,
    pub thinking_budget: u32,
    pub request_timeout_s: u64,

    // Web
    pub web_bind: String,
    pub web_port: u16,
    pub dashboard_dist_dir: String,
    pub max_upload_mb: u64,
}

fn parse_dotenv() -> HashMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return HashMap::new();
    };
    parse_dotenv_str(&contents)
}

fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_num<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from the process environment, falling back to `./.env`.
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Build from `.env`-style text only. Used by tests and tooling.
    pub fn from_dotenv_str(contents: &str) -> Result<Self> {
        let map = parse_dotenv_str(contents);
        Self::from_lookup(|key| map.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("API_KEY")
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()));
        let Some(api_key) = api_key else {
            bail!("API_KEY environment variable not set");
        };

        Ok(Config {
            api_key: api_key.trim().to_string(),
            gemini_base_url: get_str(&lookup, "GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            search_model: get_str(&lookup, "SEARCH_MODEL", DEFAULT_SEARCH_MODEL),
            thinking_model: get_str(&lookup, "THINKING_MODEL", DEFAULT_THINKING_MODEL),
            evidence_model: get_str(&lookup, "EVIDENCE_MODEL", DEFAULT_EVIDENCE_MODEL),
            thinking_budget: get_num(&lookup, "THINKING_BUDGET", DEFAULT_THINKING_BUDGET),
            request_timeout_s: get_num(&lookup, "REQUEST_TIMEOUT_S", 300),
            web_bind: get_str(&lookup, "WEB_BIND", "127.0.0.1"),
            web_port: get_num(&lookup, "WEB_PORT", 3131),
            dashboard_dist_dir: get_str(&lookup, "DASHBOARD_DIST_DIR", "dist"),
            max_upload_mb: get_num(&lookup, "MAX_UPLOAD_MB", 20),
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}
