use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PromdashError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub scrape_url: String,
    pub scrape_headers: Vec<(String, String)>,
    pub poll_interval: Duration,
    pub fetch_attempts: u32,
    pub fetch_timeout: Duration,
    pub retry_backoff: Duration,
    pub view_http_addr: String,
    pub commit_untyped: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scrape_url: "http://127.0.0.1:3000/api/prometheus-metrics".to_string(),
            scrape_headers: Vec::new(),
            poll_interval: Duration::from_secs(60),
            fetch_attempts: 3,
            fetch_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(250),
            view_http_addr: "127.0.0.1:9464".to_string(),
            commit_untyped: false,
        }
    }
}

impl Config {
    /// Defaults, then the config file, then `PROMDASH_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides(path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    scrape_url: Option<String>,
    scrape_headers: Option<String>,
    poll_interval: Option<String>,
    fetch_attempts: Option<u32>,
    fetch_timeout: Option<String>,
    retry_backoff: Option<String>,
    view_http_addr: Option<String>,
    commit_untyped: Option<bool>,
}

pub fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("PROMDASH_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("promdash/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| PromdashError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| PromdashError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let fetch_attempts = match env::var("PROMDASH_FETCH_ATTEMPTS") {
        Ok(v) => Some(v.parse::<u32>().map_err(|e| {
            PromdashError::Config(format!("bad PROMDASH_FETCH_ATTEMPTS in environment: {e}"))
        })?),
        Err(_) => None,
    };
    let commit_untyped = match env::var("PROMDASH_COMMIT_UNTYPED") {
        Ok(v) => Some(parse_bool(&v).ok_or_else(|| {
            PromdashError::Config(format!("bad PROMDASH_COMMIT_UNTYPED in environment: {v}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        scrape_url: env::var("PROMDASH_SCRAPE_URL").ok(),
        scrape_headers: env::var("PROMDASH_SCRAPE_HEADERS").ok(),
        poll_interval: env::var("PROMDASH_POLL_INTERVAL").ok(),
        fetch_attempts,
        fetch_timeout: env::var("PROMDASH_FETCH_TIMEOUT").ok(),
        retry_backoff: env::var("PROMDASH_RETRY_BACKOFF").ok(),
        view_http_addr: env::var("PROMDASH_VIEW_HTTP_ADDR").ok(),
        commit_untyped,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.scrape_url {
        cfg.scrape_url = v;
    }
    if let Some(v) = overrides.scrape_headers {
        cfg.scrape_headers = parse_headers(&v).map_err(|e| {
            PromdashError::Config(format!("bad scrape_headers in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.poll_interval {
        let interval = parse_config_duration(&v, "poll_interval", source)?;
        if interval.is_zero() {
            return Err(PromdashError::Config(format!(
                "bad poll_interval in {source}: must be greater than zero"
            )));
        }
        cfg.poll_interval = interval;
    }
    if let Some(v) = overrides.fetch_attempts {
        if v == 0 {
            return Err(PromdashError::Config(format!(
                "bad fetch_attempts in {source}: must be at least 1"
            )));
        }
        cfg.fetch_attempts = v;
    }
    if let Some(v) = overrides.fetch_timeout {
        cfg.fetch_timeout = parse_config_duration(&v, "fetch_timeout", source)?;
    }
    if let Some(v) = overrides.retry_backoff {
        cfg.retry_backoff = parse_config_duration(&v, "retry_backoff", source)?;
    }
    if let Some(v) = overrides.view_http_addr {
        cfg.view_http_addr = v;
    }
    if let Some(v) = overrides.commit_untyped {
        cfg.commit_untyped = v;
    }
    Ok(())
}

fn parse_config_duration(value: &str, field: &str, source: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        PromdashError::Config(format!("bad {field} in {source}: {e} (value={value})"))
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_headers(raw: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for entry in raw.split(',') {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(PromdashError::Config(
                "header entries must use key=value syntax".to_string(),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(PromdashError::Config("header key cannot be empty".to_string()));
        }
        out.push((key.to_string(), value.trim().to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn default_polls_every_minute_with_three_attempts() {
        let cfg = Config::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.fetch_attempts, 3);
        assert!(!cfg.commit_untyped);
        assert!(cfg.scrape_url.ends_with("/api/prometheus-metrics"));
    }

    #[test]
    fn parse_headers_accepts_list() {
        let headers = parse_headers("x-tenant-id=acme,authorization=Bearer token").unwrap();
        assert_eq!(
            headers,
            vec![
                ("x-tenant-id".to_string(), "acme".to_string()),
                ("authorization".to_string(), "Bearer token".to_string())
            ]
        );
    }

    #[test]
    fn parse_headers_rejects_bad_entries() {
        assert!(parse_headers("x-tenant-id").is_err());
        assert!(parse_headers("=acme").is_err());
    }

    #[test]
    fn apply_overrides_updates_scrape_fields() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            scrape_url: Some("http://itsm.internal/api/prometheus-metrics".to_string()),
            scrape_headers: Some("x-tenant-id=acme".to_string()),
            poll_interval: Some("15s".to_string()),
            fetch_attempts: Some(5),
            retry_backoff: Some("10ms".to_string()),
            commit_untyped: Some(true),
            ..ConfigOverrides::default()
        };

        apply_overrides(&mut cfg, file, "config file").unwrap();

        assert_eq!(cfg.scrape_url, "http://itsm.internal/api/prometheus-metrics");
        assert_eq!(
            cfg.scrape_headers,
            vec![("x-tenant-id".to_string(), "acme".to_string())]
        );
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.fetch_attempts, 5);
        assert_eq!(cfg.retry_backoff, Duration::from_millis(10));
        assert!(cfg.commit_untyped);
    }

    #[test]
    fn apply_overrides_rejects_zero_attempts_and_bad_durations() {
        let mut cfg = Config::default();
        let zero = ConfigOverrides {
            fetch_attempts: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, zero, "config file").is_err());

        let bad = ConfigOverrides {
            poll_interval: Some("soon".to_string()),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut cfg, bad, "environment").unwrap_err();
        assert!(err.to_string().contains("poll_interval in environment"));
    }

    #[test]
    fn apply_overrides_rejects_zero_poll_interval() {
        let mut cfg = Config::default();
        let zero = ConfigOverrides {
            poll_interval: Some("0s".to_string()),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut cfg, zero, "config file").unwrap_err();
        assert!(matches!(err, PromdashError::Config(_)));
        assert!(err.to_string().contains("poll_interval in config file"));
        assert_eq!(cfg.poll_interval, Config::default().poll_interval);
    }

    #[test]
    #[serial]
    fn load_from_rejects_zero_poll_interval_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval = \"0s\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        let missing = dir.path().join("missing.toml");
        unsafe { env::set_var("PROMDASH_POLL_INTERVAL", "0ms") };
        let cfg = Config::load_from(&missing);
        unsafe { env::remove_var("PROMDASH_POLL_INTERVAL") };
        assert!(cfg.is_err());
    }

    #[test]
    #[serial]
    fn load_from_reads_toml_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "scrape_url = \"http://file/metrics\"\npoll_interval = \"30s\"\n",
        )
        .unwrap();

        // SAFETY: serialized with the other environment-mutating tests.
        unsafe { env::set_var("PROMDASH_POLL_INTERVAL", "5s") };
        let cfg = Config::load_from(&path);
        unsafe { env::remove_var("PROMDASH_POLL_INTERVAL") };

        let cfg = cfg.unwrap();
        assert_eq!(cfg.scrape_url, "http://file/metrics");
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn from_env_rejects_bad_bool() {
        unsafe { env::set_var("PROMDASH_COMMIT_UNTYPED", "maybe") };
        let cfg = Config::from_env();
        unsafe { env::remove_var("PROMDASH_COMMIT_UNTYPED") };
        assert!(cfg.is_err());
    }
}
