//! Configuration loader and validator for the feed client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Fixed local default used when no origin is supplied at all.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Environment override for `backend.origin`.
pub const ORIGIN_ENV: &str = "GLOBAL_PULSE_API_BASE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
/// Every key is optional; omissions fall back to the local defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub feed: Feed,
    pub live: Live,
}

/// Where the backend lives and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Backend {
    pub origin: String,
    /// Explicit push endpoint. Unset derives `/ws/news` from the origin;
    /// the empty string disables the live channel entirely.
    pub push_url: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for Backend {
    fn default() -> Self {
        Backend {
            origin: DEFAULT_ORIGIN.to_string(),
            push_url: None,
            request_timeout_seconds: 20,
        }
    }
}

/// Feed query settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Feed {
    pub page_size: u32,
}

impl Default for Feed {
    fn default() -> Self {
        Feed { page_size: 30 }
    }
}

/// Live push-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Live {
    pub heartbeat_seconds: u64,
    pub max_backoff_seconds: u64,
}

impl Default for Live {
    fn default() -> Self {
        Live {
            heartbeat_seconds: 20,
            max_backoff_seconds: 60,
        }
    }
}

impl Config {
    /// Parsed backend origin. `validate` has already checked the scheme
    /// for configs that went through `load`.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin_str())
            .map_err(|_| ConfigError::Invalid("backend.origin must be an http(s) URL"))
    }

    fn origin_str(&self) -> String {
        self.backend.origin.trim().to_string()
    }

    fn with_env_origin(mut self, value: Option<String>) -> Config {
        if let Some(origin) = value.filter(|v| !v.trim().is_empty()) {
            self.backend.origin = origin;
        }
        self
    }
}

/// Load configuration from a YAML file and validate it.
/// - An explicit `path` must exist and parse.
/// - With `None`, `config.yaml` in the current directory is used when
///   present, otherwise the built-in defaults apply.
/// - `GLOBAL_PULSE_API_BASE` overrides `backend.origin` either way.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = match path {
        Some(path) => parse_file(path)?,
        None => {
            let implicit = Path::new("config.yaml");
            if implicit.exists() {
                parse_file(implicit)?
            } else {
                Config::default()
            }
        }
    };
    let cfg = cfg.with_env_origin(std::env::var(ORIGIN_ENV).ok());
    validate(&cfg)?;
    Ok(cfg)
}

fn parse_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let origin = Url::parse(cfg.backend.origin.trim())
        .map_err(|_| ConfigError::Invalid("backend.origin must be an http(s) URL"))?;
    if origin.scheme() != "http" && origin.scheme() != "https" {
        return Err(ConfigError::Invalid("backend.origin must be an http(s) URL"));
    }

    if let Some(push) = cfg.backend.push_url.as_deref() {
        let push = push.trim();
        if !push.is_empty() {
            let url = Url::parse(push)
                .map_err(|_| ConfigError::Invalid("backend.push_url must be a ws(s) URL"))?;
            if url.scheme() != "ws" && url.scheme() != "wss" {
                return Err(ConfigError::Invalid("backend.push_url must be a ws(s) URL"));
            }
        }
    }

    if cfg.backend.request_timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "backend.request_timeout_seconds must be > 0",
        ));
    }
    if cfg.feed.page_size == 0 || cfg.feed.page_size > 100 {
        return Err(ConfigError::Invalid(
            "feed.page_size must be between 1 and 100",
        ));
    }
    if cfg.live.heartbeat_seconds == 0 {
        return Err(ConfigError::Invalid("live.heartbeat_seconds must be > 0"));
    }
    // max_backoff_seconds == 0 simply removes the cap

    Ok(())
}

/// Example YAML document with every key at its default.
pub fn example() -> &'static str {
    r#"backend:
  origin: "http://localhost:8000"
  # push_url: "wss://news.example.org/ws/news"
  request_timeout_seconds: 20

feed:
  page_size: 30

live:
  heartbeat_seconds: 20
  max_backoff_seconds: 60
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.backend.origin, DEFAULT_ORIGIN);
        assert_eq!(cfg.feed.page_size, 30);
        assert_eq!(cfg.live.heartbeat_seconds, 20);
    }

    #[test]
    fn invalid_origin_rejected() {
        let mut cfg = Config::default();
        cfg.backend.origin = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("backend.origin")),
            _ => panic!("wrong error"),
        }

        let mut cfg = Config::default();
        cfg.backend.origin = "ftp://example.org".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_push_url_rejected() {
        let mut cfg = Config::default();
        cfg.backend.push_url = Some("http://example.org/ws".into());
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("push_url")),
            _ => panic!("wrong error"),
        }

        // The empty override is legal: it disables the channel.
        let mut cfg = Config::default();
        cfg.backend.push_url = Some(String::new());
        validate(&cfg).unwrap();
    }

    #[test]
    fn page_size_bounds_enforced() {
        let mut cfg = Config::default();
        cfg.feed.page_size = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.feed.page_size = 101;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.feed.page_size = 100;
        validate(&cfg).unwrap();
    }

    #[test]
    fn env_origin_override_wins() {
        let cfg = Config::default().with_env_origin(Some("http://10.0.0.5:9000".into()));
        assert_eq!(cfg.backend.origin, "http://10.0.0.5:9000");

        let cfg = Config::default().with_env_origin(Some("   ".into()));
        assert_eq!(cfg.backend.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(b"feed:\n  page_size: 10\n").unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.feed.page_size, 10);
        assert_eq!(cfg.backend.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let td = tempdir().unwrap();
        let p = td.path().join("absent.yaml");
        assert!(matches!(load(Some(&p)), Err(ConfigError::Io(_))));
    }
}
