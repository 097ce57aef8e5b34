// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoints
    #[serde(default)]
    pub portal: PortalConfig,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.portal.studip_base)
            .map_err(|e| AppError::config(format!("portal.studip_base is not a URL: {e}")))?;
        Url::parse(&self.portal.sso_base)
            .map_err(|e| AppError::config(format!("portal.sso_base is not a URL: {e}")))?;
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::config("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.session_ttl_secs == 0 {
            return Err(AppError::config("crawler.session_ttl_secs must be > 0"));
        }
        Ok(())
    }
}

/// Portal endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the Stud.IP deployment
    #[serde(default = "defaults::studip_base")]
    pub studip_base: String,

    /// Base URL of the Shibboleth SSO identity provider
    #[serde(default = "defaults::sso_base")]
    pub sso_base: String,

    /// Restrict crawling to courses of this semester tag, if set
    #[serde(default)]
    pub semester: Option<String>,
}

impl PortalConfig {
    /// Build an absolute Stud.IP URL from a path.
    pub fn studip_url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}{}",
            self.studip_base.trim_end_matches('/'),
            path
        ))?)
    }

    /// Build an absolute SSO URL from a form action path.
    pub fn sso_url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(Url::parse(&format!(
            "{}{}",
            self.sso_base.trim_end_matches('/'),
            path
        ))?)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            studip_base: defaults::studip_base(),
            sso_base: defaults::sso_base(),
            semester: None,
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Retry attempts for transient network failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "defaults::backoff_cap")]
    pub backoff_cap_ms: u64,

    /// Mandatory wait after a throttling response in milliseconds
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// How long a login is assumed valid before proactive renewal
    #[serde(default = "defaults::session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: defaults::request_delay(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_cap_ms: defaults::backoff_cap(),
            rate_limit_backoff_ms: defaults::rate_limit_backoff(),
            session_ttl_secs: defaults::session_ttl(),
        }
    }
}

mod defaults {
    pub fn studip_base() -> String {
        "https://studip.uni-passau.de".to_string()
    }

    pub fn sso_base() -> String {
        "https://sso.uni-passau.de".to_string()
    }

    pub fn user_agent() -> String {
        "studsync/0.1 (+https://github.com/studsync)".to_string()
    }

    pub fn timeout() -> u64 {
        30
    }

    pub fn max_concurrent() -> usize {
        4
    }

    pub fn request_delay() -> u64 {
        0
    }

    pub fn max_retries() -> u32 {
        3
    }

    pub fn backoff_base() -> u64 {
        250
    }

    pub fn backoff_cap() -> u64 {
        5_000
    }

    pub fn rate_limit_backoff() -> u64 {
        15_000
    }

    pub fn session_ttl() -> u64 {
        20 * 60
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [portal]
            studip_base = "https://studip.example.edu"

            [crawler]
            max_concurrent = 8
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.portal.studip_base, "https://studip.example.edu");
        assert_eq!(config.crawler.max_concurrent, 8);
        // untouched fields keep their defaults
        assert_eq!(config.crawler.max_retries, 3);
    }

    #[test]
    fn test_studip_url_joins_path() {
        let portal = PortalConfig {
            studip_base: "https://studip.example.edu/".to_string(),
            ..PortalConfig::default()
        };
        let url = portal.studip_url("/studip/dispatch.php/my_courses").unwrap();
        assert_eq!(
            url.as_str(),
            "https://studip.example.edu/studip/dispatch.php/my_courses"
        );
    }

    #[test]
    fn test_sso_url_accepts_absolute_action() {
        let portal = PortalConfig::default();
        let url = portal.sso_url("https://idp.example.edu/profile/SAML2").unwrap();
        assert_eq!(url.as_str(), "https://idp.example.edu/profile/SAML2");
    }
}
