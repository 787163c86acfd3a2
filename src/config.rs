//! Configuration management for breachfeed using the prefer crate.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Agency;
use crate::scrapers::BrowserOptions;
use crate::sources::{self, SourceSpec};
use crate::view::DEFAULT_WINDOW_DAYS;

/// Default feed cache lifetime in seconds (one hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// User agent for HTTP requests (None = built-in, "impersonate" = real browser UA).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    /// Preferred browser binary.
    pub browser_path: Option<PathBuf>,
    /// Seconds to wait for an interactive control before giving up.
    pub click_timeout_secs: u64,
    /// How long a computed feed is served before recomputing.
    pub cache_ttl_secs: u64,
    /// Look-back window for the dashboard, in days.
    pub window_days: u32,
    /// Web server bind host.
    pub host: String,
    /// Web server port.
    pub port: u16,
    /// Sources switched off in configuration.
    pub disabled_sources: HashSet<Agency>,
    /// Per-source listing URL overrides.
    pub source_urls: HashMap<Agency, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 500,
            browser_path: Some(PathBuf::from("/usr/bin/chromium")),
            click_timeout_secs: 10,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            window_days: DEFAULT_WINDOW_DAYS,
            host: "127.0.0.1".to_string(),
            port: 8501,
            disabled_sources: HashSet::new(),
            source_urls: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Browser launch options derived from these settings.
    pub fn browser_options(&self) -> BrowserOptions {
        let mut options = BrowserOptions {
            binary_path: self.browser_path.clone(),
            request_timeout: self.request_timeout(),
            click_timeout: Duration::from_secs(self.click_timeout_secs),
            request_delay: self.request_delay(),
            ..Default::default()
        };
        if let Some(ua) = &self.user_agent {
            if ua != "impersonate" {
                options.user_agent = ua.clone();
            }
        }
        options
    }

    /// Enabled sources with URL overrides applied.
    pub fn sources(&self) -> Vec<SourceSpec> {
        sources::configured(&self.disabled_sources, &self.source_urls)
    }
}

/// Per-source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct SourceConfig {
    /// Set to false to skip this source.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Replacement listing URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub browser_path: Option<String>,
    #[serde(default)]
    pub click_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Source configurations keyed by agency code ("ME", "TX", ...).
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers breachfeed config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("breachfeed").await {
            Ok(pref_config) => {
                let user_agent: Option<String> = pref_config.get("user_agent").ok();
                let request_timeout: Option<u64> = pref_config.get("request_timeout").ok();
                let request_delay_ms: Option<u64> =
                    pref_config.get("request_delay_ms").ok();
                let browser_path: Option<String> = pref_config.get("browser_path").ok();
                let click_timeout_secs: Option<u64> =
                    pref_config.get("click_timeout_secs").ok();
                let cache_ttl_secs: Option<u64> = pref_config.get("cache_ttl_secs").ok();
                let window_days: Option<u32> = pref_config.get("window_days").ok();
                let host: Option<String> = pref_config.get("host").ok();
                let port: Option<u16> = pref_config.get("port").ok();
                let sources: HashMap<String, SourceConfig> =
                    pref_config.get("sources").unwrap_or_default();

                Config {
                    user_agent,
                    request_timeout,
                    request_delay_ms,
                    browser_path,
                    click_timeout_secs,
                    cache_ttl_secs,
                    window_days,
                    host,
                    port,
                    sources,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(ref path) = self.browser_path {
            settings.browser_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = self.click_timeout_secs {
            settings.click_timeout_secs = secs;
        }
        if let Some(secs) = self.cache_ttl_secs {
            settings.cache_ttl_secs = secs;
        }
        if let Some(days) = self.window_days {
            settings.window_days = days;
        }
        if let Some(ref host) = self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }

        for (code, source) in &self.sources {
            let agency: Agency = match code.parse() {
                Ok(agency) => agency,
                Err(e) => {
                    warn!("Ignoring source config: {}", e);
                    continue;
                }
            };
            match source.enabled {
                Some(false) => {
                    settings.disabled_sources.insert(agency);
                }
                Some(true) => {
                    settings.disabled_sources.remove(&agency);
                }
                None => {}
            }
            if let Some(ref url) = source.url {
                settings.source_urls.insert(agency, url.clone());
            }
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(settings.window_days, 14);
        assert_eq!(settings.sources().len(), 6);
    }

    #[test]
    fn test_apply_overrides() {
        let config = Config {
            request_timeout: Some(5),
            cache_ttl_secs: Some(60),
            browser_path: Some("/opt/chrome/chrome".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
        assert_eq!(
            settings.browser_options().binary_path,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
        // untouched values keep their defaults
        assert_eq!(settings.port, 8501);
    }

    #[test]
    fn test_apply_source_overrides() {
        let mut sources = HashMap::new();
        sources.insert(
            "tx".to_string(),
            SourceConfig {
                enabled: Some(false),
                url: None,
            },
        );
        sources.insert(
            "CA".to_string(),
            SourceConfig {
                enabled: None,
                url: Some("http://localhost:9000/ca".to_string()),
            },
        );
        sources.insert("NY".to_string(), SourceConfig::default());

        let config = Config {
            sources,
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert!(settings.disabled_sources.contains(&Agency::Texas));
        let enabled = settings.sources();
        assert_eq!(enabled.len(), 5);
        let ca = enabled
            .iter()
            .find(|s| s.agency == Agency::California)
            .unwrap();
        assert_eq!(ca.url, "http://localhost:9000/ca");
    }

    #[test]
    fn test_browser_options_use_custom_user_agent() {
        let settings = Settings {
            user_agent: Some("TestBot/1.0".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.browser_options().user_agent, "TestBot/1.0");

        let settings = Settings {
            user_agent: Some("impersonate".to_string()),
            ..Default::default()
        };
        assert_ne!(settings.browser_options().user_agent, "impersonate");
    }
}
