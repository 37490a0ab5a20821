use crate::cost::DEFAULT_COMMISSION;
use crate::instrument::{default_universe, Instrument};
use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capital: CapitalConfig,
    pub advisory: AdvisoryConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub market: MarketConfig,
    pub instruments: Vec<Instrument>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capital: CapitalConfig::default(),
            advisory: AdvisoryConfig::default(),
            engine: EngineConfig::default(),
            storage: StorageConfig::default(),
            notifications: NotificationConfig::default(),
            market: MarketConfig::default(),
            instruments: default_universe(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Demo,
    Real,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    pub account: AccountType,
    pub demo_api_url: String,
    pub real_api_url: String,
    pub ws_url: String,
    pub identifier: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
    pub reconnect_delay_secs: u64,
    pub heartbeat_idle_secs: u64,
    /// Streamed quotes older than this are replaced by a REST snapshot.
    pub quote_max_age_secs: u64,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            account: AccountType::Demo,
            demo_api_url: "https://demo-api-capital.backend-capital.com".to_string(),
            real_api_url: "https://api-capital.backend-capital.com".to_string(),
            ws_url: "wss://api-streaming-capital.backend-capital.com/connect".to_string(),
            identifier: None,
            password: None,
            api_key: None,
            request_timeout_secs: 15,
            requests_per_second: 10,
            reconnect_delay_secs: 5,
            heartbeat_idle_secs: 600,
            quote_max_age_secs: 120,
        }
    }
}

impl CapitalConfig {
    /// REST base URL for the configured account type.
    #[must_use]
    pub fn api_url(&self) -> &str {
        match self.account {
            AccountType::Demo => &self.demo_api_url,
            AccountType::Real => &self.real_api_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Loop timings and cost constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub commission: f64,
    pub entry_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub refresh_interval_secs: u64,
    pub trailing_interval_secs: u64,
    pub trailing_initial_delay_secs: u64,
    pub stop_loss_interval_secs: u64,
    pub report_interval_secs: u64,
    pub advisory_min_interval_secs: u64,
    pub quote_retry_attempts: u32,
    pub quote_retry_base_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission: DEFAULT_COMMISSION,
            entry_interval_secs: 10,
            error_backoff_secs: 60,
            refresh_interval_secs: 60,
            trailing_interval_secs: 30,
            trailing_initial_delay_secs: 10,
            stop_loss_interval_secs: 30,
            report_interval_secs: 3600,
            advisory_min_interval_secs: 120,
            quote_retry_attempts: 3,
            quote_retry_base_ms: 1000,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn entry_interval(&self) -> Duration {
        Duration::from_secs(self.entry_interval_secs)
    }

    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    #[must_use]
    pub const fn advisory_min_interval(&self) -> Duration {
        Duration::from_secs(self.advisory_min_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub settings_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("data/settings.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// IANA zone in which market sessions are defined.
    pub timezone: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Tashkent".to_string(),
        }
    }
}

impl MarketConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid market timezone {}: {e}", self.timezone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_follows_account_type() {
        let mut config = CapitalConfig::default();
        assert!(config.api_url().contains("demo-api"));
        config.account = AccountType::Real;
        assert!(!config.api_url().contains("demo"));
    }

    #[test]
    fn test_default_timezone_parses() {
        assert_eq!(MarketConfig::default().tz().unwrap(), chrono_tz::Asia::Tashkent);
        let bad = MarketConfig {
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(bad.tz().is_err());
    }
}
