use crate::adapter::driven::EventBusConfig;
use crate::domain::model::DiscountRate;
use crate::domain::pricing::PricingPolicy;
use rust_decimal::Decimal;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// 設定エラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// 環境変数の値（未設定なら既定値）
pub(crate) fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// 環境変数を解析する（未設定なら既定値）
pub(crate) fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// 永続化の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MySql,
    /// プロセス内のみ（開発・デモ用）
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::MySql),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}' (expected mysql or memory)", other)),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_address: String,
    pub log_level: String,
    pub storage: StorageBackend,
    pub pricing: PricingPolicy,
    pub event_bus: EventBusConfig,
}

impl AppConfig {
    /// 環境変数から設定を読み取る
    pub fn from_env() -> Result<Self, ConfigError> {
        let quantity_threshold =
            parse_env("PRICING_QUANTITY_THRESHOLD", PricingPolicy::DEFAULT_QUANTITY_THRESHOLD)?;
        let quantity_percent = parse_env(
            "PRICING_QUANTITY_PERCENT",
            Decimal::from(PricingPolicy::DEFAULT_QUANTITY_PERCENT),
        )?;
        let loyalty_threshold =
            parse_env("PRICING_LOYALTY_THRESHOLD", PricingPolicy::DEFAULT_LOYALTY_THRESHOLD)?;
        let loyalty_percent = parse_env(
            "PRICING_LOYALTY_PERCENT",
            Decimal::from(PricingPolicy::DEFAULT_LOYALTY_PERCENT),
        )?;

        let pricing = PricingPolicy::new(
            quantity_threshold,
            percent_rate("PRICING_QUANTITY_PERCENT", quantity_percent)?,
            loyalty_threshold,
            percent_rate("PRICING_LOYALTY_PERCENT", loyalty_percent)?,
        );

        let event_bus = EventBusConfig {
            max_retry_attempts: parse_env(
                "EVENT_BUS_MAX_RETRIES",
                EventBusConfig::default().max_retry_attempts,
            )?,
            ..EventBusConfig::default()
        };

        Ok(Self {
            server_address: env_or("SERVER_ADDRESS", "0.0.0.0:3000"),
            log_level: env_or("LOG_LEVEL", "info"),
            storage: parse_env("STORAGE_BACKEND", StorageBackend::MySql)?,
            pricing,
            event_bus,
        })
    }
}

fn percent_rate(name: &str, percent: Decimal) -> Result<DiscountRate, ConfigError> {
    DiscountRate::from_percent(percent)
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 8] = [
        "SERVER_ADDRESS",
        "LOG_LEVEL",
        "STORAGE_BACKEND",
        "PRICING_QUANTITY_THRESHOLD",
        "PRICING_QUANTITY_PERCENT",
        "PRICING_LOYALTY_THRESHOLD",
        "PRICING_LOYALTY_PERCENT",
        "EVENT_BUS_MAX_RETRIES",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear();

        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.server_address, "0.0.0.0:3000");
        assert_eq!(config.storage, StorageBackend::MySql);
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.event_bus.max_retry_attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear();
        env::set_var("STORAGE_BACKEND", "Memory");
        env::set_var("PRICING_QUANTITY_THRESHOLD", "3");
        env::set_var("PRICING_LOYALTY_PERCENT", "12.5");
        env::set_var("EVENT_BUS_MAX_RETRIES", "5");

        let config = AppConfig::from_env().unwrap();
        clear();

        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.pricing.quantity_threshold(), 3);
        assert_eq!(
            config.pricing.loyalty_rate_for(10).value(),
            "0.125".parse::<Decimal>().unwrap()
        );
        assert_eq!(config.event_bus.max_retry_attempts, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear();
        env::set_var("STORAGE_BACKEND", "postgres");
        assert!(AppConfig::from_env().is_err());

        clear();
        env::set_var("PRICING_QUANTITY_PERCENT", "150");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
