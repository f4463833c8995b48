//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{DispatcherConfig, RateHawkConfig, ReconcilerConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `PAYMENT_WEBHOOK_SECRET`: webhook signing secret; webhooks are rejected when unset
/// - `SUPPLIER_KEY_ID`, `SUPPLIER_API_KEY`: supplier credentials
/// - `SUPPLIER_USE_SANDBOX`: use the supplier sandbox (default: `false`)
/// - `SUPPLIER_BASE_URL`: overrides the supplier base URL
/// - `FINALIZATION_WORKERS` (default: `4`), `FINALIZATION_QUEUE_CAPACITY` (default: `256`)
/// - `RECONCILE_INTERVAL_SECS` (default: `60`), `RECONCILE_PAID_GRACE_SECS` (default: `120`),
///   `RECONCILE_STARTED_GRACE_SECS` (default: `300`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub supplier_key_id: Option<String>,
    pub supplier_api_key: Option<String>,
    pub supplier_use_sandbox: bool,
    pub supplier_base_url: Option<String>,
    pub finalization_workers: usize,
    pub finalization_queue_capacity: usize,
    pub reconcile_interval_secs: u64,
    pub reconcile_paid_grace_secs: u64,
    pub reconcile_started_grace_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| {
            text(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: text("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: text("DATABASE_URL"),
            webhook_secret: text("PAYMENT_WEBHOOK_SECRET"),
            supplier_key_id: text("SUPPLIER_KEY_ID"),
            supplier_api_key: text("SUPPLIER_API_KEY"),
            supplier_use_sandbox: text("SUPPLIER_USE_SANDBOX")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            supplier_base_url: text("SUPPLIER_BASE_URL"),
            finalization_workers: number(
                "FINALIZATION_WORKERS",
                defaults.finalization_workers as u64,
            ) as usize,
            finalization_queue_capacity: number(
                "FINALIZATION_QUEUE_CAPACITY",
                defaults.finalization_queue_capacity as u64,
            ) as usize,
            reconcile_interval_secs: number(
                "RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            ),
            reconcile_paid_grace_secs: number(
                "RECONCILE_PAID_GRACE_SECS",
                defaults.reconcile_paid_grace_secs,
            ),
            reconcile_started_grace_secs: number(
                "RECONCILE_STARTED_GRACE_SECS",
                defaults.reconcile_started_grace_secs,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Supplier client settings.
    pub fn supplier(&self) -> RateHawkConfig {
        let config = RateHawkConfig::new(self.supplier_key_id.clone(), self.supplier_api_key.clone())
            .with_sandbox(self.supplier_use_sandbox);
        match &self.supplier_base_url {
            Some(url) => config.with_base_url(url.as_str()),
            None => config,
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.finalization_workers,
            queue_capacity: self.finalization_queue_capacity,
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(self.reconcile_interval_secs.max(1)),
            paid_grace: Duration::from_secs(self.reconcile_paid_grace_secs),
            started_grace: Duration::from_secs(self.reconcile_started_grace_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            webhook_secret: None,
            supplier_key_id: None,
            supplier_api_key: None,
            supplier_use_sandbox: false,
            supplier_base_url: None,
            finalization_workers: 4,
            finalization_queue_capacity: 256,
            reconcile_interval_secs: 60,
            reconcile_paid_grace_secs: 120,
            reconcile_started_grace_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.finalization_workers, 4);
        assert_eq!(config.finalization_queue_capacity, 256);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(config.database_url.is_none());
        assert_eq!(config.reconciler().paid_grace, Duration::from_secs(120));
    }

    #[test]
    fn test_values_are_read() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_1"),
            ("SUPPLIER_KEY_ID", "42"),
            ("SUPPLIER_API_KEY", "key"),
            ("FINALIZATION_WORKERS", "8"),
            ("RECONCILE_STARTED_GRACE_SECS", "900"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.webhook_secret.as_deref(), Some("whsec_1"));
        assert_eq!(config.dispatcher().workers, 8);
        assert_eq!(config.reconciler().started_grace, Duration::from_secs(900));

        let supplier = config.supplier();
        assert_eq!(supplier.key_id.as_deref(), Some("42"));
        assert_eq!(supplier.base_url, saga::services::PRODUCTION_BASE_URL);
    }

    #[test]
    fn test_blank_and_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("PAYMENT_WEBHOOK_SECRET", "  "),
            ("FINALIZATION_QUEUE_CAPACITY", "-3"),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.finalization_queue_capacity, 256);
    }

    #[test]
    fn test_supplier_base_url_selection() {
        let sandbox = from_pairs(&[("SUPPLIER_USE_SANDBOX", "true")]);
        assert_eq!(sandbox.supplier().base_url, saga::services::SANDBOX_BASE_URL);

        let overridden = from_pairs(&[
            ("SUPPLIER_USE_SANDBOX", "true"),
            ("SUPPLIER_BASE_URL", "http://localhost:9000/"),
        ]);
        assert_eq!(overridden.supplier().base_url, "http://localhost:9000");
    }
}
