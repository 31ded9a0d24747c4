//! Process-level configuration (§6 "Configuration"). A typed struct with
//! a `Default` impl and env-var overrides, the way `escrow-reconciler`'s
//! and `escrow-dispatcher`'s own configs are built, rather than ad hoc
//! `env::var` calls scattered through `main`.

use escrow_dispatcher::DispatcherConfig;
use escrow_reconciler::ReconcilerConfig;
use escrow_registry::RegistryDispatcherConfig;

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub listen_addr: String,
    /// `None` runs against `InMemoryStore`; `Some(url)` connects
    /// `PgStore` and runs its migrations at startup.
    pub database_url: Option<String>,
    pub reconciler: ReconcilerConfig,
    pub dispatcher: DispatcherConfig,
    pub registry_dispatcher: RegistryDispatcherConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            reconciler: ReconcilerConfig::default(),
            dispatcher: DispatcherConfig::default(),
            registry_dispatcher: RegistryDispatcherConfig::default(),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok())
}

impl ControllerConfig {
    /// Overlays env vars onto the default. Unset or malformed vars keep
    /// the default rather than failing startup — this is an operator
    /// convenience layer, not a validation boundary.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(addr) = std::env::var("PAYMENT_API_LISTEN_ADDR") {
            if !addr.is_empty() {
                cfg.listen_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                cfg.database_url = Some(url);
            }
        }
        if let Some(ms) = env_u64("RECONCILER_INTERVAL_MS") {
            cfg.reconciler = cfg.reconciler.with_interval_ms(ms);
        }
        if let Some(ms) = env_u64("DISPATCHER_INTERVAL_MS") {
            cfg.dispatcher.interval_ms = ms;
        }
        if let Some(ms) = env_u64("REGISTRY_DISPATCHER_INTERVAL_MS") {
            cfg.registry_dispatcher.interval_ms = ms;
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_8080_against_no_database() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn reconciler_interval_override_is_clamped_to_spec_bounds() {
        let cfg = ControllerConfig::default().reconciler.with_interval_ms(1);
        assert_eq!(cfg.interval_ms, 5_000);
    }
}
