use log::warn;

use crate::auth_stores::SecurityStore;
use crate::error::{AppError, AppResult};

const MAINTENANCE_FLAG_KEY: &str = "system:maintenance";

/// Gate that rejects sign-ins while the system is under maintenance. The flag
/// can be flipped at runtime through the store, with the static config value
/// as the baseline when no flag is present.
#[derive(Clone)]
pub struct MaintenanceGate {
    store: SecurityStore,
    enabled_by_config: bool,
}

impl MaintenanceGate {
    pub fn new(store: SecurityStore, enabled_by_config: bool) -> Self {
        Self {
            store,
            enabled_by_config,
        }
    }

    /// Errors with `Maintenance` when the system is closed. A store outage
    /// falls back to the config value; maintenance is an availability switch,
    /// not a security control, so it fails open.
    pub async fn check(&self) -> AppResult<()> {
        let flagged = match self.store.exists(MAINTENANCE_FLAG_KEY).await {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!("Maintenance flag unreadable, using config value: {}", e);
                self.enabled_by_config
            }
        };

        if flagged || self.enabled_by_config {
            return Err(AppError::Maintenance(
                "System is under maintenance. Try again later".to_string(),
            ));
        }
        Ok(())
    }

    /// Flips the runtime flag. Used by operational tooling, not the API.
    pub async fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        if enabled {
            self.store.put_string(MAINTENANCE_FLAG_KEY, "1", None).await
        } else {
            self.store.delete(MAINTENANCE_FLAG_KEY).await.map(|_| ())
        }
    }
}
