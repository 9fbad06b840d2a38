use tracing::info;
use uuid::Uuid;

use crate::auth_stores::SecurityStore;
use crate::error::AppResult;

fn revoked_key(token_id: &Uuid) -> String {
    format!("revoked:{}", token_id)
}

/// Global set of revoked token ids. Entries are append-only and carry a TTL
/// equal to the refresh-token lifetime: once every token bearing the id has
/// expired on its own, the flag no longer needs to exist.
#[derive(Clone)]
pub struct RevocationRegistry {
    store: SecurityStore,
    retention_secs: i64,
}

impl RevocationRegistry {
    pub fn new(store: SecurityStore, retention_secs: i64) -> Self {
        Self {
            store,
            retention_secs,
        }
    }

    pub async fn insert(&self, token_id: &Uuid) -> AppResult<()> {
        self.store
            .put_string(&revoked_key(token_id), "1", Some(self.retention_secs))
            .await?;
        info!(token_id = %token_id, "token_revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: &Uuid) -> AppResult<bool> {
        self.store.exists(&revoked_key(token_id)).await
    }
}
