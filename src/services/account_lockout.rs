use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth_stores::SecurityStore;
use crate::config::settings::LockoutConfig;
use crate::error::{AppError, AppResult};

fn lockout_key(user_id: &Uuid) -> String {
    format!("lockout:{}", user_id)
}

/// Failure state tracked per user. `escalated`, once set, is never unset by
/// further failures; only clearing the record resets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub attempts: i64,
    pub locked_until: Option<i64>,
    pub escalated: bool,
}

impl LockoutRecord {
    fn fresh() -> Self {
        Self {
            attempts: 0,
            locked_until: None,
            escalated: false,
        }
    }
}

/// Per-user failed-credential tracker with escalating locks: the first-tier
/// threshold arms a short lock, the escalation threshold a day-long one.
/// Records live in the shared store under a TTL covering the longest lock.
#[derive(Clone)]
pub struct AccountLockoutTracker {
    store: SecurityStore,
    config: LockoutConfig,
}

impl AccountLockoutTracker {
    pub fn new(store: SecurityStore, config: LockoutConfig) -> Self {
        Self { store, config }
    }

    async fn load(&self, user_id: &Uuid) -> AppResult<Option<LockoutRecord>> {
        match self.store.get_string(&lockout_key(user_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user_id: &Uuid, record: &LockoutRecord) -> AppResult<()> {
        let raw = serde_json::to_string(record)?;
        self.store
            .put_string(
                &lockout_key(user_id),
                &raw,
                Some(self.config.escalation_lock_secs),
            )
            .await
    }

    /// Admits or denies the user. An elapsed lock wipes the record on the
    /// spot, so the next failure starts a fresh count.
    pub async fn check(&self, user_id: &Uuid) -> AppResult<()> {
        let Some(record) = self.load(user_id).await? else {
            return Ok(());
        };

        match record.locked_until {
            Some(until) => {
                let now = Utc::now().timestamp();
                if now < until {
                    let minutes = (((until - now) + 59) / 60).max(1);
                    Err(AppError::Locked(format!(
                        "Account is locked. Try again in {} minute(s)",
                        minutes
                    )))
                } else {
                    self.store.delete(&lockout_key(user_id)).await?;
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    /// Counts one failed credential check and arms locks at the thresholds.
    /// Returns the updated record so the calling flow can apply its own
    /// threshold side effects.
    ///
    /// Read-modify-write without a lock: two concurrent failures for the same
    /// user can under-count by one. Accepted on this path.
    pub async fn record_failure(&self, user_id: &Uuid) -> AppResult<LockoutRecord> {
        let mut record = self
            .load(user_id)
            .await?
            .unwrap_or_else(LockoutRecord::fresh);

        record.attempts += 1;
        let now = Utc::now().timestamp();

        if record.attempts >= self.config.escalation_attempts {
            record.escalated = true;
            record.locked_until = Some(now + self.config.escalation_lock_secs);
        } else if record.attempts >= self.config.max_failed_attempts {
            record.locked_until = Some(now + self.config.lock_secs);
        }

        self.save(user_id, &record).await?;

        if let Some(until) = record.locked_until {
            warn!(
                "User {} locked until {} after {} failed attempts (escalated: {})",
                user_id, until, record.attempts, record.escalated
            );
        }

        Ok(record)
    }

    /// Forgives everything. Called on successful authentication and on
    /// password change.
    pub async fn clear(&self, user_id: &Uuid) -> AppResult<()> {
        self.store.delete(&lockout_key(user_id)).await?;
        Ok(())
    }
}
