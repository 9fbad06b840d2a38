use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth_stores::SecurityStore;
use crate::error::AppResult;

/// Index of user ids that currently hold at least one live session. Lets
/// logout-all-users enumerate sessions without scanning the keyspace.
const ACTIVE_USERS_KEY: &str = "active_session_users";

fn sessions_key(user_id: &Uuid) -> String {
    format!("sessions:{}", user_id)
}

/// One live refresh session as reported to the sessions endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub token_id: Uuid,
    pub issued_at: i64,
}

/// Per-user registry of live sessions, keyed by token id and ordered by
/// issuance time. Registering a session past the concurrency ceiling evicts
/// the oldest sessions; the session being registered is never the one
/// evicted.
#[derive(Clone)]
pub struct SessionRegistry {
    store: SecurityStore,
    max_concurrent: usize,
    session_ttl_secs: i64,
}

impl SessionRegistry {
    pub fn new(store: SecurityStore, max_concurrent: usize, session_ttl_secs: i64) -> Self {
        Self {
            store,
            max_concurrent,
            session_ttl_secs,
        }
    }

    /// Records a freshly issued session and returns the token ids evicted to
    /// stay within the ceiling, oldest first. Callers revoke the evicted ids.
    pub async fn register(
        &self,
        user_id: &Uuid,
        token_id: &Uuid,
        issued_at: i64,
    ) -> AppResult<Vec<Uuid>> {
        let key = sessions_key(user_id);
        let new_member = token_id.to_string();

        self.store
            .sorted_set_add(&key, &new_member, issued_at)
            .await?;
        // The registry only needs to outlive the longest-lived refresh token.
        self.store.expire(&key, self.session_ttl_secs).await?;
        self.store
            .set_add(ACTIVE_USERS_KEY, &user_id.to_string())
            .await?;

        let members = self.store.sorted_set_range(&key).await?;
        let mut live = members.len();
        let mut evicted = Vec::new();

        for (member, _) in members {
            if live <= self.max_concurrent {
                break;
            }
            if member == new_member {
                continue;
            }
            if self.store.sorted_set_remove(&key, &member).await? {
                live -= 1;
                match Uuid::parse_str(&member) {
                    Ok(evicted_id) => evicted.push(evicted_id),
                    Err(_) => warn!(
                        user_id = %user_id,
                        member = %member,
                        "session_registry_dropped_malformed_member"
                    ),
                }
            }
        }

        if evicted.is_empty() {
            info!(
                user_id = %user_id,
                token_id = %token_id,
                active_sessions = live,
                "session_registered"
            );
        } else {
            info!(
                user_id = %user_id,
                token_id = %token_id,
                evicted_count = evicted.len(),
                active_sessions = live,
                "session_registered_with_eviction"
            );
        }

        Ok(evicted)
    }

    /// Whether the token id is still a live session for the user.
    pub async fn is_active(&self, user_id: &Uuid, token_id: &Uuid) -> AppResult<bool> {
        let score = self
            .store
            .sorted_set_score(&sessions_key(user_id), &token_id.to_string())
            .await?;
        Ok(score.is_some())
    }

    /// Drops one session. Returns whether it was present.
    pub async fn remove(&self, user_id: &Uuid, token_id: &Uuid) -> AppResult<bool> {
        let key = sessions_key(user_id);
        let removed = self
            .store
            .sorted_set_remove(&key, &token_id.to_string())
            .await?;

        if removed {
            info!(user_id = %user_id, token_id = %token_id, "session_removed");
        }

        if self.store.sorted_set_len(&key).await? == 0 {
            self.store
                .set_remove(ACTIVE_USERS_KEY, &user_id.to_string())
                .await?;
        }

        Ok(removed)
    }

    /// Live sessions for the user, oldest first.
    pub async fn list(&self, user_id: &Uuid) -> AppResult<Vec<ActiveSession>> {
        let members = self.store.sorted_set_range(&sessions_key(user_id)).await?;
        let sessions = members
            .into_iter()
            .filter_map(|(member, score)| {
                Uuid::parse_str(&member).ok().map(|token_id| ActiveSession {
                    token_id,
                    issued_at: score,
                })
            })
            .collect();
        Ok(sessions)
    }

    /// Drops every session for the user and returns the token ids that were
    /// live, oldest first.
    pub async fn clear(&self, user_id: &Uuid) -> AppResult<Vec<Uuid>> {
        let key = sessions_key(user_id);
        let members = self.store.sorted_set_range(&key).await?;
        self.store.delete(&key).await?;
        self.store
            .set_remove(ACTIVE_USERS_KEY, &user_id.to_string())
            .await?;

        let token_ids: Vec<Uuid> = members
            .into_iter()
            .filter_map(|(member, _)| Uuid::parse_str(&member).ok())
            .collect();

        if !token_ids.is_empty() {
            info!(
                user_id = %user_id,
                cleared_count = token_ids.len(),
                "sessions_cleared"
            );
        }

        Ok(token_ids)
    }

    /// Users that currently hold at least one session.
    pub async fn active_users(&self) -> AppResult<Vec<Uuid>> {
        let members = self.store.set_members(ACTIVE_USERS_KEY).await?;
        Ok(members
            .into_iter()
            .filter_map(|member| Uuid::parse_str(&member).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SecurityStore::new_memory(), 3, 86400)
    }

    #[tokio::test]
    async fn sessions_up_to_the_ceiling_coexist() {
        let registry = registry();
        let user = Uuid::new_v4();
        let tokens: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for (i, token) in tokens.iter().enumerate() {
            let evicted = registry.register(&user, token, 100 + i as i64).await.unwrap();
            assert!(evicted.is_empty());
        }

        for token in &tokens {
            assert!(registry.is_active(&user, token).await.unwrap());
        }
        assert_eq!(registry.list(&user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fourth_session_evicts_the_oldest() {
        let registry = registry();
        let user = Uuid::new_v4();
        let tokens: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        for (i, token) in tokens.iter().take(3).enumerate() {
            registry.register(&user, token, 100 + i as i64).await.unwrap();
        }

        let evicted = registry.register(&user, &tokens[3], 200).await.unwrap();
        assert_eq!(evicted, vec![tokens[0]]);

        assert!(!registry.is_active(&user, &tokens[0]).await.unwrap());
        assert!(registry.is_active(&user, &tokens[1]).await.unwrap());
        assert!(registry.is_active(&user, &tokens[3]).await.unwrap());
    }

    #[tokio::test]
    async fn newly_registered_session_survives_even_with_oldest_timestamp() {
        let registry = registry();
        let user = Uuid::new_v4();
        let tokens: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        for (i, token) in tokens.iter().take(3).enumerate() {
            registry.register(&user, token, 100 + i as i64).await.unwrap();
        }

        // A skewed clock can hand the new session the smallest score; the
        // eviction must still fall on an older registration.
        let evicted = registry.register(&user, &tokens[3], 1).await.unwrap();
        assert_eq!(evicted, vec![tokens[0]]);
        assert!(registry.is_active(&user, &tokens[3]).await.unwrap());
    }

    #[tokio::test]
    async fn removing_the_last_session_drops_the_user_from_the_index() {
        let registry = registry();
        let user = Uuid::new_v4();
        let token = Uuid::new_v4();

        registry.register(&user, &token, 100).await.unwrap();
        assert_eq!(registry.active_users().await.unwrap(), vec![user]);

        assert!(registry.remove(&user, &token).await.unwrap());
        assert!(!registry.remove(&user, &token).await.unwrap());
        assert!(registry.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_returns_all_live_token_ids_oldest_first() {
        let registry = registry();
        let user = Uuid::new_v4();
        let tokens: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for (i, token) in tokens.iter().enumerate() {
            registry.register(&user, token, 100 + i as i64).await.unwrap();
        }

        let cleared = registry.clear(&user).await.unwrap();
        assert_eq!(cleared, tokens);
        assert!(registry.list(&user).await.unwrap().is_empty());
        assert!(registry.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_reports_issuance_order() {
        let registry = registry();
        let user = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        registry.register(&user, &second, 200).await.unwrap();
        registry.register(&user, &first, 100).await.unwrap();

        let sessions = registry.list(&user).await.unwrap();
        assert_eq!(sessions[0].token_id, first);
        assert_eq!(sessions[0].issued_at, 100);
        assert_eq!(sessions[1].token_id, second);
    }
}
