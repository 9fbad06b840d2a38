use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, error, info, warn};
use redis::AsyncCommands;

use crate::error::{AppError, AppResult};

/// One stored value in the in-process backend. Kinds mirror the store
/// primitives the security services use: plain strings (records, flags,
/// counters as decimal strings, matching Redis), sorted sets (session
/// registries), and plain sets (index of users with sessions).
#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    SortedSet(Vec<(String, i64)>),
    Set(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MemoryEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn text(value: &str, ttl_secs: Option<i64>) -> Self {
        Self {
            value: StoredValue::Text(value.to_string()),
            expires_at: ttl_to_instant(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

fn ttl_to_instant(ttl_secs: Option<i64>) -> Option<Instant> {
    ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs.max(0) as u64))
}

/// Shared security-state store holding rate-limit counters, lockout records,
/// session registries, and revocation flags.
///
/// Two backends: Redis (distributed, production) and in-memory DashMap
/// (single instance, development and tests). All operations are explicit
/// `Result`s; callers on security paths treat an `Err` as a denial, never as
/// an admit.
#[derive(Clone)]
pub enum SecurityStore {
    /// In-memory storage using DashMap (single instance)
    Memory {
        entries: Arc<DashMap<String, MemoryEntry>>,
    },
    /// Redis-based storage (distributed)
    Redis {
        connection_manager: Arc<redis::aio::ConnectionManager>,
    },
}

impl SecurityStore {
    /// Create a new in-memory storage
    pub fn new_memory() -> Self {
        Self::Memory {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Create a new Redis-based storage
    pub async fn new_redis(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        info!("Redis connection established for security store");

        Ok(Self::Redis {
            connection_manager: Arc::new(connection_manager),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Redis { .. } => "redis",
        }
    }

    fn redis_conn(
        connection_manager: &Arc<redis::aio::ConnectionManager>,
    ) -> redis::aio::ConnectionManager {
        connection_manager.as_ref().clone()
    }

    pub async fn get_string(&self, key: &str) -> AppResult<Option<String>> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(None);
                    }
                    return match &entry.value {
                        StoredValue::Text(text) => Ok(Some(text.clone())),
                        _ => Err(wrong_kind(key, "string")),
                    };
                }
                Ok(None)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let value: Option<String> = conn.get(key).await?;
                Ok(value)
            }
        }
    }

    pub async fn put_string(&self, key: &str, value: &str, ttl_secs: Option<i64>) -> AppResult<()> {
        match self {
            Self::Memory { entries } => {
                entries.insert(key.to_string(), MemoryEntry::text(value, ttl_secs));
                Ok(())
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                match ttl_secs {
                    Some(secs) => {
                        let _: () = conn.set_ex(key, value, secs.max(0) as u64).await?;
                    }
                    None => {
                        let _: () = conn.set(key, value).await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Deletes the key. Returns whether anything was there to delete.
    pub async fn delete(&self, key: &str) -> AppResult<bool> {
        match self {
            Self::Memory { entries } => {
                let removed = entries
                    .remove(key)
                    .map(|(_, entry)| !entry.is_expired())
                    .unwrap_or(false);
                Ok(removed)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let removed: i64 = conn.del(key).await?;
                Ok(removed > 0)
            }
        }
    }

    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(false);
                    }
                    return Ok(true);
                }
                Ok(false)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let found: bool = conn.exists(key).await?;
                Ok(found)
            }
        }
    }

    /// Atomic counter increment. The value is stored as a decimal string so
    /// both backends agree on representation; a missing or expired key starts
    /// from zero. TTL of an existing entry is left untouched, matching INCR.
    pub async fn increment(&self, key: &str) -> AppResult<i64> {
        match self {
            Self::Memory { entries } => {
                let mut entry = entries
                    .entry(key.to_string())
                    .or_insert_with(|| MemoryEntry::text("0", None));
                if entry.is_expired() {
                    *entry = MemoryEntry::text("0", None);
                }
                match &mut entry.value {
                    StoredValue::Text(text) => {
                        let count = text.parse::<i64>().unwrap_or(0) + 1;
                        *text = count.to_string();
                        Ok(count)
                    }
                    _ => Err(wrong_kind(key, "counter")),
                }
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let count: i64 = conn.incr(key, 1).await?;
                Ok(count)
            }
        }
    }

    /// Applies a TTL to an existing key. Returns false when the key is gone.
    pub async fn expire(&self, key: &str, ttl_secs: i64) -> AppResult<bool> {
        match self {
            Self::Memory { entries } => {
                if let Some(mut entry) = entries.get_mut(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(false);
                    }
                    entry.expires_at = ttl_to_instant(Some(ttl_secs));
                    return Ok(true);
                }
                Ok(false)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let applied: bool = conn.expire(key, ttl_secs).await?;
                Ok(applied)
            }
        }
    }

    /// Remaining TTL in seconds; None when the key is missing or has no TTL.
    pub async fn ttl_secs(&self, key: &str) -> AppResult<Option<i64>> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(None);
                    }
                    let remaining = entry.expires_at.map(|at| {
                        let left = at.saturating_duration_since(Instant::now());
                        left.as_secs() as i64 + if left.subsec_nanos() > 0 { 1 } else { 0 }
                    });
                    return Ok(remaining);
                }
                Ok(None)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let ttl: i64 = conn.ttl(key).await?;
                if ttl >= 0 { Ok(Some(ttl)) } else { Ok(None) }
            }
        }
    }

    /// Adds a member to a score-ordered set, replacing its score if present.
    pub async fn sorted_set_add(&self, key: &str, member: &str, score: i64) -> AppResult<()> {
        match self {
            Self::Memory { entries } => {
                let mut entry = entries.entry(key.to_string()).or_insert_with(|| MemoryEntry {
                    value: StoredValue::SortedSet(Vec::new()),
                    expires_at: None,
                });
                if entry.is_expired() {
                    *entry = MemoryEntry {
                        value: StoredValue::SortedSet(Vec::new()),
                        expires_at: None,
                    };
                }
                match &mut entry.value {
                    StoredValue::SortedSet(members) => {
                        members.retain(|(m, _)| m != member);
                        members.push((member.to_string(), score));
                        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                        Ok(())
                    }
                    _ => Err(wrong_kind(key, "sorted set")),
                }
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let _: () = conn.zadd(key, member, score).await?;
                Ok(())
            }
        }
    }

    /// Full member list ascending by score (oldest first for issuance scores).
    pub async fn sorted_set_range(&self, key: &str) -> AppResult<Vec<(String, i64)>> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(Vec::new());
                    }
                    return match &entry.value {
                        StoredValue::SortedSet(members) => Ok(members.clone()),
                        _ => Err(wrong_kind(key, "sorted set")),
                    };
                }
                Ok(Vec::new())
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let members: Vec<(String, i64)> = conn.zrange_withscores(key, 0, -1).await?;
                Ok(members)
            }
        }
    }

    /// Removes a member; the key itself disappears once the set is empty,
    /// matching Redis semantics.
    pub async fn sorted_set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        match self {
            Self::Memory { entries } => {
                let mut removed = false;
                let mut now_empty = false;
                if let Some(mut entry) = entries.get_mut(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(false);
                    }
                    match &mut entry.value {
                        StoredValue::SortedSet(members) => {
                            let before = members.len();
                            members.retain(|(m, _)| m != member);
                            removed = members.len() < before;
                            now_empty = members.is_empty();
                        }
                        _ => return Err(wrong_kind(key, "sorted set")),
                    }
                }
                if now_empty {
                    entries.remove(key);
                }
                Ok(removed)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let removed: i64 = conn.zrem(key, member).await?;
                Ok(removed > 0)
            }
        }
    }

    pub async fn sorted_set_score(&self, key: &str, member: &str) -> AppResult<Option<i64>> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(None);
                    }
                    return match &entry.value {
                        StoredValue::SortedSet(members) => Ok(members
                            .iter()
                            .find(|(m, _)| m == member)
                            .map(|(_, score)| *score)),
                        _ => Err(wrong_kind(key, "sorted set")),
                    };
                }
                Ok(None)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let score: Option<i64> = conn.zscore(key, member).await?;
                Ok(score)
            }
        }
    }

    pub async fn sorted_set_len(&self, key: &str) -> AppResult<usize> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(0);
                    }
                    return match &entry.value {
                        StoredValue::SortedSet(members) => Ok(members.len()),
                        _ => Err(wrong_kind(key, "sorted set")),
                    };
                }
                Ok(0)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let len: i64 = conn.zcard(key).await?;
                Ok(len.max(0) as usize)
            }
        }
    }

    pub async fn set_add(&self, key: &str, member: &str) -> AppResult<()> {
        match self {
            Self::Memory { entries } => {
                let mut entry = entries.entry(key.to_string()).or_insert_with(|| MemoryEntry {
                    value: StoredValue::Set(Vec::new()),
                    expires_at: None,
                });
                if entry.is_expired() {
                    *entry = MemoryEntry {
                        value: StoredValue::Set(Vec::new()),
                        expires_at: None,
                    };
                }
                match &mut entry.value {
                    StoredValue::Set(members) => {
                        if !members.iter().any(|m| m == member) {
                            members.push(member.to_string());
                        }
                        Ok(())
                    }
                    _ => Err(wrong_kind(key, "set")),
                }
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let _: i64 = conn.sadd(key, member).await?;
                Ok(())
            }
        }
    }

    pub async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        match self {
            Self::Memory { entries } => {
                let mut removed = false;
                let mut now_empty = false;
                if let Some(mut entry) = entries.get_mut(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(false);
                    }
                    match &mut entry.value {
                        StoredValue::Set(members) => {
                            let before = members.len();
                            members.retain(|m| m != member);
                            removed = members.len() < before;
                            now_empty = members.is_empty();
                        }
                        _ => return Err(wrong_kind(key, "set")),
                    }
                }
                if now_empty {
                    entries.remove(key);
                }
                Ok(removed)
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let removed: i64 = conn.srem(key, member).await?;
                Ok(removed > 0)
            }
        }
    }

    pub async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        match self {
            Self::Memory { entries } => {
                if let Some(entry) = entries.get(key) {
                    if entry.is_expired() {
                        drop(entry);
                        entries.remove(key);
                        return Ok(Vec::new());
                    }
                    return match &entry.value {
                        StoredValue::Set(members) => Ok(members.clone()),
                        _ => Err(wrong_kind(key, "set")),
                    };
                }
                Ok(Vec::new())
            }
            Self::Redis { connection_manager } => {
                let mut conn = Self::redis_conn(connection_manager);
                let members: Vec<String> = conn.smembers(key).await?;
                Ok(members)
            }
        }
    }

    /// Periodic purge of expired in-memory entries. Redis expires keys
    /// natively, so this is a no-op there.
    pub fn start_cleanup_task(&self, interval_secs: u64) -> Option<tokio::task::JoinHandle<()>> {
        match self {
            Self::Memory { entries } => {
                let entries = entries.clone();
                Some(tokio::spawn(async move {
                    let mut interval =
                        tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
                    loop {
                        interval.tick().await;
                        let before = entries.len();
                        entries.retain(|_, entry| !entry.is_expired());
                        let purged = before.saturating_sub(entries.len());
                        if purged > 0 {
                            debug!(
                                "Security store cleanup removed {} expired entries ({} live)",
                                purged,
                                entries.len()
                            );
                        }
                    }
                }))
            }
            Self::Redis { .. } => None,
        }
    }
}

fn wrong_kind(key: &str, expected: &str) -> AppError {
    AppError::Internal(format!(
        "Security store key '{}' does not hold a {} value",
        key, expected
    ))
}

/// Builds the store from configuration. A missing Redis URL selects the
/// in-process backend, which is only safe for a single instance; state is
/// lost on restart and not shared between replicas.
pub async fn create_security_store(redis_url: &Option<String>) -> AppResult<SecurityStore> {
    match redis_url {
        Some(url) => match SecurityStore::new_redis(url).await {
            Ok(store) => {
                info!("Redis connected for security state");
                Ok(store)
            }
            Err(e) => {
                error!("Failed to connect to Redis for security state: {}", e);
                Err(AppError::Configuration(format!(
                    "Failed to connect to Redis: {}. Set REDIS_URL to a reachable instance or unset it to run single-instance.",
                    e
                )))
            }
        },
        None => {
            warn!("REDIS_URL is not set; using in-process security state (single instance only)");
            Ok(SecurityStore::new_memory())
        }
    }
}
