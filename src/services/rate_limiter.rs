use log::warn;

use crate::auth_stores::SecurityStore;
use crate::config::settings::RateLimitConfig;
use crate::error::{AppError, AppResult};

const LOGIN_ATTEMPT_PREFIX: &str = "login_attempts";
const LOGIN_BLOCK_PREFIX: &str = "login_block";
const RESET_ATTEMPT_PREFIX: &str = "pwd_reset_attempts";
const RESET_BLOCK_PREFIX: &str = "pwd_reset_block";

fn retry_hint(remaining_secs: i64) -> String {
    let minutes = ((remaining_secs + 59) / 60).max(1);
    format!("Too many attempts. Try again in {} minute(s)", minutes)
}

/// Per-IP sliding-window limiter over the shared store.
///
/// Failed attempts are counted with an atomic increment; the window TTL is
/// set on the first increment, so the count naturally resets when the window
/// elapses. Reaching the ceiling arms a separate block flag with its own,
/// longer TTL, which outlives the counting window. A successful attempt
/// deletes both keys. A store failure surfaces as an error, never an admit.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: SecurityStore,
    attempt_prefix: &'static str,
    block_prefix: &'static str,
    window_secs: i64,
    max_attempts: i64,
    block_secs: i64,
}

impl SlidingWindowLimiter {
    fn attempts_key(&self, ip: &str) -> String {
        format!("{}:{}", self.attempt_prefix, ip)
    }

    fn block_key(&self, ip: &str) -> String {
        format!("{}:{}", self.block_prefix, ip)
    }

    /// Admits or denies the attempt. Denials carry a remaining-time hint.
    pub async fn check(&self, ip: &str) -> AppResult<()> {
        let block_key = self.block_key(ip);
        if self.store.exists(&block_key).await? {
            let remaining = self
                .store
                .ttl_secs(&block_key)
                .await?
                .unwrap_or(self.block_secs);
            return Err(AppError::TooManyRequests(retry_hint(remaining)));
        }

        let count = self
            .store
            .get_string(&self.attempts_key(ip))
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        if count >= self.max_attempts {
            self.store
                .put_string(&block_key, "1", Some(self.block_secs))
                .await?;
            warn!(
                "Blocking client {} for {}s after {} failed attempts",
                ip, self.block_secs, count
            );
            return Err(AppError::TooManyRequests(retry_hint(self.block_secs)));
        }

        Ok(())
    }

    /// Counts one failed attempt; returns the count within the window.
    pub async fn record_failure(&self, ip: &str) -> AppResult<i64> {
        let key = self.attempts_key(ip);
        let count = self.store.increment(&key).await?;
        if count == 1 {
            // Window TTL starts with the first failure; later increments
            // inherit the remaining window.
            self.store.expire(&key, self.window_secs).await?;
        }
        Ok(count)
    }

    /// A success wipes the IP's slate, counter and block alike.
    pub async fn record_success(&self, ip: &str) -> AppResult<()> {
        self.store.delete(&self.attempts_key(ip)).await?;
        self.store.delete(&self.block_key(ip)).await?;
        Ok(())
    }
}

/// Limiter for sign-in attempts. Newtype so it can live in app data next to
/// the password-reset limiter without colliding.
#[derive(Clone)]
pub struct LoginRateLimiter(SlidingWindowLimiter);

impl LoginRateLimiter {
    pub fn new(store: SecurityStore, config: &RateLimitConfig) -> Self {
        Self(SlidingWindowLimiter {
            store,
            attempt_prefix: LOGIN_ATTEMPT_PREFIX,
            block_prefix: LOGIN_BLOCK_PREFIX,
            window_secs: config.login_window_secs,
            max_attempts: config.login_max_attempts,
            block_secs: config.login_block_secs,
        })
    }

    pub async fn check(&self, ip: &str) -> AppResult<()> {
        self.0.check(ip).await
    }

    pub async fn record_failure(&self, ip: &str) -> AppResult<i64> {
        self.0.record_failure(ip).await
    }

    pub async fn record_success(&self, ip: &str) -> AppResult<()> {
        self.0.record_success(ip).await
    }
}

/// Limiter for password-reset initiation, with its own window and ceiling.
#[derive(Clone)]
pub struct PasswordResetRateLimiter(SlidingWindowLimiter);

impl PasswordResetRateLimiter {
    pub fn new(store: SecurityStore, config: &RateLimitConfig) -> Self {
        Self(SlidingWindowLimiter {
            store,
            attempt_prefix: RESET_ATTEMPT_PREFIX,
            block_prefix: RESET_BLOCK_PREFIX,
            window_secs: config.reset_window_secs,
            max_attempts: config.reset_max_attempts,
            block_secs: config.reset_block_secs,
        })
    }

    pub async fn check(&self, ip: &str) -> AppResult<()> {
        self.0.check(ip).await
    }

    pub async fn record_attempt(&self, ip: &str) -> AppResult<i64> {
        self.0.record_failure(ip).await
    }

    pub async fn record_success(&self, ip: &str) -> AppResult<()> {
        self.0.record_success(ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn login_limiter(window_secs: i64, max_attempts: i64, block_secs: i64) -> LoginRateLimiter {
        let config = RateLimitConfig {
            login_window_secs: window_secs,
            login_max_attempts: max_attempts,
            login_block_secs: block_secs,
            reset_window_secs: 3600,
            reset_max_attempts: 3,
            reset_block_secs: 3600,
        };
        LoginRateLimiter::new(SecurityStore::new_memory(), &config)
    }

    #[tokio::test]
    async fn attempts_below_the_ceiling_are_admitted() {
        let limiter = login_limiter(900, 10, 1800);
        for _ in 0..9 {
            limiter.check("10.0.0.1").await.unwrap();
            limiter.record_failure("10.0.0.1").await.unwrap();
        }
        limiter.check("10.0.0.1").await.unwrap();
    }

    #[tokio::test]
    async fn eleventh_attempt_in_the_window_is_denied() {
        let limiter = login_limiter(900, 10, 1800);
        for _ in 0..10 {
            limiter.check("10.0.0.1").await.unwrap();
            limiter.record_failure("10.0.0.1").await.unwrap();
        }

        let err = limiter.check("10.0.0.1").await.unwrap_err();
        match err {
            AppError::TooManyRequests(hint) => assert!(hint.contains("30 minute")),
            other => panic!("expected TooManyRequests, got {:?}", other),
        }

        // Denial is sticky until the block key expires.
        assert!(limiter.check("10.0.0.1").await.is_err());
    }

    #[tokio::test]
    async fn ips_are_limited_independently() {
        let limiter = login_limiter(900, 10, 1800);
        for _ in 0..10 {
            limiter.record_failure("10.0.0.1").await.unwrap();
        }
        assert!(limiter.check("10.0.0.1").await.is_err());
        limiter.check("10.0.0.2").await.unwrap();
    }

    #[tokio::test]
    async fn success_clears_the_counter() {
        let limiter = login_limiter(900, 10, 1800);
        for _ in 0..10 {
            limiter.record_failure("10.0.0.1").await.unwrap();
        }

        limiter.record_success("10.0.0.1").await.unwrap();
        limiter.check("10.0.0.1").await.unwrap();
        assert_eq!(limiter.record_failure("10.0.0.1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn success_also_lifts_an_armed_block() {
        let limiter = login_limiter(900, 10, 1800);
        for _ in 0..10 {
            limiter.record_failure("10.0.0.1").await.unwrap();
        }
        assert!(limiter.check("10.0.0.1").await.is_err());

        limiter.record_success("10.0.0.1").await.unwrap();
        limiter.check("10.0.0.1").await.unwrap();
    }

    #[tokio::test]
    async fn block_outlives_the_counting_window() {
        let limiter = login_limiter(1, 2, 60);
        limiter.record_failure("10.0.0.9").await.unwrap();
        limiter.record_failure("10.0.0.9").await.unwrap();
        assert!(limiter.check("10.0.0.9").await.is_err());

        // Counter window lapses; the block flag must still deny.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(limiter.check("10.0.0.9").await.is_err());
    }

    #[tokio::test]
    async fn counter_resets_once_the_window_elapses() {
        let limiter = login_limiter(1, 10, 60);
        for _ in 0..5 {
            limiter.record_failure("10.0.0.9").await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(limiter.record_failure("10.0.0.9").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_limiter_uses_its_own_ceiling() {
        let config = RateLimitConfig {
            login_window_secs: 900,
            login_max_attempts: 10,
            login_block_secs: 1800,
            reset_window_secs: 3600,
            reset_max_attempts: 3,
            reset_block_secs: 3600,
        };
        let store = SecurityStore::new_memory();
        let login = LoginRateLimiter::new(store.clone(), &config);
        let reset = PasswordResetRateLimiter::new(store, &config);

        for _ in 0..3 {
            reset.check("10.0.0.1").await.unwrap();
            reset.record_attempt("10.0.0.1").await.unwrap();
        }
        let err = reset.check("10.0.0.1").await.unwrap_err();
        match err {
            AppError::TooManyRequests(hint) => assert!(hint.contains("60 minute")),
            other => panic!("expected TooManyRequests, got {:?}", other),
        }

        // The login limiter for the same IP is untouched.
        login.check("10.0.0.1").await.unwrap();
    }
}
