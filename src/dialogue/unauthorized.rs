//! Unauthorized access flood protection.
//!
//! A cache-based cooldown so users outside the allow-list receive the
//! "access denied" reply at most once per cooldown period. Every attempt is
//! still logged, with throttling so a hammering client cannot flood the log.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Log every Nth silenced attempt
const SILENCED_LOG_EVERY: u64 = 100;

/// Tracks when each unauthorized user last received a denial reply
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user_id -> last denial time, with automatic TTL eviction
    cache: Cache<i64, std::time::Instant>,
    cooldown: Duration,
    /// Counter for silenced attempts (log throttling)
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Create a cache with the given cooldown, entry TTL and capacity
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            cache,
            cooldown: Duration::from_secs(cooldown_secs),
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a denial reply should be sent to this user now.
    ///
    /// True on the first attempt or once the cooldown has elapsed; false
    /// while the user is still in the cooldown window.
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        if let Some(last_sent) = self.cache.get(&user_id).await {
            if last_sent.elapsed() < self.cooldown {
                let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
                if count % SILENCED_LOG_EVERY == 0 {
                    debug!(
                        "Silenced {} unauthorized attempts (latest: {} / {})",
                        count, user_id, user_name
                    );
                }
                return false;
            }
        }
        true
    }

    /// Record that a denial reply was just sent to this user
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, std::time::Instant::now()).await;
    }

    /// Number of attempts silenced so far
    #[must_use]
    pub fn silenced(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_attempt_sends_then_cooldown_silences() {
        let cache = UnauthorizedCache::new(60, 60, 100);

        assert!(cache.should_send(7, "Mallory").await);
        cache.mark_sent(7).await;

        assert!(!cache.should_send(7, "Mallory").await);
        assert_eq!(cache.silenced(), 1);

        // A different user is unaffected
        assert!(cache.should_send(8, "Other").await);
    }
}
