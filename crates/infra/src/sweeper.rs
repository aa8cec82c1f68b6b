//! Periodic purge of expired process-local state.
//!
//! Kicks, limiter buckets and pending one-time codes all expire lazily on read. The
//! sweeper only bounds memory for keys that are never read again; it never changes an
//! answer.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

/// State with entries that can be dropped once expired.
pub trait Sweep: Send + Sync {
    fn label(&self) -> &'static str;

    /// Drop expired entries and return how many were removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;
}

/// Sweep every target each `every`. Abort the handle to stop it.
pub fn spawn_sweeper(targets: Vec<Arc<dyn Sweep>>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            for target in &targets {
                let removed = target.sweep(now);
                if removed > 0 {
                    debug!(target = target.label(), removed, "swept expired entries");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use lessonbay_auth::ModerationRegistry;
    use lessonbay_core::{ClassId, UserId};

    use super::*;
    use crate::{FixedWindowLimiter, InMemoryModerationRegistry, OneTimeCodeStore, RateLimitRule};

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_drains_every_target() {
        let past = Utc::now() - Duration::hours(2);

        let kicks = Arc::new(InMemoryModerationRegistry::new());
        kicks.kick(ClassId::new(), UserId::new(), 5, past);

        let limiter = Arc::new(FixedWindowLimiter::new("otp", RateLimitRule::one_time_code()));
        limiter.allow("198.51.100.1", past);
        limiter.allow("198.51.100.2", Utc::now());

        let codes = Arc::new(OneTimeCodeStore::new(Duration::minutes(10)));
        codes.issue("stale@example.com", past);
        codes.issue("fresh@example.com", Utc::now());

        let targets: Vec<Arc<dyn Sweep>> = vec![
            kicks.clone() as Arc<dyn Sweep>,
            limiter.clone() as Arc<dyn Sweep>,
            codes.clone() as Arc<dyn Sweep>,
        ];
        let handle = spawn_sweeper(targets, StdDuration::from_secs(60));
        tokio::time::sleep(StdDuration::from_secs(1)).await;
        handle.abort();

        assert!(kicks.is_empty());
        assert_eq!(limiter.len(), 1);
        assert!(limiter.stats("198.51.100.2").is_some());
        assert_eq!(codes.len(), 1);
    }
}
