//! Fixed-window request counting.
//!
//! Each sensitive endpoint owns one `FixedWindowLimiter`, so counters never leak across
//! endpoints. Buckets are keyed by a caller-supplied identity (usually the source
//! address) and are pruned by the background sweeper once idle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::sweeper::Sweep;

/// `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// One-time-code requests: 5 per 5 minutes.
    pub fn one_time_code() -> Self {
        Self::new(5, Duration::minutes(5))
    }

    /// Account signup: 10 per 10 minutes.
    pub fn signup() -> Self {
        Self::new(10, Duration::minutes(10))
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.limit, self.window.num_seconds())
    }
}

/// Parses `"<limit>/<window_secs>"`, e.g. `"5/300"`.
impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, window) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("expected <limit>/<window_secs>, got {s:?}"))?;
        let limit: u32 = limit
            .trim()
            .parse()
            .map_err(|_| format!("invalid limit in {s:?}"))?;
        let secs: i64 = window
            .trim()
            .parse()
            .map_err(|_| format!("invalid window in {s:?}"))?;
        if limit == 0 || secs <= 0 {
            return Err(format!("limit and window must be positive in {s:?}"));
        }
        let window = Duration::try_seconds(secs).ok_or_else(|| format!("window out of range in {s:?}"))?;
        Ok(Self::new(limit, window))
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_expires_at: DateTime<Utc>,
    first_seen: DateTime<Utc>,
    windows: u64,
}

impl Bucket {
    fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 1,
            window_expires_at: now + window,
            first_seen: now,
            windows: 1,
        }
    }
}

/// Snapshot of one key's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketStats {
    pub count: u32,
    pub window_expires_at: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    /// Windows opened for this key since it was first seen.
    pub windows: u64,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: &'static str,
    rule: RateLimitRule,
    buckets: DashMap<String, Bucket>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, rule: RateLimitRule) -> Self {
        Self {
            name,
            rule,
            buckets: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Count a hit against this limiter's configured rule.
    pub fn allow(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.allow_with(key, self.rule.window, self.rule.limit, now)
    }

    /// Count a hit for `key` with an explicit window and limit.
    ///
    /// The first hit opens `[now, now + window)`. A hit at or after the window end
    /// reopens the same bucket with count 1. Once `count` reaches `limit`, further hits
    /// in the window are refused and the count stays at `limit`.
    pub fn allow_with(&self, key: &str, window: Duration, limit: u32, now: DateTime<Utc>) -> bool {
        let mut bucket = match self.buckets.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Bucket::open(now, window));
                return limit > 0;
            }
            Entry::Occupied(slot) => slot.into_ref(),
        };

        if now >= bucket.window_expires_at {
            bucket.count = 1;
            bucket.window_expires_at = now + window;
            bucket.windows += 1;
            return limit > 0;
        }

        if bucket.count >= limit {
            debug!(limiter = self.name, key, "rate limit exceeded");
            return false;
        }

        bucket.count += 1;
        true
    }

    pub fn stats(&self, key: &str) -> Option<BucketStats> {
        self.buckets.get(key).map(|b| BucketStats {
            count: b.count,
            window_expires_at: b.window_expires_at,
            first_seen: b.first_seen,
            windows: b.windows,
        })
    }

    /// Drop buckets whose window ended more than `idle` ago.
    pub fn prune_idle(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, b| now < b.window_expires_at + idle);
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Buckets idle for a full window after expiring are dropped.
impl Sweep for FixedWindowLimiter {
    fn label(&self) -> &'static str {
        self.name
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.prune_idle(now, self.rule.window)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sixth_hit_in_window_is_denied_then_window_resets() {
        let limiter = FixedWindowLimiter::new("otp", RateLimitRule::one_time_code());
        let w = Duration::minutes(5);

        for i in 0..5 {
            assert!(limiter.allow("10.0.0.1", t0() + Duration::seconds(i)), "hit {i}");
        }
        assert!(!limiter.allow("10.0.0.1", t0() + Duration::seconds(10)));
        assert_eq!(limiter.stats("10.0.0.1").unwrap().count, 5);

        assert!(limiter.allow("10.0.0.1", t0() + w));
        let stats = limiter.stats("10.0.0.1").unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.window_expires_at, t0() + w + w);
    }

    #[test]
    fn reset_keeps_key_lifetime() {
        let limiter = FixedWindowLimiter::new("signup", RateLimitRule::signup());
        limiter.allow("k", t0());
        limiter.allow("k", t0() + Duration::minutes(20));

        let stats = limiter.stats("k").unwrap();
        assert_eq!(stats.first_seen, t0());
        assert_eq!(stats.windows, 2);
    }

    #[test]
    fn keys_and_limiters_are_independent() {
        let otp = FixedWindowLimiter::new("otp", RateLimitRule::new(1, Duration::minutes(5)));
        let signup = FixedWindowLimiter::new("signup", RateLimitRule::new(1, Duration::minutes(5)));

        assert!(otp.allow("a", t0()));
        assert!(!otp.allow("a", t0()));
        assert!(otp.allow("b", t0()));
        assert!(signup.allow("a", t0()));
    }

    #[test]
    fn prune_drops_idle_buckets() {
        let limiter = FixedWindowLimiter::new("otp", RateLimitRule::one_time_code());
        limiter.allow("old", t0());
        limiter.allow("new", t0() + Duration::minutes(30));

        assert_eq!(limiter.prune_idle(t0() + Duration::minutes(31), Duration::minutes(10)), 1);
        assert!(limiter.stats("old").is_none());
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn rule_parses_from_config_string() {
        assert_eq!("5/300".parse::<RateLimitRule>().unwrap(), RateLimitRule::one_time_code());
        assert_eq!(" 10 / 600 ".parse::<RateLimitRule>().unwrap(), RateLimitRule::signup());
        assert!("0/300".parse::<RateLimitRule>().is_err());
        assert!("5".parse::<RateLimitRule>().is_err());
        assert!("five/300".parse::<RateLimitRule>().is_err());
    }

    proptest! {
        #[test]
        fn never_more_than_limit_allowed_per_window(limit in 1u32..20, hits in 1usize..60) {
            let limiter = FixedWindowLimiter::new("p", RateLimitRule::new(limit, Duration::minutes(1)));
            let allowed = (0..hits)
                .filter(|i| limiter.allow("k", t0() + Duration::milliseconds(*i as i64)))
                .count();
            prop_assert_eq!(allowed, hits.min(limit as usize));
        }
    }
}
