//! Process-local kick registry.
//!
//! Records live in a `DashMap` keyed by `(class, user)`. Reads expire lazily.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use lessonbay_auth::{KickRecord, ModerationRegistry};
use lessonbay_core::{ClassId, UserId};

use crate::sweeper::Sweep;

#[derive(Debug, Default)]
pub struct InMemoryModerationRegistry {
    kicks: DashMap<(ClassId, UserId), KickRecord>,
}

impl InMemoryModerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.kicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kicks.is_empty()
    }
}

impl ModerationRegistry for InMemoryModerationRegistry {
    fn kick(&self, class_id: ClassId, user_id: UserId, ttl_minutes: i64, now: DateTime<Utc>) -> KickRecord {
        let record = KickRecord::new(class_id, user_id, ttl_minutes, now);
        self.kicks.insert((class_id, user_id), record);
        record
    }

    fn is_kicked(&self, class_id: ClassId, user_id: UserId, now: DateTime<Utc>) -> bool {
        let key = (class_id, user_id);
        let expired = match self.kicks.get(&key) {
            None => return false,
            Some(record) => record.is_expired(now),
        };

        if expired {
            // Re-check under the entry lock: a fresh kick may have landed since the read.
            self.kicks.remove_if(&key, |_, record| record.is_expired(now));
            return false;
        }
        true
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.kicks.len();
        self.kicks.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.kicks.len())
    }
}

impl Sweep for InMemoryModerationRegistry {
    fn label(&self) -> &'static str {
        "kicks"
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.sweep_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn kick_expires_after_ttl_and_is_removed() {
        let reg = InMemoryModerationRegistry::new();
        let (class, user) = (ClassId::new(), UserId::new());

        reg.kick(class, user, 5, t0());

        assert!(reg.is_kicked(class, user, t0() + Duration::minutes(4)));
        assert!(reg.is_kicked(class, user, t0() + Duration::minutes(5)));
        assert!(!reg.is_kicked(class, user, t0() + Duration::minutes(6)));
        assert!(reg.is_empty());
    }

    #[test]
    fn kick_is_scoped_to_class_and_user() {
        let reg = InMemoryModerationRegistry::new();
        let (class, user) = (ClassId::new(), UserId::new());
        reg.kick(class, user, 10, t0());

        assert!(!reg.is_kicked(ClassId::new(), user, t0()));
        assert!(!reg.is_kicked(class, UserId::new(), t0()));
    }

    #[test]
    fn rekick_overwrites_expiry() {
        let reg = InMemoryModerationRegistry::new();
        let (class, user) = (ClassId::new(), UserId::new());

        reg.kick(class, user, 60, t0());
        let shorter = reg.kick(class, user, 1, t0());

        assert_eq!(shorter.expires_at, t0() + Duration::minutes(1));
        assert!(!reg.is_kicked(class, user, t0() + Duration::minutes(2)));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn ttl_outside_bounds_is_clamped() {
        let reg = InMemoryModerationRegistry::new();
        let (class, user) = (ClassId::new(), UserId::new());

        assert_eq!(reg.kick(class, user, 0, t0()).expires_at, t0() + Duration::minutes(1));
        assert_eq!(reg.kick(class, user, 50_000, t0()).expires_at, t0() + Duration::minutes(1440));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let reg = InMemoryModerationRegistry::new();
        let class = ClassId::new();
        reg.kick(class, UserId::new(), 1, t0());
        reg.kick(class, UserId::new(), 1, t0());
        let keep = UserId::new();
        reg.kick(class, keep, 30, t0());

        assert_eq!(reg.sweep_expired(t0() + Duration::minutes(10)), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.is_kicked(class, keep, t0() + Duration::minutes(10)));
    }
}
