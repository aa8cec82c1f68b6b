//! Live-room moderation contract.
//!
//! A kick bars one user from one class's live room for a bounded time, regardless of
//! enrollment. The registry holds data only; who may kick is decided by the gate.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use lessonbay_core::{ClassId, UserId};

pub const MIN_BAN_MINUTES: i64 = 1;
pub const MAX_BAN_MINUTES: i64 = 24 * 60;

/// Clamp a caller-supplied ban length into `[1, 1440]` minutes.
pub fn clamp_ban_minutes(minutes: i64) -> i64 {
    minutes.clamp(MIN_BAN_MINUTES, MAX_BAN_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KickRecord {
    pub class_id: ClassId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl KickRecord {
    pub fn new(class_id: ClassId, user_id: UserId, ttl_minutes: i64, now: DateTime<Utc>) -> Self {
        Self {
            class_id,
            user_id,
            expires_at: now + Duration::minutes(clamp_ban_minutes(ttl_minutes)),
        }
    }

    /// Expired strictly after `expires_at`; the instant itself is still kicked.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Per-class, per-user kick state.
///
/// Implementations must be safe for concurrent use and must expire records lazily:
/// every read re-checks `expires_at`.
pub trait ModerationRegistry: Send + Sync {
    /// Record (or overwrite) a kick. `ttl_minutes` is clamped.
    fn kick(&self, class_id: ClassId, user_id: UserId, ttl_minutes: i64, now: DateTime<Utc>) -> KickRecord;

    /// Whether a live kick exists. An expired record is removed and reported as `false`.
    fn is_kicked(&self, class_id: ClassId, user_id: UserId, now: DateTime<Utc>) -> bool;

    /// Drop every expired record; returns how many were removed. Footprint only.
    fn sweep_expired(&self, now: DateTime<Utc>) -> usize;
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ban_minutes_are_clamped() {
        assert_eq!(clamp_ban_minutes(0), 1);
        assert_eq!(clamp_ban_minutes(-5), 1);
        assert_eq!(clamp_ban_minutes(99_999), 1440);
        assert_eq!(clamp_ban_minutes(30), 30);
    }

    proptest! {
        #[test]
        fn clamped_ttl_is_always_in_range(minutes in any::<i64>()) {
            let clamped = clamp_ban_minutes(minutes);
            prop_assert!((MIN_BAN_MINUTES..=MAX_BAN_MINUTES).contains(&clamped));
        }
    }
}
