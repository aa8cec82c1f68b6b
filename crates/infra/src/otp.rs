//! Short-lived one-time sign-in codes, keyed by lowercased email.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;

use crate::sweeper::Sweep;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("no code was requested for this address")]
    NotRequested,

    #[error("code expired")]
    Expired,

    #[error("code does not match")]
    Mismatch,
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OneTimeCodeStore {
    ttl: Duration,
    pending: DashMap<String, PendingCode>,
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl OneTimeCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: DashMap::new(),
        }
    }

    /// Issue a fresh six-digit code, replacing any outstanding one for the address.
    pub fn issue(&self, email: &str, now: DateTime<Utc>) -> String {
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        self.pending.insert(
            normalize(email),
            PendingCode {
                code: code.clone(),
                expires_at: now + self.ttl,
            },
        );
        code
    }

    /// Check a submitted code.
    ///
    /// Success consumes the code. An expired code is dropped. A wrong code leaves the
    /// outstanding one in place.
    pub fn verify(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let key = normalize(email);
        let expired = match self.pending.get(&key) {
            None => return Err(OtpError::NotRequested),
            Some(pending) if now > pending.expires_at => true,
            Some(pending) if pending.code != code.trim() => return Err(OtpError::Mismatch),
            Some(_) => false,
        };

        if expired {
            self.pending.remove(&key);
            return Err(OtpError::Expired);
        }

        self.pending.remove(&key);
        Ok(())
    }

    /// Drop every expired code.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| now <= p.expires_at);
        before.saturating_sub(self.pending.len())
    }

    /// Outstanding codes, expired ones included.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Sweep for OneTimeCodeStore {
    fn label(&self) -> &'static str {
        "one_time_codes"
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.sweep_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn issued_code_is_six_digits() {
        let store = OneTimeCodeStore::new(Duration::minutes(10));
        let code = store.issue("a@example.com", t0());

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(!code.starts_with('0'));
    }

    #[test]
    fn correct_code_verifies_once() {
        let store = OneTimeCodeStore::new(Duration::minutes(10));
        let code = store.issue("A@Example.com", t0());

        assert_eq!(store.verify("a@example.com", &code, t0() + Duration::minutes(1)), Ok(()));
        assert_eq!(
            store.verify("a@example.com", &code, t0() + Duration::minutes(1)),
            Err(OtpError::NotRequested)
        );
    }

    #[test]
    fn wrong_code_does_not_consume() {
        let store = OneTimeCodeStore::new(Duration::minutes(10));
        let code = store.issue("a@example.com", t0());
        let wrong = if code == "123456" { "654321" } else { "123456" };

        assert_eq!(store.verify("a@example.com", wrong, t0()), Err(OtpError::Mismatch));
        assert_eq!(store.verify("a@example.com", &code, t0()), Ok(()));
    }

    #[test]
    fn expired_code_is_rejected_and_dropped() {
        let store = OneTimeCodeStore::new(Duration::minutes(10));
        let code = store.issue("a@example.com", t0());

        assert_eq!(
            store.verify("a@example.com", &code, t0() + Duration::minutes(11)),
            Err(OtpError::Expired)
        );
        assert_eq!(store.verify("a@example.com", &code, t0()), Err(OtpError::NotRequested));
    }

    #[test]
    fn reissue_replaces_outstanding_code() {
        let store = OneTimeCodeStore::new(Duration::minutes(10));
        store.issue("a@example.com", t0());
        let second = store.issue("a@example.com", t0());

        assert_eq!(store.verify("a@example.com", &second, t0()), Ok(()));
        assert_eq!(store.sweep_expired(t0()), 0);
    }
}
