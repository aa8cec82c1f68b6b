//! Time-windowed enrollment validity.
//!
//! An enrollment entitles a student to a class while `status == active` and
//! `now < end_at`. Renewal always restarts the window at the purchase instant; plans
//! are fixed blocks of days (a "month" is 30 days, never a calendar month).

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use lessonbay_core::{ClassId, DomainError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Weekly,
    Monthly,
}

impl PlanType {
    /// Length of one billing unit in days.
    pub fn block_days(self) -> i64 {
        match self {
            PlanType::Weekly => 7,
            PlanType::Monthly => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Weekly => "weekly",
            PlanType::Monthly => "monthly",
        }
    }
}

impl FromStr for PlanType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(PlanType::Weekly),
            "monthly" => Ok(PlanType::Monthly),
            other => Err(DomainError::validation(format!(
                "planType must be 'weekly' or 'monthly', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown enrollment status '{other}'"))),
        }
    }
}

/// Number of plan blocks purchased. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationUnits(u32);

impl DurationUnits {
    pub const ONE: DurationUnits = DurationUnits(1);

    /// Largest block count a single purchase may carry (ten years of weekly blocks).
    pub const MAX_PER_PURCHASE: u32 = 520;

    /// Clamp an integer into a valid unit count (`<= 0` becomes 1).
    pub fn from_i64(raw: i64) -> Self {
        if raw < 1 {
            Self::ONE
        } else {
            Self(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Coerce loosely-typed input: numbers and numeric strings are truncated to an
    /// integer; anything non-numeric or `<= 0` becomes 1.
    pub fn coerce(raw: &JsonValue) -> Self {
        let parsed = match raw {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            JsonValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        };
        parsed.map(Self::from_i64).unwrap_or(Self::ONE)
    }

    /// [`coerce`](Self::coerce), then refuse counts above
    /// [`MAX_PER_PURCHASE`](Self::MAX_PER_PURCHASE).
    pub fn for_purchase(raw: &JsonValue) -> Result<Self, DomainError> {
        let units = Self::coerce(raw);
        if units.0 > Self::MAX_PER_PURCHASE {
            return Err(DomainError::validation(format!(
                "durationUnits must be at most {}",
                Self::MAX_PER_PURCHASE
            )));
        }
        Ok(units)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for DurationUnits {
    fn default() -> Self {
        Self::ONE
    }
}

/// End of the entitlement window for a purchase made at `now`.
pub fn compute_end_at(plan: PlanType, units: DurationUnits, now: DateTime<Utc>) -> DateTime<Utc> {
    let days = plan.block_days() * i64::from(units.get());
    Duration::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A student's entitlement row for one class (unique per user and class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub class_id: ClassId,
    pub plan_type: PlanType,
    pub duration_units: DurationUnits,
    pub paid_amount: i64,
    pub end_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
}

/// A purchase request, as reported by the (external) payment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    pub plan_type: PlanType,
    pub duration_units: DurationUnits,
    pub paid_amount: i64,
}

impl Enrollment {
    /// Apply a purchase, creating the row or overwriting the existing one.
    ///
    /// Remaining time on an existing row is discarded: the new window starts at `now`.
    pub fn purchase(
        existing: Option<Enrollment>,
        user_id: UserId,
        class_id: ClassId,
        purchase: Purchase,
        now: DateTime<Utc>,
    ) -> Enrollment {
        let end_at = compute_end_at(purchase.plan_type, purchase.duration_units, now);
        match existing {
            Some(mut row) => {
                row.plan_type = purchase.plan_type;
                row.duration_units = purchase.duration_units;
                row.paid_amount = purchase.paid_amount;
                row.end_at = end_at;
                row.status = EnrollmentStatus::Active;
                row
            }
            None => Enrollment {
                user_id,
                class_id,
                plan_type: purchase.plan_type,
                duration_units: purchase.duration_units,
                paid_amount: purchase.paid_amount,
                end_at,
                status: EnrollmentStatus::Active,
            },
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::Active && self.end_at > now
    }
}

/// `true` iff an enrollment exists, is active, and has not reached `end_at`.
pub fn is_active(enrollment: Option<&Enrollment>, now: DateTime<Utc>) -> bool {
    enrollment.is_some_and(|e| e.is_active(now))
}

/// Why an enrollment does or does not entitle its holder right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    Active,
    Expired,
    Cancelled,
    Missing,
}

impl EnrollmentState {
    pub fn of(enrollment: Option<&Enrollment>, now: DateTime<Utc>) -> Self {
        match enrollment {
            None => EnrollmentState::Missing,
            Some(e) if e.status == EnrollmentStatus::Cancelled => EnrollmentState::Cancelled,
            Some(e) if e.end_at > now => EnrollmentState::Active,
            Some(_) => EnrollmentState::Expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap()
    }

    fn weekly(units: i64) -> Purchase {
        Purchase {
            plan_type: PlanType::Weekly,
            duration_units: DurationUnits::from_i64(units),
            paid_amount: 19_000 * units,
        }
    }

    #[test]
    fn weekly_and_monthly_are_fixed_day_blocks() {
        assert_eq!(compute_end_at(PlanType::Weekly, DurationUnits::from_i64(4), t0()), t0() + Duration::days(28));
        // Jan 31 + 30 days is Mar 2 in 2025, not Feb 28.
        assert_eq!(compute_end_at(PlanType::Monthly, DurationUnits::ONE, t0()), t0() + Duration::days(30));
    }

    #[test]
    fn expiry_instant_is_inactive() {
        let e = Enrollment::purchase(None, UserId::new(), ClassId::new(), weekly(1), t0());

        assert!(is_active(Some(&e), e.end_at - Duration::milliseconds(1)));
        assert!(!is_active(Some(&e), e.end_at));
        assert!(!is_active(None, t0()));
    }

    #[test]
    fn cancelled_row_is_inactive_before_end() {
        let mut e = Enrollment::purchase(None, UserId::new(), ClassId::new(), weekly(2), t0());
        e.status = EnrollmentStatus::Cancelled;

        assert!(!e.is_active(t0()));
        assert_eq!(EnrollmentState::of(Some(&e), t0()), EnrollmentState::Cancelled);
    }

    #[test]
    fn renewal_replaces_remaining_time() {
        let (user, class) = (UserId::new(), ClassId::new());
        let first = Enrollment::purchase(None, user, class, weekly(1), t0());
        let later = t0() + Duration::seconds(1);
        let second = Enrollment::purchase(Some(first), user, class, weekly(1), later);

        assert_eq!(second.end_at, later + Duration::days(7));
    }

    #[test]
    fn renewal_reactivates_cancelled_row() {
        let (user, class) = (UserId::new(), ClassId::new());
        let mut row = Enrollment::purchase(None, user, class, weekly(1), t0());
        row.status = EnrollmentStatus::Cancelled;

        let monthly = Purchase {
            plan_type: PlanType::Monthly,
            duration_units: DurationUnits::from_i64(2),
            paid_amount: 118_000,
        };
        let renewed = Enrollment::purchase(Some(row), user, class, monthly, t0());

        assert_eq!(renewed.status, EnrollmentStatus::Active);
        assert_eq!(renewed.plan_type, PlanType::Monthly);
        assert_eq!(renewed.paid_amount, 118_000);
        assert_eq!(renewed.end_at, t0() + Duration::days(60));
    }

    #[test]
    fn state_distinguishes_missing_and_expired() {
        let e = Enrollment::purchase(None, UserId::new(), ClassId::new(), weekly(1), t0());
        assert_eq!(EnrollmentState::of(None, t0()), EnrollmentState::Missing);
        assert_eq!(EnrollmentState::of(Some(&e), t0()), EnrollmentState::Active);
        assert_eq!(EnrollmentState::of(Some(&e), e.end_at), EnrollmentState::Expired);
    }

    #[test]
    fn duration_units_coercion() {
        assert_eq!(DurationUnits::coerce(&json!(3)).get(), 3);
        assert_eq!(DurationUnits::coerce(&json!("4")).get(), 4);
        assert_eq!(DurationUnits::coerce(&json!(2.9)).get(), 2);
        assert_eq!(DurationUnits::coerce(&json!(0)).get(), 1);
        assert_eq!(DurationUnits::coerce(&json!(-3)).get(), 1);
        assert_eq!(DurationUnits::coerce(&json!("abc")).get(), 1);
        assert_eq!(DurationUnits::coerce(&json!(null)).get(), 1);
        assert_eq!(DurationUnits::coerce(&json!([2])).get(), 1);
    }

    #[test]
    fn purchase_units_above_cap_are_rejected() {
        assert_eq!(DurationUnits::for_purchase(&json!(520)).unwrap().get(), 520);
        assert_eq!(DurationUnits::for_purchase(&json!("abc")).unwrap(), DurationUnits::ONE);
        assert!(matches!(
            DurationUnits::for_purchase(&json!(521)),
            Err(DomainError::Validation(_))
        ));
        assert!(DurationUnits::for_purchase(&json!(1e15)).is_err());
        assert!(DurationUnits::for_purchase(&json!("99999999999")).is_err());
    }

    #[test]
    fn plan_type_parsing() {
        assert_eq!("Weekly".parse::<PlanType>().unwrap(), PlanType::Weekly);
        assert_eq!(" monthly ".parse::<PlanType>().unwrap(), PlanType::Monthly);
        assert!("yearly".parse::<PlanType>().is_err());
    }

    #[test]
    fn absurd_durations_saturate_instead_of_panicking() {
        let end = compute_end_at(PlanType::Monthly, DurationUnits::from_i64(i64::MAX), t0());
        assert!(end > t0());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: end date is exactly `block_days * units` days after purchase.
        #[test]
        fn end_at_is_linear_in_units(units in 1i64..520, monthly in any::<bool>()) {
            let plan = if monthly { PlanType::Monthly } else { PlanType::Weekly };
            let end = compute_end_at(plan, DurationUnits::from_i64(units), t0());
            prop_assert_eq!(end - t0(), Duration::days(plan.block_days() * units));
        }

        /// Property: coerced units are never below one.
        #[test]
        fn coerced_units_are_positive(raw in any::<i64>()) {
            prop_assert!(DurationUnits::coerce(&json!(raw)).get() >= 1);
        }
    }
}
