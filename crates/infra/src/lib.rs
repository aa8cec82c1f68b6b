//! Infrastructure layer: stores, process-local moderation and rate-limit state, and
//! adapters for the mail and conferencing providers.

pub mod mailer;
pub mod moderation;
pub mod otp;
pub mod rate_limit;
pub mod room;
pub mod store;
pub mod sweeper;


pub use mailer::{Mailer, MailerError, TracingMailer};
pub use moderation::InMemoryModerationRegistry;
pub use otp::{OneTimeCodeStore, OtpError};
pub use rate_limit::{BucketStats, FixedWindowLimiter, RateLimitRule};
pub use room::{LocalRoomOperator, RoomError, RoomGrant, RoomOperator, RoomToken};
pub use sweeper::{spawn_sweeper, Sweep};
pub use store::{InMemoryClassStore, InMemoryEnrollmentStore, InMemoryUserStore};
#[cfg(feature = "postgres")]
pub use store::{PostgresClassStore, PostgresEnrollmentStore, PostgresUserStore};
