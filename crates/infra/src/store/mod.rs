//! Implementations of the user, class and enrollment store contracts.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryClassStore, InMemoryEnrollmentStore, InMemoryUserStore, KeyedStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresClassStore, PostgresEnrollmentStore, PostgresUserStore};
