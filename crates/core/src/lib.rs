//! `lessonbay-core`: identifiers and the shared domain error model.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{ClassId, UserId};
