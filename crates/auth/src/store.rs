//! Read/write contracts for the external relational store.
//!
//! Implementations live in `lessonbay-infra` (in-memory for dev/tests, Postgres
//! behind a feature).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use lessonbay_core::{ClassId, UserId};

use crate::{ClassResource, Enrollment, Principal};

/// Storage failure. Never to be read as "no entitlement".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;
    async fn upsert(&self, user: Principal) -> Result<Principal, StoreError>;

    /// Insert `user` when no row exists; otherwise refresh only `email` and
    /// `display_name` and leave role and suspension as stored. Returns the stored row.
    async fn sync_profile(&self, user: Principal) -> Result<Principal, StoreError>;

    async fn list(&self) -> Result<Vec<Principal>, StoreError>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn get_by_id(&self, id: ClassId) -> Result<Option<ClassResource>, StoreError>;
    async fn insert(&self, class: ClassResource) -> Result<ClassResource, StoreError>;
    /// Returns whether a class was removed.
    async fn delete(&self, id: ClassId) -> Result<bool, StoreError>;
    async fn list(&self) -> Result<Vec<ClassResource>, StoreError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn get_by_user_and_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
    ) -> Result<Option<Enrollment>, StoreError>;

    /// Insert or overwrite the single row for `(user_id, class_id)`.
    async fn upsert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError>;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn get_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        (**self).get_by_id(id).await
    }

    async fn upsert(&self, user: Principal) -> Result<Principal, StoreError> {
        (**self).upsert(user).await
    }

    async fn sync_profile(&self, user: Principal) -> Result<Principal, StoreError> {
        (**self).sync_profile(user).await
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        (**self).list().await
    }
}

#[async_trait]
impl<S> ClassStore for Arc<S>
where
    S: ClassStore + ?Sized,
{
    async fn get_by_id(&self, id: ClassId) -> Result<Option<ClassResource>, StoreError> {
        (**self).get_by_id(id).await
    }

    async fn insert(&self, class: ClassResource) -> Result<ClassResource, StoreError> {
        (**self).insert(class).await
    }

    async fn delete(&self, id: ClassId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn list(&self) -> Result<Vec<ClassResource>, StoreError> {
        (**self).list().await
    }
}

#[async_trait]
impl<S> EnrollmentStore for Arc<S>
where
    S: EnrollmentStore + ?Sized,
{
    async fn get_by_user_and_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
    ) -> Result<Option<Enrollment>, StoreError> {
        (**self).get_by_user_and_class(user_id, class_id).await
    }

    async fn upsert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError> {
        (**self).upsert(enrollment).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        (**self).list_for_user(user_id).await
    }
}
