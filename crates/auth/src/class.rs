use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lessonbay_core::{ClassId, UserId};

/// Class reference data as the gate sees it.
///
/// The gate only needs `id` and `teacher_id`; the rest is listing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassResource {
    pub id: ClassId,
    pub teacher_id: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl ClassResource {
    pub fn new(id: ClassId, teacher_id: UserId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            teacher_id,
            title: title.into(),
            created_at,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.teacher_id == user_id
    }
}
