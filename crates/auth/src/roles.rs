use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform role of a principal.
///
/// The identity provider only *suggests* a role; once a local record exists the
/// stored role wins (see [`crate::identity::reconcile`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    /// Interpret a provider-declared role hint.
    ///
    /// Anything other than exactly `teacher` or `admin` (including a missing hint)
    /// is a student.
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some("teacher") => Role::Teacher,
            Some("admin") => Role::Admin,
            _ => Role::Student,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
