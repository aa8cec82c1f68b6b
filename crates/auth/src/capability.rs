use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named protected action on a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    JoinLive,
    ViewReplay,
    ViewMaterials,
    ViewAssignments,
    PostChat,
    PostQna,
    RecordAttendance,
    TrackProgress,
    PostReview,
    /// Create/delete/grade, and moderation (kick) on an existing class.
    ManageClass,
    /// Buy or renew an enrollment.
    Enroll,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::JoinLive,
        Capability::ViewReplay,
        Capability::ViewMaterials,
        Capability::ViewAssignments,
        Capability::PostChat,
        Capability::PostQna,
        Capability::RecordAttendance,
        Capability::TrackProgress,
        Capability::PostReview,
        Capability::ManageClass,
        Capability::Enroll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::JoinLive => "join_live",
            Capability::ViewReplay => "view_replay",
            Capability::ViewMaterials => "view_materials",
            Capability::ViewAssignments => "view_assignments",
            Capability::PostChat => "post_chat",
            Capability::PostQna => "post_qna",
            Capability::RecordAttendance => "record_attendance",
            Capability::TrackProgress => "track_progress",
            Capability::PostReview => "post_review",
            Capability::ManageClass => "manage_class",
            Capability::Enroll => "enroll",
        }
    }

    /// Participation and content access: what an active enrollment (or ownership) unlocks.
    pub fn is_content(&self) -> bool {
        !matches!(self, Capability::PostReview | Capability::ManageClass | Capability::Enroll)
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
            assert_eq!(serde_json::to_value(cap).unwrap(), cap.as_str());
        }
    }

    #[test]
    fn content_group() {
        let content: Vec<_> = Capability::ALL.into_iter().filter(Capability::is_content).collect();
        assert_eq!(content.len(), 8);
        assert!(!Capability::PostReview.is_content());
        assert!("teleport".parse::<Capability>().is_err());
    }
}
