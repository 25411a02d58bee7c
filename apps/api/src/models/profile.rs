use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Position of the student in the counseling funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunnelStage {
    Discovery,
    Shortlist,
    Guidance,
}

impl FunnelStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FunnelStage::Discovery => "DISCOVERY",
            FunnelStage::Shortlist => "SHORTLIST",
            FunnelStage::Guidance => "GUIDANCE",
        }
    }

    /// Stage implied by the student's shortlist state.
    pub fn for_shortlist(entry_count: i64, has_lock: bool) -> Self {
        if has_lock {
            FunnelStage::Guidance
        } else if entry_count > 0 {
            FunnelStage::Shortlist
        } else {
            FunnelStage::Discovery
        }
    }
}

/// Profile as stored. Academic and budget fields are kept as the student
/// entered them; `matching::canonical` is responsible for interpreting them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_degree: String,
    pub target_major: String,
    pub target_intake: Option<String>,
    pub gpa: Option<String>,
    pub gpa_scale: Option<String>,
    pub english_test: Option<String>,
    pub test_score: Option<String>,
    pub budget: Option<String>,
    pub preferred_countries: Vec<String>,
    pub stage: String,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_shortlist_state() {
        assert_eq!(FunnelStage::for_shortlist(0, false), FunnelStage::Discovery);
        assert_eq!(FunnelStage::for_shortlist(3, false), FunnelStage::Shortlist);
        assert_eq!(FunnelStage::for_shortlist(1, true), FunnelStage::Guidance);
    }

    #[test]
    fn test_stage_serializes_like_stored_value() {
        for stage in [FunnelStage::Discovery, FunnelStage::Shortlist, FunnelStage::Guidance] {
            assert_eq!(serde_json::to_value(stage).unwrap(), stage.as_str());
        }
    }
}
