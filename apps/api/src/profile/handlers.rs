//! Onboarding, profile editing and the dashboard summary.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::guidance::handlers::TaskProgress;
use crate::guidance::store::list_active_tasks;
use crate::models::guidance::{GuidanceTaskRow, TaskStatus};
use crate::models::profile::{FunnelStage, ProfileRow};
use crate::profile::store::{find_profile, require_profile, sync_stage, upsert_profile};
use crate::profile::validation::{validate_profile, ProfileInput, ProfileUpdate};
use crate::shortlist::handlers::{scored_entries, ShortlistEntry};
use crate::shortlist::store::list_entries;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileRow,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUser {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user: DashboardUser,
    pub profile: Option<ProfileRow>,
    pub onboarding_complete: bool,
    pub stage: FunnelStage,
    pub shortlist_count: usize,
    pub locked_university: Option<ShortlistEntry>,
    pub task_progress: TaskProgress,
    pub next_task: Option<GuidanceTaskRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/onboarding
///
/// Creates the profile, or replaces every field of an existing one.
pub async fn handle_onboarding(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProfileInput>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError> {
    let input = input.normalized();
    validate_profile(&input)?;

    let existed = find_profile(&state.db, user.id).await?.is_some();
    let profile = save(&state, &user, &input).await?;

    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ProfileResponse { profile })))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = require_profile(&state.db, user.id).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// PUT /api/v1/profile
///
/// Partial update: absent fields keep their stored value.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    let current = require_profile(&state.db, user.id).await?;
    let input = ProfileInput::from_row(&current).apply(update).normalized();
    validate_profile(&input)?;

    let profile = save(&state, &user, &input).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let profile = find_profile(&state.db, user.id).await?;
    let entries = list_entries(&state.db, user.id).await?;
    let tasks = list_active_tasks(&state.db, user.id).await?;

    let shortlist_count = entries.len();
    let has_lock = entries.iter().any(|(entry, _)| entry.locked);
    let stage = FunnelStage::for_shortlist(shortlist_count as i64, has_lock);

    let locked_university = scored_entries(&state, profile.as_ref(), entries)
        .into_iter()
        .find(|e| e.entry.locked);

    Ok(Json(DashboardResponse {
        user: DashboardUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
        onboarding_complete: profile.as_ref().is_some_and(|p| p.onboarding_complete),
        profile,
        stage,
        shortlist_count,
        locked_university,
        task_progress: TaskProgress::of(&tasks),
        next_task: next_pending_task(tasks),
    }))
}

async fn save(
    state: &AppState,
    user: &CurrentUser,
    input: &ProfileInput,
) -> Result<ProfileRow, AppError> {
    let mut profile = upsert_profile(&state.db, user.id, input).await?;
    if let Some(stage) = sync_stage(&state.db, user.id).await? {
        profile.stage = stage.as_str().to_string();
    }
    Ok(profile)
}

/// The pending task due soonest.
fn next_pending_task(tasks: Vec<GuidanceTaskRow>) -> Option<GuidanceTaskRow> {
    tasks
        .into_iter()
        .filter(|t| TaskStatus::parse(&t.status) == TaskStatus::Pending)
        .min_by_key(|t| t.due_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn task(title: &str, status: &str, days: i64) -> GuidanceTaskRow {
        GuidanceTaskRow {
            id: Uuid::new_v4(),
            shortlist_id: Uuid::nil(),
            user_id: Uuid::nil(),
            title: title.to_string(),
            category: "Documents".to_string(),
            status: status.to_string(),
            due_date: Utc::now() + Duration::days(days),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_task_skips_completed() {
        let tasks = vec![
            task("Gather academic transcripts", "completed", 7),
            task("Request letters of recommendation", "pending", 21),
            task("Finalize statement of purpose", "pending", 14),
        ];
        let next = next_pending_task(tasks).unwrap();
        assert_eq!(next.title, "Finalize statement of purpose");
    }

    #[test]
    fn test_no_next_task_when_all_done() {
        assert!(next_pending_task(vec![task("Apply for student visa", "completed", 90)]).is_none());
        assert!(next_pending_task(Vec::new()).is_none());
    }
}
