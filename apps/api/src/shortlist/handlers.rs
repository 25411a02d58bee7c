use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::profile::{FunnelStage, ProfileRow};
use crate::models::shortlist::ShortlistRow;
use crate::models::university::UniversityRow;
use crate::profile::store::{find_profile, sync_stage};
use crate::shortlist::store::{
    add_to_shortlist, list_entries, lock_entry, remove_from_shortlist, unlock_entry, AddOutcome,
    LockOutcome,
};
use crate::state::AppState;
use crate::universities::handlers::ScoredUniversity;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddShortlistRequest {
    pub university_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistEntry {
    #[serde(flatten)]
    pub entry: ShortlistRow,
    pub university: ScoredUniversity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistResponse {
    pub entries: Vec<ShortlistEntry>,
    pub locked_university_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistChangeResponse {
    pub entry: ShortlistRow,
    pub already_existed: bool,
    pub stage: Option<FunnelStage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResponse {
    pub entry: ShortlistRow,
    pub tasks_created: usize,
    pub stage: Option<FunnelStage>,
}

pub fn scored_entries(
    state: &AppState,
    profile: Option<&ProfileRow>,
    entries: Vec<(ShortlistRow, UniversityRow)>,
) -> Vec<ShortlistEntry> {
    entries
        .into_iter()
        .map(|(entry, university)| ShortlistEntry {
            entry,
            university: ScoredUniversity::score(state.match_scorer.as_ref(), profile, university),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/shortlist
pub async fn handle_list_shortlist(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ShortlistResponse>, AppError> {
    let profile = find_profile(&state.db, user.id).await?;
    let entries = scored_entries(&state, profile.as_ref(), list_entries(&state.db, user.id).await?);
    let locked_university_id = entries
        .iter()
        .find(|e| e.entry.locked)
        .map(|e| e.entry.university_id);

    Ok(Json(ShortlistResponse {
        entries,
        locked_university_id,
    }))
}

/// POST /api/v1/shortlist
///
/// 201 when the entry is new, 200 when the university was already shortlisted.
pub async fn handle_add_to_shortlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddShortlistRequest>,
) -> Result<(StatusCode, Json<ShortlistChangeResponse>), AppError> {
    let outcome = add_to_shortlist(&state.db, user.id, req.university_id).await?;
    let stage = sync_stage(&state.db, user.id).await?;

    let (status, already_existed) = match &outcome {
        AddOutcome::Added(_) => (StatusCode::CREATED, false),
        AddOutcome::AlreadyExists(_) => (StatusCode::OK, true),
    };
    Ok((
        status,
        Json(ShortlistChangeResponse {
            entry: outcome.entry().clone(),
            already_existed,
            stage,
        }),
    ))
}

/// DELETE /api/v1/shortlist/:university_id
pub async fn handle_remove_from_shortlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(university_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    remove_from_shortlist(&state.db, user.id, university_id).await?;
    sync_stage(&state.db, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/shortlist/:university_id/lock
///
/// 409 when a different university is already locked.
pub async fn handle_lock(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(university_id): Path<Uuid>,
) -> Result<Json<LockResponse>, AppError> {
    let outcome = lock_entry(&state.db, user.id, university_id).await?;
    let stage = sync_stage(&state.db, user.id).await?;

    let tasks_created = match &outcome {
        LockOutcome::Locked { tasks_created, .. } => *tasks_created,
        LockOutcome::AlreadyLocked(_) => 0,
    };
    Ok(Json(LockResponse {
        entry: outcome.entry().clone(),
        tasks_created,
        stage,
    }))
}

/// POST /api/v1/shortlist/:university_id/unlock
pub async fn handle_unlock(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(university_id): Path<Uuid>,
) -> Result<Json<LockResponse>, AppError> {
    let entry = unlock_entry(&state.db, user.id, university_id).await?;
    let stage = sync_stage(&state.db, user.id).await?;
    Ok(Json(LockResponse {
        entry,
        tasks_created: 0,
        stage,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_add_request_accepts_camel_case() {
        let id = Uuid::new_v4();
        let req: AddShortlistRequest =
            serde_json::from_value(serde_json::json!({ "universityId": id })).unwrap();
        assert_eq!(req.university_id, id);
    }

    #[test]
    fn test_lock_response_shape() {
        let response = LockResponse {
            entry: ShortlistRow {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                university_id: Uuid::new_v4(),
                locked: true,
                locked_at: Some(Utc::now()),
                created_at: Utc::now(),
            },
            tasks_created: 6,
            stage: Some(FunnelStage::Guidance),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tasksCreated"], 6);
        assert_eq!(json["stage"], "GUIDANCE");
        assert_eq!(json["entry"]["locked"], true);
    }
}
