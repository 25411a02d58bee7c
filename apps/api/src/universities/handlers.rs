//! University discovery: catalogue search scored against the student's profile,
//! with the public directory as a fallback for names the catalogue lacks.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::matching::canonical::{canonical_country, directory_country};
use crate::matching::{score_row, MatchCategory, MatchResult, MatchScorer};
use crate::models::profile::ProfileRow;
use crate::models::university::UniversityRow;
use crate::profile::store::find_profile;
use crate::state::AppState;
use crate::universities::directory::DirectoryEntry;
use crate::universities::store::{get_university, import_directory_entries, search_catalogue};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UniversityQuery {
    pub search: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// A university with its match against the caller's profile. `match` is null
/// until the student has onboarded.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredUniversity {
    #[serde(flatten)]
    pub university: UniversityRow,
    #[serde(rename = "match")]
    pub match_result: Option<MatchResult>,
}

impl ScoredUniversity {
    pub fn score(
        scorer: &dyn MatchScorer,
        profile: Option<&ProfileRow>,
        university: UniversityRow,
    ) -> Self {
        let match_result = profile.map(|p| score_row(scorer, p, &university));
        Self {
            university,
            match_result,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityListResponse {
    pub universities: Vec<ScoredUniversity>,
    pub total: usize,
    /// True when results came from the external directory rather than the catalogue.
    pub from_directory: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/universities
///
/// Catalogue search filtered by country and match category, ranked by match
/// percentage when the student has a profile. A named search with no catalogue
/// hit is forwarded to the directory and the results imported.
pub async fn handle_list_universities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<UniversityQuery>,
) -> Result<Json<UniversityListResponse>, AppError> {
    let search = non_blank(query.search.as_deref());
    let country = non_blank(query.country.as_deref());
    let category = match non_blank(query.category.as_deref()) {
        Some(raw) => Some(MatchCategory::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("Unknown category '{raw}'; use SAFE, TARGET or DREAM"))
        })?),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let profile = find_profile(&state.db, user.id).await?;
    if category.is_some() && profile.is_none() {
        return Err(AppError::Validation(
            "Filtering by category requires a completed profile".to_string(),
        ));
    }

    let mut rows = filter_by_country(search_catalogue(&state.db, search).await?, country);
    let mut from_directory = false;

    if rows.is_empty() {
        if let Some(name) = search {
            let entries = discover(&state, name, country).await;
            rows = filter_by_country(import_directory_entries(&state.db, &entries).await?, country);
            from_directory = !rows.is_empty();
        }
    }

    let scored = rows
        .into_iter()
        .map(|row| ScoredUniversity::score(state.match_scorer.as_ref(), profile.as_ref(), row))
        .collect();
    let universities = rank_and_filter(scored, category, limit);

    Ok(Json(UniversityListResponse {
        total: universities.len(),
        universities,
        from_directory,
    }))
}

/// GET /api/v1/universities/:id
pub async fn handle_get_university(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoredUniversity>, AppError> {
    let university = get_university(&state.db, id).await?;
    let profile = find_profile(&state.db, user.id).await?;
    Ok(Json(ScoredUniversity::score(
        state.match_scorer.as_ref(),
        profile.as_ref(),
        university,
    )))
}

/// Directory lookup through the cache. Upstream failures degrade to no results.
/// The directory indexes full country names, so aliases are folded first.
async fn discover(state: &AppState, name: &str, country: Option<&str>) -> Vec<DirectoryEntry> {
    let country = country.and_then(directory_country);
    let country = country.as_deref();
    if let Some(cached) = state.directory_cache.get(name, country).await {
        info!("Directory cache hit for '{name}'");
        return cached;
    }

    match state.directory.search(name, country).await {
        Ok(entries) => {
            state.directory_cache.put(name, country, &entries).await;
            entries
        }
        Err(e) => {
            warn!("Directory search for '{name}' failed: {e}");
            Vec::new()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Keeps rows whose country matches `country` after alias folding.
pub fn filter_by_country(rows: Vec<UniversityRow>, country: Option<&str>) -> Vec<UniversityRow> {
    let Some(wanted) = country.and_then(canonical_country) else {
        return rows;
    };
    rows.into_iter()
        .filter(|row| canonical_country(&row.country).as_deref() == Some(wanted.as_str()))
        .collect()
}

/// Applies the category filter, orders by match percentage (stable, so
/// catalogue rank order breaks ties) and truncates to `limit`.
pub fn rank_and_filter(
    mut scored: Vec<ScoredUniversity>,
    category: Option<MatchCategory>,
    limit: usize,
) -> Vec<ScoredUniversity> {
    if let Some(category) = category {
        scored.retain(|s| s.match_result.as_ref().map(|m| m.category) == Some(category));
    }
    scored.sort_by_key(|s| std::cmp::Reverse(s.match_result.as_ref().map(|m| m.percentage)));
    scored.truncate(limit);
    scored
}
