use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{FunnelStage, ProfileRow};
use crate::profile::validation::ProfileInput;

pub async fn find_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, AppError> {
    Ok(
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn require_profile(pool: &PgPool, user_id: Uuid) -> Result<ProfileRow, AppError> {
    find_profile(pool, user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Profile not found; complete onboarding first".to_string())
        })
}

/// Inserts or replaces the profile of `user_id`. The funnel stage is not
/// touched by an update; a fresh profile starts in DISCOVERY.
pub async fn upsert_profile(
    pool: &PgPool,
    user_id: Uuid,
    input: &ProfileInput,
) -> Result<ProfileRow, AppError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        INSERT INTO profiles
            (id, user_id, target_degree, target_major, target_intake, gpa, gpa_scale,
             english_test, test_score, budget, preferred_countries, stage, onboarding_complete)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE)
        ON CONFLICT (user_id) DO UPDATE SET
            target_degree = EXCLUDED.target_degree,
            target_major = EXCLUDED.target_major,
            target_intake = EXCLUDED.target_intake,
            gpa = EXCLUDED.gpa,
            gpa_scale = EXCLUDED.gpa_scale,
            english_test = EXCLUDED.english_test,
            test_score = EXCLUDED.test_score,
            budget = EXCLUDED.budget,
            preferred_countries = EXCLUDED.preferred_countries,
            onboarding_complete = TRUE,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&input.target_degree)
    .bind(&input.target_major)
    .bind(&input.target_intake)
    .bind(&input.gpa)
    .bind(&input.gpa_scale)
    .bind(&input.english_test)
    .bind(&input.test_score)
    .bind(&input.budget)
    .bind(&input.preferred_countries)
    .bind(FunnelStage::Discovery.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Recomputes the funnel stage from shortlist state and stores it.
/// Returns `None` when the user has no profile yet.
pub async fn sync_stage(pool: &PgPool, user_id: Uuid) -> Result<Option<FunnelStage>, AppError> {
    let (entry_count, lock_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE locked)
        FROM shortlists
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let stage = FunnelStage::for_shortlist(entry_count, lock_count > 0);

    let updated: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE profiles SET stage = $1, updated_at = now()
        WHERE user_id = $2 AND stage <> $1
        RETURNING stage
        "#,
    )
    .bind(stage.as_str())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if updated.is_some() {
        info!("User {user_id} moved to stage {}", stage.as_str());
        return Ok(Some(stage));
    }
    let has_profile: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(has_profile.then_some(stage))
}
