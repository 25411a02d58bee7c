use std::collections::HashMap;

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::guidance::checklist::tasks_to_create;
use crate::guidance::store::{count_tasks, insert_tasks};
use crate::models::shortlist::ShortlistRow;
use crate::models::university::UniversityRow;
use crate::universities::store::{get_universities, get_university};

#[derive(Debug, Clone)]
pub enum AddOutcome {
    Added(ShortlistRow),
    AlreadyExists(ShortlistRow),
}

impl AddOutcome {
    pub fn entry(&self) -> &ShortlistRow {
        match self {
            AddOutcome::Added(row) | AddOutcome::AlreadyExists(row) => row,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LockOutcome {
    Locked { entry: ShortlistRow, tasks_created: usize },
    AlreadyLocked(ShortlistRow),
}

impl LockOutcome {
    pub fn entry(&self) -> &ShortlistRow {
        match self {
            LockOutcome::Locked { entry, .. } | LockOutcome::AlreadyLocked(entry) => entry,
        }
    }
}

/// What locking `university_id` means given the user's current entries.
#[derive(Debug, PartialEq)]
pub(crate) enum LockDecision {
    Lock(Uuid),
    AlreadyLocked,
}

/// Adds a university to the user's shortlist. An existing entry is reported,
/// not duplicated.
pub async fn add_to_shortlist(
    pool: &PgPool,
    user_id: Uuid,
    university_id: Uuid,
) -> Result<AddOutcome, AppError> {
    get_university(pool, university_id).await?;

    let inserted = sqlx::query_as::<_, ShortlistRow>(
        r#"
        INSERT INTO shortlists (id, user_id, university_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, university_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(university_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = inserted {
        info!("User {user_id} shortlisted university {university_id}");
        return Ok(AddOutcome::Added(row));
    }

    let existing = sqlx::query_as::<_, ShortlistRow>(
        "SELECT * FROM shortlists WHERE user_id = $1 AND university_id = $2",
    )
    .bind(user_id)
    .bind(university_id)
    .fetch_one(pool)
    .await?;
    Ok(AddOutcome::AlreadyExists(existing))
}

pub async fn remove_from_shortlist(
    pool: &PgPool,
    user_id: Uuid,
    university_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM shortlists WHERE user_id = $1 AND university_id = $2")
        .bind(user_id)
        .bind(university_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_shortlisted(university_id));
    }
    info!("User {user_id} removed university {university_id} from shortlist");
    Ok(())
}

/// Shortlist entries with their universities, oldest first.
pub async fn list_entries(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(ShortlistRow, UniversityRow)>, AppError> {
    let rows = sqlx::query_as::<_, ShortlistRow>(
        "SELECT * FROM shortlists WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.university_id).collect();
    let mut universities: HashMap<Uuid, UniversityRow> = get_universities(pool, &ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let university = universities.remove(&row.university_id)?;
            Some((row, university))
        })
        .collect())
}

/// Locks one shortlist entry and materialises its checklist.
///
/// The user's entries are row-locked for the duration of the transaction so
/// two concurrent lock requests cannot both succeed.
pub async fn lock_entry(
    pool: &PgPool,
    user_id: Uuid,
    university_id: Uuid,
) -> Result<LockOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let entries = sqlx::query_as::<_, ShortlistRow>(
        "SELECT * FROM shortlists WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let entry_id = match decide_lock(&entries, university_id)? {
        LockDecision::AlreadyLocked => {
            let entry = entries
                .into_iter()
                .find(|e| e.university_id == university_id)
                .ok_or_else(|| not_shortlisted(university_id))?;
            tx.commit().await?;
            return Ok(LockOutcome::AlreadyLocked(entry));
        }
        LockDecision::Lock(id) => id,
    };

    let entry = sqlx::query_as::<_, ShortlistRow>(
        "UPDATE shortlists SET locked = TRUE, locked_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(entry_id)
    .fetch_one(&mut *tx)
    .await?;

    let existing = count_tasks(&mut tx, entry.id).await?;
    let planned = tasks_to_create(existing, Utc::now());
    insert_tasks(&mut tx, user_id, entry.id, &planned).await?;

    tx.commit().await?;
    info!("User {user_id} locked university {university_id}");

    Ok(LockOutcome::Locked {
        entry,
        tasks_created: planned.len(),
    })
}

/// Unlocks an entry. Its guidance tasks are kept for a later re-lock.
pub async fn unlock_entry(
    pool: &PgPool,
    user_id: Uuid,
    university_id: Uuid,
) -> Result<ShortlistRow, AppError> {
    let row = sqlx::query_as::<_, ShortlistRow>(
        r#"
        UPDATE shortlists SET locked = FALSE, locked_at = NULL
        WHERE user_id = $1 AND university_id = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(university_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_shortlisted(university_id))?;

    info!("User {user_id} unlocked university {university_id}");
    Ok(row)
}

/// A user may hold at most one lock; a different locked entry is a conflict.
pub(crate) fn decide_lock(
    entries: &[ShortlistRow],
    university_id: Uuid,
) -> Result<LockDecision, AppError> {
    let target = entries
        .iter()
        .find(|e| e.university_id == university_id)
        .ok_or_else(|| not_shortlisted(university_id))?;

    if target.locked {
        return Ok(LockDecision::AlreadyLocked);
    }
    if entries.iter().any(|e| e.locked) {
        return Err(AppError::Conflict(
            "Another university is already locked; unlock it first".to_string(),
        ));
    }
    Ok(LockDecision::Lock(target.id))
}

fn not_shortlisted(university_id: Uuid) -> AppError {
    AppError::NotFound(format!("University {university_id} is not in your shortlist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(university_id: Uuid, locked: bool) -> ShortlistRow {
        ShortlistRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            university_id,
            locked,
            locked_at: locked.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lock_unlocked_entry() {
        let target = Uuid::new_v4();
        let entries = vec![entry(Uuid::new_v4(), false), entry(target, false)];
        assert_eq!(
            decide_lock(&entries, target).unwrap(),
            LockDecision::Lock(entries[1].id)
        );
    }

    #[test]
    fn test_relock_is_idempotent() {
        let target = Uuid::new_v4();
        let entries = vec![entry(target, true)];
        assert_eq!(decide_lock(&entries, target).unwrap(), LockDecision::AlreadyLocked);
    }

    #[test]
    fn test_second_lock_conflicts() {
        let target = Uuid::new_v4();
        let entries = vec![entry(Uuid::new_v4(), true), entry(target, false)];
        assert!(matches!(
            decide_lock(&entries, target),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_lock_requires_shortlisted_university() {
        let entries = vec![entry(Uuid::new_v4(), false)];
        assert!(matches!(
            decide_lock(&entries, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(decide_lock(&[], Uuid::new_v4()), Err(AppError::NotFound(_))));
    }
}
