use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::guidance::checklist::PlannedTask;
use crate::models::guidance::{GuidanceTaskRow, TaskStatus};

/// Tasks of the user's currently locked shortlist entry, soonest first.
pub async fn list_active_tasks(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<GuidanceTaskRow>, AppError> {
    Ok(sqlx::query_as::<_, GuidanceTaskRow>(
        r#"
        SELECT t.*
        FROM guidance_tasks t
        JOIN shortlists s ON s.id = t.shortlist_id
        WHERE t.user_id = $1 AND s.locked
        ORDER BY t.due_date ASC, t.title ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn count_tasks(
    tx: &mut Transaction<'_, Postgres>,
    shortlist_id: Uuid,
) -> Result<i64, AppError> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM guidance_tasks WHERE shortlist_id = $1")
            .bind(shortlist_id)
            .fetch_one(&mut **tx)
            .await?,
    )
}

pub async fn insert_tasks(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    shortlist_id: Uuid,
    tasks: &[PlannedTask],
) -> Result<(), AppError> {
    for task in tasks {
        sqlx::query(
            r#"
            INSERT INTO guidance_tasks (id, shortlist_id, user_id, title, category, status, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(shortlist_id)
        .bind(user_id)
        .bind(task.title)
        .bind(task.category)
        .bind(TaskStatus::Pending.as_str())
        .bind(task.due_date)
        .execute(&mut **tx)
        .await?;
    }
    if !tasks.is_empty() {
        info!("Created {} guidance tasks for shortlist entry {shortlist_id}", tasks.len());
    }
    Ok(())
}

/// Flips status in one statement so concurrent toggles serialise on the row.
const TOGGLE_TASK_SQL: &str = r#"
    UPDATE guidance_tasks
    SET status = CASE WHEN lower(status) = 'completed' THEN 'pending' ELSE 'completed' END
    WHERE id = $1 AND user_id = $2
    RETURNING *
"#;

/// Flips a task between pending and completed. The only mutation tasks allow.
pub async fn toggle_task(
    pool: &PgPool,
    user_id: Uuid,
    task_id: Uuid,
) -> Result<GuidanceTaskRow, AppError> {
    sqlx::query_as::<_, GuidanceTaskRow>(TOGGLE_TASK_SQL)
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {task_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_one_owner_scoped_update() {
        let sql = TOGGLE_TASK_SQL.trim();
        assert!(sql.starts_with("UPDATE guidance_tasks"));
        assert!(!sql.contains("SELECT"));
        assert!(sql.contains("WHERE id = $1 AND user_id = $2"));
        assert!(sql.contains(&format!(
            "= '{}' THEN '{}' ELSE '{}' END",
            TaskStatus::Completed.as_str(),
            TaskStatus::Pending.as_str(),
            TaskStatus::Completed.as_str()
        )));
    }
}
