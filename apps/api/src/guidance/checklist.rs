//! The fixed application checklist materialised when a university is locked.

use chrono::{DateTime, Duration, Utc};

/// (title, category, days until due)
const CHECKLIST: &[(&str, &str, i64)] = &[
    ("Gather academic transcripts", "Documents", 7),
    ("Finalize statement of purpose", "Documents", 14),
    ("Request letters of recommendation", "Documents", 21),
    ("Prepare proof of funds", "Finance", 30),
    ("Submit application", "Application", 45),
    ("Apply for student visa", "Visa", 90),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub title: &'static str,
    pub category: &'static str,
    pub due_date: DateTime<Utc>,
}

/// The full checklist with due dates counted from `now`.
pub fn plan_checklist(now: DateTime<Utc>) -> Vec<PlannedTask> {
    CHECKLIST
        .iter()
        .map(|&(title, category, days)| PlannedTask {
            title,
            category,
            due_date: now + Duration::days(days),
        })
        .collect()
}

/// Tasks to insert when locking an entry that already has `existing` tasks.
/// Only an entry without any tasks gets the checklist; re-locking never duplicates it.
pub fn tasks_to_create(existing: i64, now: DateTime<Utc>) -> Vec<PlannedTask> {
    if existing > 0 {
        Vec::new()
    } else {
        plan_checklist(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_lock_creates_full_checklist() {
        let now = Utc::now();
        let tasks = tasks_to_create(0, now);
        assert_eq!(tasks.len(), CHECKLIST.len());
        let titles: HashSet<_> = tasks.iter().map(|t| t.title).collect();
        assert_eq!(titles.len(), tasks.len(), "titles must be unique");
    }

    #[test]
    fn test_due_dates_strictly_in_future() {
        let now = Utc::now();
        for task in plan_checklist(now) {
            assert!(task.due_date > now, "{} is not in the future", task.title);
        }
    }

    #[test]
    fn test_relock_creates_nothing() {
        let now = Utc::now();
        let first = tasks_to_create(0, now);
        assert!(tasks_to_create(first.len() as i64, now).is_empty());
        assert!(tasks_to_create(1, now).is_empty());
    }

    #[test]
    fn test_checklist_is_fixed() {
        let a = plan_checklist(Utc::now());
        let b = plan_checklist(Utc::now());
        let titles_a: Vec<_> = a.iter().map(|t| (t.title, t.category)).collect();
        let titles_b: Vec<_> = b.iter().map(|t| (t.title, t.category)).collect();
        assert_eq!(titles_a, titles_b);
    }
}
