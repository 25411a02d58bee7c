use std::collections::HashSet;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::university::UniversityRow;
use crate::universities::directory::DirectoryEntry;

/// Minimum Jaro-Winkler similarity for a fuzzy name hit.
pub const FUZZY_NAME_THRESHOLD: f64 = 0.85;
const CATALOGUE_SCAN_LIMIT: i64 = 500;

const NAME_STOPWORDS: &[&str] = &["of", "the", "and", "at", "for", "in", "de"];

/// Catalogue rows whose name, location or tags contain `search` (all rows when `None`).
pub async fn search_catalogue(
    pool: &PgPool,
    search: Option<&str>,
) -> Result<Vec<UniversityRow>, AppError> {
    Ok(sqlx::query_as::<_, UniversityRow>(
        r#"
        SELECT *
        FROM universities
        WHERE $1::text IS NULL
           OR name ILIKE '%' || $1 || '%'
           OR location ILIKE '%' || $1 || '%'
           OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE '%' || $1 || '%')
        ORDER BY rank ASC NULLS LAST, name ASC
        LIMIT $2
        "#,
    )
    .bind(search)
    .bind(CATALOGUE_SCAN_LIMIT)
    .fetch_all(pool)
    .await?)
}

pub async fn get_university(pool: &PgPool, id: Uuid) -> Result<UniversityRow, AppError> {
    sqlx::query_as::<_, UniversityRow>("SELECT * FROM universities WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("University {id} not found")))
}

pub async fn get_universities(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<UniversityRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UniversityRow>("SELECT * FROM universities WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?,
    )
}

/// Upserts directory results into the catalogue so they can be shortlisted.
/// Existing rows (same name and country) are returned unchanged apart from a
/// missing website being filled in.
pub async fn import_directory_entries(
    pool: &PgPool,
    entries: &[DirectoryEntry],
) -> Result<Vec<UniversityRow>, AppError> {
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let row = sqlx::query_as::<_, UniversityRow>(
            r#"
            INSERT INTO universities (id, name, location, country, tags, website, source)
            VALUES ($1, $2, $3, $4, '{}', $5, 'directory')
            ON CONFLICT (name, country) DO UPDATE
                SET website = COALESCE(universities.website, EXCLUDED.website)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.name.trim())
        .bind(entry.state_province.as_deref())
        .bind(entry.country.trim())
        .bind(entry.web_pages.first())
        .fetch_one(pool)
        .await?;
        rows.push(row);
    }
    if !rows.is_empty() {
        info!("Imported {} universities from the directory", rows.len());
    }
    Ok(rows)
}

/// Resolves a free-text university name ("MIT", "oxford uni") to a catalogue row.
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<UniversityRow>, AppError> {
    let query = name.trim();
    if query.is_empty() {
        return Ok(None);
    }

    let substring_hits = search_catalogue(pool, Some(query)).await?;
    let scan = search_catalogue(pool, None).await?;
    let candidates = merge_candidates(substring_hits, scan);
    Ok(best_name_match(query, &candidates).cloned())
}

/// Substring hits first, then the rest of the catalogue scan, without duplicates.
/// Matching runs once over the union so exact and acronym hits outrank substrings.
fn merge_candidates(hits: Vec<UniversityRow>, scan: Vec<UniversityRow>) -> Vec<UniversityRow> {
    let mut seen: HashSet<Uuid> = hits.iter().map(|row| row.id).collect();
    let mut merged = hits;
    merged.extend(scan.into_iter().filter(|row| seen.insert(row.id)));
    merged
}

fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| *w != "the")
        .collect::<Vec<_>>()
        .join(" ")
}

fn acronym(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .filter(|w| !NAME_STOPWORDS.contains(w))
        .filter_map(|w| w.chars().next())
        .collect()
}

/// Picks the best candidate for `query`: exact name, then acronym, then the
/// shortest name containing the query, then the closest Jaro-Winkler match
/// above `FUZZY_NAME_THRESHOLD`.
pub fn best_name_match<'a>(
    query: &str,
    candidates: &'a [UniversityRow],
) -> Option<&'a UniversityRow> {
    let q = normalize_name(query);
    if q.is_empty() {
        return None;
    }
    let normalized: Vec<(String, &UniversityRow)> = candidates
        .iter()
        .map(|c| (normalize_name(&c.name), c))
        .collect();

    if let Some((_, row)) = normalized.iter().find(|(n, _)| *n == q) {
        return Some(row);
    }

    let q_compact = q.replace(' ', "");
    if q_compact.len() >= 2 && !q.contains(' ') {
        if let Some((_, row)) = normalized.iter().find(|(n, _)| acronym(n) == q_compact) {
            return Some(row);
        }
    }

    if let Some((_, row)) = normalized
        .iter()
        .filter(|(n, _)| n.contains(&q))
        .min_by_key(|(n, _)| n.len())
    {
        return Some(row);
    }

    normalized
        .iter()
        .map(|(n, row)| (strsim::jaro_winkler(n, &q), *row))
        .filter(|(score, _)| *score >= FUZZY_NAME_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, row)| row)
}
