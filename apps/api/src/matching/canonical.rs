//! Canonical profile and university: the normalised shapes the scorer works on.
//!
//! Stored rows keep whatever the student or the catalogue supplied ("3.9/4",
//! "$20k - $40k", "4%"). Everything here is best-effort: a field that cannot be
//! interpreted becomes `None` and the scorer treats it as "no contribution".

use std::sync::OnceLock;

use regex::Regex;

use crate::models::profile::ProfileRow;
use crate::models::university::UniversityRow;

pub const DEFAULT_GPA_SCALE: f64 = 4.0;
pub const CANONICAL_GPA_SCALE: f64 = 4.0;

// ────────────────────────────────────────────────────────────────────────────
// Canonical shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnglishTest {
    Ielts,
    Toefl,
    Pte,
    Duolingo,
}

impl EnglishTest {
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        let has_word = |word: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|w| w == word)
        };
        if lower.contains("ielts") {
            Some(EnglishTest::Ielts)
        } else if lower.contains("toefl") {
            Some(EnglishTest::Toefl)
        } else if has_word("pte") {
            Some(EnglishTest::Pte)
        } else if lower.contains("duolingo") || has_word("det") {
            Some(EnglishTest::Duolingo)
        } else {
            None
        }
    }

    pub fn max_score(self) -> f64 {
        match self {
            EnglishTest::Ielts => 9.0,
            EnglishTest::Toefl => 120.0,
            EnglishTest::Pte => 90.0,
            EnglishTest::Duolingo => 160.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EnglishTest::Ielts => "IELTS",
            EnglishTest::Toefl => "TOEFL",
            EnglishTest::Pte => "PTE",
            EnglishTest::Duolingo => "Duolingo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnglishScore {
    pub test: EnglishTest,
    /// Score divided by the test maximum, in `[0, 1]`.
    pub normalized: f64,
}

/// Annual spending ceiling derived from a budget bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    UpTo(f64),
    Unlimited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProfile {
    /// GPA on a 4.0 scale.
    pub gpa: Option<f64>,
    pub english: Option<EnglishScore>,
    pub budget: Option<Budget>,
    pub target_degree: Option<String>,
    pub target_major: Option<String>,
    /// Alias-folded, lower-cased country names.
    pub preferred_countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalUniversity {
    pub name: String,
    /// Country as displayed to the student.
    pub country_label: String,
    /// Alias-folded, lower-cased country used for comparisons.
    pub country: Option<String>,
    pub rank: Option<i32>,
    pub annual_fee: Option<f64>,
    /// Fraction in `(0, 1]`.
    pub acceptance_rate: Option<f64>,
    pub tags: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Constructors
// ────────────────────────────────────────────────────────────────────────────

pub fn create_canonical_profile(profile: &ProfileRow) -> CanonicalProfile {
    let english = match (profile.english_test.as_deref(), profile.test_score.as_deref()) {
        (Some(test), Some(score)) => parse_english_score(test, score),
        _ => None,
    };

    CanonicalProfile {
        gpa: parse_gpa(profile.gpa.as_deref(), profile.gpa_scale.as_deref()),
        english,
        budget: profile.budget.as_deref().and_then(parse_budget),
        target_degree: non_empty_lower(&profile.target_degree),
        target_major: non_empty_lower(&profile.target_major),
        preferred_countries: canonical_country_list(&profile.preferred_countries),
    }
}

pub fn create_canonical_university(university: &UniversityRow) -> CanonicalUniversity {
    CanonicalUniversity {
        name: university.name.trim().to_string(),
        country_label: university.country.trim().to_string(),
        country: canonical_country(&university.country),
        rank: university.rank.filter(|r| *r > 0),
        annual_fee: university.fees.as_deref().and_then(parse_fee),
        acceptance_rate: university
            .acceptance_rate
            .as_deref()
            .and_then(parse_acceptance_rate),
        tags: university
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field parsers
// ────────────────────────────────────────────────────────────────────────────

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(k|m)?\b").expect("amount regex is valid")
    })
}

/// All amounts in a string, with `k`/`m` suffixes applied.
fn parse_amounts(raw: &str) -> Vec<f64> {
    amount_regex()
        .captures_iter(raw)
        .filter_map(|caps| {
            let digits = caps.get(1)?.as_str().replace(',', "");
            let value: f64 = digits.parse().ok()?;
            let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(ref s) if s == "k" => 1_000.0,
                Some(ref s) if s == "m" => 1_000_000.0,
                _ => 1.0,
            };
            Some(value * multiplier)
        })
        .collect()
}

fn parse_plain_number(raw: &str) -> Option<f64> {
    amount_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Parses a GPA entered as "3.9", "3.9/4.0" or "85%", normalised to a 4.0 scale.
/// An explicit `scale` field wins over an inline "/x" scale.
pub fn parse_gpa(gpa: Option<&str>, scale: Option<&str>) -> Option<f64> {
    let raw = gpa?.trim();
    if raw.is_empty() {
        return None;
    }

    let (value_part, inline_scale) = match raw.split_once('/') {
        Some((value, scale)) => (value, parse_plain_number(scale)),
        None => (raw, None),
    };
    let value = parse_plain_number(value_part)?;

    let scale = scale
        .and_then(parse_plain_number)
        .or(inline_scale)
        .unwrap_or(if raw.ends_with('%') {
            100.0
        } else {
            DEFAULT_GPA_SCALE
        });

    if value <= 0.0 || scale <= 0.0 || value > scale {
        return None;
    }
    Some(value / scale * CANONICAL_GPA_SCALE)
}

pub fn parse_english_score(test: &str, score: &str) -> Option<EnglishScore> {
    let test = EnglishTest::parse(test)?;
    let value = parse_plain_number(score)?;
    if value <= 0.0 || value > test.max_score() {
        return None;
    }
    Some(EnglishScore {
        test,
        normalized: value / test.max_score(),
    })
}

/// Parses a budget bracket such as "$20k - $40k", "Under 20,000" or "60k+".
/// The ceiling is the largest amount mentioned; open-ended brackets are unlimited.
pub fn parse_budget(raw: &str) -> Option<Budget> {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if ["no limit", "unlimited", "flexible", "no budget"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return Some(Budget::Unlimited);
    }

    let amounts = parse_amounts(&lower);
    let ceiling = amounts.into_iter().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    })?;

    let open_ended = lower.starts_with('>')
        || lower.trim_end().ends_with('+')
        || ["above", "over", "more than", "at least"]
            .iter()
            .any(|k| lower.contains(k));

    if open_ended {
        Some(Budget::Unlimited)
    } else if ceiling > 0.0 {
        Some(Budget::UpTo(ceiling))
    } else {
        None
    }
}

/// First amount in a fee string ("$57,986/yr", "£9,250", "25k").
/// Currencies are not converted.
pub fn parse_fee(raw: &str) -> Option<f64> {
    parse_amounts(raw).into_iter().next().filter(|v| *v > 0.0)
}

/// "4%" or "4" → 0.04, "0.04" → 0.04.
pub fn parse_acceptance_rate(raw: &str) -> Option<f64> {
    let value = parse_plain_number(raw)?;
    let fraction = if raw.contains('%') || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    (fraction > 0.0 && fraction <= 1.0).then_some(fraction)
}

/// Lower-cases and folds common aliases so "USA" and "United States" compare equal.
pub fn canonical_country(raw: &str) -> Option<String> {
    let lower = raw.trim().trim_matches('.').to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let folded = match lower.as_str() {
        "usa" | "us" | "u.s" | "u.s.a" | "united states" | "united states of america"
        | "america" => "united states",
        "uk" | "u.k" | "england" | "scotland" | "wales" | "great britain" | "britain"
        | "united kingdom" => "united kingdom",
        "uae" | "emirates" => "united arab emirates",
        "holland" => "netherlands",
        "deutschland" => "germany",
        other => other,
    };
    Some(folded.to_string())
}

/// Folded country in the title-cased form external directories index by
/// ("USA" and "u.s.a." become "United States").
pub fn directory_country(raw: &str) -> Option<String> {
    let folded = canonical_country(raw)?;
    let words: Vec<String> = folded
        .split_whitespace()
        .map(|word| match word {
            "of" | "and" | "the" => word.to_string(),
            _ => {
                let mut chars = word.chars();
                chars
                    .next()
                    .map(|first| first.to_uppercase().chain(chars).collect())
                    .unwrap_or_default()
            }
        })
        .collect();
    Some(words.join(" "))
}

fn canonical_country_list(raw: &[String]) -> Vec<String> {
    let mut countries: Vec<String> = Vec::new();
    for entry in raw {
        for part in entry.split(',') {
            if let Some(country) = canonical_country(part) {
                if !countries.contains(&country) {
                    countries.push(country);
                }
            }
        }
    }
    countries
}

fn non_empty_lower(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpa_plain_defaults_to_four_point_scale() {
        assert_eq!(parse_gpa(Some("3.6"), None), Some(3.6));
    }

    #[test]
    fn test_gpa_with_explicit_scale() {
        let gpa = parse_gpa(Some("8.5"), Some("10")).unwrap();
        assert!((gpa - 3.4).abs() < 1e-9, "gpa was {gpa}");
    }

    #[test]
    fn test_gpa_inline_scale_and_percentage() {
        let inline = parse_gpa(Some("3.9/4.0"), None).unwrap();
        assert!((inline - 3.9).abs() < 1e-9);
        let pct = parse_gpa(Some("85%"), None).unwrap();
        assert!((pct - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_gpa_above_scale_or_garbage_is_dropped() {
        assert_eq!(parse_gpa(Some("8.5"), None), None);
        assert_eq!(parse_gpa(Some("excellent"), None), None);
        assert_eq!(parse_gpa(Some(""), Some("4")), None);
        assert_eq!(parse_gpa(None, Some("4")), None);
    }

    #[test]
    fn test_english_scores_normalised_by_test_maximum() {
        let ielts = parse_english_score("IELTS", "8").unwrap();
        assert_eq!(ielts.test, EnglishTest::Ielts);
        assert!((ielts.normalized - 8.0 / 9.0).abs() < 1e-9);

        let toefl = parse_english_score("toefl ibt", "102").unwrap();
        assert!((toefl.normalized - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_english_unknown_test_or_out_of_range() {
        assert!(parse_english_score("Cambridge C2", "200").is_none());
        assert!(parse_english_score("IELTS", "10").is_none());
        assert!(parse_english_score("IELTS", "n/a").is_none());
    }

    #[test]
    fn test_english_test_names() {
        assert_eq!(EnglishTest::parse("PTE Academic"), Some(EnglishTest::Pte));
        assert_eq!(EnglishTest::parse("DET"), Some(EnglishTest::Duolingo));
        assert_eq!(EnglishTest::parse("not attempted"), None);
        assert_eq!(EnglishTest::parse("None"), None);
    }

    #[test]
    fn test_budget_brackets() {
        assert_eq!(parse_budget("$20k - $40k"), Some(Budget::UpTo(40_000.0)));
        assert_eq!(parse_budget("Under 20,000"), Some(Budget::UpTo(20_000.0)));
        assert_eq!(parse_budget("60k+"), Some(Budget::Unlimited));
        assert_eq!(parse_budget("> $60k"), Some(Budget::Unlimited));
        assert_eq!(parse_budget("No limit"), Some(Budget::Unlimited));
        assert_eq!(parse_budget("not sure"), None);
    }

    #[test]
    fn test_budget_ignores_month_word() {
        assert_eq!(parse_budget("2000/month"), Some(Budget::UpTo(2_000.0)));
    }

    #[test]
    fn test_fee_parsing() {
        assert_eq!(parse_fee("$57,986/yr"), Some(57_986.0));
        assert_eq!(parse_fee("CHF 1,460/yr"), Some(1_460.0));
        assert_eq!(parse_fee("25k"), Some(25_000.0));
        assert_eq!(parse_fee("Free"), None);
    }

    #[test]
    fn test_acceptance_rate_parsing() {
        assert_eq!(parse_acceptance_rate("4%"), Some(0.04));
        assert_eq!(parse_acceptance_rate("0.25"), Some(0.25));
        assert_eq!(parse_acceptance_rate("43"), Some(0.43));
        assert_eq!(parse_acceptance_rate("unknown"), None);
        assert_eq!(parse_acceptance_rate("250%"), None);
    }

    #[test]
    fn test_country_aliases_fold() {
        assert_eq!(canonical_country("USA").as_deref(), Some("united states"));
        assert_eq!(
            canonical_country(" United States ").as_deref(),
            Some("united states")
        );
        assert_eq!(canonical_country("UK").as_deref(), Some("united kingdom"));
        assert_eq!(canonical_country("Canada").as_deref(), Some("canada"));
        assert_eq!(canonical_country("  "), None);
    }

    #[test]
    fn test_directory_country_uses_full_names() {
        assert_eq!(directory_country("USA").as_deref(), Some("United States"));
        assert_eq!(directory_country("uk").as_deref(), Some("United Kingdom"));
        assert_eq!(
            directory_country("bosnia and herzegovina").as_deref(),
            Some("Bosnia and Herzegovina")
        );
        assert_eq!(directory_country("  "), None);
    }

    #[test]
    fn test_country_list_splits_and_dedups() {
        let raw = vec!["USA, UK".to_string(), "United States".to_string(), "".to_string()];
        assert_eq!(
            canonical_country_list(&raw),
            vec!["united states".to_string(), "united kingdom".to_string()]
        );
    }
}
