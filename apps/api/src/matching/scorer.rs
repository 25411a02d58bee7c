//! University match scoring: a pluggable, trait-based scorer that rates one
//! university against one student profile.
//!
//! Default: `RuleBasedScorer` (pure, deterministic, no I/O).
//!
//! The score is the sum of four independently bounded factors:
//!
//! | factor     | max | neutral when input is missing |
//! |------------|-----|-------------------------------|
//! | academic   | 4.0 | 2.0                           |
//! | test       | 2.0 | 1.0                           |
//! | financial  | 2.0 | 1.0                           |
//! | geographic | 2.0 | 1.0                           |
//!
//! `AppState` holds an `Arc<dyn MatchScorer>`.

use serde::{Deserialize, Serialize};

use crate::matching::canonical::{Budget, CanonicalProfile, CanonicalUniversity};

pub const MAX_SCORE: f64 = 10.0;
pub const MAX_REASONS: usize = 3;

const ACADEMIC_MAX: f64 = 4.0;
const TEST_MAX: f64 = 2.0;
const FINANCIAL_MAX: f64 = 2.0;
const GEOGRAPHIC_MAX: f64 = 2.0;

/// GPA points below the admit bar at which the academic factor reaches zero.
const GPA_SHORTFALL_SPAN: f64 = 1.5;
/// Fees up to this multiple of the budget still earn partial financial credit.
const BUDGET_STRETCH: f64 = 1.25;
/// Universities admitting fewer than this fraction never report a High chance.
const HIGHLY_SELECTIVE_RATE: f64 = 0.10;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Cut points on the 0–100 percentage. Loaded from config at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchThresholds {
    pub safe: u32,
    pub target: u32,
    pub high_chance: u32,
    pub medium_chance: u32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            safe: 80,
            target: 50,
            high_chance: 75,
            medium_chance: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCategory {
    Safe,
    Target,
    Dream,
}

impl MatchCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Some(MatchCategory::Safe),
            "TARGET" => Some(MatchCategory::Target),
            "DREAM" | "REACH" => Some(MatchCategory::Dream),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptanceChance {
    Low,
    Medium,
    High,
}

/// Per-factor points, exposed so the UI can explain a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub academic: f64,
    pub test: f64,
    pub financial: f64,
    pub geographic: f64,
}

impl FactorBreakdown {
    fn total(&self) -> f64 {
        self.academic + self.test + self.financial + self.geographic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// 0.0 – 10.0
    pub score: f64,
    /// 0 – 100
    pub percentage: u32,
    pub category: MatchCategory,
    pub acceptance_chance: AcceptanceChance,
    pub reasons: Vec<String>,
    pub breakdown: FactorBreakdown,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

pub trait MatchScorer: Send + Sync {
    fn evaluate(&self, profile: &CanonicalProfile, university: &CanonicalUniversity)
        -> MatchResult;
}

/// Weighted-rule scorer with configurable category thresholds.
pub struct RuleBasedScorer {
    pub thresholds: MatchThresholds,
}

impl RuleBasedScorer {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }
}

impl MatchScorer for RuleBasedScorer {
    fn evaluate(
        &self,
        profile: &CanonicalProfile,
        university: &CanonicalUniversity,
    ) -> MatchResult {
        evaluate_university(profile, university, &self.thresholds)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core algorithm
// ────────────────────────────────────────────────────────────────────────────

/// Scores `university` for `profile`. Same inputs always give the same result.
pub fn evaluate_university(
    profile: &CanonicalProfile,
    university: &CanonicalUniversity,
    thresholds: &MatchThresholds,
) -> MatchResult {
    let breakdown = FactorBreakdown {
        academic: academic_fit(profile.gpa, university),
        test: test_fit(profile),
        financial: financial_fit(profile.budget, university.annual_fee),
        geographic: geographic_fit(&profile.preferred_countries, university),
    };

    let score = (breakdown.total().clamp(0.0, MAX_SCORE) * 100.0).round() / 100.0;
    let percentage = ((score / MAX_SCORE) * 100.0).round().clamp(0.0, 100.0) as u32;

    MatchResult {
        score,
        percentage,
        category: categorize(percentage, thresholds),
        acceptance_chance: acceptance_chance(percentage, university.acceptance_rate, thresholds),
        reasons: build_reasons(profile, university, &breakdown),
        breakdown,
    }
}

/// GPA (4.0 scale) a university of this selectivity typically expects.
fn required_gpa(university: &CanonicalUniversity) -> f64 {
    match (university.acceptance_rate, university.rank) {
        (Some(rate), _) if rate < 0.10 => 3.8,
        (Some(rate), _) if rate < 0.25 => 3.5,
        (Some(rate), _) if rate < 0.50 => 3.2,
        (Some(_), _) => 2.8,
        (None, Some(rank)) if rank <= 20 => 3.7,
        (None, Some(rank)) if rank <= 100 => 3.4,
        (None, Some(rank)) if rank <= 300 => 3.1,
        (None, Some(_)) => 2.8,
        (None, None) => 3.0,
    }
}

fn academic_fit(gpa: Option<f64>, university: &CanonicalUniversity) -> f64 {
    let Some(gpa) = gpa else {
        return ACADEMIC_MAX / 2.0;
    };
    let bar = required_gpa(university);
    if gpa >= bar {
        ACADEMIC_MAX
    } else {
        ACADEMIC_MAX * (1.0 - (bar - gpa) / GPA_SHORTFALL_SPAN).max(0.0)
    }
}

fn test_fit(profile: &CanonicalProfile) -> f64 {
    match profile.english {
        None => TEST_MAX / 2.0,
        Some(score) => match score.normalized {
            n if n >= 0.85 => TEST_MAX,
            n if n >= 0.70 => 1.5,
            n if n >= 0.60 => 1.0,
            _ => 0.5,
        },
    }
}

fn financial_fit(budget: Option<Budget>, annual_fee: Option<f64>) -> f64 {
    match (budget, annual_fee) {
        (Some(Budget::Unlimited), _) => FINANCIAL_MAX,
        (Some(Budget::UpTo(limit)), Some(fee)) if fee <= limit => FINANCIAL_MAX,
        (Some(Budget::UpTo(limit)), Some(fee)) if fee <= limit * BUDGET_STRETCH => {
            FINANCIAL_MAX / 2.0
        }
        (Some(Budget::UpTo(_)), Some(_)) => 0.0,
        _ => FINANCIAL_MAX / 2.0,
    }
}

fn geographic_fit(preferred: &[String], university: &CanonicalUniversity) -> f64 {
    match &university.country {
        Some(country) if !preferred.is_empty() => {
            if preferred.iter().any(|p| p == country) {
                GEOGRAPHIC_MAX
            } else {
                0.0
            }
        }
        _ => GEOGRAPHIC_MAX / 2.0,
    }
}

fn categorize(percentage: u32, thresholds: &MatchThresholds) -> MatchCategory {
    if percentage >= thresholds.safe {
        MatchCategory::Safe
    } else if percentage >= thresholds.target {
        MatchCategory::Target
    } else {
        MatchCategory::Dream
    }
}

fn acceptance_chance(
    percentage: u32,
    acceptance_rate: Option<f64>,
    thresholds: &MatchThresholds,
) -> AcceptanceChance {
    let chance = if percentage >= thresholds.high_chance {
        AcceptanceChance::High
    } else if percentage >= thresholds.medium_chance {
        AcceptanceChance::Medium
    } else {
        AcceptanceChance::Low
    };
    match acceptance_rate {
        Some(rate) if rate < HIGHLY_SELECTIVE_RATE && chance == AcceptanceChance::High => {
            AcceptanceChance::Medium
        }
        _ => chance,
    }
}

/// Reasons for factors that scored (near) full marks, in a fixed order.
fn build_reasons(
    profile: &CanonicalProfile,
    university: &CanonicalUniversity,
    breakdown: &FactorBreakdown,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if breakdown.geographic >= GEOGRAPHIC_MAX {
        reasons.push(format!(
            "Located in {}, one of your preferred countries",
            university.country_label
        ));
    }
    if profile.gpa.is_some() && breakdown.academic >= ACADEMIC_MAX * 0.875 {
        reasons.push("Your GPA meets the typical admit bar".to_string());
    }
    if profile.budget.is_some()
        && university.annual_fee.is_some()
        && breakdown.financial >= FINANCIAL_MAX
    {
        reasons.push("Tuition fits within your budget".to_string());
    }
    if let Some(english) = profile.english {
        if breakdown.test >= 1.5 {
            reasons.push(format!(
                "Your {} score meets English requirements",
                english.test.label()
            ));
        }
    }
    if let Some(tag) = programme_match(profile, university) {
        reasons.push(format!("Known for {tag}"));
    }

    reasons.truncate(MAX_REASONS);
    reasons
}

/// First university tag that overlaps the student's target major or degree.
fn programme_match<'a>(
    profile: &CanonicalProfile,
    university: &'a CanonicalUniversity,
) -> Option<&'a str> {
    let targets: Vec<&str> = [&profile.target_major, &profile.target_degree]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if targets.is_empty() {
        return None;
    }
    university
        .tags
        .iter()
        .find(|tag| {
            let tag_lower = tag.to_lowercase();
            targets
                .iter()
                .any(|t| t.contains(&tag_lower) || tag_lower.contains(t))
        })
        .map(String::as_str)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::canonical::{EnglishScore, EnglishTest};

    fn profile(gpa: Option<f64>, countries: &[&str]) -> CanonicalProfile {
        CanonicalProfile {
            gpa,
            english: None,
            budget: None,
            target_degree: Some("masters".to_string()),
            target_major: Some("computer science".to_string()),
            preferred_countries: countries.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn university(country: &str, acceptance: Option<f64>, fee: Option<f64>) -> CanonicalUniversity {
        CanonicalUniversity {
            name: "Test University".to_string(),
            country_label: country.to_string(),
            country: crate::matching::canonical::canonical_country(country),
            rank: Some(50),
            annual_fee: fee,
            acceptance_rate: acceptance,
            tags: vec!["Computer Science".to_string()],
        }
    }

    fn thresholds() -> MatchThresholds {
        MatchThresholds::default()
    }

    #[test]
    fn test_score_bounds_across_inputs() {
        let gpas = [None, Some(0.5), Some(2.0), Some(3.3), Some(4.0)];
        let rates = [None, Some(0.03), Some(0.2), Some(0.9)];
        let fees = [None, Some(5_000.0), Some(80_000.0)];
        for gpa in gpas {
            for rate in rates {
                for fee in fees {
                    let mut p = profile(gpa, &["usa"]);
                    p.budget = Some(Budget::UpTo(30_000.0));
                    let uni = university("Canada", rate, fee);
                    let r = evaluate_university(&p, &uni, &thresholds());
                    assert!((0.0..=MAX_SCORE).contains(&r.score), "score {}", r.score);
                    assert!(r.percentage <= 100);
                }
            }
        }
    }

    #[test]
    fn test_preferred_country_scores_strictly_higher() {
        let uni = university("USA", Some(0.2), None);
        let preferring = profile(Some(3.5), &["united states"]);
        let with_pref = evaluate_university(&preferring, &uni, &thresholds());
        let without = evaluate_university(&profile(Some(3.5), &[]), &uni, &thresholds());
        assert!(with_pref.score > without.score);
    }

    #[test]
    fn test_academic_fit_monotonic_in_gpa() {
        let uni = university("USA", Some(0.05), None);
        let mut last = -1.0;
        for tenth in 0..=40 {
            let gpa = tenth as f64 / 10.0;
            let points = academic_fit(Some(gpa), &uni);
            assert!(points >= last, "academic fit dropped at gpa {gpa}");
            last = points;
        }
        assert!(academic_fit(Some(2.5), &uni) < academic_fit(Some(3.9), &uni));
    }

    #[test]
    fn test_missing_optional_fields_are_neutral() {
        let p = profile(Some(3.5), &[]);
        let r = evaluate_university(&p, &university("USA", None, None), &thresholds());
        assert!(r.breakdown.test > 0.0 && r.breakdown.test < TEST_MAX);
        assert!(r.breakdown.financial > 0.0 && r.breakdown.financial < FINANCIAL_MAX);
        assert!(r.breakdown.geographic > 0.0 && r.breakdown.geographic < GEOGRAPHIC_MAX);

        let no_gpa = academic_fit(None, &university("USA", None, None));
        assert!(no_gpa > 0.0 && no_gpa < ACADEMIC_MAX);
    }

    #[test]
    fn test_budget_fit_levels() {
        assert_eq!(financial_fit(Some(Budget::UpTo(40_000.0)), Some(35_000.0)), 2.0);
        assert_eq!(financial_fit(Some(Budget::UpTo(40_000.0)), Some(48_000.0)), 1.0);
        assert_eq!(financial_fit(Some(Budget::UpTo(40_000.0)), Some(60_000.0)), 0.0);
        assert_eq!(financial_fit(Some(Budget::Unlimited), Some(90_000.0)), 2.0);
        assert_eq!(financial_fit(None, Some(90_000.0)), 1.0);
    }

    #[test]
    fn test_strong_profile_prefers_listed_country() {
        let mut p = profile(Some(3.9), &["united states"]);
        p.english = Some(EnglishScore {
            test: EnglishTest::Ielts,
            normalized: 8.0 / 9.0,
        });
        let mit = university("USA", Some(0.04), Some(57_986.0));
        let elsewhere = university("Singapore", Some(0.05), Some(38_000.0));

        let home = evaluate_university(&p, &mit, &thresholds());
        let away = evaluate_university(&p, &elsewhere, &thresholds());
        assert!(
            home.percentage >= away.percentage + 15,
            "{} vs {}",
            home.percentage,
            away.percentage
        );
        assert_eq!(home.category, MatchCategory::Safe);
    }

    #[test]
    fn test_category_thresholds() {
        let t = thresholds();
        assert_eq!(categorize(80, &t), MatchCategory::Safe);
        assert_eq!(categorize(79, &t), MatchCategory::Target);
        assert_eq!(categorize(50, &t), MatchCategory::Target);
        assert_eq!(categorize(49, &t), MatchCategory::Dream);
    }

    #[test]
    fn test_custom_thresholds_respected() {
        let t = MatchThresholds {
            safe: 95,
            target: 70,
            ..MatchThresholds::default()
        };
        assert_eq!(categorize(90, &t), MatchCategory::Target);
        assert_eq!(categorize(60, &t), MatchCategory::Dream);
    }

    #[test]
    fn test_selective_university_caps_chance() {
        let t = thresholds();
        assert_eq!(acceptance_chance(95, Some(0.04), &t), AcceptanceChance::Medium);
        assert_eq!(acceptance_chance(95, Some(0.40), &t), AcceptanceChance::High);
        assert_eq!(acceptance_chance(30, None, &t), AcceptanceChance::Low);
    }

    #[test]
    fn test_reasons_capped_and_ordered() {
        let mut p = profile(Some(4.0), &["united states"]);
        p.budget = Some(Budget::Unlimited);
        p.english = Some(EnglishScore {
            test: EnglishTest::Toefl,
            normalized: 0.95,
        });
        let uni = university("USA", Some(0.3), Some(20_000.0));
        let r = evaluate_university(&p, &uni, &thresholds());
        assert_eq!(r.reasons.len(), MAX_REASONS);
        assert!(r.reasons[0].contains("USA"));
        assert!(r.reasons[1].contains("GPA"));
    }

    #[test]
    fn test_programme_reason_when_tag_matches_major() {
        let p = profile(None, &[]);
        let r = evaluate_university(&p, &university("Canada", None, None), &thresholds());
        assert!(r.reasons.iter().any(|reason| reason == "Known for Computer Science"));
    }

    #[test]
    fn test_deterministic() {
        let p = profile(Some(3.2), &["canada"]);
        let uni = university("Canada", Some(0.43), Some(45_000.0));
        let a = evaluate_university(&p, &uni, &thresholds());
        let b = evaluate_university(&p, &uni, &thresholds());
        assert_eq!(a, b);
    }

    #[test]
    fn test_rule_based_scorer_uses_its_thresholds() {
        let scorer = RuleBasedScorer::new(MatchThresholds {
            safe: 100,
            target: 99,
            ..MatchThresholds::default()
        });
        let r = scorer.evaluate(&profile(Some(3.0), &[]), &university("USA", None, None));
        assert_eq!(r.category, MatchCategory::Dream);
    }
}
