// University matching: canonicalisation of stored records + the rule-based scorer.
// Pure code only; handlers load rows and pass them through here.

pub mod canonical;
pub mod scorer;

pub use canonical::{create_canonical_profile, create_canonical_university};
pub use scorer::{MatchCategory, MatchResult, MatchScorer, MatchThresholds, RuleBasedScorer};

use crate::models::profile::ProfileRow;
use crate::models::university::UniversityRow;

/// Canonicalises both records and scores them with `scorer`.
pub fn score_row(
    scorer: &dyn MatchScorer,
    profile: &ProfileRow,
    university: &UniversityRow,
) -> MatchResult {
    scorer.evaluate(
        &create_canonical_profile(profile),
        &create_canonical_university(university),
    )
}
