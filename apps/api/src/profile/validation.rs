use serde::{Deserialize, Deserializer};

use crate::errors::AppError;
use crate::matching::canonical::{parse_english_score, parse_gpa, EnglishTest};
use crate::models::profile::ProfileRow;

/// Onboarding payload. Numeric fields are accepted as JSON numbers or strings
/// and stored as text.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub target_degree: String,
    #[serde(default)]
    pub target_major: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub target_intake: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub gpa: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub gpa_scale: Option<String>,
    #[serde(default)]
    pub english_test: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub test_score: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub budget: Option<String>,
    #[serde(default)]
    pub preferred_countries: Vec<String>,
}

/// Partial update for `PUT /api/v1/profile`. An absent field keeps its value;
/// for optional fields an explicit `""` or `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub target_degree: Option<String>,
    pub target_major: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub target_intake: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub gpa: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub gpa_scale: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub english_test: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub test_score: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub budget: Option<Option<String>>,
    pub preferred_countries: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(value
        .map(|v| match v {
            TextOrNumber::Text(s) => s.trim().to_string(),
            TextOrNumber::Number(n) => n.to_string(),
        })
        .filter(|s| !s.is_empty()))
}

/// Only called when the key is present, so the outer `Some` marks "set".
fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    text_or_number(deserializer).map(Some)
}

impl ProfileInput {
    pub fn from_row(row: &ProfileRow) -> Self {
        Self {
            target_degree: row.target_degree.clone(),
            target_major: row.target_major.clone(),
            target_intake: row.target_intake.clone(),
            gpa: row.gpa.clone(),
            gpa_scale: row.gpa_scale.clone(),
            english_test: row.english_test.clone(),
            test_score: row.test_score.clone(),
            budget: row.budget.clone(),
            preferred_countries: row.preferred_countries.clone(),
        }
    }

    pub fn apply(mut self, update: ProfileUpdate) -> Self {
        if let Some(v) = update.target_degree {
            self.target_degree = v;
        }
        if let Some(v) = update.target_major {
            self.target_major = v;
        }
        if let Some(v) = update.target_intake {
            self.target_intake = v;
        }
        if let Some(v) = update.gpa {
            self.gpa = v;
        }
        if let Some(v) = update.gpa_scale {
            self.gpa_scale = v;
        }
        if let Some(v) = update.english_test {
            self.english_test = v;
        }
        if let Some(v) = update.test_score {
            self.test_score = v;
        }
        if let Some(v) = update.budget {
            self.budget = v;
        }
        if let Some(v) = update.preferred_countries {
            self.preferred_countries = v;
        }
        self
    }

    /// Trims text fields and drops blank country entries.
    pub fn normalized(mut self) -> Self {
        self.target_degree = self.target_degree.trim().to_string();
        self.target_major = self.target_major.trim().to_string();
        self.english_test = self
            .english_test
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self.preferred_countries = self
            .preferred_countries
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }
}

/// Rejects input the student can fix. Fields the scorer can live without are
/// only checked when present.
pub fn validate_profile(input: &ProfileInput) -> Result<(), AppError> {
    if input.target_degree.trim().is_empty() {
        return Err(AppError::Validation("targetDegree is required".to_string()));
    }
    if input.target_major.trim().is_empty() {
        return Err(AppError::Validation("targetMajor is required".to_string()));
    }

    if input.gpa.is_some() && parse_gpa(input.gpa.as_deref(), input.gpa_scale.as_deref()).is_none()
    {
        return Err(AppError::Validation(
            "gpa must be a positive number no greater than gpaScale".to_string(),
        ));
    }

    if let (Some(test), Some(score)) = (&input.english_test, &input.test_score) {
        if let Some(kind) = EnglishTest::parse(test) {
            if parse_english_score(test, score).is_none() {
                return Err(AppError::Validation(format!(
                    "testScore must be between 0 and {} for {}",
                    kind.max_score(),
                    kind.label()
                )));
            }
        }
    }

    Ok(())
}
