use std::fmt::Write;

use crate::chat::persona::Persona;
use crate::chat::tools::{ADD_TO_SHORTLIST, LOCK_UNIVERSITY};
use crate::models::profile::{FunnelStage, ProfileRow};

/// What the model is told about the student it is talking to.
#[derive(Debug, Clone)]
pub struct StudentContext {
    pub name: String,
    pub profile: Option<ProfileRow>,
    pub stage: FunnelStage,
    /// `(university name, country, locked)` for each shortlist entry.
    pub shortlist: Vec<(String, String, bool)>,
}

fn tool_guidance() -> String {
    format!(
        "TOOLS: You can change the student's shortlist.\n\
         - `{ADD_TO_SHORTLIST}` adds a university when the student asks to save or shortlist it.\n\
         - `{LOCK_UNIVERSITY}` locks one university as the primary target and creates the \
         application checklist. Only use it when the student clearly commits, and only one \
         university can be locked at a time.\n\
         Use the university's full catalogue name. If native tools are unavailable, reply with \
         ONLY a JSON object of the form \
         {{\"tool\": \"{ADD_TO_SHORTLIST}\", \"args\": {{\"university_name\": \"...\"}}}} and no other text.\n\
         Lines starting with [System: ...] report what the application did; never write them yourself."
    )
}

fn stage_guidance(stage: FunnelStage) -> &'static str {
    match stage {
        FunnelStage::Discovery => {
            "The student is exploring. Suggest a balanced mix of dream, target and safe universities."
        }
        FunnelStage::Shortlist => {
            "The student has a shortlist. Help them compare options and decide which one to lock."
        }
        FunnelStage::Guidance => {
            "The student has locked a university. Focus on application tasks, deadlines and documents."
        }
    }
}

pub fn build_system_prompt(persona: Persona, context: &StudentContext) -> String {
    let mut prompt = String::from(persona.system_prompt());
    prompt.push_str("\n\nSTUDENT CONTEXT:\n");
    let _ = writeln!(prompt, "Name: {}", context.name);
    let _ = writeln!(prompt, "Stage: {}", context.stage.as_str());

    match &context.profile {
        Some(p) => {
            let _ = writeln!(
                prompt,
                "Goal: {} in {}{}",
                p.target_degree,
                p.target_major,
                p.target_intake
                    .as_deref()
                    .map(|i| format!(" ({i} intake)"))
                    .unwrap_or_default()
            );
            if let Some(gpa) = &p.gpa {
                let scale = p.gpa_scale.as_deref().unwrap_or("4.0");
                let _ = writeln!(prompt, "GPA: {gpa} / {scale}");
            }
            if let (Some(test), Some(score)) = (&p.english_test, &p.test_score) {
                let _ = writeln!(prompt, "English test: {test} {score}");
            }
            if let Some(budget) = &p.budget {
                let _ = writeln!(prompt, "Annual budget: {budget}");
            }
            if !p.preferred_countries.is_empty() {
                let _ = writeln!(
                    prompt,
                    "Preferred countries: {}",
                    p.preferred_countries.join(", ")
                );
            }
        }
        None => prompt.push_str(
            "Profile: not completed yet. Encourage the student to finish onboarding.\n",
        ),
    }

    if context.shortlist.is_empty() {
        prompt.push_str("Shortlist: empty\n");
    } else {
        prompt.push_str("Shortlist:\n");
        for (name, country, locked) in &context.shortlist {
            let marker = if *locked { " [LOCKED]" } else { "" };
            let _ = writeln!(prompt, "- {name} ({country}){marker}");
        }
    }

    let _ = write!(
        prompt,
        "\n{}\n\n{}",
        stage_guidance(context.stage),
        tool_guidance()
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn context(profile: Option<ProfileRow>) -> StudentContext {
        StudentContext {
            name: "Asha".to_string(),
            profile,
            stage: FunnelStage::Shortlist,
            shortlist: vec![
                ("University of Toronto".to_string(), "Canada".to_string(), false),
                ("National University of Singapore".to_string(), "Singapore".to_string(), true),
            ],
        }
    }

    #[test]
    fn test_prompt_includes_profile_and_shortlist() {
        let profile = ProfileRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            target_degree: "Masters".to_string(),
            target_major: "Data Science".to_string(),
            target_intake: Some("Fall 2027".to_string()),
            gpa: Some("3.7".to_string()),
            gpa_scale: None,
            english_test: Some("IELTS".to_string()),
            test_score: Some("7.5".to_string()),
            budget: Some("$30k - $50k".to_string()),
            preferred_countries: vec!["Canada".to_string(), "Singapore".to_string()],
            stage: "SHORTLIST".to_string(),
            onboarding_complete: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let prompt = build_system_prompt(Persona::Strict, &context(Some(profile)));

        assert!(prompt.starts_with(Persona::Strict.system_prompt()));
        assert!(prompt.contains("Goal: Masters in Data Science (Fall 2027 intake)"));
        assert!(prompt.contains("GPA: 3.7 / 4.0"));
        assert!(prompt.contains("- National University of Singapore (Singapore) [LOCKED]"));
        assert!(prompt.contains("- University of Toronto (Canada)\n"));
        assert!(prompt.contains("Stage: SHORTLIST"));
    }

    #[test]
    fn test_prompt_without_profile_mentions_onboarding() {
        let mut ctx = context(None);
        ctx.shortlist.clear();
        let prompt = build_system_prompt(Persona::default(), &ctx);
        assert!(prompt.contains("not completed yet"));
        assert!(prompt.contains("Shortlist: empty"));
    }

    #[test]
    fn test_tool_guidance_names_both_tools() {
        let prompt = build_system_prompt(Persona::Friendly, &context(None));
        assert!(prompt.contains("`add_to_shortlist`"));
        assert!(prompt.contains("`lock_university`"));
        assert!(prompt.contains(
            r#"{"tool": "add_to_shortlist", "args": {"university_name": "..."}}"#
        ));
    }
}
