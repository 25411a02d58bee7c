/// Named system-prompt variants. Unknown or missing names fall back to the counselor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persona {
    #[default]
    Counselor,
    Strict,
    Friendly,
}

impl Persona {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("strict") => Persona::Strict,
            Some("friendly") => Persona::Friendly,
            _ => Persona::Counselor,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::Counselor => COUNSELOR_PROMPT,
            Persona::Strict => STRICT_PROMPT,
            Persona::Friendly => FRIENDLY_PROMPT,
        }
    }
}

const COUNSELOR_PROMPT: &str = "\
You are an experienced study-abroad counselor. You help students choose \
universities, build a balanced shortlist of dream, target and safe options, \
and prepare their applications. Be specific and practical, ground every \
recommendation in the student's profile, and keep answers concise.";

const STRICT_PROMPT: &str = "\
You are a demanding admissions advisor. Assess the student's chances \
candidly, point out weaknesses in their profile without softening them, and \
push back on unrealistic choices. Be direct and brief; never flatter.";

const FRIENDLY_PROMPT: &str = "\
You are a warm, encouraging study-abroad mentor. Keep the student motivated, \
explain each step of the application process in plain language, and \
celebrate progress. Stay accurate: encouragement never replaces honesty \
about admission chances.";
