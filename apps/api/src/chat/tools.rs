//! Chat tools: native tool definitions, the text fallback parser and the side
//! effects a recognised call performs.

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::ToolDefinition;
use crate::profile::store::sync_stage;
use crate::shortlist::store::{add_to_shortlist, lock_entry, AddOutcome, LockOutcome};
use crate::universities::store::find_by_name;

pub const ADD_TO_SHORTLIST: &str = "add_to_shortlist";
pub const LOCK_UNIVERSITY: &str = "lock_university";

/// Argument keys the models have been seen to use for the university name.
const NAME_KEYS: &[&str] = &["university_name", "universityName", "name", "university"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    AddToShortlist { university_name: String },
    LockUniversity { university_name: String },
}

impl ToolCall {
    /// Builds a call from a tool name and its JSON arguments.
    pub fn from_native(name: &str, input: &Value) -> Option<Self> {
        let university_name = NAME_KEYS
            .iter()
            .filter_map(|key| input.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())?
            .to_string();

        match name.trim() {
            ADD_TO_SHORTLIST => Some(ToolCall::AddToShortlist { university_name }),
            LOCK_UNIVERSITY => Some(ToolCall::LockUniversity { university_name }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::AddToShortlist { .. } => ADD_TO_SHORTLIST,
            ToolCall::LockUniversity { .. } => LOCK_UNIVERSITY,
        }
    }

    pub fn university_name(&self) -> &str {
        match self {
            ToolCall::AddToShortlist { university_name }
            | ToolCall::LockUniversity { university_name } => university_name,
        }
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    let schema = json!({
        "type": "object",
        "properties": {
            "university_name": {
                "type": "string",
                "description": "Full name of the university as it appears in the catalogue"
            }
        },
        "required": ["university_name"]
    });
    vec![
        ToolDefinition {
            name: ADD_TO_SHORTLIST,
            description: "Add a university to the student's shortlist. Use when the student asks to save, add or shortlist a university.",
            input_schema: schema.clone(),
        },
        ToolDefinition {
            name: LOCK_UNIVERSITY,
            description: "Lock a university as the student's primary application target and create their application checklist. Use only when the student explicitly commits to one university.",
            input_schema: schema,
        },
    ]
}

/// Finds the first balanced `{...}` object in `text` that names a tool, in the
/// form `{"tool": "add_to_shortlist", "args": {"university_name": ".."}}`.
pub fn extract_tool_call(text: &str) -> Option<ToolCall> {
    text.match_indices('{')
        .filter_map(|(start, _)| balanced_object(&text[start..]))
        .filter(|candidate| candidate.contains("\"tool\""))
        .find_map(parse_text_call)
}

fn parse_text_call(candidate: &str) -> Option<ToolCall> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let name = value.get("tool")?.as_str()?;
    let args = value.get("args").unwrap_or(&value);
    ToolCall::from_native(name, args)
}

/// The prefix of `text` (which starts with `{`) up to its matching `}`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

// ────────────────────────────────────────────────────────────────────────────
// Execution
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Added,
    AlreadyShortlisted,
    Locked,
    AlreadyLocked,
    Conflict,
    NotFound,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    pub tool: &'static str,
    pub status: ToolStatus,
    pub university_id: Option<Uuid>,
    pub university_name: String,
    pub message: String,
}

impl ToolOutcome {
    fn new(call: &ToolCall, status: ToolStatus, university_id: Option<Uuid>, name: &str) -> Self {
        let message = match status {
            ToolStatus::Added => format!("Added {name} to your shortlist."),
            ToolStatus::AlreadyShortlisted => format!("{name} is already on your shortlist."),
            ToolStatus::Locked => format!(
                "Locked {name} as your primary target. \
                 Your application checklist is ready in Guidance."
            ),
            ToolStatus::AlreadyLocked => {
                format!("{name} is already locked as your primary target.")
            }
            ToolStatus::Conflict => format!(
                "Could not lock {name}: another university is already locked. \
                 Unlock it from your shortlist first."
            ),
            ToolStatus::NotFound => format!(
                "Could not find a university matching \"{name}\" in the catalogue. \
                 Try searching for it on the Universities page."
            ),
            ToolStatus::Failed => {
                format!("Something went wrong while updating {name}. Please try again.")
            }
        };
        Self {
            tool: call.name(),
            status,
            university_id,
            university_name: name.to_string(),
            message,
        }
    }

    /// The user-visible system-channel line for this outcome.
    pub fn narration(&self) -> String {
        format!("[System: {}]", self.message)
    }
}

/// Runs the side effect of `call` for `user_id`. Never fails: every problem is
/// reported through the outcome so the chat can narrate it.
pub async fn execute_tool(pool: &PgPool, user_id: Uuid, call: &ToolCall) -> ToolOutcome {
    match try_execute(pool, user_id, call).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Tool {} failed for user {user_id}: {e}", call.name());
            ToolOutcome::new(call, ToolStatus::Failed, None, call.university_name())
        }
    }
}

async fn try_execute(
    pool: &PgPool,
    user_id: Uuid,
    call: &ToolCall,
) -> Result<ToolOutcome, AppError> {
    let Some(university) = find_by_name(pool, call.university_name()).await? else {
        info!("Tool {} found no university for '{}'", call.name(), call.university_name());
        return Ok(ToolOutcome::new(call, ToolStatus::NotFound, None, call.university_name()));
    };
    let id = Some(university.id);
    let name = university.name.as_str();

    let added = add_to_shortlist(pool, user_id, university.id).await?;

    let status = match call {
        ToolCall::AddToShortlist { .. } => match added {
            AddOutcome::Added(_) => ToolStatus::Added,
            AddOutcome::AlreadyExists(_) => ToolStatus::AlreadyShortlisted,
        },
        ToolCall::LockUniversity { .. } => match lock_entry(pool, user_id, university.id).await {
            Ok(LockOutcome::Locked { .. }) => ToolStatus::Locked,
            Ok(LockOutcome::AlreadyLocked(_)) => ToolStatus::AlreadyLocked,
            Err(AppError::Conflict(_)) => ToolStatus::Conflict,
            Err(e) => return Err(e),
        },
    };

    sync_stage(pool, user_id).await?;
    info!("Tool {} for user {user_id}: {:?} ({name})", call.name(), status);
    Ok(ToolOutcome::new(call, status, id, name))
}
