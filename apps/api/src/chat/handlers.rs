//! POST /api/v1/chat: the counseling chat proxy.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::chat::interceptor::{Action, StreamInterceptor};
use crate::chat::persona::Persona;
use crate::chat::prompts::{build_system_prompt, StudentContext};
use crate::chat::tools::{execute_tool, tool_definitions, ToolOutcome};
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, Role, StreamEvent};
use crate::models::profile::FunnelStage;
use crate::profile::store::find_profile;
use crate::shortlist::store::list_entries;
use crate::state::AppState;

/// Prior turns forwarded upstream.
pub const MAX_HISTORY_TURNS: usize = 20;

const APOLOGY: &str =
    "I'm sorry, I'm having trouble reaching my knowledge service right now. Please try again in a moment.";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
    pub persona: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub tool_results: Vec<ToolOutcome>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handler
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
///
/// `stream: false` answers with `{reply, toolResults}`; `stream: true` with a
/// chunked plain-text body. Upstream failures become an apologetic reply.
pub async fn handle_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let persona = Persona::parse(request.persona.as_deref());
    let context = load_context(&state.db, &user).await?;
    let system = build_system_prompt(persona, &context);
    let messages = build_conversation(&request.messages, message);
    let tools = tool_definitions();

    info!(
        "Chat turn for user {} (persona {:?}, {} messages, stream={})",
        user.id,
        persona,
        messages.len(),
        request.stream
    );

    if !request.stream {
        let reply = match state.llm.chat(&system, &messages, &tools).await {
            Ok(response) => {
                run_actions(&state.db, user.id, StreamInterceptor::absorb_response(&response)).await
            }
            Err(e) => {
                error!("Chat completion failed: {e}");
                ChatReply {
                    reply: APOLOGY.to_string(),
                    tool_results: Vec::new(),
                }
            }
        };
        return Ok(Json(reply).into_response());
    }

    let body = match state.llm.stream_chat(&system, &messages, &tools).await {
        Ok(events) => Body::from_stream(relay(events, state.db.clone(), user.id)),
        Err(e) => {
            error!("Chat stream failed to start: {e}");
            Body::from(APOLOGY)
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Forwards model text and runs tool calls as the upstream events arrive.
fn relay(
    mut events: crate::llm_client::EventStream,
    db: PgPool,
    user_id: Uuid,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let mut interceptor = StreamInterceptor::default();
        while let Some(event) = events.next().await {
            let actions = match event {
                Ok(StreamEvent::Error(message)) => {
                    error!("Chat stream reported an error: {message}");
                    yield Ok::<_, Infallible>(Bytes::from(format!("\n\n{APOLOGY}")));
                    return;
                }
                Ok(event) => interceptor.on_event(&event),
                Err(e) => {
                    error!("Chat stream interrupted: {e}");
                    yield Ok::<_, Infallible>(Bytes::from(format!("\n\n{APOLOGY}")));
                    return;
                }
            };
            for action in actions {
                yield Ok::<_, Infallible>(Bytes::from(render(&db, user_id, action).await));
            }
        }
        for action in interceptor.finish() {
            yield Ok::<_, Infallible>(Bytes::from(render(&db, user_id, action).await));
        }
    }
}

async fn render(db: &PgPool, user_id: Uuid, action: Action) -> String {
    match action {
        Action::Emit(text) => text,
        Action::Invoke(call) => {
            let outcome = execute_tool(db, user_id, &call).await;
            format!("\n\n{}\n", outcome.narration())
        }
    }
}

async fn run_actions(db: &PgPool, user_id: Uuid, actions: Vec<Action>) -> ChatReply {
    let mut text = String::new();
    let mut tool_results = Vec::new();
    for action in actions {
        match action {
            Action::Emit(chunk) => text.push_str(&chunk),
            Action::Invoke(call) => tool_results.push(execute_tool(db, user_id, &call).await),
        }
    }
    ChatReply {
        reply: compose_reply(&text, &tool_results),
        tool_results,
    }
}

/// Model text followed by one `[System: ...]` line per tool result.
fn compose_reply(text: &str, outcomes: &[ToolOutcome]) -> String {
    std::iter::once(text.trim().to_string())
        .chain(outcomes.iter().map(ToolOutcome::narration))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn load_context(db: &PgPool, user: &CurrentUser) -> Result<StudentContext, AppError> {
    let profile = find_profile(db, user.id).await?;
    let entries = list_entries(db, user.id).await?;
    let has_lock = entries.iter().any(|(entry, _)| entry.locked);
    Ok(StudentContext {
        name: user.name.clone(),
        profile,
        stage: FunnelStage::for_shortlist(entries.len() as i64, has_lock),
        shortlist: entries
            .into_iter()
            .map(|(entry, university)| (university.name, university.country, entry.locked))
            .collect(),
    })
}

/// Last `MAX_HISTORY_TURNS` valid turns plus the new message, with consecutive
/// same-role turns merged so roles alternate and the first turn is the user's.
pub fn build_conversation(history: &[HistoryMessage], message: &str) -> Vec<ChatMessage> {
    let valid: Vec<ChatMessage> = history
        .iter()
        .filter_map(|m| {
            let role = match m.role.trim().to_ascii_lowercase().as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                _ => return None,
            };
            let content = m.content.trim();
            (!content.is_empty()).then(|| ChatMessage {
                role,
                content: content.to_string(),
            })
        })
        .collect();

    let start = valid.len().saturating_sub(MAX_HISTORY_TURNS);
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(MAX_HISTORY_TURNS + 1);
    for turn in valid
        .into_iter()
        .skip(start)
        .chain(std::iter::once(ChatMessage::user(message)))
    {
        match merged.last_mut() {
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            None if turn.role == Role::Assistant => {}
            _ => merged.push(turn),
        }
    }
    merged
}
