pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::chat::handlers as chat;
use crate::guidance::handlers as guidance;
use crate::profile::handlers as profile;
use crate::shortlist::handlers as shortlist;
use crate::state::AppState;
use crate::universities::handlers as universities;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        .route("/api/v1/auth/me", get(auth::handle_me))
        // Profile
        .route("/api/v1/onboarding", post(profile::handle_onboarding))
        .route(
            "/api/v1/profile",
            get(profile::handle_get_profile).put(profile::handle_update_profile),
        )
        .route("/api/v1/dashboard", get(profile::handle_dashboard))
        // Universities
        .route(
            "/api/v1/universities",
            get(universities::handle_list_universities),
        )
        .route(
            "/api/v1/universities/:id",
            get(universities::handle_get_university),
        )
        // Shortlist
        .route(
            "/api/v1/shortlist",
            get(shortlist::handle_list_shortlist).post(shortlist::handle_add_to_shortlist),
        )
        .route(
            "/api/v1/shortlist/:university_id",
            delete(shortlist::handle_remove_from_shortlist),
        )
        .route(
            "/api/v1/shortlist/:university_id/lock",
            post(shortlist::handle_lock),
        )
        .route(
            "/api/v1/shortlist/:university_id/unlock",
            post(shortlist::handle_unlock),
        )
        // Guidance
        .route("/api/v1/guidance/tasks", get(guidance::handle_list_tasks))
        .route(
            "/api/v1/guidance/tasks/:id/toggle",
            post(guidance::handle_toggle_task),
        )
        // Chat
        .route("/api/v1/chat", post(chat::handle_chat))
        .with_state(state)
}
