// Student profile: onboarding input validation, storage, and the funnel stage
// derived from shortlist state.

pub mod handlers;
pub mod store;
pub mod validation;
