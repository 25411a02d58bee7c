// Shortlist: saved candidate universities and the single locked target.
// Every mutation is followed by a funnel-stage recomputation in the handler.

pub mod handlers;
pub mod store;
