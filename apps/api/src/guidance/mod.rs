// Guidance: the post-lock application checklist.
// Tasks are created in one batch when a shortlist entry is locked and are
// afterwards only toggled between pending and completed.

pub mod checklist;
pub mod handlers;
pub mod store;
