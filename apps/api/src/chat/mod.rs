// Chat: persona prompts, the student context handed to the model, and the
// tool-call protocol that turns model replies into shortlist changes.

pub mod handlers;
pub mod interceptor;
pub mod persona;
pub mod prompts;
pub mod tools;
