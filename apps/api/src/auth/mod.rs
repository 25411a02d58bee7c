//! Authentication: Argon2 password hashing, opaque cookie sessions, and the
//! `CurrentUser` extractor every protected handler takes as an argument.

pub mod handlers;
pub mod password;
pub mod session;

pub use session::CurrentUser;
