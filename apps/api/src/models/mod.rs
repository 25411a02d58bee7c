pub mod guidance;
pub mod profile;
pub mod shortlist;
pub mod university;
pub mod user;
