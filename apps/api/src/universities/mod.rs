// University catalogue: local search, directory discovery and the Redis cache in front of it.

pub mod cache;
pub mod directory;
pub mod handlers;
pub mod store;
