//! Session-scoped agents and their idle eviction.

mod cache;
mod eviction;

pub use cache::{SessionCache, SessionRecord};
pub use eviction::{EvictionLoop, EvictionPolicy};
