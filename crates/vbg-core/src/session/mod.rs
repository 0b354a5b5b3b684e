//! Session context
//!
//! A session is the conversation history of one working directory. Each
//! completed task appends one task-issuer entry and one entry per invoked
//! agent; older entries are evicted to keep the history inside its token
//! budget and entry cap.
//!
//! # Module Structure
//!
//! - `context`: `Session`, `ContextEntry` and their invariants
//! - `store`: `SessionStore`, the JSON file persistence

mod context;
mod store;

#[cfg(test)]
mod tests;

pub use context::{ContextEntry, EntryRole, Session, SessionLimits, SessionStats};
pub use store::{SessionRef, SessionStore, SessionSummary, CURRENT_POINTER};
