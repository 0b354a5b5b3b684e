//! Orchestrator - task coordination
//!
//! Ties the session store, file selector, agent runner and report store
//! together for one task at a time.
//!
//! # Module Structure
//!
//! - `types`: task input, state machine and outcome types
//! - `core`: Orchestrator struct and builder methods
//! - `process`: main task flow and input validation
//! - `execution`: parallel and sequential role execution
//! - `prompts`: prompt construction per mode

mod core;
mod execution;
mod process;
pub mod prompts;
mod types;


pub use self::core::Orchestrator;
pub use process::validate_request;
pub use types::{SessionChoice, TaskMode, TaskOutcome, TaskProgress, TaskRequest, TaskState};
