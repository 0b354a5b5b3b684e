//! VBG Core - Cross-check orchestration engine
//!
//! This crate provides the orchestration logic of VBG, including:
//! - Config: agent templates, roles, budgets and limits
//! - Project: project type detection and ignore rules
//! - Selector: importance-ranked file selection
//! - Session: token-budgeted context history persisted as JSON
//! - Report: merged cross-check reports
//! - Orchestrator: parallel and sequential execution of the agent roles

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod project;
pub mod report;
pub mod selector;
pub mod session;
pub mod token;
mod utils;

pub use config::{
    AgentConfig, BenchmarkConfig, ExecutionConfig, ExecutionMode, LimitsConfig, OutputConfig,
    RolesConfig, SelectionCaps, SelectionConfig, SelectionWeights, SessionConfig, VbgConfig,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use orchestrator::{
    validate_request, Orchestrator, SessionChoice, TaskMode, TaskOutcome, TaskProgress,
    TaskRequest, TaskState,
};
pub use project::{IgnoreRules, ProjectType};
pub use report::{AgentRole, Report, ReportStore, RoleOutcome, RoleReport};
pub use selector::{scan, FileCandidate, FileSelector};
pub use session::{
    ContextEntry, EntryRole, Session, SessionLimits, SessionRef, SessionStats, SessionStore,
    SessionSummary,
};
pub use token::TokenCounter;
