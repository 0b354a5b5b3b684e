//! VBG Tools - External agent execution
//!
//! This crate provides the process-level building blocks for VBG:
//! - Agent CLI: one-shot invocation of an external AI agent with timeout
//! - Sampler: background memory sampling of a running process
//! - Benchmark: repeated build-command timing for refactor baselines

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent_cli;
pub mod benchmark;
pub mod error;
pub mod sampler;

pub use agent_cli::{
    is_available, mask_secrets, AgentInvoker, AgentResult, AgentRunner, AgentSpec,
    CompletionKind, PromptDelivery,
};
pub use benchmark::{BuildBenchmark, BuildMeasurement};
pub use error::{Error, Result};
pub use sampler::{ActiveSampling, ResourceSampler, ResourceUsage};
