//! Configuration types
//!
//! Every tunable of the engine lives here: agent launch templates, role
//! assignment, execution mode, session budget, selection weights and caps,
//! input limits, benchmark settings and output locations. All fields carry
//! serde defaults so a partial document deserializes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use vbg_tools::{AgentSpec, PromptDelivery};

/// Root configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VbgConfig {
    /// Agent launch templates keyed by agent id
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, AgentConfig>,
    /// Which agents act as primary and auditor
    #[serde(default)]
    pub roles: RolesConfig,
    /// Execution strategy and invocation limits
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,
    /// File selection heuristic
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Input limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Build baseline for refactor mode
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    /// Report and plan output
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for VbgConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            roles: RolesConfig::default(),
            execution: ExecutionConfig::default(),
            session: SessionConfig::default(),
            selection: SelectionConfig::default(),
            limits: LimitsConfig::default(),
            benchmark: BenchmarkConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_agents() -> BTreeMap<String, AgentConfig> {
    let mut agents = BTreeMap::new();
    agents.insert(
        "claude".to_string(),
        AgentConfig {
            args: vec!["-p".to_string(), "{prompt}".to_string()],
            ..AgentConfig::new("claude")
        },
    );
    agents.insert(
        "gemini".to_string(),
        AgentConfig {
            args: vec!["-p".to_string(), "{prompt}".to_string()],
            model_args: vec!["-m".to_string(), "{model}".to_string()],
            ..AgentConfig::new("gemini")
        },
    );
    agents
}

/// Launch template for one external agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Executable name or path
    pub command: String,
    /// Argument template, `{prompt}` is replaced by the prompt
    #[serde(default = "default_prompt_args")]
    pub args: Vec<String>,
    /// Model identifier passed through `model_args`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Arguments appended when `model` is set, `{model}` is replaced
    #[serde(default)]
    pub model_args: Vec<String>,
    /// Prompt delivery
    #[serde(default)]
    pub prompt_via: PromptDelivery,
    /// Per-agent timeout override in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Disabled agents are never invoked
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AgentConfig {
    /// Template running `command` with the prompt as its only argument
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: default_prompt_args(),
            model: None,
            model_args: Vec::new(),
            prompt_via: PromptDelivery::Argument,
            timeout_secs: None,
            enabled: true,
        }
    }

    /// Launch description for the invoker
    #[must_use]
    pub fn to_spec(&self, id: &str) -> AgentSpec {
        let spec = AgentSpec::new(id, self.command.clone())
            .with_args(self.args.iter().cloned())
            .with_prompt_via(self.prompt_via);
        match &self.model {
            Some(model) => spec.with_model(model.clone(), self.model_args.clone()),
            None => spec,
        }
    }
}

fn default_prompt_args() -> Vec<String> {
    vec!["{prompt}".to_string()]
}

fn default_true() -> bool {
    true
}

/// Role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Agent producing the main answer
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Agent cross-checking the primary; empty disables the audit
    #[serde(default = "default_auditor")]
    pub auditor: String,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            auditor: default_auditor(),
        }
    }
}

fn default_primary() -> String {
    "claude".to_string()
}

fn default_auditor() -> String {
    "gemini".to_string()
}

/// How the two roles are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Both agents run concurrently on the same prompt
    #[default]
    Parallel,
    /// The auditor reviews the primary's output
    Sequential,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => f.write_str("parallel"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Parallel or sequential cross-check
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Default per-invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest accepted agent output
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Memory sampling interval
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    vbg_tools::agent_cli::DEFAULT_TIMEOUT_SECS
}
fn default_max_output_bytes() -> usize {
    vbg_tools::agent_cli::DEFAULT_MAX_OUTPUT_BYTES
}
fn default_sample_interval_ms() -> u64 {
    100
}

/// Session persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Persist sessions to disk
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Session directory, relative to the project root
    #[serde(default = "default_session_dir")]
    pub dir: String,
    /// Token budget of the stored history
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Entry cap, independent of the token budget
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Idle time after which a session is expired
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u64,
    /// Agent output is clipped to this many characters before it is stored
    #[serde(default = "default_max_entry_chars")]
    pub max_entry_chars: usize,
    /// Recent entries quoted in each prompt
    #[serde(default = "default_history_in_prompt")]
    pub history_in_prompt: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_session_dir(),
            max_context_tokens: default_max_context_tokens(),
            max_entries: default_max_entries(),
            expiry_hours: default_expiry_hours(),
            max_entry_chars: default_max_entry_chars(),
            history_in_prompt: default_history_in_prompt(),
        }
    }
}

impl SessionConfig {
    /// Expiry as a chrono duration
    #[must_use]
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::try_from(self.expiry_hours).unwrap_or(i64::MAX / 3600))
    }
}

fn default_session_dir() -> String {
    ".vbg_sessions".to_string()
}
fn default_max_context_tokens() -> usize {
    8_000
}
fn default_max_entries() -> usize {
    20
}
fn default_expiry_hours() -> u64 {
    24
}
fn default_max_entry_chars() -> usize {
    4_000
}
fn default_history_in_prompt() -> usize {
    6
}

/// File selection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Scoring weights
    #[serde(default)]
    pub weights: SelectionWeights,
    /// Per-mode caps
    #[serde(default)]
    pub caps: SelectionCaps,
}

/// Scoring weights of the importance heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionWeights {
    /// Weight of the recency term
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
    /// Age at which the recency term halves
    #[serde(default = "default_half_life")]
    pub recency_half_life_hours: f64,
    /// Weight of the file-type term
    #[serde(default = "default_type_weight")]
    pub file_type: f64,
    /// Weight of the size penalty
    #[serde(default = "default_size_weight")]
    pub size: f64,
    /// Size scale of the logarithmic penalty
    #[serde(default = "default_size_scale")]
    pub size_scale_bytes: u64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            recency: default_recency_weight(),
            recency_half_life_hours: default_half_life(),
            file_type: default_type_weight(),
            size: default_size_weight(),
            size_scale_bytes: default_size_scale(),
        }
    }
}

fn default_recency_weight() -> f64 {
    1.0
}
fn default_half_life() -> f64 {
    72.0
}
fn default_type_weight() -> f64 {
    2.0
}
fn default_size_weight() -> f64 {
    0.3
}
fn default_size_scale() -> u64 {
    16 * 1024
}

/// Maximum selected files per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCaps {
    /// Question analysis
    #[serde(default = "default_cap_30")]
    pub analysis: usize,
    /// Refactor suggestions
    #[serde(default = "default_cap_20")]
    pub refactor: usize,
    /// Improvement recommendations
    #[serde(default = "default_cap_30")]
    pub recommend: usize,
    /// UI/UX review
    #[serde(default = "default_cap_20")]
    pub ui: usize,
    /// Implementation plan
    #[serde(default = "default_cap_30")]
    pub plan: usize,
    /// New project scaffolding
    #[serde(default)]
    pub new_project: usize,
}

impl Default for SelectionCaps {
    fn default() -> Self {
        Self {
            analysis: 30,
            refactor: 20,
            recommend: 30,
            ui: 20,
            plan: 30,
            new_project: 0,
        }
    }
}

fn default_cap_30() -> usize {
    30
}
fn default_cap_20() -> usize {
    20
}

/// Input limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Longest accepted task text
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Longest accepted project name
    #[serde(default = "default_max_project_name_chars")]
    pub max_project_name_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_project_name_chars: default_max_project_name_chars(),
        }
    }
}

fn default_max_input_chars() -> usize {
    10_000
}
fn default_max_project_name_chars() -> usize {
    64
}

/// Build baseline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Measure the project build before refactor analysis
    #[serde(default)]
    pub enabled: bool,
    /// Measured runs
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Unmeasured warmup runs
    #[serde(default = "default_warmup")]
    pub warmup: u32,
    /// Timeout of a single build run
    #[serde(default = "default_build_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            iterations: default_iterations(),
            warmup: default_warmup(),
            timeout_secs: default_build_timeout_secs(),
        }
    }
}

fn default_iterations() -> u32 {
    3
}
fn default_warmup() -> u32 {
    1
}
fn default_build_timeout_secs() -> u64 {
    600
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write one report file per task
    #[serde(default = "default_true")]
    pub save_reports: bool,
    /// Report directory, relative to the project root
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
    /// File receiving the primary output of plan mode
    #[serde(default = "default_plan_file")]
    pub plan_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_reports: true,
            report_dir: default_report_dir(),
            plan_file: default_plan_file(),
        }
    }
}

fn default_report_dir() -> String {
    ".vbg_reports".to_string()
}
fn default_plan_file() -> String {
    "vbg_plan.md".to_string()
}

impl VbgConfig {
    /// Check cross-field constraints.
    ///
    /// Runs before any agent is invoked; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        let primary = self.primary_agent()?;
        if !primary.enabled {
            return Err(Error::config(
                "roles.primary",
                format!("agent '{}' is disabled", self.roles.primary),
            ));
        }
        if let Some(id) = self.auditor_id() {
            if !self.agents.contains_key(id) {
                return Err(Error::config(
                    "roles.auditor",
                    format!("unknown agent '{}'", id),
                ));
            }
        }

        for (id, agent) in &self.agents {
            if agent.command.trim().is_empty() {
                return Err(Error::config(
                    format!("agents.{}.command", id),
                    "must not be empty",
                ));
            }
            if agent.prompt_via == PromptDelivery::Argument
                && !agent.args.iter().any(|a| a.contains("{prompt}"))
            {
                return Err(Error::config(
                    format!("agents.{}.args", id),
                    "must contain a {prompt} placeholder when prompt_via = \"argument\"",
                ));
            }
            if agent.timeout_secs == Some(0) {
                return Err(Error::config(
                    format!("agents.{}.timeout_secs", id),
                    "must be positive",
                ));
            }
        }

        let positive: [(&str, u64); 7] = [
            ("execution.timeout_secs", self.execution.timeout_secs),
            ("execution.max_output_bytes", self.execution.max_output_bytes as u64),
            ("execution.sample_interval_ms", self.execution.sample_interval_ms),
            ("session.max_context_tokens", self.session.max_context_tokens as u64),
            ("session.max_entries", self.session.max_entries as u64),
            ("session.expiry_hours", self.session.expiry_hours),
            ("limits.max_input_chars", self.limits.max_input_chars as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(Error::config(field, "must be positive"));
            }
        }
        if self.session.max_entry_chars == 0 {
            return Err(Error::config("session.max_entry_chars", "must be positive"));
        }
        if self.limits.max_project_name_chars == 0 {
            return Err(Error::config(
                "limits.max_project_name_chars",
                "must be positive",
            ));
        }
        if self.session.dir.trim().is_empty() {
            return Err(Error::config("session.dir", "must not be empty"));
        }

        let weights = &self.selection.weights;
        if !(weights.recency_half_life_hours.is_finite() && weights.recency_half_life_hours > 0.0)
        {
            return Err(Error::config(
                "selection.weights.recency_half_life_hours",
                "must be a positive number",
            ));
        }
        if weights.size_scale_bytes == 0 {
            return Err(Error::config(
                "selection.weights.size_scale_bytes",
                "must be positive",
            ));
        }
        for (field, value) in [
            ("selection.weights.recency", weights.recency),
            ("selection.weights.file_type", weights.file_type),
            ("selection.weights.size", weights.size),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(field, "must be a non-negative number"));
            }
        }

        if self.benchmark.enabled && self.benchmark.timeout_secs == 0 {
            return Err(Error::config("benchmark.timeout_secs", "must be positive"));
        }
        if self.output.save_reports && self.output.report_dir.trim().is_empty() {
            return Err(Error::config("output.report_dir", "must not be empty"));
        }

        Ok(())
    }

    /// Configuration of the primary agent
    pub fn primary_agent(&self) -> Result<&AgentConfig> {
        self.agents.get(&self.roles.primary).ok_or_else(|| {
            Error::config(
                "roles.primary",
                format!("unknown agent '{}'", self.roles.primary),
            )
        })
    }

    /// Auditor id, `None` when the audit is turned off
    #[must_use]
    pub fn auditor_id(&self) -> Option<&str> {
        let id = self.roles.auditor.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Launch description of the auditor, if one is configured and enabled
    #[must_use]
    pub fn auditor_spec(&self) -> Option<AgentSpec> {
        let id = self.auditor_id()?;
        let agent = self.agents.get(id)?;
        agent.enabled.then(|| agent.to_spec(id))
    }

    /// Effective timeout for `agent_id`
    #[must_use]
    pub fn agent_timeout(&self, agent_id: &str) -> Duration {
        let secs = self
            .agents
            .get(agent_id)
            .and_then(|a| a.timeout_secs)
            .unwrap_or(self.execution.timeout_secs);
        Duration::from_secs(secs)
    }
}
