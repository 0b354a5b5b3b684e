//! Orchestrator core structure
//!
//! Contains the main `Orchestrator` struct and its builder methods.

use crate::config::VbgConfig;
use crate::error::Result;
use crate::project::{IgnoreRules, ProjectType};
use crate::report::ReportStore;
use crate::session::{SessionStore, SessionSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vbg_tools::{AgentInvoker, AgentRunner, BuildBenchmark, ResourceSampler};

/// Coordinates one task from session resolution to report
pub struct Orchestrator {
    pub(crate) config: VbgConfig,
    pub(crate) root: PathBuf,
    pub(crate) project_type: ProjectType,
    pub(crate) runner: Arc<dyn AgentRunner>,
    pub(crate) sessions: Option<SessionStore>,
    pub(crate) reports: Option<ReportStore>,
    pub(crate) benchmark: Option<BuildBenchmark>,
    pub(crate) cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator for the project at `root`.
    ///
    /// The configuration is validated here, before anything runs.
    pub fn new(config: VbgConfig, root: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let root = root.into();

        let sampler = ResourceSampler::new(Duration::from_millis(config.execution.sample_interval_ms));
        let invoker = AgentInvoker::new(sampler)
            .with_max_output_bytes(config.execution.max_output_bytes)
            .with_working_dir(root.clone());

        let sessions = config
            .session
            .enabled
            .then(|| SessionStore::from_config(&config.session, &root));
        let reports = config
            .output
            .save_reports
            .then(|| ReportStore::new(root.join(&config.output.report_dir)));
        let benchmark = config.benchmark.enabled.then(|| {
            BuildBenchmark::new(
                config.benchmark.iterations,
                config.benchmark.warmup,
                Duration::from_secs(config.benchmark.timeout_secs),
            )
            .with_sampler(sampler)
        });
        let project_type = ProjectType::detect(&root);

        info!(
            root = %root.display(),
            project_type = %project_type,
            primary = %config.roles.primary,
            auditor = config.auditor_id().unwrap_or("-"),
            mode = %config.execution.mode,
            "Orchestrator ready"
        );

        Ok(Self {
            config,
            root,
            project_type,
            runner: Arc::new(invoker),
            sessions,
            reports,
            benchmark,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the agent runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn AgentRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Override the detected project type
    #[must_use]
    pub fn with_project_type(mut self, project_type: ProjectType) -> Self {
        self.project_type = project_type;
        self
    }

    /// Token cancelling every invocation of this orchestrator
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &VbgConfig {
        &self.config
    }

    /// Project root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Detected project type
    #[must_use]
    pub fn project_type(&self) -> ProjectType {
        self.project_type
    }

    /// Session store, when persistence is enabled
    #[must_use]
    pub fn session_store(&self) -> Option<&SessionStore> {
        self.sessions.as_ref()
    }

    /// Non-expired sessions, newest first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        match &self.sessions {
            Some(store) => store.list(),
            None => Ok(Vec::new()),
        }
    }

    /// Scan rules: project rules plus our own output directories
    pub(crate) fn ignore_rules(&self) -> IgnoreRules {
        let mut rules = self.project_type.ignore_rules();
        for dir in [&self.config.session.dir, &self.config.output.report_dir] {
            if let Some(name) = Path::new(dir).file_name().and_then(|n| n.to_str()) {
                rules = rules.with_dir(name);
            }
        }
        rules
    }
}
