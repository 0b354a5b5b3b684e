//! Agent CLI - run external AI coding agents as subprocesses
//!
//! Supports any agent that reads a prompt from its arguments or standard
//! input and writes its answer to standard output (Claude Code, Gemini CLI,
//! Codex, ...). Each invocation is a one-shot execution via
//! `tokio::process::Command`, measured by a [`ResourceSampler`].
//!
//! Failures are values, not errors: a missing binary, a timeout and a
//! non-zero exit all come back as an [`AgentResult`] with the matching
//! [`CompletionKind`].

use crate::sampler::{ResourceSampler, ResourceUsage};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default execution timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default ceiling on captured stdout/stderr (4 MiB each)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Amount of stderr quoted in a failure reason
const STDERR_TAIL_BYTES: usize = 2 * 1024;

/// How long pipes may stay open after the agent exits
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK_BYTES: usize = 8 * 1024;

const PROMPT_PLACEHOLDER: &str = "{prompt}";
const MODEL_PLACEHOLDER: &str = "{model}";

static SECRET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(sk-[a-zA-Z0-9_\-]{20,}|ghp_[a-zA-Z0-9]{20,}|ghu_[a-zA-Z0-9]{20,}|xoxb-[a-zA-Z0-9\-]{20,}|AIza[0-9A-Za-z_\-]{35})",
    )
    .expect("secret mask regex")
});

/// How the prompt reaches the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptDelivery {
    /// Substituted into the `{prompt}` argument
    #[default]
    Argument,
    /// Written to the child's standard input
    Stdin,
}

/// Launch description for one external agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    /// Agent identifier (e.g. "claude")
    pub id: String,
    /// Binary to execute
    pub command: String,
    /// Argument template; `{prompt}` is replaced with the prompt
    pub args: Vec<String>,
    /// Model identifier, if pinned
    pub model: Option<String>,
    /// Arguments appended when a model is pinned; `{model}` is replaced
    pub model_args: Vec<String>,
    /// Prompt delivery channel
    pub prompt_via: PromptDelivery,
}

impl AgentSpec {
    /// Create a spec that passes the prompt as the only argument
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: vec![PROMPT_PLACEHOLDER.to_string()],
            model: None,
            model_args: Vec::new(),
            prompt_via: PromptDelivery::Argument,
        }
    }

    /// Set the argument template
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Pin a model, passed through `model_args`
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, model_args: Vec<String>) -> Self {
        self.model = Some(model.into());
        self.model_args = model_args;
        self
    }

    /// Set the prompt delivery channel
    #[must_use]
    pub fn with_prompt_via(mut self, prompt_via: PromptDelivery) -> Self {
        self.prompt_via = prompt_via;
        self
    }

    /// Expand the argument template for a prompt.
    ///
    /// With stdin delivery, arguments carrying the prompt placeholder are
    /// dropped.
    #[must_use]
    pub fn build_args(&self, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .filter_map(|arg| match self.prompt_via {
                PromptDelivery::Argument => Some(arg.replace(PROMPT_PLACEHOLDER, prompt)),
                PromptDelivery::Stdin if arg.contains(PROMPT_PLACEHOLDER) => None,
                PromptDelivery::Stdin => Some(arg.clone()),
            })
            .collect();

        if let Some(model) = &self.model {
            args.extend(
                self.model_args
                    .iter()
                    .map(|arg| arg.replace(MODEL_PLACEHOLDER, model)),
            );
        }

        args
    }
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// Exit status zero, output captured
    Success,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Binary could not be located
    NotFound,
    /// Non-zero exit, spawn error, oversized output or cancellation
    Failed,
}

impl CompletionKind {
    /// Label used in reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::TimedOut => "AgentTimeout",
            Self::NotFound => "AgentNotFound",
            Self::Failed => "AgentFailed",
        }
    }
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Agent identifier
    pub agent_id: String,
    /// Completion kind
    pub kind: CompletionKind,
    /// Captured standard output (empty unless `Success`)
    pub output: String,
    /// Exit code, when the process exited on its own
    pub exit_code: Option<i32>,
    /// Failure reason for non-success kinds
    pub reason: Option<String>,
    /// Time and memory measurement
    pub usage: ResourceUsage,
}

impl AgentResult {
    /// Successful invocation
    #[must_use]
    pub fn success(agent_id: impl Into<String>, output: String, usage: ResourceUsage) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind: CompletionKind::Success,
            output,
            exit_code: Some(0),
            reason: None,
            usage,
        }
    }

    /// Unsuccessful invocation of the given kind
    #[must_use]
    pub fn failure(
        agent_id: impl Into<String>,
        kind: CompletionKind,
        reason: impl Into<String>,
        exit_code: Option<i32>,
        usage: ResourceUsage,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
            output: String::new(),
            exit_code,
            reason: Some(reason.into()),
            usage,
        }
    }

    /// Whether the output is usable
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == CompletionKind::Success
    }
}

/// Seam between the orchestrator and process execution
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `agent` with `prompt`. Never returns an error: every failure is
    /// described by the returned [`AgentResult`].
    async fn invoke(
        &self,
        agent: &AgentSpec,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AgentResult;
}

/// Subprocess-backed [`AgentRunner`]
#[derive(Debug, Clone)]
pub struct AgentInvoker {
    sampler: ResourceSampler,
    max_output_bytes: usize,
    working_dir: Option<PathBuf>,
}

impl Default for AgentInvoker {
    fn default() -> Self {
        Self::new(ResourceSampler::default())
    }
}

impl AgentInvoker {
    /// Create an invoker that measures with `sampler`
    #[must_use]
    pub fn new(sampler: ResourceSampler) -> Self {
        Self {
            sampler,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            working_dir: None,
        }
    }

    /// Set the output ceiling
    #[must_use]
    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Run agents from this directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

enum Finished {
    Exited {
        status: io::Result<ExitStatus>,
        read: io::Result<()>,
    },
    Overflowed,
    TimedOut,
    Cancelled,
}

#[async_trait]
impl AgentRunner for AgentInvoker {
    async fn invoke(
        &self,
        agent: &AgentSpec,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AgentResult {
        let started = Instant::now();
        let args = agent.build_args(prompt);

        info!(
            agent = %agent.id,
            command = %agent.command,
            timeout_secs = timeout.as_secs(),
            prompt_len = prompt.len(),
            "Invoking external AI agent"
        );
        debug!(arg_count = args.len(), via = ?agent.prompt_via, "Agent CLI arguments");

        let mut cmd = Command::new(&agent.command);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match agent.prompt_via {
            PromptDelivery::Argument => cmd.stdin(Stdio::null()),
            PromptDelivery::Stdin => cmd.stdin(Stdio::piped()),
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(agent = %agent.id, command = %agent.command, "Agent binary not found");
                return AgentResult::failure(
                    &agent.id,
                    CompletionKind::NotFound,
                    format!("binary '{}' not found in PATH", agent.command),
                    None,
                    ResourceUsage::unmeasured(started.elapsed()),
                );
            }
            Err(e) => {
                warn!(agent = %agent.id, error = %e, "Failed to spawn agent");
                return AgentResult::failure(
                    &agent.id,
                    CompletionKind::Failed,
                    format!("failed to spawn '{}': {}", agent.command, e),
                    None,
                    ResourceUsage::unmeasured(started.elapsed()),
                );
            }
        };

        let sampling = self.sampler.start(child.id(), started);
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let overflow = CancellationToken::new();
        let mut out = Captured::default();
        let mut err = Captured::default();

        let finished = {
            let reads = async {
                let (stdout, stderr, ()) = tokio::join!(
                    read_capped(stdout, limit, &mut out, Some(&overflow)),
                    read_capped(stderr, limit, &mut err, None),
                    write_prompt(stdin, prompt, agent.prompt_via),
                );
                stdout.and(stderr)
            };

            let run = async {
                tokio::pin!(reads);
                let mut read = None;

                // Keep draining the pipes while waiting, or a chatty child blocks
                let status = loop {
                    tokio::select! {
                        biased;
                        _ = overflow.cancelled() => return Finished::Overflowed,
                        r = &mut reads, if read.is_none() => read = Some(r),
                        status = child.wait() => break status,
                    }
                };

                // A helper left running in the background can hold the pipes
                // open after the agent itself has exited.
                let read = match read {
                    Some(read) => read,
                    None => match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut reads).await {
                        Ok(read) => read,
                        Err(_) => {
                            debug!(agent = %agent.id, "Pipes still open after exit, using captured output");
                            Ok(())
                        }
                    },
                };
                if overflow.is_cancelled() {
                    return Finished::Overflowed;
                }
                Finished::Exited { status, read }
            };

            tokio::select! {
                result = tokio::time::timeout(timeout, run) => {
                    result.unwrap_or(Finished::TimedOut)
                }
                _ = cancel.cancelled() => Finished::Cancelled,
            }
        };

        if matches!(
            finished,
            Finished::Overflowed | Finished::TimedOut | Finished::Cancelled
        ) {
            if let Err(e) = child.start_kill() {
                debug!(agent = %agent.id, error = %e, "Kill after deadline failed");
            }
            let _ = child.wait().await;
        }

        let usage = sampling.stop().await;

        let result = match finished {
            Finished::TimedOut => {
                warn!(agent = %agent.id, timeout_secs = timeout.as_secs(), "Agent timed out");
                AgentResult::failure(
                    &agent.id,
                    CompletionKind::TimedOut,
                    format!("timed out after {}s", timeout.as_secs()),
                    None,
                    usage,
                )
            }
            Finished::Cancelled => AgentResult::failure(
                &agent.id,
                CompletionKind::Failed,
                "cancelled",
                None,
                usage,
            ),
            Finished::Overflowed => {
                warn!(agent = %agent.id, limit, "Agent output exceeded limit, stopped");
                AgentResult::failure(
                    &agent.id,
                    CompletionKind::Failed,
                    format!("output exceeded {} bytes", limit),
                    None,
                    usage,
                )
            }
            Finished::Exited { status, read } => classify_exit(agent, status, read, out, err, usage),
        };

        info!(
            agent = %agent.id,
            kind = %result.kind,
            exit_code = ?result.exit_code,
            output_len = result.output.len(),
            duration_ms = result.usage.elapsed_ms,
            peak_memory_bytes = ?result.usage.peak_memory_bytes,
            "Agent execution completed"
        );

        result
    }
}

fn classify_exit(
    agent: &AgentSpec,
    status: io::Result<ExitStatus>,
    read: io::Result<()>,
    stdout: Captured,
    stderr: Captured,
    usage: ResourceUsage,
) -> AgentResult {
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return AgentResult::failure(
                &agent.id,
                CompletionKind::Failed,
                format!("failed to wait for '{}': {}", agent.command, e),
                None,
                usage,
            )
        }
    };
    let exit_code = status.code();

    if let Err(e) = read {
        return AgentResult::failure(
            &agent.id,
            CompletionKind::Failed,
            format!("failed to read output: {}", e),
            exit_code,
            usage,
        );
    }

    let stderr = stderr.bytes;

    if status.success() {
        let output = String::from_utf8_lossy(&stdout.bytes);
        return AgentResult::success(&agent.id, mask_secrets(&output), usage);
    }

    let diagnostic = mask_secrets(&tail_utf8(&stderr, STDERR_TAIL_BYTES));
    warn!(
        agent = %agent.id,
        exit_code = ?exit_code,
        stderr_len = stderr.len(),
        "Agent exited with non-zero status"
    );
    let reason = match exit_code {
        Some(code) if diagnostic.trim().is_empty() => format!("exit status {}", code),
        Some(code) => format!("exit status {}: {}", code, diagnostic.trim()),
        None => "terminated by signal".to_string(),
    };
    AgentResult::failure(&agent.id, CompletionKind::Failed, reason, exit_code, usage)
}

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
}

/// Read a pipe into `sink` until EOF or until more than `limit` bytes
/// arrived. Overflow cancels `overflow` so the caller can stop the child.
/// Bytes already read stay in `sink` if the future is dropped early.
async fn read_capped<R>(
    reader: Option<R>,
    limit: usize,
    sink: &mut Captured,
    overflow: Option<&CancellationToken>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let room = (limit + 1).saturating_sub(sink.bytes.len());
        sink.bytes.extend_from_slice(&buf[..n.min(room)]);
        if sink.bytes.len() > limit {
            if let Some(token) = overflow {
                token.cancel();
            }
            return Ok(());
        }
    }
}

async fn write_prompt(stdin: Option<ChildStdin>, prompt: &str, via: PromptDelivery) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if via != PromptDelivery::Stdin {
        return;
    }
    if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
        debug!(error = %e, "Agent closed stdin early");
        return;
    }
    let _ = stdin.shutdown().await;
}

/// Last `max_bytes` of `bytes` as UTF-8, cut on a char boundary.
fn tail_utf8(bytes: &[u8], max_bytes: usize) -> String {
    let s = String::from_utf8_lossy(bytes);
    if s.len() <= max_bytes {
        return s.into_owned();
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &s[start..])
}

/// Replace strings that look like API keys or tokens.
#[must_use]
pub fn mask_secrets(text: &str) -> String {
    SECRET_PATTERN.replace_all(text, "[REDACTED]").into_owned()
}

/// Check whether `command` resolves on the PATH.
pub async fn is_available(command: &str) -> bool {
    match Command::new("which")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            debug!(error = %e, "Failed to run `which`");
            false
        }
    }
}
