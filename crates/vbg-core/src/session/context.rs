//! Session and context entry types
//!
//! ## Budget management
//!
//! The token count of a session is always the sum of its entries' token
//! counts. [`Session::enforce_limits`] evicts the oldest entries until both
//! the token budget and the entry cap hold. A single entry larger than the
//! whole budget is evicted as well, which can leave the history empty.

use crate::token::TokenCounter;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Who produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    /// The task text given by the user
    TaskIssuer,
    /// Output (or failure marker) of an agent
    Agent,
}

impl fmt::Display for EntryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskIssuer => f.write_str("task-issuer"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// One turn of the history. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    role: EntryRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,
    content: String,
    timestamp: DateTime<Utc>,
    command: String,
    token_count: usize,
}

impl ContextEntry {
    /// Entry recording the task text
    #[must_use]
    pub fn task(content: impl Into<String>, command: impl Into<String>) -> Self {
        Self::build(EntryRole::TaskIssuer, None, content.into(), command.into())
    }

    /// Entry recording an agent's output
    #[must_use]
    pub fn agent(
        agent_id: impl Into<String>,
        content: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self::build(
            EntryRole::Agent,
            Some(agent_id.into()),
            content.into(),
            command.into(),
        )
    }

    fn build(role: EntryRole, agent_id: Option<String>, content: String, command: String) -> Self {
        let token_count = TokenCounter::new().count_entry_tokens(&content);
        Self {
            role,
            agent_id,
            content,
            timestamp: Utc::now(),
            command,
            token_count,
        }
    }

    /// Producer of the entry
    #[must_use]
    pub fn role(&self) -> EntryRole {
        self.role
    }

    /// Agent id for agent entries
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// Entry text
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Mode that produced the entry
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Estimated tokens
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Speaker label used when quoting the entry in a prompt
    #[must_use]
    pub fn speaker(&self) -> &str {
        match self.role {
            EntryRole::TaskIssuer => "user",
            EntryRole::Agent => self.agent_id.as_deref().unwrap_or("agent"),
        }
    }
}

/// Token budget and entry cap of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Maximum sum of entry token counts
    pub max_context_tokens: usize,
    /// Maximum number of entries
    pub max_entries: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_context_tokens: 8_000,
            max_entries: 20,
        }
    }
}

/// Per-session usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Completed tasks
    #[serde(default)]
    pub tasks: u32,
    /// Invocations per agent id
    #[serde(default)]
    pub agent_calls: BTreeMap<String, u32>,
    /// Estimated prompt tokens sent to agents
    #[serde(default)]
    pub estimated_tokens_sent: u64,
}

impl SessionStats {
    /// Record one agent invocation with a prompt of `prompt_tokens`
    pub fn record_invocation(&mut self, agent_id: &str, prompt_tokens: usize) {
        *self.agent_calls.entry(agent_id.to_string()).or_default() += 1;
        self.estimated_tokens_sent += prompt_tokens as u64;
    }

    /// Total invocations across agents
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.agent_calls.values().sum()
    }
}

/// Conversation history of one working directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    working_dir: PathBuf,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    entry_count: usize,
    #[serde(default)]
    token_count: usize,
    #[serde(default)]
    stats: SessionStats,
    #[serde(default)]
    entries: Vec<ContextEntry>,
}

impl Session {
    /// Fresh session for `working_dir`
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            working_dir: working_dir.into(),
            created_at: now,
            last_used_at: now,
            expires_at: now + expiry,
            entry_count: 0,
            token_count: 0,
            stats: SessionStats::default(),
            entries: Vec::new(),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Working directory the session belongs to
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Creation time
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time the session was used
    #[must_use]
    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }

    /// Time at which the session expires if left idle
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// History in chronological order
    #[must_use]
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// The `n` most recent entries, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> &[ContextEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Sum of entry token counts
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Usage statistics
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Mutable usage statistics
    pub fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }

    /// Mark the session as used now
    pub fn touch(&mut self, expiry: Duration) {
        self.last_used_at = Utc::now();
        self.expires_at = self.last_used_at + expiry;
    }

    /// Whether the session has been idle longer than `expiry` at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now - self.last_used_at > expiry
    }

    /// Append an entry. Limits are enforced separately.
    pub fn push(&mut self, entry: ContextEntry) {
        self.token_count += entry.token_count;
        self.entries.push(entry);
        self.entry_count = self.entries.len();
    }

    /// Evict oldest entries until the history fits `limits`.
    ///
    /// Returns the number of evicted entries.
    pub fn enforce_limits(&mut self, limits: SessionLimits) -> usize {
        let mut evict = 0;
        let mut tokens = self.token_count;
        let mut remaining = self.entries.len();
        for entry in &self.entries {
            if tokens <= limits.max_context_tokens && remaining <= limits.max_entries {
                break;
            }
            tokens -= entry.token_count;
            remaining -= 1;
            evict += 1;
        }

        if evict > 0 {
            self.entries.drain(..evict);
            self.token_count = tokens;
            self.entry_count = self.entries.len();
            debug!(
                session_id = %self.id,
                evicted = evict,
                tokens = self.token_count,
                entries = self.entry_count,
                "Evicted oldest context entries"
            );
        }
        evict
    }

    /// Restore the cached counters from the entries after loading
    pub(crate) fn recount(&mut self) {
        self.token_count = self.entries.iter().map(|e| e.token_count).sum();
        self.entry_count = self.entries.len();
    }

    #[cfg(test)]
    pub(crate) fn set_last_used_at(&mut self, at: DateTime<Utc>) {
        self.last_used_at = at;
    }
}
