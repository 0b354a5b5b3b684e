//! JSON file session store
//!
//! Layout under the session directory:
//!
//! - `<uuid>.json`: one pretty-printed session document
//! - `current`: id of the session resumed by default
//!
//! Every write goes through a temp file and a rename. There is no
//! cross-process locking: two concurrent runs in the same directory may
//! lose one run's history.

use super::context::{Session, SessionLimits};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::utils::write_atomic;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the pointer file holding the current session id
pub const CURRENT_POINTER: &str = "current";

/// Which session to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRef {
    /// Whatever the pointer file names
    Current,
    /// An explicit id; unknown ids are an error
    Id(Uuid),
}

/// Header fields of a stored session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub id: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last use
    pub last_used_at: DateTime<Utc>,
    /// Number of stored entries
    #[serde(default)]
    pub entry_count: usize,
}

/// Session persistence for one working directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    working_dir: PathBuf,
    limits: SessionLimits,
    expiry: Duration,
}

impl SessionStore {
    /// Store rooted at `dir`, creating sessions for `working_dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            working_dir: working_dir.into(),
            limits: SessionLimits::default(),
            expiry: Duration::hours(24),
        }
    }

    /// Store configured from the `session` section, relative to `root`
    #[must_use]
    pub fn from_config(config: &SessionConfig, root: &Path) -> Self {
        Self::new(root.join(&config.dir), root)
            .with_limits(SessionLimits {
                max_context_tokens: config.max_context_tokens,
                max_entries: config.max_entries,
            })
            .with_expiry(config.expiry())
    }

    /// Set the budget enforced on save
    #[must_use]
    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the idle expiry
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Session directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Budget enforced on save
    #[must_use]
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Idle expiry
    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn pointer_path(&self) -> PathBuf {
        self.dir.join(CURRENT_POINTER)
    }

    /// Create, persist and point at a fresh session
    pub fn create(&self) -> Result<Session> {
        let mut session = Session::new(self.working_dir.clone(), self.expiry);
        self.save(&mut session)?;
        info!(session_id = %session.id(), dir = %self.dir.display(), "Session created");
        Ok(session)
    }

    /// Load a session.
    ///
    /// A missing pointer, an expired session or a corrupt file yields a
    /// fresh session. An explicit id with no file is
    /// [`Error::SessionNotFound`].
    pub fn load(&self, which: SessionRef) -> Result<Session> {
        let id = match which {
            SessionRef::Current => match self.current_id()? {
                Some(id) => id,
                None => {
                    debug!("No current session pointer");
                    return self.create();
                }
            },
            SessionRef::Id(id) => id,
        };

        let session = match self.read_session(id) {
            Ok(Some(session)) => session,
            Ok(None) => match which {
                SessionRef::Id(id) => return Err(Error::SessionNotFound(id)),
                SessionRef::Current => {
                    warn!(session_id = %id, "Current session file is missing, starting a new one");
                    return self.create();
                }
            },
            Err(e @ Error::SessionCorrupt { .. }) => {
                warn!(session_id = %id, error = %e, "Session file is corrupt, starting a new one");
                return self.create();
            }
            Err(e) => return Err(e),
        };

        if self.is_expired(&session) {
            info!(
                session_id = %id,
                last_used_at = %session.last_used_at(),
                "Session expired, starting a new one"
            );
            return self.create();
        }

        if which != SessionRef::Current {
            self.write_pointer(id)?;
        }
        debug!(session_id = %id, entries = session.entries().len(), "Session loaded");
        Ok(session)
    }

    /// Enforce the budget, then write the session and point at it
    pub fn save(&self, session: &mut Session) -> Result<()> {
        session.enforce_limits(self.limits);

        let content = serde_json::to_string_pretty(session)?;
        write_atomic(&self.session_path(session.id()), &content)?;
        self.write_pointer(session.id())?;

        debug!(
            session_id = %session.id(),
            entries = session.entries().len(),
            tokens = session.token_count(),
            "Session saved"
        );
        Ok(())
    }

    /// Non-expired sessions, most recently used first.
    ///
    /// Each file is streamed into [`SessionSummary`], which keeps only the
    /// header fields; the entry history is skipped, not materialised.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let mut summaries = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let summary: SessionSummary = match fs::File::open(&path)
                .map_err(Error::from)
                .and_then(|file| {
                    serde_json::from_reader(io::BufReader::new(file)).map_err(Error::from)
                }) {
                Ok(summary) => summary,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    continue;
                }
            };
            if now - summary.last_used_at <= self.expiry {
                summaries.push(summary);
            }
        }

        summaries.sort_by(|a, b| {
            b.last_used_at
                .cmp(&a.last_used_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    /// Whether the session has been idle longer than the expiry
    #[must_use]
    pub fn is_expired(&self, session: &Session) -> bool {
        session.is_expired_at(Utc::now(), self.expiry)
    }

    /// Id stored in the pointer file, if it is present and well formed
    pub fn current_id(&self) -> Result<Option<Uuid>> {
        let raw = match fs::read_to_string(self.pointer_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed session pointer");
                Ok(None)
            }
        }
    }

    fn write_pointer(&self, id: Uuid) -> Result<()> {
        write_atomic(&self.pointer_path(), &format!("{}\n", id))?;
        Ok(())
    }

    fn read_session(&self, id: Uuid) -> Result<Option<Session>> {
        let path = self.session_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut session: Session =
            serde_json::from_str(&content).map_err(|e| Error::SessionCorrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if session.id() != id {
            return Err(Error::SessionCorrupt {
                path: path.display().to_string(),
                message: format!("file holds session {}", session.id()),
            });
        }
        session.recount();
        Ok(Some(session))
    }
}
