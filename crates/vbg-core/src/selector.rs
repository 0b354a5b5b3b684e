//! File selection
//!
//! Ranks project files by an importance heuristic and keeps the best few
//! for prompt inclusion. The score of a candidate is
//!
//! ```text
//! recency * 0.5^(age_hours / half_life) + file_type * type_score - size * ln(1 + size / scale)
//! ```
//!
//! where `type_score` is 1.0 for project source, 0.5 for configuration and
//! documentation, 0.2 for other text and 0.0 for build artifacts. Ties are
//! broken by path so the selection is a pure function of its inputs.
//!
//! [`scan`] gathers the candidates from disk.

use crate::config::SelectionWeights;
use crate::error::Result;
use crate::project::IgnoreRules;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Bytes inspected when sniffing for binary content
const SNIFF_BYTES: usize = 1024;

/// Scan stops after this many files
pub const MAX_SCANNED_FILES: usize = 20_000;

const CONFIG_DOC_EXTENSIONS: &[&str] = &[
    "md", "rst", "txt", "toml", "json", "yaml", "yml", "xml", "ini", "cfg", "properties",
    "gradle", "kts", "env",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "webp", "pdf", "zip", "gz", "tar", "jar", "class",
    "exe", "dll", "so", "dylib", "o", "a", "pyc", "woff", "woff2", "ttf", "otf", "mp3", "mp4",
];

const ARTIFACT_SUFFIXES: &[&str] = &[".lock", ".min.js", ".min.css", ".map"];

const ARTIFACT_NAMES: &[&str] = &["package-lock.json", "yarn.lock", "pnpm-lock.yaml"];

/// A project file considered for selection
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    /// Path relative to the project root
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// NUL bytes were found in the first KiB
    pub is_binary: bool,
    /// Importance score, set by [`FileSelector::select`]
    pub score: f64,
}

impl FileCandidate {
    /// Create a text candidate
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            is_binary: false,
            score: 0.0,
        }
    }

    /// Mark the candidate as binary
    #[must_use]
    pub fn binary(mut self) -> Self {
        self.is_binary = true;
        self
    }

    fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

/// Importance-ranked file selection
#[derive(Debug, Clone)]
pub struct FileSelector {
    weights: SelectionWeights,
    rules: IgnoreRules,
    source_extensions: Vec<String>,
    only_extensions: Option<Vec<String>>,
}

impl FileSelector {
    /// Create a selector ranking `source_extensions` as project source
    #[must_use]
    pub fn new<I, S>(weights: SelectionWeights, rules: IgnoreRules, source_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            weights,
            rules,
            source_extensions: source_extensions.into_iter().map(Into::into).collect(),
            only_extensions: None,
        }
    }

    /// Restrict candidates to these extensions
    #[must_use]
    pub fn with_only_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Classification weight of a candidate's file type
    #[must_use]
    pub fn type_score(&self, candidate: &FileCandidate) -> f64 {
        let name = candidate.file_name();
        if ARTIFACT_NAMES.contains(&name.as_str())
            || ARTIFACT_SUFFIXES.iter().any(|s| name.ends_with(s))
        {
            return 0.0;
        }
        match candidate.extension() {
            Some(ext) if self.source_extensions.iter().any(|s| *s == ext) => 1.0,
            Some(ext) if CONFIG_DOC_EXTENSIONS.contains(&ext.as_str()) => 0.5,
            _ => 0.2,
        }
    }

    /// Importance score of a candidate at `now`
    #[must_use]
    pub fn score(&self, candidate: &FileCandidate, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        let age_hours = (now - candidate.modified).num_seconds().max(0) as f64 / 3600.0;
        let recency = 0.5f64.powf(age_hours / w.recency_half_life_hours);
        let size_penalty = (1.0 + candidate.size as f64 / w.size_scale_bytes as f64).ln();

        w.recency * recency + w.file_type * self.type_score(candidate) - w.size * size_penalty
    }

    fn is_eligible(&self, candidate: &FileCandidate) -> bool {
        if candidate.is_binary || self.rules.is_ignored(&candidate.path) {
            return false;
        }
        let ext = candidate.extension();
        if ext
            .as_deref()
            .is_some_and(|e| BINARY_EXTENSIONS.contains(&e))
        {
            return false;
        }
        match (&self.only_extensions, ext) {
            (Some(only), Some(ext)) => only.iter().any(|o| *o == ext),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Score, rank and cap the candidates.
    ///
    /// Returns at most `cap` candidates ordered by descending score, ties
    /// broken by ascending path.
    #[must_use]
    pub fn select(
        &self,
        candidates: &[FileCandidate],
        cap: usize,
        now: DateTime<Utc>,
    ) -> Vec<FileCandidate> {
        if cap == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<FileCandidate> = candidates
            .iter()
            .filter(|c| self.is_eligible(c))
            .map(|c| FileCandidate {
                score: self.score(c, now),
                ..c.clone()
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        ranked.truncate(cap);

        debug!(
            candidates = candidates.len(),
            selected = ranked.len(),
            cap,
            "Files selected"
        );
        ranked
    }
}

/// Walk `root` and collect candidates, pruning ignored directories.
///
/// Paths are reported relative to `root`, in file-name order so the scan
/// limit always keeps the same files. Unreadable entries are skipped.
pub fn scan(root: &Path, rules: &IgnoreRules) -> Result<Vec<FileCandidate>> {
    let now = Utc::now();
    let mut candidates = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| rules.is_ignored_dir(name))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if candidates.len() >= MAX_SCANNED_FILES {
            warn!(root = %root.display(), limit = MAX_SCANNED_FILES, "Scan limit reached");
            break;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %relative.display(), error = %e, "Skipping file without metadata");
                continue;
            }
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(now);

        let mut candidate = FileCandidate::new(relative, metadata.len(), modified);
        candidate.is_binary = sniff_binary(entry.path());
        candidates.push(candidate);
    }

    debug!(root = %root.display(), files = candidates.len(), "Project scanned");
    Ok(candidates)
}

/// Unreadable files count as binary so they are never selected
fn sniff_binary(path: &Path) -> bool {
    let mut buf = [0u8; SNIFF_BYTES];
    let read = File::open(path).and_then(|mut file| file.read(&mut buf));
    match read {
        Ok(n) => buf[..n].contains(&0),
        Err(_) => true,
    }
}
