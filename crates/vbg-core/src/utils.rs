//! Small filesystem and text helpers shared by the stores

use std::fs;
use std::io;
use std::path::Path;

/// Write `content` to `path` through a temp file and a rename.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with a marker when clipped
pub(crate) fn clip_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n[... truncated]", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/file.json");

        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!dir.path().join("nested/file.json.tmp").exists());
    }

    #[test]
    fn test_clip_chars() {
        assert_eq!(clip_chars("short", 10), "short");
        assert_eq!(clip_chars("exact", 5), "exact");
        assert_eq!(clip_chars("한글입니다", 2), "한글\n[... truncated]");
    }
}
