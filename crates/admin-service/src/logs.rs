//! Access to rebuild logs and the face database file

use chrono::{DateTime, Utc};
use facedb_common::{DatabaseInfo, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Characters of a log returned to the UI
pub const LOG_TAIL_CHARS: usize = 20_000;

/// Tail of the most recent log file
#[derive(Debug, Clone, Serialize)]
pub struct LogTail {
    pub content: String,
    pub filename: String,
}

/// Most recently modified file in `log_dir`, truncated to its last
/// [`LOG_TAIL_CHARS`] characters
pub fn latest_log(log_dir: &Path) -> Result<Option<LogTail>> {
    if !log_dir.is_dir() {
        return Ok(None);
    }

    let mut newest = None;
    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        match &newest {
            Some((when, _)) if *when >= modified => {}
            _ => newest = Some((modified, entry.path())),
        }
    }

    let Some((_, path)) = newest else {
        return Ok(None);
    };

    let bytes = fs::read(&path)?;
    let text = String::from_utf8_lossy(&bytes);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(LogTail {
        content: tail_chars(&text, LOG_TAIL_CHARS).to_string(),
        filename,
    }))
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

/// Size and modification time of the face database file
pub fn database_info(path: &Path) -> DatabaseInfo {
    match fs::metadata(path) {
        Ok(metadata) => DatabaseInfo {
            exists: true,
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        },
        Err(_) => DatabaseInfo {
            exists: false,
            size: 0,
            modified: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_latest_log_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("rebuild_1.log");
        let new = dir.path().join("rebuild_2.log");
        fs::write(&old, "old run").unwrap();
        fs::write(&new, "new run").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let tail = latest_log(dir.path()).unwrap().unwrap();
        assert_eq!(tail.filename, "rebuild_2.log");
        assert_eq!(tail.content, "new run");
    }

    #[test]
    fn test_latest_log_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_log(dir.path()).unwrap().is_none());
        assert!(latest_log(&dir.path().join("missing")).unwrap().is_none());
    }

    #[test]
    fn test_tail_chars_keeps_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
    }

    #[test]
    fn test_database_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_db.pkl");

        assert!(!database_info(&path).exists);

        fs::write(&path, vec![0u8; 128]).unwrap();
        let info = database_info(&path);
        assert!(info.exists);
        assert_eq!(info.size, 128);
        assert!(info.modified.is_some());
    }
}
