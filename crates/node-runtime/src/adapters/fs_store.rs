//! # Filesystem Message Store
//!
//! One file per message under the data directory:
//!
//! - `held/{origin}-{seq}.ism` - signed bytes awaiting processing
//! - `archive/{origin}-{seq}.ism` - processed messages kept for replay
//!
//! Writes go through a temp file and a rename so a crash never leaves a
//! truncated message behind. Age is the file's modification time.

use ism_sequencer::{HeldMessageStore, StoreError};
use shared_types::{IsmKey, SiteId};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

const HELD_DIR: &str = "held";
const ARCHIVE_DIR: &str = "archive";
const EXTENSION: &str = "ism";

/// Held-message store backed by plain files.
#[derive(Debug, Clone)]
pub struct FsMessageStore {
    held: PathBuf,
    archive: PathBuf,
}

impl FsMessageStore {
    /// Opens (creating if needed) the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let held = data_dir.join(HELD_DIR);
        let archive = data_dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&held).map_err(|e| io_error(&held, e))?;
        fs::create_dir_all(&archive).map_err(|e| io_error(&archive, e))?;
        Ok(Self { held, archive })
    }

    /// Writes a message straight into the archive, e.g. one we authored.
    pub fn archive(&self, key: IsmKey, encoded: &[u8]) -> Result<(), StoreError> {
        write_atomic(&self.archive.join(file_name(key)), encoded)
    }

    pub fn held_keys(&self) -> Result<Vec<IsmKey>, StoreError> {
        let mut keys: Vec<IsmKey> = list_dir(&self.held)?.into_iter().map(|(key, _)| key).collect();
        keys.sort();
        Ok(keys)
    }

    pub fn archived_keys(&self) -> Result<Vec<IsmKey>, StoreError> {
        let mut keys: Vec<IsmKey> =
            list_dir(&self.archive)?.into_iter().map(|(key, _)| key).collect();
        keys.sort();
        Ok(keys)
    }
}

impl HeldMessageStore for FsMessageStore {
    fn write(&self, key: IsmKey, encoded: &[u8]) -> Result<(), StoreError> {
        let path = self.held.join(file_name(key));
        // Rewrites keep the first copy and its age.
        if path.exists() {
            return Ok(());
        }
        write_atomic(&path, encoded)
    }

    fn poll_oldest(&self, limit: usize) -> Result<Vec<(IsmKey, Vec<u8>)>, StoreError> {
        let mut entries = Vec::new();
        for (key, path) in list_dir(&self.held)? {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|e| io_error(&path, e))?;
            entries.push((modified, key, path));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut oldest = Vec::with_capacity(limit.min(entries.len()));
        for (_, key, path) in entries.into_iter().take(limit) {
            match fs::read(&path) {
                Ok(bytes) => oldest.push((key, bytes)),
                // Cleared by a completion since we listed the directory.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        Ok(oldest)
    }

    fn clear(&self, key: IsmKey, archive: bool) -> Result<(), StoreError> {
        let name = file_name(key);
        let held = self.held.join(&name);
        let result = if archive {
            fs::rename(&held, self.archive.join(&name))
        } else {
            fs::remove_file(&held)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&held, e)),
        }
    }

    fn scan_archive(&self, origin: SiteId) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut messages = Vec::new();
        for dir in [&self.archive, &self.held] {
            for (key, path) in list_dir(dir)? {
                if key.origin != origin {
                    continue;
                }
                match fs::read(&path) {
                    Ok(bytes) => messages.push(bytes),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(io_error(&path, e)),
                }
            }
        }
        Ok(messages)
    }
}

fn file_name(key: IsmKey) -> String {
    format!("{}-{}.{}", key.origin.get(), key.seq_num, EXTENSION)
}

fn parse_file_name(name: &str) -> Option<IsmKey> {
    let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    let (origin, seq) = stem.split_once('-')?;
    Some(IsmKey {
        origin: SiteId(origin.parse().ok()?),
        seq_num: seq.parse().ok()?,
    })
}

/// Message files in `dir`. Temp files and strays are skipped.
fn list_dir(dir: &Path) -> Result<Vec<(IsmKey, PathBuf)>, StoreError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        match parse_file_name(name) {
            Some(key) => files.push((key, entry.path())),
            None => warn!("[ism] Ignoring unexpected file {:?} in {:?}", name, dir),
        }
    }
    Ok(files)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let temp_path = temp_path_for(path);
    let mut file = fs::File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
    file.write_all(bytes).map_err(|e| io_error(&temp_path, e))?;
    file.sync_all().map_err(|e| io_error(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| io_error(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("message");
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    path.with_file_name(format!(".{name}.{nanos}.tmp"))
}

fn io_error(path: &Path, err: io::Error) -> StoreError {
    StoreError::Io(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(origin: u16, seq_num: u64) -> IsmKey {
        IsmKey {
            origin: SiteId(origin),
            seq_num,
        }
    }

    fn open() -> (TempDir, FsMessageStore) {
        let dir = TempDir::new().unwrap();
        let store = FsMessageStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_file_name_round_trips() {
        assert_eq!(parse_file_name(&file_name(key(12, 345))), Some(key(12, 345)));
        assert_eq!(parse_file_name(".12-345.ism.99.tmp"), None);
        assert_eq!(parse_file_name("12-abc.ism"), None);
    }

    #[test]
    fn test_write_then_poll() {
        let (_dir, store) = open();
        store.write(key(2, 1), b"first").unwrap();

        let polled = store.poll_oldest(10).unwrap();
        assert_eq!(polled, vec![(key(2, 1), b"first".to_vec())]);
    }

    #[test]
    fn test_rewrite_keeps_first_copy() {
        let (_dir, store) = open();
        store.write(key(2, 1), b"first").unwrap();
        store.write(key(2, 1), b"second").unwrap();

        let polled = store.poll_oldest(10).unwrap();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].1, b"first".to_vec());
    }

    #[test]
    fn test_poll_respects_limit() {
        let (_dir, store) = open();
        for seq in 1..=5 {
            store.write(key(2, seq), &[seq as u8]).unwrap();
        }
        assert_eq!(store.poll_oldest(3).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_with_archive_moves_the_file() {
        let (_dir, store) = open();
        store.write(key(2, 1), b"kept").unwrap();
        store.write(key(2, 2), b"gone").unwrap();

        store.clear(key(2, 1), true).unwrap();
        store.clear(key(2, 2), false).unwrap();

        assert!(store.held_keys().unwrap().is_empty());
        assert_eq!(store.archived_keys().unwrap(), vec![key(2, 1)]);
    }

    #[test]
    fn test_clear_missing_is_ok() {
        let (_dir, store) = open();
        assert!(store.clear(key(9, 9), false).is_ok());
        assert!(store.clear(key(9, 9), true).is_ok());
    }

    #[test]
    fn test_scan_archive_filters_by_origin() {
        let (_dir, store) = open();
        store.archive(key(2, 1), b"a").unwrap();
        store.write(key(2, 2), b"b").unwrap();
        store.archive(key(3, 1), b"c").unwrap();

        let mut scanned = store.scan_archive(SiteId(2)).unwrap();
        scanned.sort();
        assert_eq!(scanned, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_stray_files_ignored() {
        let (dir, store) = open();
        fs::write(dir.path().join(HELD_DIR).join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(HELD_DIR).join(".2-1.ism.7.tmp"), b"x").unwrap();

        assert!(store.poll_oldest(10).unwrap().is_empty());
    }
}
