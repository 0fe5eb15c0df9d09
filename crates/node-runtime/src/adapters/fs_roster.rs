//! # Filesystem Site Roster
//!
//! The whole roster lives in one JSON file, cached in memory and rewritten
//! atomically on every change.

use ism_sequencer::{SiteRoster, StoreError};
use parking_lot::Mutex;
use shared_types::{SeqNum, SiteId, SiteRecord, SiteStatus, Visibility};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Site roster persisted as `roster.json`.
#[derive(Debug)]
pub struct FsSiteRoster {
    path: PathBuf,
    records: Mutex<BTreeMap<SiteId, SiteRecord>>,
}

impl FsSiteRoster {
    const FILE_NAME: &'static str = "roster.json";

    /// Opens the roster under `data_dir`, starting empty if none exists.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| io_error(data_dir, e))?;
        let path = data_dir.join(Self::FILE_NAME);

        let records = match fs::read(&path) {
            Ok(bytes) => {
                let list: Vec<SiteRecord> =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                        key: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                list.into_iter().map(|r| (r.site_id, r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_error(&path, e)),
        };
        debug!("[ism] Loaded {} roster entries from {:?}", records.len(), path);

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Adds `record` unless the site is already known. Returns whether it was added.
    pub fn seed(&self, record: SiteRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.site_id) {
            return Ok(false);
        }
        records.insert(record.site_id, record);
        self.persist(&records)?;
        Ok(true)
    }

    fn update<F>(&self, site: SiteId, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SiteRecord) -> bool,
    {
        let mut records = self.records.lock();
        let record = records.get_mut(&site).ok_or(StoreError::UnknownSite(site))?;
        if change(record) {
            self.persist(&records)?;
        }
        Ok(())
    }

    fn persist(&self, records: &BTreeMap<SiteId, SiteRecord>) -> Result<(), StoreError> {
        let list: Vec<&SiteRecord> = records.values().collect();
        let json = serde_json::to_vec_pretty(&list).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
        file.write_all(&json).map_err(|e| io_error(&temp_path, e))?;
        file.sync_all().map_err(|e| io_error(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

impl SiteRoster for FsSiteRoster {
    fn load_all(&self) -> Result<Vec<SiteRecord>, StoreError> {
        Ok(self.records.lock().values().cloned().collect())
    }

    fn load(&self, site: SiteId) -> Result<Option<SiteRecord>, StoreError> {
        Ok(self.records.lock().get(&site).cloned())
    }

    fn write_watermark(
        &self,
        site: SiteId,
        visibility: Visibility,
        seq_num: SeqNum,
    ) -> Result<(), StoreError> {
        self.update(site, |record| {
            let watermark = match visibility {
                Visibility::Public => &mut record.applied_public,
                Visibility::Private => &mut record.applied_private,
            };
            if seq_num <= *watermark {
                return false;
            }
            *watermark = seq_num;
            true
        })
    }

    fn mark_deactivated(&self, site: SiteId) -> Result<(), StoreError> {
        self.update(site, |record| {
            record.status = SiteStatus::Inactive;
            true
        })
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {}", path.display(), err))
}
