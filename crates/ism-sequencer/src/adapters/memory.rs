//! In-memory store and roster.
//!
//! Used by tests and by single-process deployments that do not need
//! restart durability.

use crate::error::StoreError;
use crate::ports::outbound::{HeldMessageStore, SiteRoster};
use parking_lot::{Mutex, RwLock};
use shared_types::{IsmKey, SeqNum, SiteId, SiteRecord, SiteStatus, Visibility};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MessageTables {
    /// key -> (write counter, signed bytes)
    held: BTreeMap<IsmKey, (u64, Vec<u8>)>,
    archived: BTreeMap<IsmKey, Vec<u8>>,
    writes: u64,
}

/// Held and archived messages kept in memory.
#[derive(Default)]
pub struct InMemoryMessageStore {
    tables: Mutex<MessageTables>,
    fail_writes: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message straight to the archive, e.g. one we authored.
    pub fn archive(&self, key: IsmKey, encoded: Vec<u8>) {
        self.tables.lock().archived.insert(key, encoded);
    }

    pub fn held_keys(&self) -> Vec<IsmKey> {
        self.tables.lock().held.keys().copied().collect()
    }

    pub fn archived_keys(&self) -> Vec<IsmKey> {
        self.tables.lock().archived.keys().copied().collect()
    }

    pub fn is_held(&self, key: IsmKey) -> bool {
        self.tables.lock().held.contains_key(&key)
    }

    /// Makes subsequent writes fail, to exercise error propagation.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl HeldMessageStore for InMemoryMessageStore {
    fn write(&self, key: IsmKey, encoded: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(format!("write of {key} refused")));
        }
        let mut tables = self.tables.lock();
        tables.writes += 1;
        let stamp = tables.writes;
        // Rewrites keep their original age.
        tables
            .held
            .entry(key)
            .or_insert_with(|| (stamp, Vec::new()))
            .1 = encoded.to_vec();
        Ok(())
    }

    fn poll_oldest(&self, limit: usize) -> Result<Vec<(IsmKey, Vec<u8>)>, StoreError> {
        let tables = self.tables.lock();
        let mut entries: Vec<_> = tables
            .held
            .iter()
            .map(|(key, (stamp, bytes))| (*stamp, *key, bytes.clone()))
            .collect();
        entries.sort_by_key(|(stamp, _, _)| *stamp);
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, key, bytes)| (key, bytes))
            .collect())
    }

    fn clear(&self, key: IsmKey, archive: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some((_, bytes)) = tables.held.remove(&key) {
            if archive {
                tables.archived.insert(key, bytes);
            }
        }
        Ok(())
    }

    fn scan_archive(&self, origin: SiteId) -> Result<Vec<Vec<u8>>, StoreError> {
        let tables = self.tables.lock();
        let held = tables
            .held
            .iter()
            .filter(|(key, _)| key.origin == origin)
            .map(|(_, (_, bytes))| bytes.clone());
        let archived = tables
            .archived
            .iter()
            .filter(|(key, _)| key.origin == origin)
            .map(|(_, bytes)| bytes.clone());
        Ok(held.chain(archived).collect())
    }
}

/// Site roster kept in memory.
#[derive(Default)]
pub struct InMemorySiteRoster {
    records: RwLock<BTreeMap<SiteId, SiteRecord>>,
}

impl InMemorySiteRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster pre-populated with `records`.
    pub fn with_sites(records: impl IntoIterator<Item = SiteRecord>) -> Self {
        let roster = Self::new();
        {
            let mut map = roster.records.write();
            for record in records {
                map.insert(record.site_id, record);
            }
        }
        roster
    }

    pub fn insert(&self, record: SiteRecord) {
        self.records.write().insert(record.site_id, record);
    }

    pub fn get(&self, site: SiteId) -> Option<SiteRecord> {
        self.records.read().get(&site).cloned()
    }
}

impl SiteRoster for InMemorySiteRoster {
    fn load_all(&self) -> Result<Vec<SiteRecord>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn load(&self, site: SiteId) -> Result<Option<SiteRecord>, StoreError> {
        Ok(self.get(site))
    }

    fn write_watermark(
        &self,
        site: SiteId,
        visibility: Visibility,
        seq_num: SeqNum,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&site).ok_or(StoreError::UnknownSite(site))?;
        let watermark = match visibility {
            Visibility::Public => &mut record.applied_public,
            Visibility::Private => &mut record.applied_private,
        };
        *watermark = (*watermark).max(seq_num);
        Ok(())
    }

    fn mark_deactivated(&self, site: SiteId) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&site).ok_or(StoreError::UnknownSite(site))?;
        record.status = SiteStatus::Inactive;
        Ok(())
    }
}
