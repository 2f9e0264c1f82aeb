//! Abstract collaborator seams: persistence keyed by (user, item) and a
//! pluggable clock. Storage technology is unconstrained; [`MemoryStore`]
//! exists for tests, demos and offline-first hosts.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{Result, SrsError};
use crate::item::{PinnedItem, SrsRecord};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant. For tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait RecordStore: Send + Sync {
    fn pinned_items(&self, user_id: &str) -> Result<Vec<PinnedItem>>;
    fn record(&self, user_id: &str, item_id: &str) -> Result<Option<SrsRecord>>;
    fn save_record(&self, user_id: &str, item_id: &str, record: &SrsRecord) -> Result<()>;
    fn save_pinned(&self, user_id: &str, pinned: &PinnedItem) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), SrsRecord>>,
    pinned: Mutex<HashMap<(String, String), PinnedItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> SrsError {
    SrsError::Storage {
        message: "poisoned lock".to_string(),
    }
}

impl RecordStore for MemoryStore {
    fn pinned_items(&self, user_id: &str) -> Result<Vec<PinnedItem>> {
        let pinned = self.pinned.lock().map_err(|_| poisoned())?;
        let mut items: Vec<_> = pinned
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| a.item.id.cmp(&b.item.id));
        Ok(items)
    }

    fn record(&self, user_id: &str, item_id: &str) -> Result<Option<SrsRecord>> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records
            .get(&(user_id.to_string(), item_id.to_string()))
            .cloned())
    }

    fn save_record(&self, user_id: &str, item_id: &str, record: &SrsRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        records.insert(
            (user_id.to_string(), item_id.to_string()),
            record.clone(),
        );
        Ok(())
    }

    fn save_pinned(&self, user_id: &str, pinned: &PinnedItem) -> Result<()> {
        let mut map = self.pinned.lock().map_err(|_| poisoned())?;
        map.insert(
            (user_id.to_string(), pinned.item.id.clone()),
            pinned.clone(),
        );
        Ok(())
    }
}
