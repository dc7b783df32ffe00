use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use beacon_api::BeaconRecord;

/// A record as held by the store.
#[derive(Debug, Clone)]
pub struct StoredBeacon {
    /// Send-time sequence stamp, when the capture path attached one.
    pub seq: Option<u64>,
    pub record: Arc<BeaconRecord>,
}

/// Lifecycle notifications observed so far. Each flag only goes false → true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleFlags {
    pub initialized: bool,
    pub page_ready: bool,
    pub beacon: bool,
    pub before_unload: bool,
}

/// Append-only beacon log.
///
/// Order is append order, which for asynchronously decoded captures is
/// decode-completion order, not send order. Use [`BeaconStore::by_send_order`]
/// when the sequence stamps matter.
#[derive(Debug, Default)]
pub struct BeaconStore {
    entries: RwLock<Vec<StoredBeacon>>,
    initialized: AtomicBool,
    page_ready: AtomicBool,
    beacon: AtomicBool,
    before_unload: AtomicBool,
}

impl BeaconStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns its index.
    pub fn append(&self, record: BeaconRecord) -> usize {
        self.append_stamped(record, None)
    }

    pub fn append_stamped(&self, record: BeaconRecord, seq: Option<u64>) -> usize {
        let mut entries = self.write_entries();
        entries.push(StoredBeacon {
            seq,
            record: Arc::new(record),
        });
        entries.len() - 1
    }

    pub fn count(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn last(&self) -> Option<Arc<BeaconRecord>> {
        self.read_entries().last().map(|e| e.record.clone())
    }

    pub fn get(&self, index: usize) -> Option<Arc<BeaconRecord>> {
        self.read_entries().get(index).map(|e| e.record.clone())
    }

    /// First record matching `pred`, in append order.
    pub fn find(&self, pred: impl Fn(&BeaconRecord) -> bool) -> Option<Arc<BeaconRecord>> {
        self.read_entries()
            .iter()
            .find(|e| pred(&e.record))
            .map(|e| e.record.clone())
    }

    pub fn records(&self) -> Vec<Arc<BeaconRecord>> {
        self.read_entries().iter().map(|e| e.record.clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<StoredBeacon> {
        self.read_entries().clone()
    }

    /// Entries ordered by send-time stamp. Unstamped entries follow in
    /// append order.
    pub fn by_send_order(&self) -> Vec<StoredBeacon> {
        let mut entries = self.snapshot();
        entries.sort_by_key(|e| e.seq.unwrap_or(u64::MAX));
        entries
    }

    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    pub fn mark_page_ready(&self) -> bool {
        !self.page_ready.swap(true, Ordering::SeqCst)
    }

    pub fn mark_beacon(&self) -> bool {
        !self.beacon.swap(true, Ordering::SeqCst)
    }

    pub fn mark_before_unload(&self) -> bool {
        !self.before_unload.swap(true, Ordering::SeqCst)
    }

    pub fn flags(&self) -> LifecycleFlags {
        LifecycleFlags {
            initialized: self.initialized.load(Ordering::SeqCst),
            page_ready: self.page_ready.load(Ordering::SeqCst),
            beacon: self.beacon.load(Ordering::SeqCst),
            before_unload: self.before_unload.load(Ordering::SeqCst),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<StoredBeacon>> {
        match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("beacon store read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<StoredBeacon>> {
        match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("beacon store write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
