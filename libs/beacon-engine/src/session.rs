use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use beacon_api::{BeaconRecord, HostEnvironment};

use crate::config::HarnessConfig;
use crate::store::BeaconStore;

/// Body text of an intercepted send, as decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCapture {
    pub seq: u64,
    pub url: String,
    pub text: String,
}

/// Everything one harness run shares: config, the beacon store, the host
/// and the raw captures of the intercepted transport.
///
/// Constructed once per run and handed to the interceptor, the query
/// functions and the validator.
pub struct BeaconSession {
    config: HarnessConfig,
    store: Arc<BeaconStore>,
    host: Arc<dyn HostEnvironment>,
    raw_captures: RwLock<Vec<RawCapture>>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for BeaconSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconSession")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

impl BeaconSession {
    pub fn new(config: HarnessConfig, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            config,
            store: Arc::new(BeaconStore::new()),
            host,
            raw_captures: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<BeaconStore> {
        &self.store
    }

    pub fn host(&self) -> &dyn HostEnvironment {
        self.host.as_ref()
    }

    /// Mark the session initialized. Only the first call has an effect.
    pub fn init(&self) -> bool {
        let first = self.store.mark_initialized();
        if first {
            tracing::info!(beacon_url = %self.config.beacon_url, "beacon session initialized");
        }
        first
    }

    pub fn on_page_ready(&self) {
        if self.store.mark_page_ready() {
            tracing::debug!("page_ready observed");
        }
    }

    pub fn on_before_unload(&self) {
        if self.store.mark_before_unload() {
            tracing::debug!("before_unload observed");
        }
    }

    /// Beacon notification: append and raise the beacon flag.
    pub fn on_beacon(&self, record: BeaconRecord) -> usize {
        self.record(record, None)
    }

    pub(crate) fn record(&self, record: BeaconRecord, seq: Option<u64>) -> usize {
        let early = record.is_early();
        let fields = record.len();
        let index = self.store.append_stamped(record, seq);
        self.store.mark_beacon();
        tracing::debug!(index, ?seq, early, fields, "beacon recorded");
        index
    }

    /// Send-time sequence stamp.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn push_raw(&self, capture: RawCapture) {
        match self.raw_captures.write() {
            Ok(mut g) => g.push(capture),
            Err(poisoned) => {
                tracing::warn!("raw capture lock was poisoned, recovering");
                poisoned.into_inner().push(capture);
            }
        }
    }

    /// Raw payloads captured by the interceptor, in decode-completion order.
    pub fn raw_captures(&self) -> Vec<RawCapture> {
        match self.raw_captures.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => {
                tracing::warn!("raw capture lock was poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }
}
