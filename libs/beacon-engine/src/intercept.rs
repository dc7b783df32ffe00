use std::sync::{Arc, RwLock, RwLockWriteGuard};

use beacon_api::{BeaconRecord, BeaconSender};

use crate::session::{BeaconSession, RawCapture};

/// Holder of the host's fire-and-forget beacon primitive.
///
/// Empty when the host has no such primitive; the interceptor then reports
/// [`Interception::Unsupported`].
#[derive(Default)]
pub struct TransportSlot {
    sender: RwLock<Option<Arc<dyn BeaconSender>>>,
}

impl TransportSlot {
    pub fn new(sender: Arc<dyn BeaconSender>) -> Self {
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<dyn BeaconSender>> {
        match self.sender.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => {
                tracing::warn!("transport slot lock was poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    /// Send through whatever sender is installed. `false` without one.
    pub fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool {
        match self.current() {
            Some(sender) => sender.send_beacon(url, body),
            None => false,
        }
    }

    fn lock(&self) -> RwLockWriteGuard<'_, Option<Arc<dyn BeaconSender>>> {
        match self.sender.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("transport slot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Outcome of [`intercept`].
#[must_use]
pub enum Interception {
    Installed(RestoreHandle),
    /// The slot already captures beacons; nothing was wrapped.
    AlreadyInstalled,
    /// No primitive to wrap.
    Unsupported,
}

impl Interception {
    pub fn is_installed(&self) -> bool {
        matches!(self, Interception::Installed(_))
    }
}

/// Puts the original sender back into the slot.
#[must_use = "dropping the handle leaves the interceptor installed"]
pub struct RestoreHandle {
    slot: Arc<TransportSlot>,
    original: Arc<dyn BeaconSender>,
}

impl RestoreHandle {
    pub fn restore(self) {
        let mut guard = self.slot.lock();
        if !guard.as_ref().is_some_and(|s| s.is_intercepting()) {
            tracing::warn!("transport slot no longer holds the interceptor, restoring anyway");
        }
        *guard = Some(self.original);
        tracing::debug!("beacon interceptor removed");
    }
}

/// Wrap the slot's sender so every accepted beacon is also captured.
///
/// Idempotent: a slot that already captures is left alone.
pub fn intercept(slot: &Arc<TransportSlot>, session: &Arc<BeaconSession>) -> Interception {
    let mut guard = slot.lock();
    let original = match guard.as_ref() {
        None => return Interception::Unsupported,
        Some(current) if current.is_intercepting() => return Interception::AlreadyInstalled,
        Some(current) => current.clone(),
    };
    *guard = Some(Arc::new(CapturingSender {
        inner: original.clone(),
        session: session.clone(),
    }));
    tracing::debug!("beacon interceptor installed");
    Interception::Installed(RestoreHandle {
        slot: slot.clone(),
        original,
    })
}

struct CapturingSender {
    inner: Arc<dyn BeaconSender>,
    session: Arc<BeaconSession>,
}

impl BeaconSender for CapturingSender {
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool {
        let accepted = self.inner.send_beacon(url, body.clone());
        if accepted {
            capture(self.session.clone(), url.to_string(), body);
        } else {
            tracing::debug!(url = %url, "beacon rejected by transport, not captured");
        }
        accepted
    }

    fn is_intercepting(&self) -> bool {
        true
    }
}

/// Stamp at send time, decode later. Decode tasks complete in no
/// particular order, so the store sees completion order.
fn capture(session: Arc<BeaconSession>, url: String, body: Vec<u8>) {
    let seq = session.next_seq();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { decode_capture(&session, seq, url, body) });
        }
        Err(_) => {
            tracing::debug!(seq, "no async runtime, decoding beacon inline");
            decode_capture(&session, seq, url, body);
        }
    }
}

fn decode_capture(session: &BeaconSession, seq: u64, url: String, body: Vec<u8>) {
    let text = String::from_utf8_lossy(&body).into_owned();
    let mut record = BeaconRecord::from_query_string(&text);
    if record.is_empty() {
        // nothing in the body, fields may be on the URL
        record = BeaconRecord::from_url(&url);
    }
    session.push_raw(RawCapture { seq, url, text });
    session.record(record, Some(seq));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use beacon_api::StaticHost;

    use super::*;
    use crate::config::HarnessConfig;
    use crate::query;

    struct CountingSender {
        calls: AtomicUsize,
        accept: bool,
    }

    impl CountingSender {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                accept,
            })
        }
    }

    impl BeaconSender for CountingSender {
        fn send_beacon(&self, _url: &str, _body: Vec<u8>) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept
        }
    }

    fn session() -> Arc<BeaconSession> {
        Arc::new(BeaconSession::new(HarnessConfig::default(), Arc::new(StaticHost::full())))
    }

    #[tokio::test(start_paused = true)]
    async fn intercepting_twice_captures_once() {
        let inner = CountingSender::new(true);
        let slot = Arc::new(TransportSlot::new(inner.clone()));
        let session = session();

        let first = intercept(&slot, &session);
        assert!(first.is_installed());
        assert!(matches!(intercept(&slot, &session), Interception::AlreadyInstalled));

        assert!(slot.send_beacon("/beacon", b"pid=p1&rt.sl=1".to_vec()));
        query::wait_for_beacons(&session, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.store().count(), 1);
        let captures = session.raw_captures();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].text, "pid=p1&rt.sl=1");
        assert_eq!(session.store().snapshot()[0].seq, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_send_is_not_captured() {
        let inner = CountingSender::new(false);
        let slot = Arc::new(TransportSlot::new(inner.clone()));
        let session = session();
        let _handle = intercept(&slot, &session);

        assert!(!slot.send_beacon("/beacon", b"pid=p1".to_vec()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.store().count(), 0);
        assert!(session.raw_captures().is_empty());
    }

    #[test]
    fn restore_puts_original_back() {
        let inner = CountingSender::new(true);
        let slot = Arc::new(TransportSlot::new(inner.clone()));
        let session = session();

        let Interception::Installed(handle) = intercept(&slot, &session) else {
            panic!("expected interceptor to install");
        };
        assert!(slot.current().unwrap().is_intercepting());
        handle.restore();
        assert!(!slot.current().unwrap().is_intercepting());

        // outside a runtime the decode runs inline
        let Interception::Installed(handle) = intercept(&slot, &session) else {
            panic!("expected interceptor to reinstall");
        };
        assert!(slot.send_beacon("/beacon?h.t=1&pid=url", Vec::new()));
        assert_eq!(session.store().count(), 1);
        assert_eq!(session.store().last().unwrap().get("pid").unwrap().to_string(), "url");
        handle.restore();
    }

    #[test]
    fn empty_slot_is_unsupported() {
        let slot = Arc::new(TransportSlot::empty());
        assert!(matches!(intercept(&slot, &session()), Interception::Unsupported));
        assert!(!slot.send_beacon("/beacon", Vec::new()));
    }
}
