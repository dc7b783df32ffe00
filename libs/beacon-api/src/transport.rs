use crate::record::BeaconRecord;

/// Fire-and-forget beacon primitive: takes a URL and a body, reports
/// whether the send was accepted for delivery.
pub trait BeaconSender: Send + Sync {
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool;

    /// Capability probe: `true` when this sender already captures beacons.
    fn is_intercepting(&self) -> bool {
        false
    }
}

/// How a beacon travelled to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// GET/image: fields on the URL, identified by `h.t` on the query.
    Get,
    /// POST/XHR/sendBeacon: fields in the body, the URL carries no `h.t`.
    Post,
}

impl Transport {
    pub fn of_url(url: &str) -> Self {
        if BeaconRecord::from_url(url).contains("h.t") {
            Transport::Get
        } else {
            Transport::Post
        }
    }
}
