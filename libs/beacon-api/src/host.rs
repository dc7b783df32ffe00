use serde::{Deserialize, Serialize};

/// One network resource load as reported by the host's resource timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTimingEntry {
    /// Full resource URL.
    pub name: String,
    /// Start time, ms since the page time origin.
    pub start_time: f64,
    /// Completion time, ms since the page time origin.
    pub response_end: f64,
}

impl ResourceTimingEntry {
    pub fn new(name: impl Into<String>, start_time: f64, response_end: f64) -> Self {
        Self {
            name: name.into(),
            start_time,
            response_end,
        }
    }
}

/// Capabilities and timing data of the page host.
///
/// Read-only from the harness point of view: the query engine consults it,
/// never mutates it.
pub trait HostEnvironment: Send + Sync {
    fn navigation_timing_supported(&self) -> bool;

    fn resource_timing_supported(&self) -> bool;

    /// Resource entries in the order the host reports them.
    fn resource_entries(&self) -> Vec<ResourceTimingEntry>;
}

/// Host with fixed capabilities and a fixed resource timeline.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    pub navigation_timing: bool,
    pub resource_timing: bool,
    pub entries: Vec<ResourceTimingEntry>,
}

impl StaticHost {
    /// Host with every capability available and no resources yet.
    pub fn full() -> Self {
        Self {
            navigation_timing: true,
            resource_timing: true,
            entries: Vec::new(),
        }
    }

    /// Host without navigation or resource timing.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: ResourceTimingEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

impl HostEnvironment for StaticHost {
    fn navigation_timing_supported(&self) -> bool {
        self.navigation_timing
    }

    fn resource_timing_supported(&self) -> bool {
        self.resource_timing
    }

    fn resource_entries(&self) -> Vec<ResourceTimingEntry> {
        self.entries.clone()
    }
}
