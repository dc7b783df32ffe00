use crate::value::parse_int;

/// Timer duration in ms. `None` is the lossy result of a malformed segment.
pub type TimerValue = Option<i64>;

/// Timers decoded from `name1|value1,name2|value2,...` (`t_other`).
///
/// Keeps wire order; a repeated name overwrites the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMap {
    entries: Vec<(String, TimerValue)>,
}

impl TimerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the wire form. Never fails: a segment without `|` or with a
    /// non-numeric value maps to `None` and is reported at debug level.
    /// No escaping exists for `,` or `|` inside names.
    pub fn decode(wire: &str) -> Self {
        let mut timers = Self::new();
        if wire.is_empty() {
            return timers;
        }
        for segment in wire.split(',') {
            let (name, value) = match segment.split_once('|') {
                Some((name, raw)) => {
                    let value = parse_int(raw);
                    if value.is_none() {
                        tracing::debug!(segment = %segment, "timer value is not an integer");
                    }
                    (name, value)
                }
                None => {
                    tracing::debug!(segment = %segment, "timer segment has no '|' separator");
                    (segment, None)
                }
            };
            timers.insert(name, value);
        }
        timers
    }

    /// Wire form, used for fixtures. Lossy values encode as `NaN`.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| match value {
                Some(ms) => format!("{name}|{ms}"),
                None => format!("{name}|NaN"),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn insert(&mut self, name: impl Into<String>, value: TimerValue) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == &name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Outer `None`: timer absent. Inner `None`: present but malformed.
    pub fn get(&self, name: &str) -> Option<TimerValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TimerValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for TimerMap {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        let mut timers = Self::new();
        for (k, v) in iter {
            timers.insert(k, Some(v));
        }
        timers
    }
}

/// Custom timers may only grow between the early and the normal beacon.
pub fn is_custom_timer(name: &str) -> bool {
    name.starts_with("custom")
}
