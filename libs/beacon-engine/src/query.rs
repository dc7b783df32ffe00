use std::sync::Arc;

use beacon_api::field::Field;
use beacon_api::{BeaconRecord, FieldValue, ResourceTimingEntry, Transport, ValidationResult};

use crate::error::CountError;
use crate::session::BeaconSession;

/// Which of several matching resource entries to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// First match in host order.
    First,
    /// Match with the latest completion time.
    Last,
    /// Zero-based position among matches ordered by completion time.
    Nth(usize),
}

// ---------------------------------------------------------------------------
// Beacon lookups
// ---------------------------------------------------------------------------

/// First beacon, in arrival order, whose `field` equals `value` exactly.
pub fn find_by_field(
    session: &BeaconSession,
    field: &str,
    value: impl Into<FieldValue>,
) -> Option<Arc<BeaconRecord>> {
    let value = value.into();
    session.store().find(|r| r.get(field) == Some(&value))
}

pub fn find_xhr_beacon(session: &BeaconSession) -> Option<Arc<BeaconRecord>> {
    find_by_field(session, Field::HttpInitiator.name(), "xhr")
}

/// First page-load beacon. Without navigation timing the library reports
/// `rt.start=none` instead of `navigation`.
pub fn find_nav_beacon(session: &BeaconSession) -> Option<Arc<BeaconRecord>> {
    let start = if session.host().navigation_timing_supported() {
        "navigation"
    } else {
        "none"
    };
    find_by_field(session, Field::RtStart.name(), start)
}

// ---------------------------------------------------------------------------
// Resource timing correlation
// ---------------------------------------------------------------------------

/// Resource entry whose name contains `url_fragment`.
///
/// `None` when the host has no resource timing or nothing matches.
pub fn find_resource(
    session: &BeaconSession,
    url_fragment: &str,
    mode: MatchMode,
) -> Option<ResourceTimingEntry> {
    let host = session.host();
    if !host.resource_timing_supported() {
        tracing::debug!(url_fragment, "resource timing unsupported, no match");
        return None;
    }
    let mut matches: Vec<ResourceTimingEntry> = host
        .resource_entries()
        .into_iter()
        .filter(|e| e.name.contains(url_fragment))
        .collect();

    match mode {
        MatchMode::First => matches.into_iter().next(),
        MatchMode::Last => matches.into_iter().fold(None, |best, e| match best {
            Some(b) if e.response_end <= b.response_end => Some(b),
            _ => Some(e),
        }),
        MatchMode::Nth(n) => {
            // stable: equal completion times keep host order
            matches.sort_by(|a, b| a.response_end.total_cmp(&b.response_end));
            matches.into_iter().nth(n)
        }
    }
}

/// First resource entry for the beacon endpoint itself.
pub fn find_resource_beacon(session: &BeaconSession) -> Option<ResourceTimingEntry> {
    find_resource(session, &session.config().beacon_url, MatchMode::First)
}

/// Check that beacon `beacon_index` completed (`t_done`) when the matched
/// resource finished loading, within `tolerance` ms.
///
/// Without a resource match `t_done` must fall in `[fallback_min, fallback_max]`.
pub fn validate_sent_after(
    session: &BeaconSession,
    beacon_index: usize,
    url_fragment: &str,
    tolerance: f64,
    fallback_min: f64,
    fallback_max: f64,
    mode: MatchMode,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let field = Field::TDone.name();

    let Some(beacon) = session.store().get(beacon_index) else {
        result.fail(field, None, None, format!("no beacon at index {beacon_index}"));
        return result;
    };
    let t_done = beacon.get_field(Field::TDone);
    let actual = t_done.map(|v| v.to_string());
    let done = t_done.map_or(f64::NAN, FieldValue::to_number);

    match find_resource(session, url_fragment, mode) {
        Some(res) => {
            result.check(
                field,
                (done - res.response_end).abs() <= tolerance,
                Some(format!("{} +/- {tolerance}", res.response_end)),
                actual,
                format!("t_done close to responseEnd of {}", res.name),
            );
        }
        None => {
            result.check(
                field,
                done >= fallback_min,
                Some(format!(">= {fallback_min}")),
                actual.clone(),
                "t_done above fallback minimum",
            );
            result.check(
                field,
                done <= fallback_max,
                Some(format!("<= {fallback_max}")),
                actual,
                "t_done below fallback maximum",
            );
        }
    }
    result
}

/// GET/image beacons carry `h.t` on the URL. Empty result without
/// resource timing.
pub fn validate_beacon_was_img(session: &BeaconSession) -> ValidationResult {
    validate_beacon_transport(session, Transport::Get)
}

/// POST/XHR beacons keep `h.t` off the URL. Empty result without
/// resource timing.
pub fn validate_beacon_was_xhr(session: &BeaconSession) -> ValidationResult {
    validate_beacon_transport(session, Transport::Post)
}

fn validate_beacon_transport(session: &BeaconSession, expected: Transport) -> ValidationResult {
    let mut result = ValidationResult::new();
    if !session.host().resource_timing_supported() {
        return result;
    }
    let field = Field::HT.name();
    match find_resource_beacon(session) {
        Some(res) => {
            let actual = Transport::of_url(&res.name);
            result.check(
                field,
                actual == expected,
                Some(format!("{expected:?}")),
                Some(format!("{actual:?}")),
                format!("beacon transport of {}", res.name),
            );
        }
        None => result.fail(
            field,
            Some(format!("{expected:?}")),
            None,
            format!("no resource entry for {}", session.config().beacon_url),
        ),
    }
    result
}

/// A beacon fired and carries the configured library identity.
pub fn validate_beacon_was_sent(session: &BeaconSession) -> ValidationResult {
    let mut result = ValidationResult::new();
    let store = session.store();
    let library = &session.config().library;

    result.check(
        "beacon",
        store.flags().beacon,
        Some("true".into()),
        Some(store.flags().beacon.to_string()),
        "ensure we fired a beacon",
    );

    let Some(last) = store.last() else {
        result.fail("beacon", None, None, "ensure the data was sent to 'beacon'");
        return result;
    };

    let checks = [
        (
            Field::V,
            library.version.as_deref(),
            "ensure the beacon has the library version",
        ),
        (
            Field::Sv,
            library.snippet_version.as_deref(),
            "ensure the beacon has the snippet version",
        ),
        (
            Field::Sm,
            library.snippet_method.as_deref(),
            "ensure the beacon has the snippet method",
        ),
    ];
    for (field, expected, message) in checks {
        let actual = last.get_field(field);
        match expected {
            Some(want) => {
                result.check(
                    field.name(),
                    actual.is_some_and(|v| v.loosely_equals(&FieldValue::from(want))),
                    Some(want.to_string()),
                    actual.map(|v| v.to_string()),
                    message,
                );
            }
            // unknown version: presence is all we can ask for
            None if field == Field::V => {
                result.check(
                    field.name(),
                    actual.is_some(),
                    None,
                    actual.map(|v| v.to_string()),
                    message,
                );
            }
            None => {}
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Count waits
// ---------------------------------------------------------------------------

/// Wait until exactly `expected` beacons were stored and the count held for
/// the settle delay.
///
/// Polls at the configured interval. Over-firing before the count settles
/// fails at once; late arrival is tolerated for as long as the caller keeps
/// waiting (no built-in timeout).
pub async fn ensure_beacon_count(
    session: &BeaconSession,
    expected: usize,
) -> Result<(), CountError> {
    let store = session.store();
    let poll = session.config().poll_interval();
    let settle = session.config().settle_delay();

    loop {
        let actual = store.count();
        if actual == expected {
            tokio::time::sleep(settle).await;
            let settled = store.count();
            if settled != expected {
                tracing::warn!(expected, actual = settled, "beacon count changed during settle");
                return Err(CountError::Mismatch {
                    expected,
                    actual: settled,
                });
            }
            tracing::debug!(expected, "beacon count settled");
            return Ok(());
        }
        if actual > expected {
            tracing::warn!(expected, actual, "too many beacons");
            return Err(CountError::TooMany { expected, actual });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Wait until at least `n` beacons were stored. No built-in timeout.
pub async fn wait_for_beacons(session: &BeaconSession, n: usize) {
    let poll = session.config().poll_interval();
    while session.store().count() < n {
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use beacon_api::{HostEnvironment, StaticHost};
    use tokio::time::Instant;

    use super::*;
    use crate::config::HarnessConfig;

    fn session_with(host: impl HostEnvironment + 'static) -> Arc<BeaconSession> {
        Arc::new(BeaconSession::new(HarnessConfig::default(), Arc::new(host)))
    }

    fn beacon(pairs: &[(&str, &str)]) -> BeaconRecord {
        BeaconRecord::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn field_lookups_return_first_match() {
        let session = session_with(StaticHost::full());
        session.on_beacon(beacon(&[("pid", "p1"), ("rt.start", "navigation"), ("n", "1")]));
        session.on_beacon(beacon(&[("pid", "p1"), ("http.initiator", "xhr"), ("n", "2")]));
        session.on_beacon(beacon(&[("pid", "p1"), ("http.initiator", "xhr"), ("n", "3")]));

        let hit = find_by_field(&session, "pid", "p1").unwrap();
        assert_eq!(hit.get("n"), Some(&FieldValue::from("1")));
        let xhr = find_xhr_beacon(&session).unwrap();
        assert_eq!(xhr.get("n"), Some(&FieldValue::from("2")));
        assert!(find_nav_beacon(&session).is_some());
        assert!(find_by_field(&session, "pid", "p2").is_none());
        // strict: text "1" is not the number 1
        assert!(find_by_field(&session, "n", 1).is_none());
    }

    #[test]
    fn nav_beacon_depends_on_capability() {
        let session = session_with(StaticHost::bare());
        session.on_beacon(beacon(&[("rt.start", "navigation"), ("n", "1")]));
        session.on_beacon(beacon(&[("rt.start", "none"), ("n", "2")]));
        let nav = find_nav_beacon(&session).unwrap();
        assert_eq!(nav.get("n"), Some(&FieldValue::from("2")));
    }

    fn timeline() -> StaticHost {
        StaticHost::full()
            .with_entry(ResourceTimingEntry::new("http://h/script.js", 0.0, 50.0))
            .with_entry(ResourceTimingEntry::new("http://h/img.png?a", 10.0, 300.0))
            .with_entry(ResourceTimingEntry::new("http://h/img.png?b", 20.0, 120.0))
            .with_entry(ResourceTimingEntry::new("http://h/img.png?c", 30.0, 120.0))
            .with_entry(ResourceTimingEntry::new("http://h/beacon?h.t=1&pid=x", 40.0, 400.0))
    }

    #[test]
    fn resource_match_modes() {
        let session = session_with(timeline());
        let name = |m| find_resource(&session, "img.png", m).map(|e| e.name);

        assert_eq!(name(MatchMode::First).as_deref(), Some("http://h/img.png?a"));
        assert_eq!(name(MatchMode::Last).as_deref(), Some("http://h/img.png?a"));
        assert_eq!(name(MatchMode::Nth(0)).as_deref(), Some("http://h/img.png?b"));
        assert_eq!(name(MatchMode::Nth(1)).as_deref(), Some("http://h/img.png?c"));
        assert_eq!(name(MatchMode::Nth(2)).as_deref(), Some("http://h/img.png?a"));
        assert_eq!(name(MatchMode::Nth(3)), None);
        assert!(find_resource(&session, "missing", MatchMode::First).is_none());
    }

    #[test]
    fn resource_match_without_capability() {
        let mut host = timeline();
        host.resource_timing = false;
        let session = session_with(host);
        assert!(find_resource(&session, "img.png", MatchMode::First).is_none());
        assert!(validate_beacon_was_img(&session).is_empty());
        assert!(validate_beacon_was_xhr(&session).is_empty());
    }

    #[test]
    fn sent_after_uses_resource_or_fallback() {
        let session = session_with(timeline());
        session.on_beacon(beacon(&[("t_done", "305")]));
        assert!(validate_sent_after(&session, 0, "img.png", 10.0, 0.0, 1.0, MatchMode::Last).passed());
        assert!(validate_sent_after(&session, 0, "img.png", 10.0, 0.0, 1.0, MatchMode::First).passed());
        assert!(!validate_sent_after(&session, 0, "script.js", 10.0, 0.0, 1000.0, MatchMode::First).passed());

        // fallback range when nothing matches
        let fallback = validate_sent_after(&session, 0, "nothing", 10.0, 300.0, 310.0, MatchMode::First);
        assert_eq!(fallback.len(), 2);
        assert!(fallback.passed());
        let fallback = validate_sent_after(&session, 0, "nothing", 10.0, 0.0, 100.0, MatchMode::First);
        assert_eq!(fallback.failures().count(), 1);

        assert!(!validate_sent_after(&session, 5, "img.png", 10.0, 0.0, 1.0, MatchMode::First).passed());
    }

    #[test]
    fn beacon_transport_checks() {
        let session = session_with(timeline());
        assert!(validate_beacon_was_img(&session).passed());
        assert!(!validate_beacon_was_xhr(&session).passed());

        let session = session_with(
            StaticHost::full().with_entry(ResourceTimingEntry::new("http://h/beacon", 0.0, 10.0)),
        );
        assert!(validate_beacon_was_xhr(&session).passed());
        assert!(!validate_beacon_was_img(&session).passed());

        let session = session_with(StaticHost::full());
        assert!(!validate_beacon_was_img(&session).passed());
    }

    #[test]
    fn beacon_was_sent_checks_identity() {
        let mut config = HarnessConfig::default();
        config.library.version = Some("1.7".into());
        config.library.snippet_method = Some("p".into());
        let session = BeaconSession::new(config, Arc::new(StaticHost::full()));

        let result = validate_beacon_was_sent(&session);
        assert!(!result.passed());

        session.on_beacon(beacon(&[("v", "1.7"), ("sm", "p")]));
        let result = validate_beacon_was_sent(&session);
        assert!(result.passed());
        assert_eq!(result.len(), 3);

        session.on_beacon(beacon(&[("v", "1.6"), ("sm", "p")]));
        let result = validate_beacon_was_sent(&session);
        assert_eq!(result.failures().next().unwrap().field, "v");
    }

    #[tokio::test(start_paused = true)]
    async fn count_settles_on_exact_match() {
        let session = session_with(StaticHost::full());
        for _ in 0..3 {
            session.on_beacon(beacon(&[("pid", "p")]));
        }
        let start = Instant::now();
        ensure_beacon_count(&session, 3).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn count_fails_immediately_when_exceeded() {
        let session = session_with(StaticHost::full());
        for _ in 0..3 {
            session.on_beacon(beacon(&[("pid", "p")]));
        }
        let start = Instant::now();
        let err = ensure_beacon_count(&session, 2).await.unwrap_err();
        assert_eq!(err, CountError::TooMany { expected: 2, actual: 3 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn count_waits_for_late_beacons() {
        let session = session_with(StaticHost::full());
        let feeder = session.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(250)).await;
                feeder.on_beacon(beacon(&[("pid", "p")]));
            }
        });
        ensure_beacon_count(&session, 3).await.unwrap();
        assert_eq!(session.store().count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn count_fails_when_extra_beacon_arrives_during_settle() {
        let session = session_with(StaticHost::full());
        session.on_beacon(beacon(&[("pid", "p")]));
        session.on_beacon(beacon(&[("pid", "p")]));
        let feeder = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            feeder.on_beacon(beacon(&[("pid", "p")]));
        });
        let err = ensure_beacon_count(&session, 2).await.unwrap_err();
        assert_eq!(err, CountError::Mismatch { expected: 2, actual: 3 });
    }
}
