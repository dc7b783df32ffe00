use beacon_api::field::{
    EQUAL_IF_BOTH_PRESENT, Field, MUST_BE_ABSENT_ON_EARLY, MUST_BE_EQUAL, MUST_EXIST_ON_EARLY,
};
use beacon_api::timer::{TimerValue, is_custom_timer};
use beacon_api::value::parse_int;
use beacon_api::{BeaconRecord, FieldValue, TimerMap, ValidationResult};

use crate::session::BeaconSession;

/// Cross-check an early beacon against the normal beacon of the same page view.
///
/// Every applicable check is recorded, failures included; neither record is
/// touched.
pub fn validate_early_beacon(early: &BeaconRecord, normal: &BeaconRecord) -> ValidationResult {
    let mut result = ValidationResult::new();

    for &field in MUST_BE_EQUAL {
        let e = early.get_field(field);
        // navigation timing may not be filled in yet when the early beacon goes out
        if field.is_nav_timing() && e.is_none_or(FieldValue::is_zero) {
            continue;
        }
        match normal.get_field(field) {
            None => {
                result.check(
                    field.name(),
                    e.is_none(),
                    None,
                    e.map(ToString::to_string),
                    format!("{field} must not be on early beacon if not on the load beacon"),
                );
            }
            Some(n) => check_equal(&mut result, field, e, n),
        }
    }

    for &field in MUST_BE_ABSENT_ON_EARLY {
        let e = early.get_field(field);
        result.check(
            field.name(),
            e.is_none(),
            None,
            e.map(ToString::to_string),
            format!("{field} must not be on early beacon"),
        );
    }

    for &field in EQUAL_IF_BOTH_PRESENT {
        if let Some(e) = early.get_field(field) {
            match normal.get_field(field) {
                Some(n) => check_equal(&mut result, field, Some(e), n),
                None => result.fail(
                    field.name(),
                    Some(e.to_string()),
                    None,
                    format!("{field} undefined === {e}"),
                ),
            }
        }
    }

    for &field in MUST_EXIST_ON_EARLY {
        let e = early.get_field(field);
        result.check(
            field.name(),
            e.is_some(),
            Some("defined".into()),
            e.map(ToString::to_string),
            format!("{field} must exist"),
        );
    }

    check_session_length(&mut result, early, normal);
    check_out_of_band_bytes(&mut result, early, normal);
    check_custom_timers(&mut result, early, normal);
    result
}

fn check_equal(
    result: &mut ValidationResult,
    field: Field,
    early: Option<&FieldValue>,
    normal: &FieldValue,
) {
    let passed = early.is_some_and(|e| e.loosely_equals(normal));
    result.check(
        field.name(),
        passed,
        Some(normal.to_string()),
        early.map(ToString::to_string),
        format!("{field} {normal} === {}", display(early)),
    );
}

fn check_session_length(
    result: &mut ValidationResult,
    early: &BeaconRecord,
    normal: &BeaconRecord,
) {
    let e = early.get_field(Field::RtSl);
    let n = normal.get_field(Field::RtSl);
    let passed = match (int_of(e), int_of(n)) {
        (Some(e), Some(n)) => e.checked_add(1) == Some(n),
        _ => false,
    };
    result.check(
        Field::RtSl.name(),
        passed,
        int_of(e).and_then(|e| e.checked_add(1)).map(|v| v.to_string()),
        n.map(ToString::to_string),
        format!("session length {} === {} + 1", display(n), display(e)),
    );
}

fn check_out_of_band_bytes(
    result: &mut ValidationResult,
    early: &BeaconRecord,
    normal: &BeaconRecord,
) {
    let e = early.get_field(Field::RtObo);
    let n = normal.get_field(Field::RtObo);
    // strict equality first: both absent is fine
    let passed = e == n
        || matches!((int_of(e), int_of(n)), (Some(e), Some(n)) if e.checked_add(1) == Some(n));
    result.check(
        Field::RtObo.name(),
        passed,
        e.map(|v| format!("{v} or {v}+1")),
        n.map(ToString::to_string),
        "rt.obo must be equal or 1 more on normal beacon",
    );
}

fn check_custom_timers(result: &mut ValidationResult, early: &BeaconRecord, normal: &BeaconRecord) {
    let Some(early_other) = early.get_field(Field::TOther).filter(|v| v.is_truthy()) else {
        return;
    };
    let Some(normal_other) = normal.get_field(Field::TOther).filter(|v| v.is_truthy()) else {
        result.fail(
            Field::TOther.name(),
            Some(early_other.to_string()),
            None,
            "t_other on early beacon but missing on the normal beacon",
        );
        return;
    };

    let early_timers = TimerMap::decode(&early_other.to_string());
    let normal_timers = TimerMap::decode(&normal_other.to_string());

    for (name, e) in early_timers.iter() {
        let n = normal_timers.get(name).flatten();
        let (passed, op) = if is_custom_timer(name) {
            (matches!((n, e), (Some(n), Some(e)) if n >= e), ">=")
        } else {
            (matches!((n, e), (Some(n), Some(e)) if n == e), "===")
        };
        result.check(
            Field::TOther.name(),
            passed,
            Some(format!("{name} {op} {}", timer_text(e))),
            Some(timer_text(n)),
            format!("t_other {name} {} {op} {}", timer_text(n), timer_text(e)),
        );
    }
}

/// Validate the early/normal pair of page view `pid`.
///
/// The early beacon is the first one carrying the `early` marker, the normal
/// beacon the first one without it. A missing partner fails on `early`.
pub fn validate_page_view(session: &BeaconSession, pid: &str) -> ValidationResult {
    let store = session.store();
    let pid_value = FieldValue::from(pid);
    let same_view = |r: &BeaconRecord| {
        r.get_field(Field::Pid)
            .is_some_and(|v| v.loosely_equals(&pid_value))
    };
    let early = store.find(|r| same_view(r) && r.is_early());
    let normal = store.find(|r| same_view(r) && !r.is_early());

    let result = match (early, normal) {
        (Some(early), Some(normal)) => validate_early_beacon(&early, &normal),
        (early, normal) => {
            let mut result = ValidationResult::new();
            let missing = if early.is_none() { "early" } else { "normal" };
            result.fail(
                Field::Early.name(),
                Some(format!("{missing} beacon for pid {pid}")),
                None,
                format!("no {missing} beacon for page view {pid}"),
            );
            if normal.is_none() && early.is_none() {
                tracing::debug!(pid, "no beacons for page view");
            }
            result
        }
    };

    let failures = result.failures().count();
    if failures == 0 {
        tracing::info!(pid = %pid, checks = result.len(), "early beacon consistent");
    } else {
        tracing::warn!(pid = %pid, checks = result.len(), failures, "early beacon inconsistent");
    }
    result
}

fn int_of(value: Option<&FieldValue>) -> Option<i64> {
    value.and_then(|v| match v {
        FieldValue::Text(s) => parse_int(s),
        other => other.as_int(),
    })
}

fn display(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| "undefined".into(), ToString::to_string)
}

fn timer_text(value: TimerValue) -> String {
    value.map_or_else(|| "NaN".into(), |v| v.to_string())
}
