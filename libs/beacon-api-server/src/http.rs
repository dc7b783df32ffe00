use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use beacon_api::{BeaconRecord, ResourceTimingEntry};
use beacon_engine::{query, validate};

use super::AppState;

// --- Beacon endpoint: GET (fields on the URL) / POST (fields in the body) ---

pub(crate) async fn handle_beacon_get(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let start = state.host.elapsed_ms();
    let record = BeaconRecord::from_query_string(raw.as_deref().unwrap_or_default());
    accept_beacon(&state, uri.to_string(), start, record)
}

pub(crate) async fn handle_beacon_post(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> impl IntoResponse {
    let start = state.host.elapsed_ms();
    let mut record = BeaconRecord::from_form_body(&body);
    if record.is_empty() {
        record = BeaconRecord::from_query_string(raw.as_deref().unwrap_or_default());
    }
    accept_beacon(&state, uri.to_string(), start, record)
}

fn accept_beacon(state: &AppState, name: String, start: f64, record: BeaconRecord) -> StatusCode {
    let index = state.session.on_beacon(record);
    let end = state.host.elapsed_ms();
    tracing::debug!(index, name = %name, "beacon received");
    state.host.record(ResourceTimingEntry::new(name, start, end));
    StatusCode::NO_CONTENT
}

// --- POST /api/events/{event} ---

pub(crate) async fn handle_event(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> impl IntoResponse {
    match event.as_str() {
        "page_ready" => state.session.on_page_ready(),
        "before_unload" => state.session.on_before_unload(),
        _ => {
            return (StatusCode::NOT_FOUND, format!("unknown event: {event}")).into_response();
        }
    }
    axum::Json(state.session.store().flags()).into_response()
}

// --- GET /api/beacons[/count|/last|/find] ---

pub(crate) async fn handle_list_beacons(State(state): State<AppState>) -> Response {
    let records = state.session.store().records();
    let records: Vec<&BeaconRecord> = records.iter().map(AsRef::as_ref).collect();
    axum::Json(records).into_response()
}

pub(crate) async fn handle_count(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({ "count": state.session.store().count() }))
}

pub(crate) async fn handle_last(State(state): State<AppState>) -> Response {
    match state.session.store().last() {
        Some(record) => axum::Json(record.as_ref()).into_response(),
        None => (StatusCode::NOT_FOUND, "no beacons").into_response(),
    }
}

#[derive(Deserialize)]
pub(crate) struct FindParams {
    field: String,
    value: String,
}

pub(crate) async fn handle_find(
    State(state): State<AppState>,
    Query(params): Query<FindParams>,
) -> Response {
    match query::find_by_field(&state.session, &params.field, params.value.as_str()) {
        Some(record) => axum::Json(record.as_ref()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("no beacon with {}={}", params.field, params.value),
        )
            .into_response(),
    }
}

// --- GET /api/validate/early/{pid} ---

pub(crate) async fn handle_validate_early(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> impl IntoResponse {
    axum::Json(validate::validate_page_view(&state.session, &pid))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Uri;
    use beacon_api::{HostEnvironment, Transport};
    use beacon_engine::{BeaconSession, HarnessConfig};

    use super::*;
    use crate::RecordingHost;

    fn state() -> AppState {
        let config = HarnessConfig::default();
        let host = Arc::new(RecordingHost::new(&config.capabilities));
        let session = Arc::new(BeaconSession::new(config, host.clone()));
        AppState { session, host }
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get_beacon(state: &AppState, query: &str) -> StatusCode {
        let uri: Uri = format!("/beacon?{query}").parse().unwrap();
        handle_beacon_get(
            State(state.clone()),
            OriginalUri(uri),
            RawQuery(Some(query.to_string())),
        )
        .await
        .into_response()
        .status()
    }

    #[tokio::test]
    async fn get_and_post_beacons_are_recorded() {
        let state = state();
        assert_eq!(get_beacon(&state, "pid=p1&h.t=10&early=true").await, StatusCode::NO_CONTENT);

        let status = handle_beacon_post(
            State(state.clone()),
            OriginalUri(Uri::from_static("/beacon")),
            RawQuery(None),
            Bytes::from_static(b"pid=p1&rt.sl=2&u=http%3A%2F%2Fx%2F"),
        )
        .await
        .into_response()
        .status();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let store = state.session.store();
        assert_eq!(store.count(), 2);
        assert!(store.flags().beacon);
        assert_eq!(store.last().unwrap().get("u").unwrap().to_string(), "http://x/");

        let entries = state.host.resource_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(Transport::of_url(&entries[0].name), Transport::Get);
        assert_eq!(Transport::of_url(&entries[1].name), Transport::Post);
        assert!(entries[0].response_end >= entries[0].start_time);
        assert_eq!(query::validate_beacon_was_xhr(&state.session).failures().count(), 1);
    }

    #[tokio::test]
    async fn beacon_queries() {
        let state = state();
        let last = handle_last(State(state.clone())).await;
        assert_eq!(last.status(), StatusCode::NOT_FOUND);

        get_beacon(&state, "pid=p1&n=1").await;
        get_beacon(&state, "pid=p2&n=2").await;

        let count = body_json(handle_count(State(state.clone())).await.into_response()).await;
        assert_eq!(count["count"], 2);

        let all = body_json(handle_list_beacons(State(state.clone())).await).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let last = body_json(handle_last(State(state.clone())).await).await;
        assert_eq!(last["pid"], "p2");

        let found = handle_find(
            State(state.clone()),
            Query(FindParams {
                field: "pid".into(),
                value: "p1".into(),
            }),
        )
        .await;
        assert_eq!(body_json(found).await["n"], "1");

        let missing = handle_find(
            State(state.clone()),
            Query(FindParams {
                field: "pid".into(),
                value: "p9".into(),
            }),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lifecycle_events() {
        let state = state();
        let resp = handle_event(State(state.clone()), Path("page_ready".into()))
            .await
            .into_response();
        assert_eq!(body_json(resp).await["page_ready"], true);

        let resp = handle_event(State(state.clone()), Path("reload".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        handle_event(State(state.clone()), Path("before_unload".into())).await;
        assert!(state.session.store().flags().before_unload);
    }

    #[tokio::test]
    async fn validates_page_view() {
        let state = state();
        get_beacon(&state, "pid=p1&early=true&rt.sl=1&rt.end=5&rt.tt=5&t_other=custom_a%7C2").await;
        get_beacon(&state, "pid=p1&rt.sl=2&t_other=custom_a%7C5&t_done=120").await;

        let resp = handle_validate_early(State(state.clone()), Path("p1".into()))
            .await
            .into_response();
        let report = body_json(resp).await;
        let assertions = report["assertions"].as_array().unwrap();
        assert!(!assertions.is_empty());
        assert!(assertions.iter().all(|a| a["passed"] == true));
    }
}
