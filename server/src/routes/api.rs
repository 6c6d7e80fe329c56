use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use nusantara_shared::{ActiveEntry, compute_label_placement};

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const ATLAS_CACHE_CONTROL: &str = "public, max-age=300";
const ACTIVE_CACHE_CONTROL: &str = "public, max-age=300";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "empires": state.atlas.atlas.len(),
        "label_placements": state.atlas.placements.len(),
        "wiki_cache_size": state.wiki_cache.len(),
        "observability": {
            "atlas_requests_total": observability.atlas_requests_total,
            "atlas_not_modified_total": observability.atlas_not_modified_total,
            "active_requests_total": observability.active_requests_total,
            "wiki_requests_total": observability.wiki_requests_total,
            "wiki_cache_hits_total": observability.wiki_cache_hits_total,
            "wiki_cache_misses_total": observability.wiki_cache_misses_total,
            "wiki_upstream_errors_total": observability.wiki_upstream_errors_total,
        }
    }))
}

/// Serve the atlas serialized once at startup.
pub async fn get_atlas(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.observability.record_atlas_request();
    let etag = state.atlas.etag.as_str();

    if if_none_match_matches(&headers, etag) {
        state.observability.record_atlas_not_modified();
        return not_modified_response(ATLAS_CACHE_CONTROL, Some(etag));
    }

    json_bytes_response(state.atlas.json.clone(), ATLAS_CACHE_CONTROL, Some(etag))
}

#[derive(serde::Deserialize)]
pub struct ActiveQuery {
    #[serde(default)]
    pub year: Option<String>,
}

fn parse_year(raw: Option<&str>) -> Result<i32, StatusCode> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<i32>().ok())
        .ok_or(StatusCode::BAD_REQUEST)
}

pub async fn get_active(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Response, StatusCode> {
    state.observability.record_active_request();
    let year = parse_year(query.year.as_deref())?;
    let snapshot = &state.atlas;

    let entries: Vec<ActiveEntry> = snapshot
        .atlas
        .active_set(year)
        .into_iter()
        .map(|territory| {
            let info = snapshot.atlas.territory_info(&territory.empire.id, year);
            let placement = snapshot
                .placement_for(&territory.empire.id, territory.boundary_year)
                .unwrap_or_else(|| compute_label_placement(territory.boundary));
            ActiveEntry {
                id: info.id,
                name: info.name,
                color: info.color,
                era: info.era,
                ruler: info.ruler,
                boundary_year: territory.boundary_year,
                placement,
            }
        })
        .collect();

    let body = serde_json::to_vec(&entries).map_err(|e| {
        tracing::error!(error = %e, year, "failed to serialize active set");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(json_bytes_response(
        Bytes::from(body),
        ACTIVE_CACHE_CONTROL,
        None,
    ))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(
        state.atlas.atlas.len(),
        state.wiki_cache.len(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(
    empire_count: usize,
    wiki_cache_size: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "nusantara_empires",
        "gauge",
        "Number of empires in the loaded atlas.",
        empire_count as u64,
    );
    write_metric(
        &mut body,
        "nusantara_wiki_cache_size",
        "gauge",
        "Current number of Wikipedia summaries in cache.",
        wiki_cache_size as u64,
    );
    write_metric(
        &mut body,
        "nusantara_atlas_requests_total",
        "counter",
        "Total /api/atlas requests.",
        observability.atlas_requests_total,
    );
    write_metric(
        &mut body,
        "nusantara_atlas_not_modified_total",
        "counter",
        "Total /api/atlas requests answered with 304 Not Modified.",
        observability.atlas_not_modified_total,
    );
    write_metric(
        &mut body,
        "nusantara_active_requests_total",
        "counter",
        "Total /api/active requests.",
        observability.active_requests_total,
    );
    write_metric(
        &mut body,
        "nusantara_wiki_requests_total",
        "counter",
        "Total /api/wiki requests.",
        observability.wiki_requests_total,
    );
    write_metric(
        &mut body,
        "nusantara_wiki_cache_hits_total",
        "counter",
        "Total Wikipedia summaries served from cache.",
        observability.wiki_cache_hits_total,
    );
    write_metric(
        &mut body,
        "nusantara_wiki_cache_misses_total",
        "counter",
        "Total Wikipedia summaries fetched upstream.",
        observability.wiki_cache_misses_total,
    );
    write_metric(
        &mut body,
        "nusantara_wiki_upstream_errors_total",
        "counter",
        "Total upstream failures while fetching Wikipedia summaries.",
        observability.wiki_upstream_errors_total,
    );
    body
}

pub(crate) fn json_bytes_response(
    body: Bytes,
    cache_control: &'static str,
    etag: Option<&str>,
) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.trim().trim_start_matches("W/")
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    value.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

#[cfg(test)]
mod tests {
    use super::{ObservabilitySnapshot, if_none_match_matches, parse_year, render_prometheus_metrics};
    use crate::state::test_support::{fixture_state, spawn_test_server};
    use axum::http::StatusCode;
    use nusantara_shared::ActiveEntry;

    #[test]
    fn metrics_output_contains_prometheus_help_type_and_values() {
        let observability = ObservabilitySnapshot {
            atlas_requests_total: 12,
            atlas_not_modified_total: 4,
            active_requests_total: 7,
            wiki_requests_total: 5,
            wiki_cache_hits_total: 3,
            wiki_cache_misses_total: 2,
            wiki_upstream_errors_total: 1,
        };

        let metrics = render_prometheus_metrics(2, 9, observability);

        assert!(metrics.contains("# HELP nusantara_empires"));
        assert!(metrics.contains("# TYPE nusantara_atlas_requests_total counter"));
        assert!(metrics.contains("nusantara_empires 2"));
        assert!(metrics.contains("nusantara_wiki_cache_size 9"));
        assert!(metrics.contains("nusantara_atlas_requests_total 12"));
        assert!(metrics.contains("nusantara_atlas_not_modified_total 4"));
        assert!(metrics.contains("nusantara_active_requests_total 7"));
        assert!(metrics.contains("nusantara_wiki_requests_total 5"));
        assert!(metrics.contains("nusantara_wiki_cache_hits_total 3"));
        assert!(metrics.contains("nusantara_wiki_cache_misses_total 2"));
        assert!(metrics.contains("nusantara_wiki_upstream_errors_total 1"));
    }

    #[test]
    fn if_none_match_supports_weak_and_multiple_etags() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::IF_NONE_MATCH,
            axum::http::HeaderValue::from_static("W/\"other\", \"atlas-0000002a\""),
        );
        assert!(if_none_match_matches(&headers, "\"atlas-0000002a\""));
        assert!(!if_none_match_matches(&headers, "\"atlas-00000001\""));
    }

    #[test]
    fn year_must_be_present_and_integral() {
        assert_eq!(parse_year(Some("1350")), Ok(1350));
        assert_eq!(parse_year(Some(" -20 ")), Ok(-20));
        assert_eq!(parse_year(None), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_year(Some("")), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_year(Some("13.5")), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_year(Some("soon")), Err(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn atlas_endpoint_returns_not_modified_when_etag_matches() {
        let (addr, server_handle) = spawn_test_server(fixture_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let first = client
            .get(format!("{base_url}/api/atlas"))
            .send()
            .await
            .expect("atlas request should succeed");
        let first_status = first.status();
        let first_etag = first
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header should be present");
        let first_body = first.text().await.expect("read first response body");

        assert_eq!(first_status, reqwest::StatusCode::OK);
        let atlas = nusantara_shared::Atlas::from_json(&first_body).expect("atlas body parses");
        assert_eq!(atlas.len(), 2);

        let second = client
            .get(format!("{base_url}/api/atlas"))
            .header(reqwest::header::IF_NONE_MATCH, first_etag)
            .send()
            .await
            .expect("conditional atlas request should succeed");

        assert_eq!(second.status(), reqwest::StatusCode::NOT_MODIFIED);
        assert_eq!(
            second
                .headers()
                .get(reqwest::header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("public, max-age=300")
        );

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn active_endpoint_lists_territories_with_placements() {
        let (addr, server_handle) = spawn_test_server(fixture_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let entries = client
            .get(format!("{base_url}/api/active?year=1360"))
            .send()
            .await
            .expect("active request")
            .error_for_status()
            .expect("active status")
            .json::<Vec<ActiveEntry>>()
            .await
            .expect("parse active response");

        assert_eq!(entries.len(), 2);
        let majapahit = entries
            .iter()
            .find(|entry| entry.id == "majapahit")
            .expect("majapahit is active in 1360");
        assert_eq!(majapahit.name, "Majapahit Empire");
        assert_eq!(majapahit.era, "Golden Age");
        assert_eq!(majapahit.ruler, "Hayam Wuruk");
        assert_eq!(majapahit.boundary_year, 1350);
        let position = majapahit.placement.position.expect("placed");
        assert!((position.lng - 112.0).abs() < 1e-7);

        let srivijaya = entries
            .iter()
            .find(|entry| entry.id == "srivijaya")
            .expect("srivijaya is active in 1360");
        assert_eq!(srivijaya.era, "Unknown");
        assert_eq!(srivijaya.boundary_year, 1200);

        let outside = client
            .get(format!("{base_url}/api/active?year=1100"))
            .send()
            .await
            .expect("active request")
            .json::<Vec<ActiveEntry>>()
            .await
            .expect("parse active response");
        assert!(outside.is_empty());

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn active_endpoint_rejects_missing_or_bad_year() {
        let (addr, server_handle) = spawn_test_server(fixture_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        for path in ["/api/active", "/api/active?year=", "/api/active?year=abc"] {
            let status = client
                .get(format!("{base_url}{path}"))
                .send()
                .await
                .expect("active request")
                .status();
            assert_eq!(status, reqwest::StatusCode::BAD_REQUEST, "{path}");
        }

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn health_and_metrics_expose_expected_contract() {
        let (addr, server_handle) = spawn_test_server(fixture_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        client
            .get(format!("{base_url}/api/atlas"))
            .send()
            .await
            .expect("atlas request")
            .error_for_status()
            .expect("atlas status");

        let health = client
            .get(format!("{base_url}/api/health"))
            .send()
            .await
            .expect("health request")
            .json::<serde_json::Value>()
            .await
            .expect("parse health response");
        assert_eq!(health["status"], "ok");
        assert_eq!(health["empires"], 2);
        assert_eq!(health["label_placements"], 3);
        assert_eq!(health["observability"]["atlas_requests_total"], 1);

        let metrics = client
            .get(format!("{base_url}/api/metrics"))
            .send()
            .await
            .expect("metrics request");
        assert_eq!(
            metrics
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; version=0.0.4; charset=utf-8")
        );
        let body = metrics.text().await.expect("metrics body");
        assert!(body.contains("nusantara_empires 2"));
        assert!(body.contains("nusantara_atlas_requests_total 1"));

        server_handle.abort();
        let _ = server_handle.await;
    }
}
