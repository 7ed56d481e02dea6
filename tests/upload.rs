use axum::{body::to_bytes, http::Request, Router};
use serde_json::Value;
use track_merge::{config::Config, state::AppState};
use tower::ServiceExt;

fn app() -> Router {
    let config = Config::from_env();
    track_merge::app(AppState::new(config))
}

fn sample_gpx() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Phone App" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><name>Test Run</name><trkseg>
    <trkpt lat="52.5200" lon="13.4050"><ele>34.0</ele><time>2026-01-01T12:00:00Z</time><extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>140</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions></trkpt>
    <trkpt lat="52.5205" lon="13.4060"><ele>39.0</ele><time>2026-01-01T12:00:10Z</time><extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>146</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions></trkpt>
  </trkseg></trk>
</gpx>"#
}

fn sample_tcx() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities><Activity Sport="Running"><Lap StartTime="2026-01-01T12:00:00Z"><Track>
    <Trackpoint><Time>2026-01-01T12:00:00Z</Time><Position><LatitudeDegrees>52.5200</LatitudeDegrees><LongitudeDegrees>13.4050</LongitudeDegrees></Position><HeartRateBpm><Value>150</Value></HeartRateBpm><Cadence>85</Cadence></Trackpoint>
  </Track></Lap><Creator><Name>Forerunner 265</Name></Creator></Activity></Activities>
</TrainingCenterDatabase>"#
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str)>, boundary: &str) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((file_name, file_body)) = file {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{file_body}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

async fn post_upload(app: &Router, fields: &[(&str, &str)], file: Option<(&str, &str)>) -> (axum::http::StatusCode, Value) {
    let boundary = "X-BOUNDARY-TEST";
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/upload")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(axum::body::Body::from(multipart_body(fields, file, boundary)))
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json"))
}

async fn get_session(app: &Router, session_id: &str) -> (axum::http::StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/sessions/{session_id}"))
                .method("GET")
                .body(axum::body::Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json"))
}

#[tokio::test]
async fn upload_gpx_creates_session_and_summary() {
    let app = app();
    let (status, json) = post_upload(&app, &[("slot", "a")], Some(("run.gpx", sample_gpx()))).await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert!(json["session_id"].as_str().is_some());
    assert_eq!(json["slot"], "a");
    assert_eq!(json["activity"]["name"], "Test Run");
    assert_eq!(json["activity"]["format"], "gpx");
    assert_eq!(json["activity"]["label"], "Phone App");
    assert_eq!(json["activity"]["point_count"], 2);
    assert_eq!(json["activity"]["stats"]["avg_heart_rate"], 143.0);
    assert_eq!(json["activity"]["display"]["duration"], "00:00:10");
}

#[tokio::test]
async fn second_slot_joins_existing_session() {
    let app = app();
    let (_, first) = post_upload(&app, &[("slot", "a")], Some(("run.gpx", sample_gpx()))).await;
    let session_id = first["session_id"].as_str().expect("session id").to_string();

    let (status, second) = post_upload(
        &app,
        &[("slot", "B"), ("session_id", session_id.as_str())],
        Some(("watch.tcx", sample_tcx())),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(second["activity"]["name"], "Running");
    assert_eq!(second["activity"]["device_name"], "Forerunner 265");
    assert_eq!(second["activity"]["stats"]["avg_cadence"], 170.0);

    let (status, session) = get_session(&app, &session_id).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(session["a"]["name"], "Test Run");
    assert_eq!(session["b"]["name"], "Running");
}

#[tokio::test]
async fn failed_upload_clears_only_its_own_slot() {
    let app = app();
    let (_, first) = post_upload(&app, &[("slot", "a")], Some(("run.gpx", sample_gpx()))).await;
    let session_id = first["session_id"].as_str().expect("session id").to_string();
    post_upload(
        &app,
        &[("slot", "b"), ("session_id", session_id.as_str())],
        Some(("watch.tcx", sample_tcx())),
    )
    .await;

    let (status, json) = post_upload(
        &app,
        &[("slot", "b"), ("session_id", session_id.as_str())],
        Some(("broken.gpx", "<gpx><trk>")),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().expect("error").contains("Invalid XML"));

    let (_, session) = get_session(&app, &session_id).await;
    assert_eq!(session["a"]["name"], "Test Run");
    assert!(session["b"].is_null());
}

#[tokio::test]
async fn upload_rejects_unsupported_document() {
    let app = app();
    let (status, json) = post_upload(
        &app,
        &[("slot", "a")],
        Some(("route.kml", "<kml><Document/></kml>")),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().expect("error").contains("Unsupported"));
}

#[tokio::test]
async fn upload_rejects_track_without_points() {
    let app = app();
    let (status, json) = post_upload(
        &app,
        &[("slot", "a")],
        Some(("empty.gpx", "<gpx><trk><trkseg/></trk></gpx>")),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No track points found in file");
}

#[tokio::test]
async fn upload_requires_valid_slot() {
    let app = app();
    let (status, _) = post_upload(&app, &[], Some(("run.gpx", sample_gpx()))).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);

    let (status, _) = post_upload(&app, &[("slot", "c")], Some(("run.gpx", sample_gpx()))).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_to_unknown_session_is_not_found() {
    let app = app();
    let (status, _) = post_upload(
        &app,
        &[("slot", "a"), ("session_id", "no-such-session")],
        Some(("run.gpx", sample_gpx())),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);

    let (status, _) = get_session(&app, "no-such-session").await;
    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_upload_without_session_creates_nothing() {
    let state = AppState::new(Config::from_env());
    let app = track_merge::app(state.clone());

    let (status, json) = post_upload(
        &app,
        &[("slot", "a")],
        Some(("broken.gpx", "<gpx><trk>")),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(json.get("session_id").is_none());
    assert_eq!(state.session_count(), 0);

    post_upload(&app, &[("slot", "a")], Some(("run.gpx", sample_gpx()))).await;
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn non_utf8_upload_clears_its_slot() {
    let app = app();
    let (_, first) = post_upload(&app, &[("slot", "a")], Some(("run.gpx", sample_gpx()))).await;
    let session_id = first["session_id"].as_str().expect("session id").to_string();

    let boundary = "X-BOUNDARY-TEST";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"slot\"\r\n\r\na\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{session_id}\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"run.gpx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(&[0xff, 0xfe, 0x00, 0x3c]);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/upload")
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(axum::body::Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

    let (_, session) = get_session(&app, &session_id).await;
    assert!(session["a"].is_null());
}
