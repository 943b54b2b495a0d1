use super::*;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::OnlineState;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct UpstreamState {
    device_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    commands: Arc<Mutex<Vec<Value>>>,
}

async fn upstream_devices(
    State(state): State<UpstreamState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.device_queries.lock().await.push(query);
    Json(json!([
        {"title": "Flota", "items": [
            {"id": 472, "online": "online", "speed": 42, "lat": -33.4, "lng": -70.6},
            {"id": 325, "online": "offline", "speed": 0, "lat": null, "lng": null},
            {"id": 1, "online": "online", "speed": 3}
        ]}
    ]))
}

async fn upstream_command(
    State(state): State<UpstreamState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.commands.lock().await.push(body);
    Json(json!({"status": 1, "message": "Comando enviado"}))
}

async fn spawn_upstream(app: Router) -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}"))?)
}

async fn spawn_fleet_upstream() -> Result<(Url, UpstreamState)> {
    let state = UpstreamState::default();
    let app = Router::new()
        .route(DEVICES_ENDPOINT, get(upstream_devices))
        .route(COMMAND_ENDPOINT, post(upstream_command))
        .with_state(state.clone());
    Ok((spawn_upstream(app).await?, state))
}

fn config(base_url: Url) -> TrackerConfig {
    TrackerConfig {
        base_url,
        user_api_hash: Some("secret-hash".to_string()),
        lang: "es".to_string(),
        devices_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn fetch_telemetry_sends_credentials_and_filters_devices() {
    let (base_url, state) = spawn_fleet_upstream().await.expect("spawn upstream");
    let tracker = HttpTrackerApi::new(config(base_url));

    let ids = [DeviceId::from("472"), DeviceId::from("325"), DeviceId::from("68")];
    let snapshot = tracker.fetch_telemetry(&ids).await.expect("telemetry");

    assert_eq!(snapshot.len(), 2);
    let moving = snapshot[&DeviceId::from("472")];
    assert_eq!(moving.online, OnlineState::Online);
    assert_eq!(moving.speed, 42.0);
    assert!(!snapshot.contains_key(&DeviceId::from("1")));
    assert!(!snapshot.contains_key(&DeviceId::from("68")));

    let queries = state.device_queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].get("user_api_hash").map(String::as_str), Some("secret-hash"));
    assert_eq!(queries[0].get("lang").map(String::as_str), Some("es"));
}

#[tokio::test]
async fn send_command_posts_custom_payload() {
    let (base_url, state) = spawn_fleet_upstream().await.expect("spawn upstream");
    let tracker = HttpTrackerApi::new(config(base_url));

    let ack = tracker
        .send_command(&DeviceId::from("472"), "ST300CMD;807356132;02;Disable1")
        .await
        .expect("ack");
    assert!(ack.is_accepted());
    assert_eq!(ack.message, "Comando enviado");

    let commands = state.commands.lock().await;
    assert_eq!(
        commands[0],
        json!({
            "user_api_hash": "secret-hash",
            "device_id": "472",
            "type": "custom",
            "data": "ST300CMD;807356132;02;Disable1"
        })
    );
}

#[tokio::test]
async fn missing_hash_fails_before_any_request() {
    let (base_url, state) = spawn_fleet_upstream().await.expect("spawn upstream");
    let mut config = config(base_url);
    config.user_api_hash = Some("  ".to_string());
    let tracker = HttpTrackerApi::new(config);

    let err = tracker
        .fetch_telemetry(&[DeviceId::from("472")])
        .await
        .expect_err("should fail");
    assert!(matches!(err, TrackerError::MissingCredentials));
    assert!(state.device_queries.lock().await.is_empty());

    let dashboard_error = DashboardError::from(err);
    assert!(matches!(dashboard_error, DashboardError::Misconfigured { .. }));
    assert!(matches!(
        tracker.ensure_configured(),
        Err(TrackerError::MissingCredentials)
    ));
}

#[test]
fn configured_hash_passes_readiness_check() {
    let base_url = Url::parse("http://127.0.0.1:9").expect("url");
    assert!(HttpTrackerApi::new(config(base_url.clone())).ensure_configured().is_ok());

    let mut unset = config(base_url);
    unset.user_api_hash = None;
    assert!(HttpTrackerApi::new(unset).ensure_configured().is_err());
}

#[tokio::test]
async fn refusal_with_null_message_is_still_an_ack() {
    let app = Router::new().route(
        COMMAND_ENDPOINT,
        post(|| async { Json(json!({"status": 0, "message": null})) }),
    );
    let base_url = spawn_upstream(app).await.expect("spawn upstream");
    let tracker = HttpTrackerApi::new(config(base_url));

    let ack = tracker
        .send_command(&DeviceId::from("472"), "setdigout 1")
        .await
        .expect("ack");
    assert!(!ack.is_accepted());
    assert!(ack.message.is_empty());
}

#[tokio::test]
async fn http_error_status_is_reported_as_status_error() {
    let app = Router::new().route(
        DEVICES_ENDPOINT,
        get(|| async { (StatusCode::UNAUTHORIZED, "bad hash") }),
    );
    let base_url = spawn_upstream(app).await.expect("spawn upstream");
    let tracker = HttpTrackerApi::new(config(base_url));

    let err = tracker
        .fetch_telemetry(&[DeviceId::from("472")])
        .await
        .expect_err("should fail");
    assert!(
        matches!(
            err,
            TrackerError::Status { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED
        ),
        "{err}"
    );
    assert!(matches!(
        DashboardError::from(err),
        DashboardError::UpstreamUnavailable { .. }
    ));
}

#[tokio::test]
async fn slow_upstream_is_reported_as_timeout() {
    let app = Router::new().route(
        COMMAND_ENDPOINT,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"status": 1, "message": "late"}))
        }),
    );
    let base_url = spawn_upstream(app).await.expect("spawn upstream");
    let mut config = config(base_url);
    config.command_timeout = Duration::from_millis(100);
    let tracker = HttpTrackerApi::new(config);

    let err = tracker
        .send_command(&DeviceId::from("472"), "setdigout 1")
        .await
        .expect_err("should time out");
    assert!(matches!(err, TrackerError::Timeout { endpoint: COMMAND_ENDPOINT }), "{err}");
}

#[tokio::test]
async fn malformed_listing_is_a_decode_error() {
    let app = Router::new().route(DEVICES_ENDPOINT, get(|| async { "<html>maintenance</html>" }));
    let base_url = spawn_upstream(app).await.expect("spawn upstream");
    let tracker = HttpTrackerApi::new(config(base_url));

    let err = tracker
        .fetch_telemetry(&[DeviceId::from("472")])
        .await
        .expect_err("should fail");
    assert!(matches!(err, TrackerError::Decode { .. }), "{err}");
}
