use crate::history::History;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use plant_core::{Alarm, Command, CommandError, EventEnvelope, Snapshot};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/alarms", get(alarms_handler))
        .route("/api/v1/events", get(events_handler))
        .route("/api/v1/history", get(history_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/commands", post(command_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Event log cursor. Missing means "from the beginning".
#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    #[serde(default)]
    pub since: u64,
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let plant = app_state.plant.borrow().clone();
    let paused = app_state.paused.load(Ordering::Relaxed);
    Json(serde_json::json!({
        "tick": plant.meta.tick,
        "seed": plant.meta.seed,
        "schema_version": plant.meta.schema_version,
        "config_version": plant.meta.config_version,
        "tick_seconds": plant.meta.tick_seconds,
        "tick_period_ms": app_state.tick_period_ms,
        "paused": paused,
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
    Query(query): Query<SinceQuery>,
) -> Json<Snapshot> {
    let plant = app_state.plant.borrow().clone();
    Json(plant_core::snapshot(&plant, query.since))
}

pub async fn alarms_handler(State(app_state): State<AppState>) -> Json<Vec<Alarm>> {
    let plant = app_state.plant.borrow().clone();
    Json(plant.alarms.iter().cloned().collect())
}

pub async fn events_handler(
    State(app_state): State<AppState>,
    Query(query): Query<SinceQuery>,
) -> Json<serde_json::Value> {
    let plant = app_state.plant.borrow().clone();
    let events = plant_core::events_since(&plant, query.since);
    Json(serde_json::json!({
        "events": events,
        "cursor": plant.events.len(),
    }))
}

pub async fn history_handler(State(app_state): State<AppState>) -> Response {
    let history = app_state.history.lock();
    Json::<&History>(&history).into_response()
}

/// Queues a command for the next tick. Only references are checked here;
/// state transitions are judged when the tick applies the command.
pub async fn command_handler(
    State(app_state): State<AppState>,
    Json(command): Json<Command>,
) -> Response {
    let plant = app_state.plant.borrow().clone();
    if let Err(err) = plant_core::validate_command(&plant, &command) {
        tracing::warn!(error = %err, "command refused");
        let status = match err {
            CommandError::UnknownComponent(_) | CommandError::UnknownAlarm(_) => {
                StatusCode::NOT_FOUND
            }
            CommandError::InvalidTransition { .. } => StatusCode::CONFLICT,
        };
        return (status, Json(err)).into_response();
    }

    let issued_tick = plant.meta.tick;
    let command_id = app_state.commands.lock().submit(issued_tick, command);
    tracing::info!(command_id = %command_id, issued_tick, "command queued");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "command_id": command_id,
            "issued_tick": issued_tick,
        })),
    )
        .into_response()
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(true, Ordering::Relaxed);
    tracing::info!("simulation paused");
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(false, Ordering::Relaxed);
    tracing::info!("simulation resumed");
    Json(serde_json::json!({"paused": false}))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let plant = app_state.plant.clone();
    let mut shutdown = app_state.shutdown.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(1000));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event stream lagged; client should resync via /events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let tick = plant.borrow().meta.tick;
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick});
                    yield Ok(Event::default().data(hb.to_string()));
                }
                _ = shutdown.changed() => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::state::CommandQueue;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use plant_core::test_fixtures::{base_state, cid, make_rng, single_tank_config};
    use plant_core::{AlarmId, AlarmKind, PlantState, PumpMode};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct Harness {
        app: AppState,
        // Keep the senders alive for the lifetime of the test.
        _plant_tx: watch::Sender<Arc<PlantState>>,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn make_harness(plant: PlantState) -> Harness {
        let (plant_tx, plant_rx) = watch::channel(Arc::new(plant));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(64);
        Harness {
            app: AppState {
                plant: plant_rx,
                commands: Arc::new(parking_lot::Mutex::new(CommandQueue::new(0))),
                history: Arc::new(parking_lot::Mutex::new(History::default())),
                event_tx,
                paused: Arc::new(AtomicBool::new(false)),
                shutdown: shutdown_rx,
                tick_period_ms: 500,
            },
            _plant_tx: plant_tx,
            _shutdown_tx: shutdown_tx,
        }
    }

    fn idle_plant() -> PlantState {
        base_state(&single_tank_config())
    }

    /// Plant with one active actuator alarm on `pump_a`, after one tick.
    fn plant_with_alarm() -> PlantState {
        let config = single_tank_config();
        let mut state = base_state(&config);
        let force = state.envelope(Command::ForceFault {
            component_id: cid("pump_a"),
        });
        plant_core::tick(&mut state, &[force], &config, &mut make_rng());
        state
    }

    async fn get_json(app: &AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = make_router(app.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(
        app: &AppState,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = make_router(app.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_meta_reports_tick_and_paused() {
        let harness = make_harness(idle_plant());

        let (status, json) = get_json(&harness.app, "/api/v1/meta").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tick"], 0);
        assert_eq!(json["seed"], 42);
        assert_eq!(json["tick_period_ms"], 500);
        assert_eq!(json["paused"], false);
    }

    #[tokio::test]
    async fn test_snapshot_hides_component_health() {
        let harness = make_harness(plant_with_alarm());

        let (status, json) = get_json(&harness.app, "/api/v1/snapshot").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tick"], 1);
        let components = json["components"].as_array().unwrap();
        assert!(!components.is_empty());
        assert!(components.iter().all(|c| c.get("status").is_none()));
        assert_eq!(json["alarms"][0]["id"], "pump_a/actuator_fault");
    }

    #[tokio::test]
    async fn test_snapshot_since_cursor_skips_seen_events() {
        let harness = make_harness(plant_with_alarm());

        let (_, all) = get_json(&harness.app, "/api/v1/snapshot").await;
        let cursor = all["cursor"].as_u64().unwrap();
        assert!(cursor > 0);
        let (_, later) =
            get_json(&harness.app, &format!("/api/v1/snapshot?since={cursor}")).await;

        assert_eq!(all["events"].as_array().unwrap().len() as u64, cursor);
        assert!(later["events"].as_array().unwrap().is_empty());
        assert_eq!(later["cursor"], cursor);
    }

    #[tokio::test]
    async fn test_alarms_and_events_routes() {
        let harness = make_harness(plant_with_alarm());

        let (_, alarms) = get_json(&harness.app, "/api/v1/alarms").await;
        let (_, events) = get_json(&harness.app, "/api/v1/events?since=0").await;

        assert_eq!(alarms.as_array().unwrap().len(), 1);
        assert_eq!(alarms[0]["state"], "active");
        assert_eq!(events["events"][0]["event"]["type"], "alarm_raised");
        assert_eq!(events["cursor"], 1);
    }

    #[tokio::test]
    async fn test_command_is_queued_with_id() {
        let harness = make_harness(idle_plant());

        let (status, json) = post_json(
            &harness.app,
            "/api/v1/commands",
            serde_json::json!({"type": "set_pump", "pump_id": "pump_a", "mode": "on"}),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["command_id"], "cmd_000000");
        let queue = harness.app.commands.lock();
        assert_eq!(queue.pending.len(), 1);
        assert_eq!(
            queue.pending[0].command,
            Command::SetPump {
                pump_id: cid("pump_a"),
                mode: PumpMode::On,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_component_is_404() {
        let harness = make_harness(idle_plant());

        let (status, json) = post_json(
            &harness.app,
            "/api/v1/commands",
            serde_json::json!({"type": "repair", "component_id": "pump_ghost"}),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "unknown_component");
        assert_eq!(json["detail"], "pump_ghost");
        assert!(harness.app.commands.lock().pending.is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_known_alarm_is_accepted() {
        let harness = make_harness(plant_with_alarm());
        let alarm_id = AlarmId::for_fault(&cid("pump_a"), AlarmKind::ActuatorFault);

        let (status, _) = post_json(
            &harness.app,
            "/api/v1/commands",
            serde_json::json!({"type": "acknowledge", "alarm_id": alarm_id}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, json) = post_json(
            &harness.app,
            "/api/v1/commands",
            serde_json::json!({"type": "acknowledge", "alarm_id": "tank_a/leak"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "unknown_alarm");
    }

    #[tokio::test]
    async fn test_pause_and_resume_toggle_flag() {
        let harness = make_harness(idle_plant());

        let (_, paused) = post_json(&harness.app, "/api/v1/pause", serde_json::json!({})).await;
        assert_eq!(paused["paused"], true);
        assert!(harness.app.paused.load(Ordering::Relaxed));

        let (_, resumed) = post_json(&harness.app, "/api/v1/resume", serde_json::json!({})).await;
        assert_eq!(resumed["paused"], false);
        assert!(!harness.app.paused.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_history_starts_empty() {
        let harness = make_harness(idle_plant());

        let (status, json) = get_json(&harness.app, "/api/v1/history").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({}));
    }
}
