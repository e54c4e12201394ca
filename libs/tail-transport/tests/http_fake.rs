use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tail_api::{
    CursorRequest, QueryNotice, QueryRecord, QueryRenderer, QueryRequest, TailRenderer,
    TransportKind,
};
use tail_engine::{QuerySession, QuerySettings, TailHandle, TailSession, TailSettings, TailState};
use tail_transport::{build_factory, HttpQueryTransport, PollSettings, TransportSettings};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Fake {
    base: Mutex<String>,
    stream_offsets: Mutex<Vec<i64>>,
    query_content_types: Mutex<Vec<String>>,
}

async fn sse_tail(
    State(fake): State<Arc<Fake>>,
    Path((_topic, offset, _count)): Path<(String, i64, usize)>,
) -> impl IntoResponse {
    fake.stream_offsets.lock().unwrap().push(offset);
    let next = offset + 1;
    let body = format!("id: {next}\ndata: line-{offset}\n\nevent: reconnect\ndata:\n\n");
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn poll_tail(
    State(fake): State<Arc<Fake>>,
    Path((topic, offset, count)): Path<(String, i64, usize)>,
) -> Json<Value> {
    let base = fake.base.lock().unwrap().clone();
    let url = |o: i64| format!("{base}/cgi-bin/tail.cgi/{topic}/{o}/{count}");
    if offset < 3 {
        Json(json!({"payload": [format!("p{offset}\n")], "next_url": url(offset + 1)}))
    } else {
        Json(json!({"payload": [], "next_url": url(offset)}))
    }
}

async fn query(State(fake): State<Arc<Fake>>, headers: HeaderMap, body: String) -> Json<Value> {
    let ct = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.query_content_types.lock().unwrap().push(ct);
    let req: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let key = req["key"].as_str().unwrap_or_default().to_string();
    Json(json!([
        {"key": "2", "value": {"timestamp": 20, "type": "MSG_CANCELED", "key": key}},
        {"key": "1", "value": {"timestamp": 10, "type": "TASK_BEGIN", "key": key, "queue": "q"}}
    ]))
}

async fn spawn_server() -> (String, Arc<Fake>) {
    let fake = Arc::new(Fake::default());
    let app = Router::new()
        .route("/cgi-bin/sse-tail.cgi/{topic}/{offset}/{count}", get(sse_tail))
        .route("/cgi-bin/tail.cgi/{topic}/{offset}/{count}", get(poll_tail))
        .route("/cgi-bin/query.cgi/{topic}", post(query))
        .route("/broken/{topic}/{offset}/{count}", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .with_state(fake.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    *fake.base.lock().unwrap() = base.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, fake)
}

#[derive(Clone, Default)]
struct Screen {
    lines: Arc<Mutex<Vec<String>>>,
    statuses: Arc<Mutex<Vec<String>>>,
}

impl TailRenderer for Screen {
    fn render(&mut self, lines: &[String], _received: u64) {
        *self.lines.lock().unwrap() = lines.to_vec();
    }

    fn status(&mut self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }
}

fn fast_tail() -> TailSettings {
    TailSettings {
        render_interval_ms: 5,
        reconnect_delay_ms: 20,
        max_reconnect_delay_ms: 20,
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn stream_session_reconnects_from_last_event_id() {
    let (base, fake) = spawn_server().await;
    let factory = build_factory(&base, &TransportSettings::default()).unwrap();
    let screen = Screen::default();
    let session = TailSession::new(
        CursorRequest::new("logs").offset(0).count(10),
        factory,
        Box::new(screen.clone()),
        &fast_tail(),
    );
    let (handle, rx) = TailHandle::channel(4);
    let task = tokio::spawn(session.run(rx));

    wait_for(|| fake.stream_offsets.lock().unwrap().len() >= 3).await;
    let offsets = fake.stream_offsets.lock().unwrap()[..3].to_vec();
    assert_eq!(offsets, vec![0, 1, 2]);

    wait_for(|| screen.lines.lock().unwrap().len() >= 3).await;
    let lines = screen.lines.lock().unwrap().clone();
    let seq: Vec<i64> = lines
        .iter()
        .map(|l| l.trim_start_matches("line-").parse().unwrap())
        .collect();
    // Most recent first, no gaps and no duplicates across reconnects.
    assert!(seq.windows(2).all(|w| w[0] == w[1] + 1), "{seq:?}");
    assert!(
        screen
            .statuses
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == "server requested reconnect")
    );

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn poll_session_follows_next_url() {
    let (base, _fake) = spawn_server().await;
    let settings = TransportSettings {
        kind: TransportKind::Poll,
        poll: PollSettings {
            first_poll_delay_ms: 0,
            poll_interval_ms: 50,
            ..PollSettings::default()
        },
        ..TransportSettings::default()
    };
    let factory = build_factory(&base, &settings).unwrap();
    let screen = Screen::default();
    let session = TailSession::new(
        CursorRequest::new("logs").offset(0).count(10),
        factory,
        Box::new(screen.clone()),
        &fast_tail(),
    );
    let (handle, rx) = TailHandle::channel(4);
    let task = tokio::spawn(session.run(rx));

    wait_for(|| *screen.lines.lock().unwrap() == vec!["p2", "p1", "p0"]).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, TailState::Connected);
    assert_eq!(snap.applied.map(|c| c.offset()), Some(3));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn stream_error_status_schedules_reconnect() {
    let (base, _fake) = spawn_server().await;
    let settings = TransportSettings {
        stream_path: "/broken".into(),
        ..TransportSettings::default()
    };
    let factory = build_factory(&base, &settings).unwrap();
    let screen = Screen::default();
    let session = TailSession::new(
        CursorRequest::new("logs"),
        factory,
        Box::new(screen.clone()),
        &fast_tail(),
    );
    let (handle, rx) = TailHandle::channel(4);
    let task = tokio::spawn(session.run(rx));

    wait_for(|| {
        screen
            .statuses
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == "disconnected - reconnecting...")
    })
    .await;
    handle.pause().await.unwrap();
    let summary = {
        handle.shutdown().await.unwrap();
        task.await.unwrap()
    };
    assert_eq!(summary.state, TailState::Paused);
}

#[derive(Clone, Default)]
struct Table {
    rows: Arc<Mutex<Vec<QueryRecord>>>,
    notices: Arc<Mutex<Vec<QueryNotice>>>,
}

impl QueryRenderer for Table {
    fn rows(&mut self, rows: &[QueryRecord]) {
        *self.rows.lock().unwrap() = rows.to_vec();
    }

    fn keys(&mut self, _keys: &[String]) {}

    fn notice(&mut self, notice: &QueryNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

#[tokio::test]
async fn query_session_posts_json_and_stops_on_cancel_record() {
    let (base, fake) = spawn_server().await;
    let transport = HttpQueryTransport::new(
        reqwest::Client::new(),
        &base,
        "/cgi-bin/query.cgi",
        "event_log",
        None,
    )
    .unwrap();
    let table = Table::default();
    let session = QuerySession::new(
        QueryRequest::lookup("event_log.ID:index", Some("t-1")),
        Arc::new(transport),
        Box::new(table.clone()),
        QuerySettings::default(),
    )
    .unwrap();

    let summary = session.run(CancellationToken::new()).await;
    assert_eq!(summary.requests, 1);
    assert!(!summary.cancelled);

    let rows = table.rows.lock().unwrap().clone();
    assert_eq!(rows.iter().map(|r| r.timestamp()).collect::<Vec<_>>(), vec![10, 20]);
    assert_eq!(rows[0].value.key.as_deref(), Some("t-1"));
    assert_eq!(
        *fake.query_content_types.lock().unwrap(),
        vec!["application/json; charset=UTF-8"]
    );
}
