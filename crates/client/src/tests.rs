use super::*;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use config::Cli;
use serde_json::{json, Value};
use skylink_engine::{AppMode, EngineError, VisualId};
use skylink_protocol::ServerConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Stand-in for the training server.
#[derive(Default)]
struct MockServer {
    config: Option<Value>,
    actors: Option<Value>,
    /// Client frames to wait for before the script is played.
    expect_commands: usize,
    script: Vec<Value>,
    received: Mutex<Vec<Value>>,
}

async fn config_route(State(mock): State<Arc<MockServer>>) -> Result<Json<Value>, StatusCode> {
    mock.config
        .clone()
        .map(Json)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn actors_route(State(mock): State<Arc<MockServer>>) -> Result<Json<Value>, StatusCode> {
    mock.actors
        .clone()
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn ws_route(ws: WebSocketUpgrade, State(mock): State<Arc<MockServer>>) -> Response {
    ws.on_upgrade(move |socket| play_script(socket, mock))
}

async fn play_script(mut socket: WebSocket, mock: Arc<MockServer>) {
    let mut seen = 0;
    while seen < mock.expect_commands {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                mock.received.lock().unwrap().push(value);
                seen += 1;
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    }
    for frame in &mock.script {
        if socket
            .send(WsMessage::Text(frame.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn serve_mock(mock: MockServer) -> (SocketAddr, Arc<MockServer>, oneshot::Sender<()>) {
    let mock = Arc::new(mock);
    let app = Router::new()
        .route("/config", get(config_route))
        .route("/actors", get(actors_route))
        .route("/ws", get(ws_route))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
    });
    (addr, mock, tx)
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        server: format!("http://{addr}/"),
        ..ClientConfig::default()
    }
}

async fn run_to_close(config: ClientConfig) -> anyhow::Result<Session<HeadlessScene>> {
    let (_tx, rx) = mpsc::channel(1);
    tokio::time::timeout(
        Duration::from_secs(10),
        run(config, rx, std::future::pending()),
    )
    .await
    .context("client did not stop")?
}

fn target_config() -> Value {
    json!({
        "targetPosition": {"x": 0.0, "y": 0.4, "z": 0.0},
        "obstacles": [{"type": "cylinder", "x": 0.5, "y": 0.0, "zMin": 0.0, "zMax": 1.5, "radius": 0.1}]
    })
}

#[tokio::test]
async fn mirrors_drone_lifecycle_from_stream() {
    let (addr, _mock, _stop) = serve_mock(MockServer {
        config: Some(target_config()),
        script: vec![
            json!({"channel":"addDrone","data":{"id":"d1","origin":[0,0,0]}}),
            json!({"channel":"setDroneState","data":{"id":"d1","data":{"x":1,"y":0,"z":0}}}),
            json!({"channel":"addDrone","data":{"id":"d2","origin":[1,0,0],
                "display_options":{"displayGlobalCoordinateSystem":false}}}),
            json!({"channel":"futureChannel","data":{}}),
            json!({"channel":"removeDrone","data":{"id":"d2"}}),
        ],
        ..MockServer::default()
    })
    .await;

    let session = run_to_close(client_config(addr)).await.unwrap();
    let d1 = session.registry().get("d1").expect("d1 mirrored");
    assert_eq!(d1.state, Some(json!({"x":1,"y":0,"z":0})));
    assert!(session.registry().has_frame("d1"));
    assert!(!session.registry().contains("d2"));
    assert!(!session.scene().contains(&VisualId::Drone("d2".to_string())));
}

#[tokio::test]
async fn start_flag_sends_command_and_reaches_finished() {
    let (addr, mock, _stop) = serve_mock(MockServer {
        config: Some(target_config()),
        expect_commands: 1,
        script: vec![
            json!({"channel":"status","data":{"progress":0.5,"time":1.0,"finished":false}}),
            json!({"channel":"status","data":{"progress":1.0,"time":2.0,"finished":true}}),
            json!({"channel":"status","data":{"progress":1.0,"time":2.1,"finished":true}}),
        ],
        ..MockServer::default()
    })
    .await;

    let config = ClientConfig {
        seed: 7,
        start: Some(TrainingMode::Hover),
        ..client_config(addr)
    };
    let session = run_to_close(config).await.unwrap();

    let received = mock.received.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![json!({"channel":"startTraining","data":{"seed":7,"mode":"hover"}})]
    );
    assert_eq!(session.controller().mode(), &AppMode::Finished);
    let view = session.controller().view();
    assert_eq!(view.result_text.as_deref(), Some("Finished"));
    assert_eq!(view.progress_text.as_deref(), Some("Training progress: 100%"));
}

#[tokio::test]
async fn unknown_drone_update_aborts_the_run() {
    let (addr, _mock, _stop) = serve_mock(MockServer {
        script: vec![json!({"channel":"setDroneState","data":{"id":"ghost","data":{}}})],
        ..MockServer::default()
    })
    .await;

    let err = run_to_close(client_config(addr)).await.err().expect("run fails");
    assert_eq!(
        err.downcast_ref::<EngineError>(),
        Some(&EngineError::UnknownEntity("ghost".to_string()))
    );
}

#[tokio::test]
async fn config_fetch_parses_target_and_obstacles() {
    let (addr, _mock, _stop) = serve_mock(MockServer {
        config: Some(target_config()),
        ..MockServer::default()
    })
    .await;
    let http = fetch::http_client(Duration::from_secs(2)).unwrap();
    let cfg = fetch::fetch_server_config(&http, &format!("http://{addr}")).await;
    assert_eq!(cfg.target_position.to_array(), [0.0, 0.4, 0.0]);
    assert_eq!(cfg.obstacles.len(), 1);
}

#[tokio::test]
async fn config_fetch_falls_back_on_server_error() {
    let (addr, _mock, _stop) = serve_mock(MockServer::default()).await;
    let http = fetch::http_client(Duration::from_secs(2)).unwrap();
    let cfg = fetch::fetch_server_config(&http, &format!("http://{addr}")).await;
    assert_eq!(cfg, ServerConfig::fallback());
}

#[tokio::test]
async fn config_fetch_falls_back_on_malformed_payload() {
    let (addr, _mock, _stop) = serve_mock(MockServer {
        config: Some(json!({"targetPosition": "oops"})),
        ..MockServer::default()
    })
    .await;
    let http = fetch::http_client(Duration::from_secs(2)).unwrap();
    let cfg = fetch::fetch_server_config(&http, &format!("http://{addr}")).await;
    assert_eq!(cfg, ServerConfig::fallback());

    let mut session = Session::new(HeadlessScene::new(), Default::default());
    session.on_config_loaded(&cfg);
    assert!(session.markers().is_loaded());
    assert_eq!(
        session.controller().view().legend_target.as_deref(),
        Some("(0, 0, 0)")
    );
}

#[tokio::test]
async fn config_fetch_falls_back_when_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let http = fetch::http_client(Duration::from_secs(2)).unwrap();
    let cfg = fetch::fetch_server_config(&http, &format!("http://{addr}")).await;
    assert_eq!(cfg, ServerConfig::fallback());

    // markers still build from the fallback
    let mut session = Session::new(HeadlessScene::new(), Default::default());
    session.on_config_loaded(&cfg);
    assert!(session.markers().is_loaded());
}

#[tokio::test]
async fn actor_list_fetch() {
    let (addr, _mock, _stop) = serve_mock(MockServer {
        actors: Some(json!([{"name":"hover","path":"actors/hover.h5"}])),
        ..MockServer::default()
    })
    .await;
    let http = fetch::http_client(Duration::from_secs(2)).unwrap();
    let actors = fetch::fetch_actors(&http, &format!("http://{addr}"))
        .await
        .unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].path, "actors/hover.h5");

    let (addr, _mock, _stop) = serve_mock(MockServer::default()).await;
    assert!(fetch::fetch_actors(&http, &format!("http://{addr}"))
        .await
        .is_err());
}

#[tokio::test]
async fn config_signal_wakes_every_waiter() {
    let (publisher, signal) = fetch::config_signal();
    assert!(signal.get().is_none());

    let mut a = signal.clone();
    let mut b = signal.clone();
    let waiter = tokio::spawn(async move { a.wait().await.map(|c| c.target_position) });

    publisher.publish(ServerConfig::fallback());
    let got = waiter.await.unwrap().unwrap();
    assert_eq!(got.to_array(), [0.0, 0.0, 0.0]);
    // late dependents resolve immediately
    assert!(b.wait().await.is_ok());
    assert!(signal.get().is_some());
}

#[tokio::test]
async fn config_signal_reports_dropped_publisher() {
    let (publisher, mut signal) = fetch::config_signal();
    drop(publisher);
    assert!(signal.wait().await.is_err());
}

#[tokio::test]
async fn read_controls_parses_lines() {
    let input: &[u8] = b"hover\n\nbogus\nselect actors/a.h5\nseed 9\nstatus\n";
    let (tx, mut rx) = mpsc::channel(8);
    read_controls(input, tx).await;
    let mut got = Vec::new();
    while let Some(i) = rx.recv().await {
        got.push(i);
    }
    assert_eq!(
        got,
        vec![
            UserInput::Control(Control::StartTraining(TrainingMode::Hover)),
            UserInput::Control(Control::SelectActor("actors/a.h5".to_string())),
            UserInput::Control(Control::SetSeed(9)),
            UserInput::ShowStatus,
        ]
    );
}

#[test]
fn parse_input_rejects_bad_commands() {
    assert_eq!(parse_input("   ").unwrap(), None);
    assert_eq!(
        parse_input("p2p").unwrap(),
        Some(UserInput::Control(Control::StartTraining(
            TrainingMode::PositionToPosition
        )))
    );
    assert!(parse_input("seed abc").is_err());
    assert!(parse_input("hover now").is_err());
}

#[test]
fn ws_url_follows_server_scheme() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.ws_url().unwrap(), "ws://127.0.0.1:8000/ws");

    let tls = ClientConfig {
        server: "https://train.example/".to_string(),
        ws_path: "socket".to_string(),
        ..ClientConfig::default()
    };
    assert_eq!(tls.ws_url().unwrap(), "wss://train.example/socket");

    let bad = ClientConfig {
        server: "ftp://x".to_string(),
        ..ClientConfig::default()
    };
    assert!(bad.ws_url().is_err());
}

#[test]
fn yaml_file_then_cli_overrides() {
    let path = std::env::temp_dir().join(format!(
        "skylink-client-test-{}.yaml",
        std::process::id()
    ));
    std::fs::write(
        &path,
        "server: http://10.0.0.5:9000\nseed: 3\nstart: position-to-position\n",
    )
    .unwrap();

    let cli = Cli::parse_from([
        "skylink-client",
        "--config",
        path.to_str().unwrap(),
        "--seed",
        "11",
        "--grace-ms",
        "250",
    ]);
    let cfg = cli.resolve().unwrap();
    assert_eq!(cfg.server, "http://10.0.0.5:9000");
    assert_eq!(cfg.seed, 11);
    assert_eq!(cfg.start, Some(TrainingMode::PositionToPosition));
    assert_eq!(cfg.ws_path, "/ws");
    assert_eq!(cfg.session_options().reset_grace, Duration::from_millis(250));

    let cli = Cli::parse_from(["skylink-client", "--start", "p2p"]);
    let mut cfg = ClientConfig::default();
    cli.apply(&mut cfg);
    assert_eq!(cfg.start, Some(TrainingMode::PositionToPosition));

    std::fs::remove_file(&path).ok();
    assert!(ClientConfig::load(&path).is_err());
}
