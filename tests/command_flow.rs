use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use ulid::Ulid;

use roomkeep::cli::{execute, parse_line};
use roomkeep::config::EngineConfig;
use roomkeep::engine::{Engine, EngineError, ErrorKind};
use roomkeep::model::Event;
use roomkeep::notify::NotifyHub;

// ── Test infrastructure ──────────────────────────────────────

fn temp_wal() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("roomkeep_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("hotels.wal")
}

fn open(path: &PathBuf) -> Engine {
    let config = EngineConfig {
        max_rooms: 100,
        lock_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    };
    Engine::new(path.clone(), config, Arc::new(NotifyHub::new())).unwrap()
}

async fn run(engine: &Engine, line: &str) -> Result<Value, EngineError> {
    let cmd = parse_line(line).unwrap_or_else(|e| panic!("parse {line:?}: {e}"));
    execute(engine, cmd).await
}

async fn create(engine: &Engine, name: &str, rooms: u32) -> (String, String) {
    let out = run(engine, &format!(r#"create "{name}" password123 {rooms}"#))
        .await
        .unwrap();
    let token = out["token"].as_str().unwrap().to_string();
    let id = out["hotel"]["id"].as_str().unwrap().to_string();
    (id, token)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn command_round_trip_shapes_json() {
    let engine = open(&temp_wal());
    let (_, token) = create(&engine, "Grand Budapest", 4).await;

    let out = run(&engine, &format!("reserve {token} 2 Gustave H")).await.unwrap();
    assert_eq!(out["roomCount"], 4);
    assert_eq!(out["reservedRooms"], 1);
    assert_eq!(out["reservedIndex"], serde_json::json!([2]));
    let room = &out["rooms"][1];
    assert_eq!(room["roomID"], 2);
    assert_eq!(room["owner"], "Gustave H");
    assert_eq!(room["isReserved"], true);
    assert!(room["reservationDate"].is_i64());
    assert!(out.get("credential").is_none());

    let vacant = &out["rooms"][0];
    assert_eq!(vacant["owner"], "Unknown");
    assert!(vacant.get("reservationDate").is_none());

    let room = run(&engine, &format!("room {token} 2")).await.unwrap();
    assert_eq!(room["owner"], "Gustave H");

    let out = run(&engine, &format!("checkout {token} 2")).await.unwrap();
    assert_eq!(out["reservedRooms"], 0);

    let found = run(&engine, r#"find "Grand Budapest""#).await.unwrap();
    assert_eq!(found["name"], "Grand Budapest");

    let verdict = run(&engine, &format!("verify {token}")).await.unwrap();
    assert_eq!(verdict["consistent"], true);
}

#[tokio::test]
async fn commands_require_a_valid_token() {
    let engine = open(&temp_wal());
    create(&engine, "Token Hotel", 2).await;

    let err = run(&engine, "show not-a-token").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let login = run(&engine, r#"login "Token Hotel" password123"#).await.unwrap();
    let token = login["token"].as_str().unwrap();
    assert!(run(&engine, &format!("show {token}")).await.is_ok());

    let err = run(&engine, r#"login "Token Hotel" wrongpassword"#).await.unwrap_err();
    assert_eq!(err, EngineError::Unauthorized);
}

#[tokio::test]
async fn capacity_commands_and_errors() {
    let engine = open(&temp_wal());
    let (_, token) = create(&engine, "Capacity Hotel", 10).await;
    run(&engine, &format!("reserve {token} 8 Guest")).await.unwrap();
    run(&engine, &format!("reserve {token} 9 Guest")).await.unwrap();

    let out = run(&engine, &format!("shrink {token} 3")).await.unwrap();
    assert_eq!(out["roomCount"], 7);
    assert_eq!(out["reservedRooms"], 0);

    let err = run(&engine, &format!("shrink {token} 7")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    let err = run(&engine, &format!("grow {token} 94")).await.unwrap_err();
    assert_eq!(err, EngineError::CapacityExceeded { requested: 101, max: 100 });

    let out = run(&engine, &format!("grow {token} 93")).await.unwrap();
    assert_eq!(out["roomCount"], 100);
}

#[tokio::test]
async fn state_survives_restart_and_compaction() {
    let path = temp_wal();
    let (id, token, before) = {
        let engine = open(&path);
        let (id, token) = create(&engine, "Durable Hotel", 5).await;
        create(&engine, "Neighbour Hotel", 2).await;
        for room in 1..=5 {
            run(&engine, &format!("reserve {token} {room} Guest {room}")).await.unwrap();
        }
        run(&engine, &format!("checkout {token} 3")).await.unwrap();
        run(&engine, &format!(r#"update {token} --name "Durable Hotel East""#))
            .await
            .unwrap();
        let before = run(&engine, &format!("show {token}")).await.unwrap();
        run(&engine, "compact").await.unwrap();
        run(&engine, &format!("checkout {token} 5")).await.unwrap();
        (id, token, before)
    };

    let engine = open(&path);
    assert_eq!(engine.hotel_count(), 2);
    let after = run(&engine, &format!("show {token}")).await.unwrap();
    assert_eq!(after["id"], id.as_str());
    assert_eq!(after["name"], "Durable Hotel East");
    assert_eq!(after["reservedIndex"], serde_json::json!([1, 2, 4]));
    assert_eq!(after["rooms"][0], before["rooms"][0]);
    assert!(run(&engine, r#"find "Durable Hotel""#).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn notifications_follow_commit_order() {
    let engine = Arc::new(open(&temp_wal()));
    let (id, _) = create(&engine, "Notified Hotel", 8).await;
    let id: Ulid = id.parse().unwrap();
    let mut rx = engine.subscribe(id);

    let mut handles = Vec::new();
    for room in 1..=8u32 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.reserve_room(id, room, "Guest").await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let mut rooms = Vec::new();
    for _ in 0..8 {
        match rx.recv().await.unwrap() {
            Event::RoomReserved { room_id, .. } => rooms.push(room_id),
            other => panic!("expected RoomReserved, got {other:?}"),
        }
    }
    rooms.sort();
    assert_eq!(rooms, (1..=8).collect::<Vec<_>>());
    assert_eq!(engine.verify(id).await.unwrap(), None);
}
