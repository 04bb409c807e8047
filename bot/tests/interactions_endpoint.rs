#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Interactions endpoint over real HTTP:
//!   1. Bind the router on an ephemeral port with an in-memory sheet
//!   2. Send signed (and badly signed) interaction payloads
//!   3. Check status codes, reply JSON, and what reached the sheet

use std::net::SocketAddr;
use std::sync::Arc;

use anthrax_bot::interactions::Dispatcher;
use anthrax_bot::server::{AppState, router};
use anthrax_bot::verify::SignatureVerifier;
use anthrax_records::memory::MemorySheet;
use anthrax_records::{CommandHandlers, RecordStore, StaffRole};
use ed25519_dalek::{Signer, SigningKey};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const STAFF_ROLE: &str = "555";

struct Harness {
    addr: SocketAddr,
    signing: SigningKey,
    dispatcher: Arc<Dispatcher<MemorySheet, StaffRole>>,
}

async fn start() -> Harness {
    let signing = SigningKey::from_bytes(&[7u8; 32]);
    let verifier =
        SignatureVerifier::from_hex(&hex::encode(signing.verifying_key().to_bytes())).unwrap();
    let store = RecordStore::open(MemorySheet::new()).await.unwrap();
    let dispatcher = Arc::new(Dispatcher::new(CommandHandlers::new(
        store,
        StaffRole::new(STAFF_ROLE),
    )));

    let state = AppState {
        dispatcher: Arc::clone(&dispatcher),
        verifier: Arc::new(verifier),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    Harness {
        addr,
        signing,
        dispatcher,
    }
}

impl Harness {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn post_signed(&self, body: &Value) -> reqwest::Response {
        let body = body.to_string();
        let timestamp = "1718000000";
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body.as_bytes());
        let signature = hex::encode(self.signing.sign(&message).to_bytes());

        reqwest::Client::new()
            .post(self.url("/interactions"))
            .header("X-Signature-Ed25519", signature)
            .header("X-Signature-Timestamp", timestamp)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }
}

fn staff_command(name: &str, options: Value) -> Value {
    json!({
        "type": 2,
        "guild_id": "1",
        "data": { "name": name, "options": options },
        "member": {
            "nick": "Night Shift",
            "roles": [STAFF_ROLE],
            "user": { "id": "42", "username": "ns" }
        }
    })
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let h = start().await;
    let response = h.post_signed(&json!({ "type": 1 })).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({ "type": 1 }));
}

#[tokio::test]
async fn unsigned_and_tampered_requests_are_rejected() {
    let h = start().await;

    let unsigned = reqwest::Client::new()
        .post(h.url("/interactions"))
        .body(r#"{"type":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status(), 401);

    let wrong_key = SigningKey::from_bytes(&[9u8; 32]);
    let body = r#"{"type":1}"#;
    let mut message = b"1718000000".to_vec();
    message.extend_from_slice(body.as_bytes());
    let forged = reqwest::Client::new()
        .post(h.url("/interactions"))
        .header("X-Signature-Ed25519", hex::encode(wrong_key.sign(&message).to_bytes()))
        .header("X-Signature-Timestamp", "1718000000")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), 401);
}

#[tokio::test]
async fn infraction_then_lookup_round_trip() {
    let h = start().await;

    let recorded = h
        .post_signed(&staff_command(
            "infraction",
            json!([
                { "name": "alderon_name", "type": 3, "value": "Rex" },
                { "name": "alderon_id", "type": 3, "value": "123-456-789" },
                { "name": "rules_broken", "type": 3, "value": "Rule 4" },
                { "name": "ticket_id", "type": 3, "value": "T-77" },
                { "name": "verdict", "type": 3, "value": "Reminder" },
                { "name": "player_informed", "type": 3, "value": "No" }
            ]),
        ))
        .await
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(recorded["type"], 4);
    assert_eq!(recorded["data"]["content"], "Infraction recorded.");
    assert_eq!(recorded["data"]["flags"], 64);

    let rows = h.dispatcher.handlers().store().backend().rows();
    assert_eq!(rows[1][6], "Night Shift");

    let listed = h
        .post_signed(&staff_command(
            "callinfractions",
            json!([{ "name": "alderon_id", "type": 3, "value": "123-456-789" }]),
        ))
        .await
        .json::<Value>()
        .await
        .unwrap();
    let content = listed["data"]["content"].as_str().unwrap();
    assert!(
        content.ends_with("| Rex | 123-456-789 | Reminder | No | Ticket T-77 | Rule 4"),
        "{content}"
    );
}

#[tokio::test]
async fn bad_alderon_id_is_reported_privately() {
    let h = start().await;
    let reply = h
        .post_signed(&staff_command(
            "callinfractions",
            json!([{ "name": "alderon_id", "type": 3, "value": "123456789" }]),
        ))
        .await
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(reply["data"]["content"], "Alderon ID must be exactly 000-000-000.");
    assert_eq!(reply["data"]["flags"], 64);
}

#[tokio::test]
async fn healthz_needs_no_signature() {
    let h = start().await;
    let response = reqwest::get(h.url("/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}
