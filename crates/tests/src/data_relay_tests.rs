use serde_json::json;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws;
use sfunet_services::auth::Grants;

#[tokio::test]
async fn send_data_relays_to_every_other_participant_but_not_the_sender() {
    let app = TestApp::spawn().await;
    let alice_token = app.issue_token("alice", Some("datar"), TestApp::full_grants()).await;
    let bob_token = app.issue_token("bob", Some("datar"), TestApp::full_grants()).await;

    let mut alice = ws::connect(&app.ws_url()).await;
    let mut bob = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut alice, "datar", &alice_token).await;
    ws::join_room(&mut bob, "datar", &bob_token).await;
    ws::recv_event(&mut alice, "participantJoined").await;

    ws::send_json(
        &mut alice,
        json!({ "type": "sendData", "payload": { "hello": "world" }, "kind": "reliable" }),
    )
    .await;
    let received = ws::recv_event(&mut bob, "dataReceived").await;
    assert_eq!(received["payload"]["hello"], "world");
    assert_eq!(received["kind"], "reliable");

    // alice never sees her own frame echoed back
    ws::send_json(&mut alice, json!({ "type": "ping" })).await;
    let pong = ws::recv_event(&mut alice, "pong").await;
    assert_eq!(pong["type"], "pong");
}

#[tokio::test]
async fn send_data_without_the_publish_data_grant_is_denied() {
    let app = TestApp::spawn().await;
    let grants = Grants { room_join: true, can_publish: true, can_subscribe: true, can_publish_data: false };
    let token = app.issue_token("alice", Some("nodatagrant"), grants).await;

    let mut conn = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut conn, "nodatagrant", &token).await;
    ws::send_json(&mut conn, json!({ "type": "sendData", "payload": {}, "kind": "lossy" })).await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("can_publish_data"));
}

#[tokio::test]
async fn oversized_reliable_payload_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("oversize"), TestApp::full_grants()).await;
    let mut conn = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut conn, "oversize", &token).await;

    let huge = "x".repeat(64 * 1024);
    ws::send_json(
        &mut conn,
        json!({ "type": "sendData", "payload": { "blob": huge }, "kind": "reliable" }),
    )
    .await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert_eq!(error["error"]["code"], 100);
}

#[tokio::test]
async fn subscribing_to_an_unknown_participant_is_not_found() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("subfail"), TestApp::full_grants()).await;
    let mut conn = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut conn, "subfail", &token).await;

    ws::send_json(
        &mut conn,
        json!({
                "type": "subscribeToParticipant",
                "participantSid": "PA_doesnotexist",
                "rtpCapabilities": {},
        }),
    )
    .await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert_eq!(error["error"]["code"], 300);
}

#[tokio::test]
async fn subscribing_without_the_subscribe_grant_is_denied() {
    let app = TestApp::spawn().await;
    let alice_grants = Grants { room_join: true, can_publish: true, can_subscribe: false, can_publish_data: true };
    let alice_token = app.issue_token("alice", Some("nosubgrant"), alice_grants).await;
    let bob_token = app.issue_token("bob", Some("nosubgrant"), TestApp::full_grants()).await;

    let mut alice = ws::connect(&app.ws_url()).await;
    let mut bob = ws::connect(&app.ws_url()).await;
    let bob_join = ws::join_room(&mut bob, "nosubgrant", &bob_token).await;
    let bob_sid = bob_join["participant"]["sid"].as_str().unwrap().to_string();
    ws::join_room(&mut alice, "nosubgrant", &alice_token).await;

    ws::send_json(
        &mut alice,
        json!({
                "type": "subscribeToParticipant",
                "participantSid": bob_sid,
                "rtpCapabilities": {},
        }),
    )
    .await;
    let error = ws::recv_event(&mut alice, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("can_subscribe"));
}
