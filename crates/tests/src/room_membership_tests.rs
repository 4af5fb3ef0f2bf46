use serde_json::json;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws;

#[tokio::test]
async fn join_room_reports_existing_participants_and_broadcasts_the_newcomer() {
    let app = TestApp::spawn().await;
    let alice_token = app.issue_token("alice", Some("lobby"), TestApp::full_grants()).await;
    let bob_token = app.issue_token("bob", Some("lobby"), TestApp::full_grants()).await;

    let mut alice = ws::connect(&app.ws_url()).await;
    let alice_join = ws::join_room(&mut alice, "lobby", &alice_token).await;
    assert_eq!(alice_join["otherParticipants"].as_array().unwrap().len(), 0);

    let mut bob = ws::connect(&app.ws_url()).await;
    let bob_join = ws::join_room(&mut bob, "lobby", &bob_token).await;
    let others = bob_join["otherParticipants"].as_array().unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0]["identity"], "alice");

    let joined = ws::recv_event(&mut alice, "participantJoined").await;
    assert_eq!(joined["participant"]["identity"], "bob");
}

#[tokio::test]
async fn leaving_broadcasts_participant_left_and_closes_an_empty_room() {
    let app = TestApp::spawn().await;
    let alice_token = app.issue_token("alice", Some("empties"), TestApp::full_grants()).await;
    let bob_token = app.issue_token("bob", Some("empties"), TestApp::full_grants()).await;

    let mut alice = ws::connect(&app.ws_url()).await;
    let mut bob = ws::connect(&app.ws_url()).await;
    let alice_join = ws::join_room(&mut alice, "empties", &alice_token).await;
    let alice_sid = alice_join["participant"]["sid"].as_str().unwrap().to_string();
    ws::join_room(&mut bob, "empties", &bob_token).await;
    ws::recv_event(&mut alice, "participantJoined").await;

    ws::send_json(&mut bob, json!({ "type": "leaveRoom" })).await;
    let left = ws::recv_event(&mut alice, "participantLeft").await;
    assert_ne!(left["participantSid"], alice_sid);

    // with bob gone, a fresh joiner sees alice as the only existing participant
    let carol_token = app.issue_token("carol", Some("empties"), TestApp::full_grants()).await;
    let mut carol = ws::connect(&app.ws_url()).await;
    let carol_join = ws::join_room(&mut carol, "empties", &carol_token).await;
    let others = carol_join["otherParticipants"].as_array().unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0]["identity"], "alice");
}

#[tokio::test]
async fn joining_twice_on_the_same_socket_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("double"), TestApp::full_grants()).await;
    let mut conn = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut conn, "double", &token).await;

    ws::send_json(&mut conn, json!({ "type": "joinRoom", "room": "double", "token": token })).await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("already joined"));
}

#[tokio::test]
async fn a_second_connection_for_the_same_identity_joins_the_same_participant() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("multi"), TestApp::full_grants()).await;

    let mut first = ws::connect(&app.ws_url()).await;
    let first_join = ws::join_room(&mut first, "multi", &token).await;
    let first_sid = first_join["participant"]["sid"].as_str().unwrap().to_string();

    let mut second = ws::connect(&app.ws_url()).await;
    let second_join = ws::join_room(&mut second, "multi", &token).await;
    let second_sid = second_join["participant"]["sid"].as_str().unwrap().to_string();

    assert_eq!(first_sid, second_sid);
}

#[tokio::test]
async fn invalid_room_name_is_rejected_before_any_token_check() {
    let app = TestApp::spawn().await;
    let mut conn = ws::connect(&app.ws_url()).await;
    ws::send_json(
        &mut conn,
        json!({ "type": "joinRoom", "room": "not a valid room!", "token": "irrelevant" }),
    )
    .await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("room name"));
}

#[tokio::test]
async fn a_credential_restricted_to_another_room_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("roomA"), TestApp::full_grants()).await;
    let mut conn = ws::connect(&app.ws_url()).await;
    ws::send_json(&mut conn, json!({ "type": "joinRoom", "room": "roomB", "token": token })).await;
    let error = ws::recv_event(&mut conn, "error").await;
    assert_eq!(error["error"]["code"], 101);
}
