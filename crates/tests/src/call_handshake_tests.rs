use serde_json::json;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws;

#[tokio::test]
async fn start_accept_end_call_reaches_both_parties() {
    let app = TestApp::spawn().await;
    let caller_token = app.issue_token("alice", Some("room1"), TestApp::full_grants()).await;
    let callee_token = app.issue_token("bob", Some("room1"), TestApp::full_grants()).await;

    let mut caller = ws::connect(&app.ws_url()).await;
    let mut callee = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut caller, "room1", &caller_token).await;
    let callee_join = ws::join_room(&mut callee, "room1", &callee_token).await;
    // the caller's view gets `participantJoined` once bob shows up
    let participant_joined = ws::recv_event(&mut caller, "participantJoined").await;
    assert_eq!(participant_joined["participant"]["identity"], "bob");
    let callee_sid = callee_join["participant"]["sid"].as_str().unwrap().to_string();

    ws::send_json(&mut caller, json!({ "type": "startCall", "targetUserId": "bob" })).await;
    let started = ws::recv_event(&mut caller, "callStarted").await;
    let call_id = started["callId"].as_str().unwrap().to_string();
    assert_eq!(started["target"]["identity"], "bob");

    let received = ws::recv_event(&mut callee, "callReceived").await;
    assert_eq!(received["callId"], call_id);
    assert_eq!(received["caller"]["identity"], "alice");

    ws::send_json(&mut callee, json!({ "type": "acceptCall", "callId": call_id })).await;
    let accepted_caller = ws::recv_event(&mut caller, "callAccepted").await;
    let accepted_callee = ws::recv_event(&mut callee, "callAccepted").await;
    assert_eq!(accepted_caller["callId"], call_id);
    assert_eq!(accepted_callee["callId"], call_id);

    ws::send_json(&mut caller, json!({ "type": "endCall", "callId": call_id, "reason": "done" })).await;
    let ended_caller = ws::recv_event(&mut caller, "callEnded").await;
    let ended_callee = ws::recv_event(&mut callee, "callEnded").await;
    assert_eq!(ended_caller["reason"], "done");
    assert_eq!(ended_callee["callId"], call_id);

    let _ = callee_sid;
}

#[tokio::test]
async fn reject_call_notifies_caller_with_reason() {
    let app = TestApp::spawn().await;
    let caller_token = app.issue_token("alice", Some("room2"), TestApp::full_grants()).await;
    let callee_token = app.issue_token("bob", Some("room2"), TestApp::full_grants()).await;

    let mut caller = ws::connect(&app.ws_url()).await;
    let mut callee = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut caller, "room2", &caller_token).await;
    ws::join_room(&mut callee, "room2", &callee_token).await;
    ws::recv_event(&mut caller, "participantJoined").await;

    ws::send_json(&mut caller, json!({ "type": "startCall", "targetUserId": "bob" })).await;
    let started = ws::recv_event(&mut caller, "callStarted").await;
    let call_id = started["callId"].as_str().unwrap().to_string();
    ws::recv_event(&mut callee, "callReceived").await;

    ws::send_json(&mut callee, json!({ "type": "rejectCall", "callId": call_id, "reason": "busy" })).await;
    let rejected = ws::recv_event(&mut caller, "callRejected").await;
    assert_eq!(rejected["reason"], "busy");
}

#[tokio::test]
async fn starting_a_second_call_to_the_same_target_is_rejected() {
    let app = TestApp::spawn().await;
    let caller_token = app.issue_token("alice", Some("room3"), TestApp::full_grants()).await;
    let callee_token = app.issue_token("bob", Some("room3"), TestApp::full_grants()).await;

    let mut caller = ws::connect(&app.ws_url()).await;
    let mut callee = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut caller, "room3", &caller_token).await;
    ws::join_room(&mut callee, "room3", &callee_token).await;
    ws::recv_event(&mut caller, "participantJoined").await;

    ws::send_json(&mut caller, json!({ "type": "startCall", "targetUserId": "bob" })).await;
    ws::recv_event(&mut caller, "callStarted").await;
    ws::recv_event(&mut callee, "callReceived").await;

    ws::send_json(&mut caller, json!({ "type": "startCall", "targetUserId": "bob" })).await;
    let error = ws::recv_event(&mut caller, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("call"));
}

#[tokio::test]
async fn calling_yourself_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("alice", Some("room4"), TestApp::full_grants()).await;
    let mut caller = ws::connect(&app.ws_url()).await;
    ws::join_room(&mut caller, "room4", &token).await;

    ws::send_json(&mut caller, json!({ "type": "startCall", "targetUserId": "alice" })).await;
    let error = ws::recv_event(&mut caller, "error").await;
    assert!(error["error"]["message"].as_str().unwrap().contains("yourself"));
}
