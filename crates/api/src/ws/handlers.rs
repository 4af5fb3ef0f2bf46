use std::str::FromStr;
use std::sync::Arc;

use mediasoup::consumer::ConsumerId;
use mediasoup::data_structures::DtlsParameters;
use mediasoup::prelude::MediaKind;
use mediasoup::producer::ProducerId;
use mediasoup::rtp_parameters::{RtpCapabilities, RtpParameters};
use mediasoup::transport::TransportId;
use parking_lot::RwLock;
use serde_json::Value;
use sfunet_domain::{
    CallId, CallView, DataKind, DomainError, DomainResult, ErrorKind, Participant, ParticipantSid,
    ParticipantView, Permissions, Room, ServerEvent, SessionEvent, Track, TrackKind, TrackSource,
};
use sfunet_media::MediaEnginePort;
use sfunet_media::types::Direction;

use crate::state::AppState;
use crate::ws::connection::Conn;
use crate::ws::{cleanup, context, fanout, validator};

/// The ~18 intent handlers (component L). Each one is a plain
/// function rather than a method on some shared `Ctx` type: a handler needs
/// a different slice of `AppState` depending on what it does, and there is
/// no behaviour here that benefits from being bundled onto an object.
fn parse_id<T: FromStr>(s: &str, what: &'static str) -> DomainResult<T>
where
T::Err: std::fmt::Display,
{
    T::from_str(s).map_err(|e| DomainError::invalid_request(format!("invalid {what}: {e}")))
}

fn not_joined() -> ServerEvent {
    ServerEvent::error(ErrorKind::NotFound, "not joined to a room")
}

/// Every handler but `joinRoom`/`ping` needs the room and acting participant;
/// this is the one piece of repeated ceremony worth factoring out.
fn require_context(state: &AppState, conn: &Conn) -> Option<(Arc<RwLock<Room>>, ParticipantSid)> {
    match context::current_room_and_participant(state, conn) {
        Some(pair) => Some(pair),
        None => {
            conn.send(&not_joined());
            None
        }
    }
}

pub async fn join_room(state: &AppState, conn: &mut Conn, room: String, token: String, metadata: Option<Value>) {
    if conn.participant_sid().is_some() {
        conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, "already joined a room"));
        return;
    }
    if let Err(e) = validator::validate_room_name(&room) {
        conn.send(&ServerEvent::error(e.kind, e.message));
        return;
    }
    if let Err(e) = validator::validate_metadata(&metadata) {
        conn.send(&ServerEvent::error(e.kind, e.message));
        return;
    }

    let claims = match state.credentials.validate(&token) {
        Ok(c) => c,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    if !claims.grants.room_join {
        conn.send(&ServerEvent::error(ErrorKind::Unauthorized, "credential does not grant room_join"));
        return;
    }
    if let Some(restricted) = &claims.room {
        if restricted != &room {
            conn.send(&ServerEvent::error(ErrorKind::Unauthorized, "credential is restricted to another room"));
            return;
        }
    }

    let room_arc = match state.room_manager.get_room_by_name(&room) {
        Some(r) => r,
        None => match state.room_manager.create_room(room.clone(), None, None).into_result() {
            Ok(r) => r,
            Err(e) => {
                conn.send(&ServerEvent::error(e.kind, e.message));
                return;
            }
        },
    };
    let room_sid = room_arc.read().sid.clone();

    let permissions = Permissions {
        may_publish: claims.grants.can_publish,
        may_subscribe: claims.grants.can_subscribe,
        may_publish_data: claims.grants.can_publish_data,
    };

    // Same identity joining from a second tab/device attaches this
    // connection to the existing participant instead of minting a new one
    // ("multiple connections per identity").
    let existing_sid = room_arc.read().get_participant_by_identity(&claims.identity).map(|p| p.sid.clone());
    let participant_sid = if let Some(sid) = existing_sid {
        room_arc.write().get_participant_mut(&sid).expect("just looked up").add_connection(conn.connection_id.clone());
        sid
    } else {
        let sid = ParticipantSid::from(state.generate_participant_sid());
        let participant = Participant::new(
            sid.clone(),
            claims.identity.clone(),
            claims.display_name.clone(),
            metadata.or(Some(claims.metadata.clone())),
            permissions,
            conn.connection_id.clone(),
        );
        if let Err(e) = state.room_manager.add_participant(&room_arc, participant).into_result() {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
        sid
    };

    let adapter = match state.get_or_create_room_media(&room_sid).await {
        Ok(a) => a,
        Err(e) => {
            conn.send(&ServerEvent::error(ErrorKind::MediaError, e.to_string()));
            return;
        }
    };

    conn.session.room_sid = Some(room_sid.clone());
    conn.session.participant_sid = Some(participant_sid.clone());
    if !conn.session.apply(SessionEvent::Joined) {
        tracing::warn!(connection_id = %conn.connection_id, "joinRoom succeeded but session transition was rejected");
    }

    let (me, others) = {
        let guard = room_arc.read();
        let me = guard.get_participant(&participant_sid).expect("just inserted");
        let me_view = ParticipantView::from(me);
        let others = guard
        .participants()
        .filter(|p| p.sid != participant_sid)
        .map(ParticipantView::from)
        .collect::<Vec<_>>();
        (me_view, others)
    };

    conn.send(&ServerEvent::RoomJoined {
            room: room.clone(),
            participant: me.clone(),
            other_participants: others,
            rtp_capabilities: adapter.rtp_capabilities(),
    });
    fanout::broadcast_room(state, &room_arc.read(), &ServerEvent::ParticipantJoined { participant: me }, Some(&conn.connection_id));
}

pub async fn leave_room(state: &AppState, conn: &mut Conn) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let room_sid = conn.room_sid().expect("checked by require_context").clone();

    let Some(participant) = state.room_manager.remove_participant(&room, &participant_sid) else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "not joined to a room"));
        return;
    };

    cleanup::close_participant_media(state, &room_sid, &participant).await;
    fanout::broadcast_room(
        state,
        &room.read(),
        &ServerEvent::ParticipantLeft { participant_sid: participant_sid.to_string() },
        Some(&conn.connection_id),
    );

    conn.session.room_sid = None;
    conn.session.participant_sid = None;

    if room.read().is_empty() {
        state.close_room_media(&room_sid);
        state.room_manager.close_room(&room_sid);
    }
}

pub async fn start_call(state: &AppState, conn: &Conn, target_user_id: String, metadata: Option<Value>) {
    let Some((room, caller_sid)) = require_context(state, conn) else {
        return;
    };

    let target_sid = {
        let guard = room.read();
        match guard.get_participant_by_identity(&target_user_id) {
            Some(p) if p.sid != caller_sid => Some(p.sid.clone()),
            Some(_) => {
                conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, "cannot call yourself"));
                return;
            }
            None => None,
        }
    };
    let Some(target_sid) = target_sid else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "target participant not found"));
        return;
    };

    match state.call_manager.start(&room, caller_sid, target_sid.clone(), metadata.clone()).into_result() {
        Ok(call_id) => {
            conn.send(&ServerEvent::CallStarted {
                    call_id: call_id.to_string(),
                    target: CallView { call_id: call_id.to_string(), identity: target_user_id },
            });
            let caller_identity = room.read().get_participant(&caller_sid).map(|p| p.identity.clone()).unwrap_or_default();
            fanout::send_to_participant(
                state,
                &room.read(),
                &target_sid,
                &ServerEvent::CallReceived {
                    call_id: call_id.to_string(),
                    caller: CallView { call_id: call_id.to_string(), identity: caller_identity },
                    metadata,
                },
            );
        }
        Err(e) => conn.send(&ServerEvent::error(e.kind, e.message)),
    }
}

fn resolve_call(room: &Arc<RwLock<Room>>, call_id_str: &str) -> DomainResult<sfunet_domain::Call> {
    let call_id = CallId::from(call_id_str.to_string());
    room.read().get_call(&call_id).cloned().ok_or_else(|| DomainError::not_found("call not found"))
}

pub async fn accept_call(state: &AppState, conn: &Conn, call_id: String) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let call = match resolve_call(&room, &call_id) {
        Ok(c) => c,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    if call.target_sid != participant_sid {
        conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "only the call target may accept"));
        return;
    }
    match state.call_manager.accept(&room, &call.call_id).into_result() {
        Ok(()) => {
            let event = ServerEvent::CallAccepted { call_id };
            fanout::send_to_participant(state, &room.read(), &call.caller_sid, &event);
            fanout::send_to_participant(state, &room.read(), &call.target_sid, &event);
        }
        Err(e) => conn.send(&ServerEvent::error(e.kind, e.message)),
    }
}

pub async fn reject_call(state: &AppState, conn: &Conn, call_id: String, reason: Option<String>) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let call = match resolve_call(&room, &call_id) {
        Ok(c) => c,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    if call.target_sid != participant_sid {
        conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "only the call target may reject"));
        return;
    }
    match state.call_manager.reject(&room, &call.call_id).into_result() {
        Ok(()) => {
            let event = ServerEvent::CallRejected { call_id, reason };
            fanout::send_to_participant(state, &room.read(), &call.caller_sid, &event);
            fanout::send_to_participant(state, &room.read(), &call.target_sid, &event);
        }
        Err(e) => conn.send(&ServerEvent::error(e.kind, e.message)),
    }
}

pub async fn end_call(state: &AppState, conn: &Conn, call_id: String, reason: Option<String>) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let call = match resolve_call(&room, &call_id) {
        Ok(c) => c,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    if !call.involves(&participant_sid) {
        conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "only a party to the call may end it"));
        return;
    }
    match state.call_manager.end(&room, &call.call_id).into_result() {
        Ok(()) => {
            let event = ServerEvent::CallEnded { call_id, reason };
            fanout::send_to_participant(state, &room.read(), &call.caller_sid, &event);
            fanout::send_to_participant(state, &room.read(), &call.target_sid, &event);
        }
        Err(e) => conn.send(&ServerEvent::error(e.kind, e.message)),
    }
}

pub async fn create_transport(state: &AppState, conn: &mut Conn, direction: String) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let dir = match direction.as_str() {
        "send" => Direction::Send,
        "recv" => Direction::Recv,
        _ => {
            conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, "direction must be 'send' or 'recv'"));
            return;
        }
    };
    let Some(adapter) = state.room_media_adapter(conn.room_sid().unwrap()) else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "room has no media adapter"));
        return;
    };

    match adapter.create_transport(dir).await {
        Ok(info) => {
            {
                let mut guard = room.write();
                if let Some(p) = guard.get_participant_mut(&participant_sid) {
                    match dir {
                        Direction::Send => p.send_transport_id = Some(info.id.clone()),
                        Direction::Recv => p.recv_transport_id = Some(info.id.clone()),
                    }
                }
            }
            conn.send(&ServerEvent::TransportCreated {
                    transport_id: info.id,
                    direction,
                    ice_parameters: info.ice_parameters,
                    ice_candidates: info.ice_candidates,
                    dtls_parameters: info.dtls_parameters,
                    sctp_parameters: info.sctp_parameters,
            });
        }
        Err(e) => conn.send(&ServerEvent::error(e.kind, e.message)),
    }
}

/// Creates the acting participant's send- or recv-transport if it does not
/// already exist, notifying the client so it can still complete its own DTLS
/// handshake (the "ensure transport exists" step every media handler needs —
/// DESIGN.md).
async fn ensure_transport(
    state: &AppState,
    conn: &Conn,
    room: &Arc<RwLock<Room>>,
    participant_sid: &ParticipantSid,
    dir: Direction,
) -> DomainResult<String> {
    let existing = {
        let guard = room.read();
        let p = guard.get_participant(participant_sid).expect("acting participant must exist");
        match dir {
            Direction::Send => p.send_transport_id.clone(),
            Direction::Recv => p.recv_transport_id.clone(),
        }
    };
    if let Some(id) = existing {
        return Ok(id);
    }

    let adapter = state
    .room_media_adapter(&room.read().sid.clone())
    .ok_or_else(|| DomainError::not_found("room has no media adapter"))?;
    let info = adapter.create_transport(dir).await?;

    {
        let mut guard = room.write();
        if let Some(p) = guard.get_participant_mut(participant_sid) {
            match dir {
                Direction::Send => p.send_transport_id = Some(info.id.clone()),
                Direction::Recv => p.recv_transport_id = Some(info.id.clone()),
            }
        }
    }
    conn.send(&ServerEvent::TransportCreated {
            transport_id: info.id.clone(),
            direction: if matches!(dir, Direction::Send) { "send".to_string() } else { "recv".to_string() },
            ice_parameters: info.ice_parameters,
            ice_candidates: info.ice_candidates,
            dtls_parameters: info.dtls_parameters,
            sctp_parameters: info.sctp_parameters,
    });
    Ok(info.id)
}

pub async fn connect_transport(state: &AppState, conn: &Conn, transport_id: String, dtls_parameters: Value) {
    let Some((room, _)) = require_context(state, conn) else {
        return;
    };
    let Some(adapter) = state.room_media_adapter(&room.read().sid.clone()) else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "room has no media adapter"));
        return;
    };
    let id: TransportId = match parse_id(&transport_id, "transport id") {
        Ok(id) => id,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    let dtls: DtlsParameters = match serde_json::from_value(dtls_parameters) {
        Ok(d) => d,
        Err(e) => {
            conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, format!("invalid dtlsParameters: {e}")));
            return;
        }
    };
    if let Err(e) = adapter.connect_transport(id, dtls).await {
        conn.send(&ServerEvent::error(e.kind, e.message));
    }
}

async fn enable_media(
    state: &AppState,
    conn: &mut Conn,
    kind: TrackKind,
    source: TrackSource,
    rtp_parameters: Value,
    width: Option<u32>,
    height: Option<u32>,
    simulcast: bool,
) -> Option<(String, Option<Track>)> {
    let (room, participant_sid) = require_context(state, conn)?;

    {
        let guard = room.read();
        let p = guard.get_participant(&participant_sid)?;
        if !p.permissions.may_publish {
            conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "credential does not grant can_publish"));
            return None;
        }
    }

    let transport_id = match ensure_transport(state, conn, &room, &participant_sid, Direction::Send).await {
        Ok(id) => id,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return None;
        }
    };
    let rtp: RtpParameters = match serde_json::from_value(rtp_parameters) {
        Ok(r) => r,
        Err(e) => {
            conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, format!("invalid rtpParameters: {e}")));
            return None;
        }
    };
    let Some(adapter) = state.room_media_adapter(&room.read().sid.clone()) else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "room has no media adapter"));
        return None;
    };
    let transport_id_parsed: TransportId = match parse_id(&transport_id, "transport id") {
        Ok(id) => id,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return None;
        }
    };
    let media_kind = match kind {
        TrackKind::Audio => MediaKind::Audio,
        TrackKind::Video => MediaKind::Video,
    };
    let source_str = match source {
        TrackSource::Camera => "camera",
        TrackSource::Microphone => "microphone",
        TrackSource::Screen => "screen",
        TrackSource::ScreenAudio => "screenAudio",
    };

    let producer = match adapter.create_producer(transport_id_parsed, media_kind, source_str.to_string(), rtp).await {
        Ok(p) => p,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return None;
        }
    };

    let mut track = Track::new(producer.id.clone().into(), kind, source);
    track.width = width;
    track.height = height;
    track.simulcast = simulcast;

    let stale = {
        let mut guard = room.write();
        let p = guard.get_participant_mut(&participant_sid)?;
        let stale = p.publish_track(track.clone());
        p.producer_ids.insert(track.sid.clone(), producer.id.clone());
        stale
    };

    if let Some(stale) = &stale {
        if let Ok(stale_id) = parse_id::<ProducerId>(stale.sid.as_str(), "producer id") {
            if let Err(e) = adapter.close_producer(stale_id).await {
                tracing::warn!(track_sid = %stale.sid, error = %e, "failed to close replaced producer");
            }
        }
    }

    Some((producer.id, stale))
}

pub async fn enable_camera(state: &AppState, conn: &mut Conn, rtp_parameters: Value, width: Option<u32>, height: Option<u32>, simulcast: bool) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let Some((track_sid, stale)) =
    enable_media(state, conn, TrackKind::Video, TrackSource::Camera, rtp_parameters, width, height, simulcast).await
    else {
        return;
    };
    conn.send(&ServerEvent::CameraEnabled { track_sid: track_sid.clone() });
    if let Some(stale) = stale {
        fanout::broadcast_room(
            state,
            &room.read(),
            &ServerEvent::TrackUnpublished { participant_sid: participant_sid.to_string(), track_sid: stale.sid.to_string() },
            Some(&conn.connection_id),
        );
    }
    let sid = sfunet_domain::TrackSid::from(track_sid);
    let published = room.read().get_participant(&participant_sid).and_then(|p| p.tracks.get(&sid).cloned());
    if let Some(track) = published {
        fanout::broadcast_room(
            state,
            &room.read(),
            &ServerEvent::TrackPublished { participant_sid: participant_sid.to_string(), track },
            Some(&conn.connection_id),
        );
    }
}

pub async fn enable_microphone(state: &AppState, conn: &mut Conn, rtp_parameters: Value) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let Some((track_sid, stale)) =
    enable_media(state, conn, TrackKind::Audio, TrackSource::Microphone, rtp_parameters, None, None, false).await
    else {
        return;
    };
    conn.send(&ServerEvent::MicrophoneEnabled { track_sid: track_sid.clone() });
    if let Some(stale) = stale {
        fanout::broadcast_room(
            state,
            &room.read(),
            &ServerEvent::TrackUnpublished { participant_sid: participant_sid.to_string(), track_sid: stale.sid.to_string() },
            Some(&conn.connection_id),
        );
    }
    let sid = sfunet_domain::TrackSid::from(track_sid);
    let published = room.read().get_participant(&participant_sid).and_then(|p| p.tracks.get(&sid).cloned());
    if let Some(track) = published {
        fanout::broadcast_room(
            state,
            &room.read(),
            &ServerEvent::TrackPublished { participant_sid: participant_sid.to_string(), track },
            Some(&conn.connection_id),
        );
    }
}

async fn disable_media(state: &AppState, conn: &Conn, source: TrackSource, kind: TrackKind) -> Option<String> {
    let (room, participant_sid) = require_context(state, conn)?;

    let track = {
        let mut guard = room.write();
        let p = guard.get_participant_mut(&participant_sid)?;
        let sid = p.find_track_by_source(source, kind).map(|t| t.sid.clone())?;
        p.remove_track(&sid)
    };
    let Some(track) = track else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "no active track for this source"));
        return None;
    };

    if let Some(adapter) = state.room_media_adapter(&room.read().sid.clone()) {
        if let Ok(producer_id) = parse_id::<ProducerId>(track.sid.as_str(), "producer id") {
            if let Err(e) = adapter.close_producer(producer_id).await {
                tracing::warn!(track_sid = %track.sid, error = %e, "failed to close producer");
            }
        }
    }

    fanout::broadcast_room(
        state,
        &room.read(),
        &ServerEvent::TrackUnpublished { participant_sid: participant_sid.to_string(), track_sid: track.sid.to_string() },
        Some(&conn.connection_id),
    );
    Some(track.sid.to_string())
}

pub async fn disable_camera(state: &AppState, conn: &Conn) {
    if disable_media(state, conn, TrackSource::Camera, TrackKind::Video).await.is_some() {
        conn.send(&ServerEvent::CameraDisabled {});
    }
}

pub async fn disable_microphone(state: &AppState, conn: &Conn) {
    if disable_media(state, conn, TrackSource::Microphone, TrackKind::Audio).await.is_some() {
        conn.send(&ServerEvent::MicrophoneDisabled {});
    }
}

pub async fn mute_track(state: &AppState, conn: &Conn, track_sid: String) {
    set_muted(state, conn, track_sid, true).await;
}

pub async fn unmute_track(state: &AppState, conn: &Conn, track_sid: String) {
    set_muted(state, conn, track_sid, false).await;
}

async fn set_muted(state: &AppState, conn: &Conn, track_sid: String, muted: bool) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    let sid = sfunet_domain::TrackSid::from(track_sid.clone());
    let found = {
        let mut guard = room.write();
        match guard.get_participant_mut(&participant_sid).and_then(|p| p.tracks.get_mut(&sid)) {
            Some(track) => {
                track.muted = muted;
                true
            }
            None => false,
        }
    };
    if !found {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "track not found"));
        return;
    }
    let event = if muted {
        ServerEvent::TrackMuted { participant_sid: participant_sid.to_string(), track_sid }
    } else {
        ServerEvent::TrackUnmuted { participant_sid: participant_sid.to_string(), track_sid }
    };
    fanout::broadcast_room(state, &room.read(), &event, None);
}

pub async fn subscribe_to_participant(state: &AppState, conn: &mut Conn, target_participant_sid: String, rtp_capabilities: Value) {
    let Some((room, acting_sid)) = require_context(state, conn) else {
        return;
    };
    {
        let guard = room.read();
        if let Some(p) = guard.get_participant(&acting_sid) {
            if !p.permissions.may_subscribe {
                conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "credential does not grant can_subscribe"));
                return;
            }
        }
    }
    let target_sid = ParticipantSid::from(target_participant_sid);
    let capabilities: RtpCapabilities = match serde_json::from_value(rtp_capabilities) {
        Ok(c) => c,
        Err(e) => {
            conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, format!("invalid rtpCapabilities: {e}")));
            return;
        }
    };

    let target_tracks: Vec<Track> = {
        let guard = room.read();
        let Some(target) = guard.get_participant(&target_sid) else {
            conn.send(&ServerEvent::error(ErrorKind::NotFound, "target participant not found"));
            return;
        };
        target.tracks.values().cloned().collect()
    };

    let recv_transport_id = match ensure_transport(state, conn, &room, &acting_sid, Direction::Recv).await {
        Ok(id) => id,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };
    let Some(adapter) = state.room_media_adapter(&room.read().sid.clone()) else {
        conn.send(&ServerEvent::error(ErrorKind::NotFound, "room has no media adapter"));
        return;
    };
    let transport_id: TransportId = match parse_id(&recv_transport_id, "transport id") {
        Ok(id) => id,
        Err(e) => {
            conn.send(&ServerEvent::error(e.kind, e.message));
            return;
        }
    };

    for track in target_tracks {
        let producer_id: ProducerId = match parse_id(track.sid.as_str(), "producer id") {
            Ok(id) => id,
            Err(e) => {
                conn.send(&ServerEvent::error(e.kind, e.message));
                continue;
            }
        };
        match adapter.create_consumer(transport_id, producer_id, &capabilities).await {
            Ok(consumer) => {
                {
                    let mut guard = room.write();
                    if let Some(p) = guard.get_participant_mut(&acting_sid) {
                        p.add_consumer(target_sid.clone(), track.sid.clone(), consumer.id.clone());
                    }
                }
                conn.send(&ServerEvent::TrackSubscribed {
                        participant_sid: target_sid.to_string(),
                        track: track.clone(),
                        consumer_id: consumer.id,
                        rtp_parameters: consumer.rtp_parameters,
                });
            }
            // Partial failure per track is reported but does not abort the
            // remaining tracks .
            Err(e) => conn.send(&ServerEvent::error(e.kind, format!("{}: track {}", e.message, track.sid))),
        }
    }
}

pub async fn unsubscribe_from_participant(state: &AppState, conn: &Conn, target_participant_sid: String) {
    let Some((room, acting_sid)) = require_context(state, conn) else {
        return;
    };
    let target_sid = ParticipantSid::from(target_participant_sid.clone());

    let consumers = {
        let mut guard = room.write();
        match guard.get_participant_mut(&acting_sid) {
            Some(p) => p.take_consumers_for(&target_sid),
            None => Vec::new(),
        }
    };

    let adapter = state.room_media_adapter(&room.read().sid.clone());
    for (track_sid, consumer_id) in consumers {
        if let Some(adapter) = &adapter {
            if let Ok(id) = parse_id::<ConsumerId>(&consumer_id, "consumer id") {
                if let Err(e) = adapter.close_consumer(id).await {
                    tracing::warn!(consumer_id, error = %e, "failed to close consumer");
                }
            }
        }
        conn.send(&ServerEvent::TrackUnsubscribed {
                participant_sid: target_participant_sid.clone(),
                track_sid: track_sid.to_string(),
        });
    }
}

pub async fn send_data(state: &AppState, conn: &Conn, payload: Value, kind: DataKind) {
    let Some((room, participant_sid)) = require_context(state, conn) else {
        return;
    };
    {
        let guard = room.read();
        if let Some(p) = guard.get_participant(&participant_sid) {
            if !p.permissions.may_publish_data {
                conn.send(&ServerEvent::error(ErrorKind::PermissionDenied, "credential does not grant can_publish_data"));
                return;
            }
        }
    }
    let caps = (state.settings.transport.m_data_reliable_bytes, state.settings.transport.m_data_lossy_bytes);
    if let Err(e) = validator::validate_data_payload(kind, &payload, caps) {
        conn.send(&ServerEvent::error(e.kind, e.message));
        return;
    }
    fanout::broadcast_room(
        state,
        &room.read(),
        &ServerEvent::DataReceived { participant_sid: participant_sid.to_string(), payload, kind },
        Some(&conn.connection_id),
    );
}

pub async fn ping(conn: &Conn) {
    conn.send(&ServerEvent::Pong {});
}
