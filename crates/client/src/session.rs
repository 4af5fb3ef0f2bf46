use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use sfunet_domain::{
    ClientIntent, DataKind, DomainError, ErrorFrame, ParticipantSid, ParticipantView, Session, SessionEvent, TrackKind,
    TrackSource,
};
use sfunet_resilience::retry_with_backoff;
use tokio::sync::oneshot;

use crate::error::{ClientError, ClientResult};
use crate::media_adapter::{ClientMediaAdapter, DataChannelProvider, NeverReadyProvider, NullMediaAdapter};
use crate::reconciliation::{self, ParticipantSnapshot, ReconciliationPolicy, ReconciliationReport, RoomSnapshot};
use crate::signaling::SignalingClient;

/// How long the reconnect loop keeps retrying, and at what cadence, before
/// giving up and driving the session to `Idle` (`T_base`/cap,
/// mirrored client-side rather than invented fresh).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
        }
    }
}

/// The last `joinRoom` call's parameters, kept so a reconnect can replay the
/// same join without the application having to resupply them.
#[derive(Debug, Clone)]
struct JoinParams {
    room: String,
    token: String,
    metadata: Option<Value>,
}

/// Ties together the session state machine , the signaling
/// transport mirror, a pluggable media adapter, and reconciliation (§4.12)
/// into the one object application code drives. Plays the same role on the
/// client that `AppState` plays on the server: one struct holding every
/// collaborator a caller needs, built once per logical connection and reused
/// across reconnects.
pub struct ClientSession {
    url: String,
    session: Arc<RwLock<Session>>,
    signaling: RwLock<Option<Arc<SignalingClient>>>,
    media: Arc<dyn ClientMediaAdapter>,
    data_provider: Arc<dyn DataChannelProvider>,
    local_state: Arc<RwLock<RoomSnapshot>>,
    policy: ReconciliationPolicy,
    reconnect: ReconnectPolicy,
    last_join: RwLock<Option<JoinParams>>,
    send_transport_id: RwLock<Option<String>>,
    recv_transport_id: RwLock<Option<String>>,
}

impl ClientSession {
    pub fn new(
        url: impl Into<String>,
        media: Arc<dyn ClientMediaAdapter>,
        data_provider: Arc<dyn DataChannelProvider>,
        policy: ReconciliationPolicy,
    ) -> Self {
        Self {
            url: url.into(),
            session: Arc::new(RwLock::new(Session::new(String::new()))),
            signaling: RwLock::new(None),
            media,
            data_provider,
            local_state: Arc::new(RwLock::new(RoomSnapshot::default())),
            policy,
            reconnect: ReconnectPolicy::default(),
            last_join: RwLock::new(None),
            send_transport_id: RwLock::new(None),
            recv_transport_id: RwLock::new(None),
        }
    }

    /// A session with no real media binding wired in, for tests and for
    /// signaling-only use before a concrete engine adapter exists.
    pub fn with_null_media(url: impl Into<String>) -> Self {
        Self::new(url, Arc::new(NullMediaAdapter), Arc::new(NeverReadyProvider), ReconciliationPolicy::default())
    }

    pub fn state(&self) -> sfunet_domain::SessionState {
        self.session.read().state
    }

    pub fn local_state(&self) -> RoomSnapshot {
        self.local_state.read().clone()
    }

    /// Opens the signaling connection and drives the session from `Idle`
    /// into `Joining`. Registers the bookkeeping listeners that keep
    /// `local_state` in sync with inbound events for the lifetime of the
    /// returned connection.
    pub async fn connect(&self) -> ClientResult<()> {
        let sig = SignalingClient::connect(&self.url).await?;
        register_bookkeeping_listeners(&sig, self.session.clone(), self.local_state.clone());
        self.session.write().apply(SessionEvent::Connect);
        *self.signaling.write() = Some(Arc::new(sig));
        Ok(())
    }

    /// Registers a listener for one server event kind on the active
    /// connection (per-event-kind dispatch, exposed to callers
    /// so application code can react to events this module doesn't already
    /// fold into `local_state`).
    pub fn on(&self, type_name: &'static str, handler: crate::signaling::EventListener) -> ClientResult<()> {
        self.require_signaling()?.on(type_name, handler);
        Ok(())
    }

    /// Joins `room` and waits for the server's `roomJoined` confirmation (or
    /// an `error` frame), returning the room's initial snapshot. On success
    /// this becomes the basis `local_state` is seeded from and the params
    /// are remembered for the reconnect loop to replay.
    pub async fn join_room(&self, room: impl Into<String>, token: impl Into<String>, metadata: Option<Value>) -> ClientResult<RoomSnapshot> {
        let room = room.into();
        let token = token.into();
        let sig = self.require_signaling()?;
        *self.last_join.write() = Some(JoinParams {
                room: room.clone(),
                token: token.clone(),
                metadata: metadata.clone(),
        });

        let rx = register_join_waiter(&sig);
        sig.send(&ClientIntent::JoinRoom { room, token, metadata })?;
        let outcome = await_join_outcome(rx).await?;

        match outcome {
            JoinOutcome::Joined(snapshot, me) => {
                {
                    let mut session = self.session.write();
                    session.participant_sid = Some(me);
                    session.apply(SessionEvent::Joined);
                }
                *self.local_state.write() = snapshot.clone();
                Ok(snapshot)
            }
            JoinOutcome::Error(error) => Err(ClientError::Server(error.code, error.message)),
        }
    }

    pub fn leave_room(&self) -> ClientResult<()> {
        let sig = self.require_signaling()?;
        sig.send(&ClientIntent::LeaveRoom {})?;
        *self.local_state.write() = RoomSnapshot::default();
        *self.last_join.write() = None;
        *self.send_transport_id.write() = None;
        *self.recv_transport_id.write() = None;
        Ok(())
    }

    pub fn start_call(&self, target_user_id: impl Into<String>, metadata: Option<Value>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::StartCall {
                target_user_id: target_user_id.into(),
                metadata,
        })
    }

    pub fn accept_call(&self, call_id: impl Into<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::AcceptCall { call_id: call_id.into() })
    }

    pub fn reject_call(&self, call_id: impl Into<String>, reason: Option<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::RejectCall { call_id: call_id.into(), reason })
    }

    pub fn end_call(&self, call_id: impl Into<String>, reason: Option<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::EndCall { call_id: call_id.into(), reason })
    }

    /// Publishes the camera: ensures a send transport exists, asks the local
    /// media adapter to produce on it, then tells the server about the new
    /// track (`enableCamera`). `trackPublished` for this track
    /// arrives later over the normal event path and is folded into
    /// `local_state` like any other participant's track.
    pub async fn enable_camera(&self, width: Option<u32>, height: Option<u32>, simulcast: bool) -> ClientResult<()> {
        let transport_id = self.ensure_send_transport().await?;
        let producer = self
        .media
        .produce(&transport_id, TrackKind::Video, TrackSource::Camera)
        .await
        .map_err(domain_err)?;
        self.require_signaling()?.send(&ClientIntent::EnableCamera {
                rtp_parameters: producer.rtp_parameters,
                width,
                height,
                simulcast,
        })
    }

    pub async fn enable_microphone(&self) -> ClientResult<()> {
        let transport_id = self.ensure_send_transport().await?;
        let producer = self
        .media
        .produce(&transport_id, TrackKind::Audio, TrackSource::Microphone)
        .await
        .map_err(domain_err)?;
        self.require_signaling()?.send(&ClientIntent::EnableMicrophone {
                rtp_parameters: producer.rtp_parameters,
        })
    }

    pub fn disable_camera(&self) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::DisableCamera {})
    }

    pub fn disable_microphone(&self) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::DisableMicrophone {})
    }

    pub fn mute_track(&self, track_sid: impl Into<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::MuteTrack { track_sid: track_sid.into() })
    }

    pub fn unmute_track(&self, track_sid: impl Into<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::UnmuteTrack { track_sid: track_sid.into() })
    }

    pub async fn subscribe_to_participant(&self, participant_sid: impl Into<String>) -> ClientResult<()> {
        self.ensure_recv_transport().await?;
        let rtp_capabilities = self.media.rtp_capabilities();
        self.require_signaling()?.send(&ClientIntent::SubscribeToParticipant {
                participant_sid: participant_sid.into(),
                rtp_capabilities,
        })
    }

    pub fn unsubscribe_from_participant(&self, participant_sid: impl Into<String>) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::UnsubscribeFromParticipant {
                participant_sid: participant_sid.into(),
        })
    }

    /// Sends a data payload, preferring the real data-channel path when
    /// `DataChannelProvider::is_ready` says it can carry reliable traffic and
    /// falling back to the signaling-relayed `sendData` intent otherwise
    /// ("data-channel fallback" supplement).
    pub fn send_data(&self, payload: Value, reliable: bool) -> ClientResult<()> {
        if reliable && self.data_provider.is_ready() {
            return self.data_provider.send(&payload).map_err(|e| ClientError::Protocol(e.to_string()));
        }
        let kind = if reliable { DataKind::Reliable } else { DataKind::Lossy };
        self.require_signaling()?.send(&ClientIntent::SendData { payload, kind })
    }

    pub fn ping(&self) -> ClientResult<()> {
        self.require_signaling()?.send(&ClientIntent::Ping {})
    }

    /// Runs until the connection drops for good: awaits disconnection, then
    /// retries the reconnect+rejoin+reconcile sequence with backoff (spec
    /// §4.11/§4.12). Returns once the session reaches a terminal state —
    /// either because the caller closed it or because the retry budget was
    /// exhausted. Intended to be spawned as a background task per
    /// connection, not awaited inline by request-handling code.
    pub async fn run_reconnect_loop(self: Arc<Self>) {
        loop {
            let Some(sig) = self.signaling.read().clone() else {
                return;
            };
            sig.disconnected.notified().await;
            if self.session.read().is_terminal() {
                return;
            }
            if !self.session.write().apply(SessionEvent::Reconnect) {
                return;
            }

            match self.clone().reconnect_and_reconcile().await {
                Ok(report) => {
                    tracing::info!(
                        local_only = report.local_only.len(),
                        server_only = report.server_only.len(),
                        conflicting = report.conflicting.len(),
                        "reconnected and reconciled room state"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "giving up reconnecting");
                    self.session.write().apply(SessionEvent::Disconnect);
                    return;
                }
            }
        }
    }

    /// Reconnects the transport with backoff, then rejoins the last room and
    /// diffs the fresh server snapshot against whatever `local_state` held at
    /// the moment of disconnect, applying `self.policy` to the result (spec
    /// §4.12). Returns the diff report for observability even though
    /// `local_state` already reflects the reconciled outcome by the time this
    /// returns.
    async fn reconnect_and_reconcile(self: Arc<Self>) -> ClientResult<ReconciliationReport> {
        let params = self.last_join.read().clone().ok_or_else(|| ClientError::Protocol("no prior join to resume".into()))?;

        let this = self.clone();
        retry_with_backoff(self.reconnect.max_attempts, self.reconnect.base, self.reconnect.cap, move || {
                let this = this.clone();
                async move { this.connect().await }
        })
        .await?;

        let pre_disconnect = self.local_state.read().clone();

        let sig = self.require_signaling()?;
        let rx = register_join_waiter(&sig);
        sig.send(&ClientIntent::JoinRoom {
                room: params.room,
                token: params.token,
                metadata: params.metadata,
        })?;
        let outcome = await_join_outcome(rx).await?;

        let server_snapshot = match outcome {
            JoinOutcome::Joined(snapshot, me) => {
                self.session.write().participant_sid = Some(me);
                snapshot
            }
            JoinOutcome::Error(error) => return Err(ClientError::Server(error.code, error.message)),
        };

        let report = reconciliation::diff(&pre_disconnect, &server_snapshot);
        let resolved = reconciliation::apply_policy(&pre_disconnect, &server_snapshot, self.policy);
        *self.local_state.write() = resolved;
        self.session.write().apply(SessionEvent::Joined);
        Ok(report)
    }

    fn require_signaling(&self) -> ClientResult<Arc<SignalingClient>> {
        self.signaling.read().clone().ok_or(ClientError::Disconnected)
    }

    async fn ensure_send_transport(&self) -> ClientResult<String> {
        if let Some(id) = self.send_transport_id.read().clone() {
            return Ok(id);
        }
        let id = self.ensure_transport(true).await?;
        *self.send_transport_id.write() = Some(id.clone());
        Ok(id)
    }

    async fn ensure_recv_transport(&self) -> ClientResult<String> {
        if let Some(id) = self.recv_transport_id.read().clone() {
            return Ok(id);
        }
        let id = self.ensure_transport(false).await?;
        *self.recv_transport_id.write() = Some(id.clone());
        Ok(id)
    }

    /// Drives the createTransport/connectTransport handshake :
    /// asks the server for a transport, creates the matching local one via
    /// the media adapter, then hands the local DTLS parameters back so the
    /// server side can finish the DTLS handshake.
    async fn ensure_transport(&self, send: bool) -> ClientResult<String> {
        let sig = self.require_signaling()?;
        let rx = register_transport_created_waiter(&sig);
        let direction = if send { "send" } else { "recv" }.to_string();
        sig.send(&ClientIntent::CreateTransport { direction })?;
        let server_info = tokio::time::timeout(Duration::from_secs(10), rx)
        .await
        .map_err(|_| ClientError::Connect("timed out waiting for transportCreated".into()))?
        .map_err(|_| ClientError::Disconnected)?;

        let local = if send {
            self.media.create_send_transport().await
        } else {
            self.media.create_recv_transport().await
        }
        .map_err(domain_err)?;

        self.media
        .connect_transport(&server_info.transport_id, local.dtls_parameters.clone())
        .await
        .map_err(domain_err)?;
        sig.send(&ClientIntent::ConnectTransport {
                transport_id: server_info.transport_id.clone(),
                dtls_parameters: local.dtls_parameters,
        })?;

        Ok(server_info.transport_id)
    }
}

fn domain_err(e: DomainError) -> ClientError {
    ClientError::Protocol(e.to_string())
}

enum JoinOutcome {
    Joined(RoomSnapshot, ParticipantSid),
    Error(ErrorFrame),
}

/// Registers one-shot `roomJoined`/`error` listeners and returns a receiver
/// for whichever fires first. Registration happens synchronously (this is a
/// plain function, not an `async fn`) so there is no race between sending the
/// intent and the listener being in place to catch the reply.
fn register_join_waiter(sig: &SignalingClient) -> oneshot::Receiver<JoinOutcome> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    {
        let tx = tx.clone();
        sig.on(
            "roomJoined",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::RoomJoined { participant, other_participants, .. } = event {
                        let mut snapshot = RoomSnapshot::default();
                        insert_participant_view(&mut snapshot, participant);
                        for p in other_participants {
                            insert_participant_view(&mut snapshot, p);
                        }
                        let me = ParticipantSid::from(participant.sid.clone());
                        if let Some(tx) = tx.lock().take() {
                            let _ = tx.send(JoinOutcome::Joined(snapshot, me));
                        }
                    }
            }),
        );
    }
    {
        let tx = tx.clone();
        sig.on(
            "error",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::Error { error } = event {
                        if let Some(tx) = tx.lock().take() {
                            let _ = tx.send(JoinOutcome::Error(error.clone()));
                        }
                    }
            }),
        );
    }
    rx
}

async fn await_join_outcome(rx: oneshot::Receiver<JoinOutcome>) -> ClientResult<JoinOutcome> {
    tokio::time::timeout(Duration::from_secs(10), rx)
    .await
    .map_err(|_| ClientError::Connect("timed out waiting for roomJoined".into()))?
    .map_err(|_| ClientError::Disconnected)
}

struct ServerTransportInfo {
    transport_id: String,
    #[allow(dead_code)]
    ice_parameters: Value,
    #[allow(dead_code)]
    ice_candidates: Value,
    dtls_parameters: Value,
    #[allow(dead_code)]
    sctp_parameters: Option<Value>,
}

fn register_transport_created_waiter(sig: &SignalingClient) -> oneshot::Receiver<ServerTransportInfo> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    sig.on(
        "transportCreated",
        Box::new(move |event| {
                if let sfunet_domain::ServerEvent::TransportCreated {
                    transport_id,
                    ice_parameters,
                    ice_candidates,
                    dtls_parameters,
                    sctp_parameters,
                    ..
                } = event
                {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(ServerTransportInfo {
                                transport_id: transport_id.clone(),
                                ice_parameters: ice_parameters.clone(),
                                ice_candidates: ice_candidates.clone(),
                                dtls_parameters: dtls_parameters.clone(),
                                sctp_parameters: sctp_parameters.clone(),
                        });
                    }
                }
        }),
    );
    rx
}

fn insert_participant_view(snapshot: &mut RoomSnapshot, view: &ParticipantView) {
    let mut tracks = HashMap::new();
    for t in &view.tracks {
        tracks.insert(t.sid.clone(), t.clone());
    }
    snapshot.participants.insert(
        ParticipantSid::from(view.sid.clone()),
        ParticipantSnapshot {
            identity: view.identity.clone(),
            metadata: view.metadata.clone(),
            tracks,
        },
    );
}

/// Keeps `local_state` (and the session's `socket_id`) in sync with every
/// inbound event that changes room membership or track state, independent of
/// whatever the caller's own listeners do. Re-registered on every `connect`
/// since a fresh `SignalingClient` has an empty listener registry.
fn register_bookkeeping_listeners(sig: &SignalingClient, session: Arc<RwLock<Session>>, local_state: Arc<RwLock<RoomSnapshot>>) {
    {
        let session = session.clone();
        sig.on(
            "connected",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::Connected { connection_id } = event {
                        session.write().socket_id = connection_id.clone();
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "participantJoined",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::ParticipantJoined { participant } = event {
                        insert_participant_view(&mut local_state.write(), participant);
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "participantLeft",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::ParticipantLeft { participant_sid } = event {
                        local_state.write().participants.remove(&ParticipantSid::from(participant_sid.clone()));
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "trackPublished",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::TrackPublished { participant_sid, track } = event {
                        let mut state = local_state.write();
                        let entry = state.participants.entry(ParticipantSid::from(participant_sid.clone())).or_default();
                        entry.tracks.insert(track.sid.clone(), track.clone());
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "trackUnpublished",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::TrackUnpublished { participant_sid, track_sid } = event {
                        if let Some(p) = local_state.write().participants.get_mut(&ParticipantSid::from(participant_sid.clone())) {
                            p.tracks.remove(&sfunet_domain::TrackSid::from(track_sid.clone()));
                        }
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "trackMuted",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::TrackMuted { participant_sid, track_sid } = event {
                        set_track_muted(&local_state, participant_sid, track_sid, true);
                    }
            }),
        );
    }
    {
        let local_state = local_state.clone();
        sig.on(
            "trackUnmuted",
            Box::new(move |event| {
                    if let sfunet_domain::ServerEvent::TrackUnmuted { participant_sid, track_sid } = event {
                        set_track_muted(&local_state, participant_sid, track_sid, false);
                    }
            }),
        );
    }
}

fn set_track_muted(local_state: &Arc<RwLock<RoomSnapshot>>, participant_sid: &str, track_sid: &str, muted: bool) {
    if let Some(p) = local_state.write().participants.get_mut(&ParticipantSid::from(participant_sid.to_string())) {
        if let Some(track) = p.tracks.get_mut(&sfunet_domain::TrackSid::from(track_sid.to_string())) {
            track.muted = muted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_starts_idle() {
        let session = ClientSession::with_null_media("ws://127.0.0.1:0/ws");
        assert_eq!(session.state(), sfunet_domain::SessionState::Idle);
        assert!(session.local_state().participants.is_empty());
    }

    #[test]
    fn insert_participant_view_captures_tracks() {
        use sfunet_domain::{Track, TrackKind, TrackSid, TrackSource};

        let mut snapshot = RoomSnapshot::default();
        let view = ParticipantView {
            sid: "PA_1".into(),
            identity: "alice".into(),
            display_name: None,
            metadata: None,
            tracks: vec![Track::new(TrackSid::from("TR_1"), TrackKind::Video, TrackSource::Camera)],
        };
        insert_participant_view(&mut snapshot, &view);
        let p = &snapshot.participants[&ParticipantSid::from("PA_1")];
        assert_eq!(p.identity, "alice");
        assert!(p.tracks.contains_key(&TrackSid::from("TR_1")));
    }
}
