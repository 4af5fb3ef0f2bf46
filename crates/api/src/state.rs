use std::sync::Arc;

use dashmap::DashMap;
use sfunet_config::Settings;
use sfunet_domain::{RoomSid, SidGenerator, UuidSidGenerator};
use sfunet_media::{MediaEnginePort, RoomMedia, WorkerPool};
use sfunet_services::room::spawn_call_gc;
use sfunet_services::{CallManager, CredentialValidator, InMemoryStateStore, RedisStateStore, RoomManager, StateStorePort};
use tokio::sync::Mutex;

use crate::ws::dispatcher::HandlerRegistry;
use crate::ws::registry::ConnectionRegistry;

/// Everything a handler needs, cloned cheaply into every request/connection
/// (components D-G wired together, plus the signaling-layer pieces
/// adds: the connection registry and the per-room media map).
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub room_manager: Arc<RoomManager>,
    pub call_manager: Arc<CallManager>,
    pub credentials: Arc<CredentialValidator>,
    pub worker_pool: Arc<WorkerPool>,
    pub state_store: Arc<dyn StateStorePort>,
    pub connections: Arc<ConnectionRegistry>,
    pub handler_registry: Arc<HandlerRegistry>,
    participant_sid_gen: Arc<dyn SidGenerator>,
    /// One media adapter per live room (: one router per room,
    /// created lazily on the first `joinRoom` into that room).
    room_media: Arc<DashMap<RoomSid, RoomMedia>>,
    /// Serializes the check-then-create race in `get_or_create_room_media`;
    /// held only across router/adapter creation, never across a handler.
    room_media_creation_lock: Arc<Mutex<()>>,
    call_gc: Arc<tokio::task::JoinHandle<()>>,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let worker_pool = Arc::new(WorkerPool::new(&settings.engine).await?);
        let room_manager = Arc::new(RoomManager::new(None, Box::new(UuidSidGenerator)));
        let call_manager = Arc::new(CallManager::new(
                settings.call_manager.clone(),
                Box::new(UuidSidGenerator),
        ));
        let credentials = Arc::new(CredentialValidator::new(&settings.credentials));

        let state_store: Arc<dyn StateStorePort> = if settings.state_store.enabled {
            Arc::new(RedisStateStore::connect(&settings.state_store, &settings.resilience).await?)
        } else {
            Arc::new(InMemoryStateStore::new())
        };

        let call_gc = spawn_call_gc(room_manager.clone(), settings.call_manager.clone());

        Ok(Self {
                settings,
                room_manager,
                call_manager,
                credentials,
                worker_pool,
                state_store,
                connections: Arc::new(ConnectionRegistry::new()),
                handler_registry: Arc::new(HandlerRegistry::build()),
                participant_sid_gen: Arc::new(UuidSidGenerator),
                room_media: Arc::new(DashMap::new()),
                room_media_creation_lock: Arc::new(Mutex::new(())),
                call_gc: Arc::new(call_gc),
        })
    }

    pub fn generate_participant_sid(&self) -> String {
        self.participant_sid_gen.generate("PA_")
    }

    /// Returns the room's media adapter, creating a router on a least-loaded
    /// worker the first time a room is reached . Double-checked so
    /// two racing `joinRoom`s on a brand-new room don't create two routers.
    pub async fn get_or_create_room_media(&self, room_sid: &RoomSid) -> anyhow::Result<Arc<dyn MediaEnginePort>> {
        if let Some(existing) = self.room_media.get(room_sid) {
            return Ok(existing.adapter.clone());
        }
        let _guard = self.room_media_creation_lock.lock().await;
        if let Some(existing) = self.room_media.get(room_sid) {
            return Ok(existing.adapter.clone());
        }
        let media = RoomMedia::create(&self.worker_pool, &self.settings.engine, &self.settings.adapter).await?;
        let adapter = media.adapter.clone();
        self.room_media.insert(room_sid.clone(), media);
        Ok(adapter)
    }

    /// Looks up a room's media adapter without creating one.
    pub fn room_media_adapter(&self, room_sid: &RoomSid) -> Option<Arc<dyn MediaEnginePort>> {
        self.room_media.get(room_sid).map(|e| e.adapter.clone())
    }

    /// Tears down a room's media adapter once it empties.
    pub fn close_room_media(&self, room_sid: &RoomSid) {
        if let Some((_, media)) = self.room_media.remove(room_sid) {
            media.close(&self.worker_pool);
        }
    }

    /// Aborts the call-GC background task; stops accepting work but does not
    /// wait for in-flight handlers (the caller drains those separately).
    pub fn shutdown(&self) {
        self.call_gc.abort();
    }
}
