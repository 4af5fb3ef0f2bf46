use std::net::SocketAddr;

use serde_json::Value;
use sfunet_api::{build_router, state::AppState};
use sfunet_config::Settings;
use sfunet_services::auth::Grants;
use tokio::net::TcpListener;

/// A running `sfunet-api` instance bound to a random port, the WebSocket
/// counterpart of the teacher's HTTP-only `TestApp` (worked
/// scenarios, driven over `/ws` instead of REST). Requires mediasoup's
/// worker binary to be available on `PATH` — there is no database to swap
/// out for an in-memory fake the way the teacher's MongoDB dependency can
/// be, since the media engine itself is the thing under test.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
    state: AppState,
}

impl TestApp {
    /// Spawns a server with two workers and the in-memory state store
    /// (Redis-backed store is exercised separately by
    /// `sfunet-services`' own `redis_store` tests against a real Redis).
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns a server after letting the caller tweak `Settings` away from
    /// the test defaults (e.g. to turn on the Redis-backed state store
    /// against a test instance, or to shrink `q_max` to exercise the
    /// slow-consumer eviction path).
    pub async fn spawn_with(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);

        let state = AppState::new(settings.clone())
        .await
        .expect("failed to initialize AppState (is the mediasoup worker binary on PATH?)");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind to a random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
        });

        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        Self {
            addr,
            base_url,
            settings,
            client,
            state,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Mints a bearer credential via the wire-level `/api/token` route
    /// (credential validator, fed by the out-of-scope issuance
    /// endpoint adds for self-contained deployments).
    pub async fn issue_token(&self, identity: &str, room: Option<&str>, grants: Grants) -> String {
        let resp = self
        .client
        .post(self.url("/api/token"))
        .json(&serde_json::json!({
                    "identity": identity,
                    "room": room,
                    "grants": grants,
        }))
        .send()
        .await
        .expect("token request failed");
        assert_eq!(resp.status().as_u16(), 200, "token issuance should succeed");
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Every grant set so tests don't have to spell out the full struct for
    /// the common "can do everything" participant.
    pub fn full_grants() -> Grants {
        Grants {
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.state.shutdown();
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::load().expect("settings should load from defaults alone");
    settings.engine.num_workers = 1;
    settings.state_store.enabled = false;
    settings.credentials.api_secret = "test-secret".into();
    settings.credentials.expires_in = 3600;
    settings
}
