use super::AppState;
use crate::config::RelayConfig;
use crate::models::memory::MemoryStore;
use crate::relay::Relay;
use crate::storage::memory::MemoryObjectStore;
use std::sync::Arc;
use std::time::Duration;

pub const AUDIO_BUCKET: &str = "audio-files";
pub const ADMIN_ROLE: &str = "admin";

pub struct MockedState {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
}

/// A local port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn relay_config(fallback_port: u16) -> RelayConfig {
    RelayConfig {
        connect_timeout: Duration::from_millis(500),
        response_timeout: Duration::from_millis(500),
        linger: Duration::from_millis(10),
        fallback_port,
        ..RelayConfig::default()
    }
}

pub fn mocked_state() -> MockedState {
    mocked_state_with(relay_config(closed_port()))
}

pub fn mocked_state_with(relay: RelayConfig) -> MockedState {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let state = AppState::new(
        store.clone(),
        objects.clone(),
        Relay::new(relay).unwrap(),
        AUDIO_BUCKET,
        ADMIN_ROLE,
    );
    MockedState {
        state,
        store,
        objects,
    }
}
