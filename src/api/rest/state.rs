use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::agent::{ConversationState, CredentialFailoverClient};

pub const DEFAULT_SESSION: &str = "default";
const MAX_SESSIONS: usize = 1024;

type SessionHandle = Arc<Mutex<ConversationState>>;

struct SessionSlot {
    handle: SessionHandle,
    last_used: u64,
}

#[derive(Default)]
struct SessionTable {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
}

impl SessionTable {
    /// Drops the least recently used session, preferring ones no request
    /// holds. The default session is never chosen.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .slots
            .iter()
            .filter(|(id, _)| id.as_str() != DEFAULT_SESSION)
            .min_by_key(|(_, slot)| (Arc::strong_count(&slot.handle) > 1, slot.last_used))
            .map(|(id, _)| id.clone());

        match victim {
            Some(id) => {
                info!("Session table full; evicting least recently used session '{}'", id);
                self.slots.remove(&id);
                true
            }
            None => false,
        }
    }
}

/// Shared server state. Planner history is kept per session id; requests in
/// the same session take turns on its lock.
pub struct AppState {
    pub client: CredentialFailoverClient,
    sessions: Mutex<SessionTable>,
    capacity: usize,
}

impl AppState {
    pub fn new(client: CredentialFailoverClient) -> Self {
        Self::with_capacity(client, MAX_SESSIONS)
    }

    pub fn with_capacity(client: CredentialFailoverClient, capacity: usize) -> Self {
        Self {
            client,
            sessions: Mutex::new(SessionTable::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn session(&self, id: &str) -> SessionHandle {
        let mut table = self.sessions.lock().await;
        table.clock += 1;
        let now = table.clock;

        if let Some(slot) = table.slots.get_mut(id) {
            slot.last_used = now;
            return slot.handle.clone();
        }

        while table.slots.len() >= self.capacity {
            if !table.evict_one() {
                break;
            }
        }

        let handle = Arc::new(Mutex::new(ConversationState::new()));
        table.slots.insert(
            id.to_string(),
            SessionSlot {
                handle: handle.clone(),
                last_used: now,
            },
        );
        handle
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.slots.len()
    }
}
