use crate::config::Config;
use crate::types::activity::{Activity, Slot};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    sessions: Arc<DashMap<String, Session>>,
}

/// The two activities a user is comparing. Slots are loaded and cleared
/// independently.
#[derive(Debug, Clone, Default)]
pub struct SessionSlots {
    pub a: Option<Activity>,
    pub b: Option<Activity>,
}

impl SessionSlots {
    pub fn get(&self, slot: Slot) -> Option<&Activity> {
        match slot {
            Slot::A => self.a.as_ref(),
            Slot::B => self.b.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Activity> {
        match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }
}

struct Session {
    slots: SessionSlots,
    touched_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions.insert(
            session_id.clone(),
            Session {
                slots: SessionSlots::default(),
                touched_at: Instant::now(),
            },
        );
        session_id
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Stores `activity` in `slot`, or clears the slot when `None`.
    /// Returns false when the session does not exist.
    pub fn set_slot(&self, session_id: &str, slot: Slot, activity: Option<Activity>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                *session.slots.slot_mut(slot) = activity;
                session.touched_at = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn slots(&self, session_id: &str) -> Option<SessionSlots> {
        self.sessions.get_mut(session_id).map(|mut session| {
            session.touched_at = Instant::now();
            session.slots.clone()
        })
    }

    pub fn evict_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.sessions.retain(|_, session| {
            now.duration_since(session.touched_at) < ttl
        });
        tracing::info!("Session eviction complete. Current size: {}", self.session_count());
    }
}
