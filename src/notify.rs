// src/notify.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

/// Wire names of the events pushed to connected clients.
pub const EVENT_QUIZ_PUBLISHED: &str = "new_quiz_available";
pub const EVENT_QUIZ_SUBMITTED: &str = "studentQuizSubmitted";

/// Room for a class's students (quiz announcements).
pub fn class_topic(class_id: i64) -> String {
    format!("class:{}", class_id)
}

/// Room for a single teacher (submission notifications).
pub fn teacher_topic(teacher_id: i64) -> String {
    format!("teacher:{}", teacher_id)
}

#[derive(Default)]
struct HubInner {
    next_conn_id: u64,
    /// topic -> (connection id -> outbound channel)
    rooms: HashMap<String, HashMap<u64, UnboundedSender<String>>>,
    /// connection id -> topics it joined, for cleanup on disconnect
    memberships: HashMap<u64, HashSet<String>>,
}

/// Topic-scoped live-connection registry.
///
/// Constructed once at startup and handed to every component that publishes,
/// so there is no global getter that can be reached before initialization.
/// Delivery is at-most-once: events published to an empty room are dropped,
/// and a send failure on a dying connection is logged and ignored. Publishers
/// never wait on subscribers; each connection drains its own unbounded queue.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<Mutex<HubInner>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the registry lock. A poisoned lock still holds structurally
    /// valid maps, so the guard is recovered instead of propagating the
    /// panic into request handlers.
    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Allocates an id for a new connection. The connection holds no rooms
    /// until it joins one.
    pub fn register(&self) -> u64 {
        let mut inner = self.lock();
        inner.next_conn_id += 1;
        inner.next_conn_id
    }

    /// Joins `conn_id` to `topic`. A connection may belong to many topics;
    /// re-joining the same topic just replaces the stored sender.
    pub fn subscribe(&self, conn_id: u64, topic: &str, tx: UnboundedSender<String>) {
        let mut inner = self.lock();
        inner
            .rooms
            .entry(topic.to_string())
            .or_default()
            .insert(conn_id, tx);
        inner
            .memberships
            .entry(conn_id)
            .or_default()
            .insert(topic.to_string());
    }

    /// Removes `conn_id` from every topic it joined. Called on disconnect.
    pub fn unsubscribe(&self, conn_id: u64) {
        let mut inner = self.lock();
        if let Some(topics) = inner.memberships.remove(&conn_id) {
            for topic in topics {
                if let Some(room) = inner.rooms.get_mut(&topic) {
                    room.remove(&conn_id);
                    if room.is_empty() {
                        inner.rooms.remove(&topic);
                    }
                }
            }
        }
    }

    /// Delivers `{event, data}` to every connection currently joined to
    /// `topic`. Returns the number of connections the frame was queued for.
    pub fn publish(&self, topic: &str, event: &str, data: serde_json::Value) -> usize {
        let frame = serde_json::json!({ "event": event, "data": data }).to_string();

        let inner = self.lock();
        let Some(room) = inner.rooms.get(topic) else {
            tracing::debug!("No subscribers in room {}, dropping {}", topic, event);
            return 0;
        };

        let mut delivered = 0;
        for (conn_id, tx) in room {
            if tx.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                // Connection is going away; cleanup happens on its disconnect.
                tracing::debug!("Dropping {} for stale connection {}", event, conn_id);
            }
        }
        delivered
    }
}
