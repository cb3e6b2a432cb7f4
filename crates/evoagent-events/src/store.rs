//! Conversation Event Store.
//!
//! Persists per-thread event logs under `state_root/<thread_id>.json`.
//! Each thread's events are kept in insertion order with a strictly
//! increasing, dense, 1-indexed `position` — the Agent Turn Engine relies
//! on this to reconstruct a deterministic view of history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use evoagent_domain::error::{Error, Result};
use evoagent_domain::trace::TraceEvent;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::event::ConversationEvent;

/// A thread's durable event log plus its next-position counter.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct ThreadLog {
    events: Vec<ConversationEvent>,
    #[serde(default)]
    next_position: u64,
}

pub struct EventStore {
    state_root: PathBuf,
    threads: RwLock<HashMap<Uuid, ThreadLog>>,
}

impl EventStore {
    /// Load or create the event store rooted at `state_root`. Existing
    /// `<thread_id>.json` files are read back lazily on first access
    /// rather than eagerly at startup, since a deployment may have
    /// accumulated many threads.
    pub fn new(state_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_root).map_err(Error::Io)?;
        Ok(Self {
            state_root: state_root.to_path_buf(),
            threads: RwLock::new(HashMap::new()),
        })
    }

    fn thread_path(&self, thread_id: Uuid) -> PathBuf {
        self.state_root.join(format!("{thread_id}.json"))
    }

    fn load_from_disk(&self, thread_id: Uuid) -> ThreadLog {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return ThreadLog::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => ThreadLog::default(),
        }
    }

    /// Create a brand-new thread, failing if one with this id already exists.
    pub fn create_thread(&self, thread_id: Uuid) -> Result<()> {
        let mut threads = self.threads.write();
        if threads.contains_key(&thread_id) || self.thread_path(thread_id).exists() {
            return Err(Error::EventStore(format!(
                "thread {thread_id} already exists"
            )));
        }
        threads.insert(thread_id, ThreadLog::default());
        TraceEvent::ThreadResolved {
            thread_id: thread_id.to_string(),
            is_new: true,
        }
        .emit();
        Ok(())
    }

    /// Resolve a thread, creating it on first reference. Returns whether
    /// the thread was newly created.
    pub fn ensure_thread(&self, thread_id: Uuid) -> bool {
        {
            let threads = self.threads.read();
            if threads.contains_key(&thread_id) {
                return false;
            }
        }
        let mut threads = self.threads.write();
        if threads.contains_key(&thread_id) {
            return false;
        }
        let is_new = !self.thread_path(thread_id).exists();
        let log = if is_new {
            ThreadLog::default()
        } else {
            self.load_from_disk(thread_id)
        };
        threads.insert(thread_id, log);
        TraceEvent::ThreadResolved { thread_id: thread_id.to_string(), is_new }.emit();
        is_new
    }

    /// Append an event to a thread, assigning it the next dense position.
    /// `event.position` and `event.created_at` are overwritten; callers
    /// only need to fill in role/kind/content/correlation fields.
    pub fn append_event(&self, mut event: ConversationEvent) -> Result<ConversationEvent> {
        self.ensure_thread(event.thread_id);
        let mut threads = self.threads.write();
        let log = threads
            .get_mut(&event.thread_id)
            .expect("ensure_thread just inserted this entry");

        log.next_position += 1;
        event.position = log.next_position;
        event.created_at = Utc::now();
        log.events.push(event.clone());

        TraceEvent::EventAppended {
            thread_id: event.thread_id.to_string(),
            position: event.position,
            kind: format!("{:?}", event.kind).to_lowercase(),
        }
        .emit();

        let json = serde_json::to_string_pretty(&*log)
            .map_err(|e| Error::EventStore(format!("serializing thread log: {e}")))?;
        std::fs::write(self.thread_path(event.thread_id), json).map_err(Error::Io)?;

        Ok(event)
    }

    /// Return the canonical, position-ordered event log for a thread.
    /// An unknown thread yields an empty vec rather than an error, since
    /// a fresh thread has no events until the first turn completes.
    pub fn get_canonical_events(&self, thread_id: Uuid) -> Vec<ConversationEvent> {
        self.ensure_thread(thread_id);
        let threads = self.threads.read();
        threads
            .get(&thread_id)
            .map(|log| log.events.clone())
            .unwrap_or_default()
    }

    /// List every thread id currently known to the store (in-memory only;
    /// does not scan `state_root` for threads never touched this process).
    pub fn known_threads(&self) -> Vec<Uuid> {
        self.threads.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventRole};
    use serde_json::json;

    fn mk_event(thread_id: Uuid, role: EventRole, kind: EventKind) -> ConversationEvent {
        ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role,
            kind,
            position: 0,
            content: json!({"text": "hi"}),
            tool_call_id: None,
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn positions_are_dense_and_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let e1 = store
            .append_event(mk_event(thread_id, EventRole::User, EventKind::Text))
            .unwrap();
        let e2 = store
            .append_event(mk_event(thread_id, EventRole::Assistant, EventKind::Text))
            .unwrap();

        assert_eq!(e1.position, 1);
        assert_eq!(e2.position, 2);
        assert_eq!(store.get_canonical_events(thread_id).len(), 2);
    }

    #[test]
    fn unknown_thread_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        assert!(store.get_canonical_events(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn create_thread_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();
        store.create_thread(thread_id).unwrap();
        assert!(store.create_thread(thread_id).is_err());
    }

    #[test]
    fn survives_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let thread_id = Uuid::new_v4();
        {
            let store = EventStore::new(dir.path()).unwrap();
            store
                .append_event(mk_event(thread_id, EventRole::User, EventKind::Text))
                .unwrap();
        }
        let store = EventStore::new(dir.path()).unwrap();
        assert_eq!(store.get_canonical_events(thread_id).len(), 1);
    }
}
