use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sdlc_core::{Event, SessionId};

use crate::error::StorageError;
use crate::projection::Projection;

/// Append-only log of session events plus a latest-wins projection
/// (spec.md §4.1). `append` is idempotent on `(session_id, timestamp_ms)`:
/// re-delivering the same event slot overwrites rather than duplicates,
/// which is what makes at-least-once retry of a worker's own appends safe.
pub struct SessionStore {
    inner: Mutex<Inner>,
    persist_dir: Option<PathBuf>,
}

struct Inner {
    events: BTreeMap<String, BTreeMap<u64, Event>>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self { inner: Mutex::new(Inner { events: BTreeMap::new() }), persist_dir: None }
    }

    /// A store that additionally flushes each session's event log to a
    /// JSON file under `dir`, one file per session, written atomically
    /// (write to a temp file, then rename) so a crash mid-write never
    /// leaves a corrupt log behind.
    pub fn with_persistence(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { inner: Mutex::new(Inner { events: BTreeMap::new() }), persist_dir: Some(dir) })
    }

    pub fn append(&self, event: Event) -> Result<(), StorageError> {
        let key = event.session_id.as_str().to_string();
        let timestamp = event.timestamp_ms;
        {
            let mut inner = self.inner.lock();
            inner.events.entry(key.clone()).or_default().insert(timestamp, event);
        }
        self.flush(&key)
    }

    pub fn project(&self, session_id: &SessionId) -> Result<Projection, StorageError> {
        let inner = self.inner.lock();
        let events = inner.events.get(session_id.as_str()).ok_or_else(|| StorageError::NotFound {
            session_id: session_id.as_str().to_string(),
        })?;
        let mut projection = Projection::seed(session_id.clone());
        for (timestamp, event) in events {
            projection.apply(*timestamp, &event.kind);
        }
        Ok(projection)
    }

    /// Lists sessions currently in `phase`, most-recently-updated first.
    /// Backs the secondary index described in spec.md §4.1/§6.
    pub fn list_by_phase(&self, phase: &str) -> Vec<Projection> {
        let mut out = self.all_projections();
        out.retain(|projection| projection.phase == phase);
        out
    }

    /// Lists every known session, most-recently-updated first. Backs the
    /// list endpoint when no phase filter is given (spec.md §6).
    pub fn list_all(&self) -> Vec<Projection> {
        self.all_projections()
    }

    fn all_projections(&self) -> Vec<Projection> {
        let inner = self.inner.lock();
        let mut out: Vec<Projection> = inner
            .events
            .keys()
            .filter_map(|key| {
                let session_id: SessionId = key.parse().ok()?;
                let events = inner.events.get(key)?;
                let mut projection = Projection::seed(session_id);
                for (timestamp, event) in events {
                    projection.apply(*timestamp, &event.kind);
                }
                Some(projection)
            })
            .collect();
        out.sort_by(|a, b| b.last_updated_ms.cmp(&a.last_updated_ms));
        out
    }

    fn flush(&self, session_key: &str) -> Result<(), StorageError> {
        let Some(dir) = &self.persist_dir else { return Ok(()) };
        let inner = self.inner.lock();
        let Some(events) = inner.events.get(session_key) else { return Ok(()) };
        let serialized: Vec<&Event> = events.values().collect();
        let bytes = serde_json::to_vec_pretty(&serialized)?;
        atomic_write(&dir.join(format!("{session_key}.json")), &bytes)?;
        Ok(())
    }

    /// Reloads every session log under the persistence directory. Used at
    /// supervisor start-up to recover in-flight sessions after a restart.
    pub fn load_from_disk(&self) -> Result<(), StorageError> {
        let Some(dir) = &self.persist_dir else { return Ok(()) };
        let mut inner = self.inner.lock();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let events: Vec<Event> = serde_json::from_slice(&bytes)?;
            let Some(first) = events.first() else { continue };
            let key = first.session_id.as_str().to_string();
            let slot = inner.events.entry(key).or_default();
            for event in events {
                slot.insert(event.timestamp_ms, event);
            }
        }
        Ok(())
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use sdlc_core::{EventKind, SessionKind};

    use super::*;

    fn created(session_id: &SessionId, t: u64) -> Event {
        Event::new(
            session_id.clone(),
            t,
            EventKind::SessionCreated {
                repo_url: "https://example.com/repo".into(),
                branch: "main".into(),
                sub_path: None,
            },
        )
    }

    #[test]
    fn project_returns_not_found_distinct_from_empty_state() {
        let store = SessionStore::in_memory();
        let id = SessionId::new(SessionKind::Deploy);
        assert!(matches!(store.project(&id), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn last_writer_wins_on_common_fields() {
        let store = SessionStore::in_memory();
        let id = SessionId::new(SessionKind::Deploy);
        store.append(created(&id, 1)).unwrap();
        store
            .append(Event::new(id.clone(), 2, EventKind::PhaseChanged { phase: "cloning".into() }))
            .unwrap();
        store
            .append(Event::new(id.clone(), 3, EventKind::PhaseChanged { phase: "detecting".into() }))
            .unwrap();
        let projection = store.project(&id).unwrap();
        assert_eq!(projection.phase, "detecting");
        assert_eq!(projection.last_updated_ms, 3);
    }

    #[test]
    fn append_is_idempotent_on_session_and_timestamp() {
        let store = SessionStore::in_memory();
        let id = SessionId::new(SessionKind::Deploy);
        store.append(created(&id, 1)).unwrap();
        store.append(created(&id, 1)).unwrap();
        let projection = store.project(&id).unwrap();
        assert_eq!(projection.log.len(), 0);
        assert_eq!(projection.repo_url, "https://example.com/repo");
    }

    #[test]
    fn log_lines_concatenate_in_timestamp_order() {
        let store = SessionStore::in_memory();
        let id = SessionId::new(SessionKind::Deploy);
        store.append(created(&id, 1)).unwrap();
        store.append(Event::new(id.clone(), 3, EventKind::Log { line: "second".into() })).unwrap();
        store.append(Event::new(id.clone(), 2, EventKind::Log { line: "first".into() })).unwrap();
        let projection = store.project(&id).unwrap();
        assert_eq!(projection.log, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn list_all_returns_every_session_most_recent_first() {
        let store = SessionStore::in_memory();
        let older = SessionId::new(SessionKind::Deploy);
        let newer = SessionId::new(SessionKind::Verify);
        store.append(created(&older, 1)).unwrap();
        store.append(created(&newer, 2)).unwrap();
        let sessions = store.list_all();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, newer);
        assert_eq!(sessions[1].session_id, older);
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new(SessionKind::Deploy);
        {
            let store = SessionStore::with_persistence(dir.path()).unwrap();
            store.append(created(&id, 1)).unwrap();
        }
        let reloaded = SessionStore::with_persistence(dir.path()).unwrap();
        reloaded.load_from_disk().unwrap();
        let projection = reloaded.project(&id).unwrap();
        assert_eq!(projection.branch, "main");
    }
}
