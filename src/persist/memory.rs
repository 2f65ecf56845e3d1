//! In-memory persistence gateway for tests and single-process embedding
//!
//! Enforces the same write guards as the journal store (pending before
//! terminal, no mutation after a terminal status) without any durability.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use ulid::Ulid;

use super::{PersistResult, PersistenceError, PersistenceGateway};
use crate::alert::Alert;
use crate::capture::StoredRecording;
use crate::contact::Contact;

#[derive(Default)]
struct State {
    alerts: BTreeMap<Ulid, Alert>,
    recordings: BTreeMap<Ulid, StoredRecording>,
    contacts: HashMap<String, BTreeMap<Ulid, Contact>>,
}

/// Volatile gateway with journal-equivalent semantics
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PersistResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::Conflict("store poisoned".to_string()))
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn create_alert(&self, alert: &Alert) -> PersistResult<()> {
        let mut state = self.lock()?;
        if state.alerts.contains_key(&alert.id) {
            return Err(PersistenceError::Conflict(format!(
                "alert already exists: {}",
                alert.id
            )));
        }
        state.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn finalize_alert(&self, alert: &Alert) -> PersistResult<()> {
        let mut state = self.lock()?;
        let existing = state
            .alerts
            .get(&alert.id)
            .ok_or_else(|| PersistenceError::NotFound {
                what: "alert",
                id: alert.id.to_string(),
            })?;

        if existing.status.is_terminal() {
            return Err(PersistenceError::Conflict(format!(
                "alert already finalized: {}",
                alert.id
            )));
        }
        if !alert.status.is_terminal() {
            return Err(PersistenceError::Conflict(
                "finalize requires a terminal status".to_string(),
            ));
        }

        state.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn alert(&self, id: Ulid) -> PersistResult<Option<Alert>> {
        Ok(self.lock()?.alerts.get(&id).cloned())
    }

    async fn alerts_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<Alert>> {
        let state = self.lock()?;
        Ok(state
            .alerts
            .values()
            .rev()
            .filter(|a| a.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save_recording(&self, recording: &StoredRecording) -> PersistResult<()> {
        let mut state = self.lock()?;
        if state.recordings.contains_key(&recording.id) {
            return Err(PersistenceError::Conflict(format!(
                "recording already exists: {}",
                recording.id
            )));
        }
        state.recordings.insert(recording.id, recording.clone());
        Ok(())
    }

    async fn recording(&self, id: Ulid) -> PersistResult<Option<StoredRecording>> {
        Ok(self.lock()?.recordings.get(&id).cloned())
    }

    async fn recordings_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<StoredRecording>> {
        let state = self.lock()?;
        Ok(state
            .recordings
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_recording(&self, user_id: &str, id: Ulid) -> PersistResult<()> {
        let mut state = self.lock()?;
        match state.recordings.get(&id) {
            Some(existing) if existing.user_id == user_id => {
                state.recordings.remove(&id);
                Ok(())
            }
            _ => Err(PersistenceError::NotFound {
                what: "recording",
                id: id.to_string(),
            }),
        }
    }

    async fn contacts_for_user(&self, user_id: &str) -> PersistResult<Vec<Contact>> {
        let state = self.lock()?;
        Ok(state
            .contacts
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> PersistResult<()> {
        let mut state = self.lock()?;
        state
            .contacts
            .entry(user_id.to_string())
            .or_default()
            .insert(contact.id, contact.clone());
        Ok(())
    }

    async fn delete_contact(&self, user_id: &str, id: Ulid) -> PersistResult<()> {
        let mut state = self.lock()?;
        let removed = state
            .contacts
            .get_mut(user_id)
            .and_then(|m| m.remove(&id));
        if removed.is_none() {
            return Err(PersistenceError::NotFound {
                what: "contact",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
