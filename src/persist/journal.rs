//! Append-only JSON Lines journal, the store of record
//!
//! Every write serializes one tagged record, appends it with a trailing
//! newline, flushes, and fsyncs before the in-memory index is updated or the
//! call returns. Opening a journal replays it line by line to rebuild the
//! index; a torn final line (crash mid-append) is repaired, anything else
//! malformed is surfaced as corruption.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use ulid::Ulid;

use super::{PersistResult, PersistenceError, PersistenceGateway};
use crate::alert::Alert;
use crate::capture::StoredRecording;
use crate::contact::Contact;

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalRecord {
    AlertCreated { alert: Alert },
    AlertFinalized { alert: Alert },
    RecordingSaved { recording: StoredRecording },
    RecordingDeleted { user_id: String, id: Ulid },
    ContactUpserted { user_id: String, contact: Contact },
    ContactDeleted { user_id: String, id: Ulid },
}

#[derive(Default)]
#[derive(Debug)]
struct Index {
    alerts: BTreeMap<Ulid, Alert>,
    recordings: BTreeMap<Ulid, StoredRecording>,
    contacts: HashMap<String, BTreeMap<Ulid, Contact>>,
}

impl Index {
    /// Validate a record against the write guards without mutating
    fn check(&self, record: &JournalRecord) -> PersistResult<()> {
        match record {
            JournalRecord::AlertCreated { alert } => {
                if self.alerts.contains_key(&alert.id) {
                    return Err(PersistenceError::Conflict(format!(
                        "alert already exists: {}",
                        alert.id
                    )));
                }
            }
            JournalRecord::AlertFinalized { alert } => {
                let existing =
                    self.alerts
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
            }
            JournalRecord::RecordingSaved { recording } => {
                if self.recordings.contains_key(&recording.id) {
                    return Err(PersistenceError::Conflict(format!(
                        "recording already exists: {}",
                        recording.id
                    )));
                }
            }
            JournalRecord::RecordingDeleted { user_id, id } => match self.recordings.get(id) {
                Some(existing) if existing.user_id == *user_id => {}
                _ => {
                    return Err(PersistenceError::NotFound {
                        what: "recording",
                        id: id.to_string(),
                    })
                }
            },
            JournalRecord::ContactUpserted { .. } => {}
            JournalRecord::ContactDeleted { user_id, id } => {
                let present = self
                    .contacts
                    .get(user_id)
                    .is_some_and(|m| m.contains_key(id));
                if !present {
                    return Err(PersistenceError::NotFound {
                        what: "contact",
                        id: id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply one record, enforcing the write guards
    ///
    /// Replay goes through the same path, so a journal that violates the
    /// guards is reported as corrupt rather than silently accepted.
    fn apply(&mut self, record: &JournalRecord) -> PersistResult<()> {
        self.check(record)?;
        match record {
            JournalRecord::AlertCreated { alert } | JournalRecord::AlertFinalized { alert } => {
                self.alerts.insert(alert.id, alert.clone());
            }
            JournalRecord::RecordingSaved { recording } => {
                self.recordings.insert(recording.id, recording.clone());
            }
            JournalRecord::RecordingDeleted { id, .. } => {
                self.recordings.remove(id);
            }
            JournalRecord::ContactUpserted { user_id, contact } => {
                self.contacts
                    .entry(user_id.clone())
                    .or_default()
                    .insert(contact.id, contact.clone());
            }
            JournalRecord::ContactDeleted { user_id, id } => {
                if let Some(contacts) = self.contacts.get_mut(user_id) {
                    contacts.remove(id);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Inner {
    writer: BufWriter<File>,
    index: Index,
}

/// Durable persistence gateway backed by one journal file
#[derive(Debug)]
pub struct JournalStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JournalStore {
    /// Open (or create) a journal, replaying its contents into the index
    pub fn open(path: impl Into<PathBuf>) -> PersistResult<Self> {
        let path = path.into();
        let mut index = Index::default();
        let mut valid_len: u64 = 0;
        let mut needs_newline = false;

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let mut line_no = 0usize;

            for segment in contents.split_inclusive('\n') {
                line_no += 1;
                let complete = segment.ends_with('\n');
                let line = segment.trim_end_matches('\n');
                if line.trim().is_empty() {
                    valid_len += segment.len() as u64;
                    continue;
                }

                match serde_json::from_str::<JournalRecord>(line) {
                    Ok(record) => {
                        index
                            .apply(&record)
                            .map_err(|e| PersistenceError::Corrupt {
                                line: line_no,
                                message: e.to_string(),
                            })?;
                        valid_len += segment.len() as u64;
                        // Complete record that lost its newline: terminate it
                        // before anything else is appended
                        needs_newline = !complete;
                    }
                    Err(e) if !complete => {
                        // Crash mid-append: drop the torn tail and continue
                        warn!(line = line_no, error = %e, "discarding torn journal tail");
                        break;
                    }
                    Err(e) => {
                        return Err(PersistenceError::Corrupt {
                            line: line_no,
                            message: e.to_string(),
                        });
                    }
                }
            }

            debug!(
                path = %path.display(),
                alerts = index.alerts.len(),
                recordings = index.recordings.len(),
                "journal replayed"
            );
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.set_len(valid_len)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                index,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> PersistResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PersistenceError::Conflict("journal poisoned".to_string()))
    }

    /// Validate against the index, append durably, then apply
    fn commit(&self, record: JournalRecord) -> PersistResult<()> {
        let mut inner = self.lock()?;
        inner.index.check(&record)?;

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;

        inner.index.apply(&record)
    }
}

#[async_trait]
impl PersistenceGateway for JournalStore {
    async fn create_alert(&self, alert: &Alert) -> PersistResult<()> {
        self.commit(JournalRecord::AlertCreated {
            alert: alert.clone(),
        })
    }

    async fn finalize_alert(&self, alert: &Alert) -> PersistResult<()> {
        self.commit(JournalRecord::AlertFinalized {
            alert: alert.clone(),
        })
    }

    async fn alert(&self, id: Ulid) -> PersistResult<Option<Alert>> {
        Ok(self.lock()?.index.alerts.get(&id).cloned())
    }

    async fn alerts_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<Alert>> {
        let inner = self.lock()?;
        Ok(inner
            .index
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
        self.commit(JournalRecord::RecordingSaved {
            recording: recording.clone(),
        })
    }

    async fn recording(&self, id: Ulid) -> PersistResult<Option<StoredRecording>> {
        Ok(self.lock()?.index.recordings.get(&id).cloned())
    }

    async fn recordings_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> PersistResult<Vec<StoredRecording>> {
        let inner = self.lock()?;
        Ok(inner
            .index
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
        self.commit(JournalRecord::RecordingDeleted {
            user_id: user_id.to_string(),
            id,
        })
    }

    async fn contacts_for_user(&self, user_id: &str) -> PersistResult<Vec<Contact>> {
        let inner = self.lock()?;
        Ok(inner
            .index
            .contacts
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> PersistResult<()> {
        self.commit(JournalRecord::ContactUpserted {
            user_id: user_id.to_string(),
            contact: contact.clone(),
        })
    }

    async fn delete_contact(&self, user_id: &str, id: Ulid) -> PersistResult<()> {
        self.commit(JournalRecord::ContactDeleted {
            user_id: user_id.to_string(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertStatus;
    use crate::location::Location;
    use chrono::Utc;
    use std::io::Write as _;

    fn pending_alert(user: &str) -> Alert {
        Alert::pending(
            user,
            Location::Unavailable {
                reason: "n/a".to_string(),
                captured_at: Utc::now(),
            },
            "help",
        )
    }

    #[tokio::test]
    async fn test_replay_reconstructs_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        let mut alert = pending_alert("u1");
        let contact = Contact::new("A").with_email("a@x.com");

        {
            let store = JournalStore::open(&path).unwrap();
            store.create_alert(&alert).await.unwrap();
            alert.status = AlertStatus::Sent;
            store.finalize_alert(&alert).await.unwrap();
            store.upsert_contact("u1", &contact).await.unwrap();
        }

        let reopened = JournalStore::open(&path).unwrap();
        let replayed = reopened.alert(alert.id).await.unwrap().unwrap();
        assert_eq!(replayed.status, AlertStatus::Sent);
        assert_eq!(reopened.contacts_for_user("u1").await.unwrap(), vec![contact]);
    }

    #[tokio::test]
    async fn test_crash_before_finalize_leaves_pending_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        let alert = pending_alert("u1");
        {
            let store = JournalStore::open(&path).unwrap();
            store.create_alert(&alert).await.unwrap();
            // Process dies before dispatch completes
        }

        let reopened = JournalStore::open(&path).unwrap();
        let alerts = reopened.alerts_for_user("u1", 10, 0).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].status, AlertStatus::Pending);
    }

    #[tokio::test]
    async fn test_torn_tail_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        let alert = pending_alert("u1");
        {
            let store = JournalStore::open(&path).unwrap();
            store.create_alert(&alert).await.unwrap();
        }

        // Simulate a crash mid-append: partial record, no trailing newline
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"type\":\"alert_cre").unwrap();
        }

        let reopened = JournalStore::open(&path).unwrap();
        assert!(reopened.alert(alert.id).await.unwrap().is_some());

        // The repaired journal accepts further writes and replays cleanly
        let second = pending_alert("u1");
        reopened.create_alert(&second).await.unwrap();
        drop(reopened);

        let third = JournalStore::open(&path).unwrap();
        assert_eq!(third.alerts_for_user("u1", 10, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_interior_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "not json at all").unwrap();
            writeln!(file, "{{}}").unwrap();
        }

        let err = JournalStore::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected_without_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        let store = JournalStore::open(&path).unwrap();
        let alert = pending_alert("u1");
        store.create_alert(&alert).await.unwrap();

        let before = std::fs::metadata(&path).unwrap().len();
        assert!(store.create_alert(&alert).await.is_err());
        let after = std::fs::metadata(&path).unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_recording_save_and_delete_survive_replay() {
        use crate::storage::StorageLocation;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.journal");

        let recording = StoredRecording {
            id: Ulid::new(),
            user_id: "u1".to_string(),
            location: StorageLocation {
                backend: "local".to_string(),
                uri: "/tmp/x.webm".to_string(),
            },
            duration_seconds: 2.5,
            size_bytes: 1024,
            encrypted: false,
            key_ref: None,
            created_at: Utc::now(),
        };

        {
            let store = JournalStore::open(&path).unwrap();
            store.save_recording(&recording).await.unwrap();
        }
        {
            let store = JournalStore::open(&path).unwrap();
            assert!(store.recording(recording.id).await.unwrap().is_some());
            store.delete_recording("u1", recording.id).await.unwrap();
        }

        let store = JournalStore::open(&path).unwrap();
        assert!(store.recording(recording.id).await.unwrap().is_none());
    }
}
