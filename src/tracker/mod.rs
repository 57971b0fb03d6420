//!  The tracker state is organized through [Tracker].
//!  The basic idea is:
//!   - [store::RecordStore] owns the subjects and the profile in memory.
//!   - The state is loaded once from a [storage::StateStorage] and saved after every mutation.
//!   - The in-memory state stays authoritative when a save fails. The failure is reported and the
//!     next mutation or [Tracker::flush] tries again.

pub mod entities;
pub mod storage;
pub mod store;

use std::collections::HashSet;

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use entities::{Profile, SubjectDraft, SubjectId, SubjectRecord, SubjectUpdate};
use storage::StateStorage;
use store::{RecordStore, StoreError};

pub const SUBJECTS_KEY: &str = "subjects";
pub const PROFILE_KEY: &str = "profile";
pub const SEQUENCE_KEY: &str = "sequence";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The change was applied in memory but couldn't be persisted.
    #[error("change was not saved: {0:#}")]
    Storage(anyhow::Error),
}

pub struct Tracker<S: StateStorage> {
    store: RecordStore,
    storage: S,
    dirty: bool,
}

impl<S: StateStorage> Tracker<S> {
    /// Reads the whole state from `storage`. Keys that were never written fall back to defaults,
    /// keys with unexpected contents are an error so they don't get overwritten by accident.
    pub async fn load(storage: S) -> anyhow::Result<Self> {
        let subjects: Vec<SubjectRecord> = load_key(&storage, SUBJECTS_KEY).await?.unwrap_or_default();
        let profile: Profile = load_key(&storage, PROFILE_KEY).await?.unwrap_or_default();
        let sequence: u64 = load_key(&storage, SEQUENCE_KEY).await?.unwrap_or(1);

        if let Some(broken) = subjects.iter().find(|s| s.present > s.total) {
            anyhow::bail!(
                "Stored subject {} has more attended classes ({}) than total classes ({})",
                broken.id,
                broken.present,
                broken.total
            );
        }
        let mut seen = HashSet::new();
        if let Some(clash) = subjects.iter().find(|s| !seen.insert(s.id)) {
            anyhow::bail!("Stored subject id {} is used more than once", clash.id);
        }
        if let Some(reserved) = subjects.iter().find(|s| s.id.0 == u64::MAX) {
            anyhow::bail!("Stored subject id {} is out of range", reserved.id);
        }
        if profile.min_attendance > 100 {
            anyhow::bail!(
                "Stored minimum attendance {} is above 100",
                profile.min_attendance
            );
        }

        info!("Loaded {} subjects", subjects.len());
        Ok(Self {
            store: RecordStore::from_parts(subjects, profile, sequence),
            storage,
            dirty: false,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn subjects(&self) -> &[SubjectRecord] {
        self.store.subjects()
    }

    pub fn profile(&self) -> Profile {
        self.store.profile()
    }

    /// Whether the in-memory state has changes that failed to persist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub async fn add(&mut self, draft: SubjectDraft) -> Result<SubjectId, TrackerError> {
        let id = self.store.add(draft)?;
        self.persist().await?;
        Ok(id)
    }

    pub async fn bulk_add(
        &mut self,
        drafts: Vec<SubjectDraft>,
    ) -> Result<Vec<SubjectId>, TrackerError> {
        let ids = self.store.bulk_add(drafts)?;
        self.persist().await?;
        Ok(ids)
    }

    pub async fn update(
        &mut self,
        id: SubjectId,
        update: &SubjectUpdate,
    ) -> Result<(), TrackerError> {
        self.store.update(id, update)?;
        self.persist().await
    }

    pub async fn delete(&mut self, id: SubjectId) -> Result<SubjectRecord, TrackerError> {
        let removed = self.store.delete(id)?;
        self.persist().await?;
        Ok(removed)
    }

    /// Returns `false` without saving anything when the subject doesn't exist.
    pub async fn mark_present(&mut self, id: SubjectId) -> Result<bool, TrackerError> {
        if !self.store.mark_present(id) {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    /// Returns `false` without saving anything when the subject doesn't exist.
    pub async fn mark_absent(&mut self, id: SubjectId) -> Result<bool, TrackerError> {
        if !self.store.mark_absent(id) {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    pub async fn set_min_attendance(&mut self, min_attendance: i64) -> Result<(), TrackerError> {
        self.store.set_min_attendance(min_attendance)?;
        self.persist().await
    }

    pub async fn reset_all(&mut self) -> Result<(), TrackerError> {
        self.store.reset_all();
        self.persist().await
    }

    /// Retries persisting changes that failed to save earlier.
    pub async fn flush(&mut self) -> Result<(), TrackerError> {
        if self.dirty {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&mut self) -> Result<(), TrackerError> {
        self.dirty = true;
        match self.save_all().await {
            Ok(()) => {
                self.dirty = false;
                debug!("Saved tracker state");
                Ok(())
            }
            Err(e) => {
                error!("Failed to save tracker state {e:?}");
                Err(TrackerError::Storage(e))
            }
        }
    }

    async fn save_all(&self) -> anyhow::Result<()> {
        save_key(&self.storage, SUBJECTS_KEY, self.store.subjects()).await?;
        save_key(&self.storage, PROFILE_KEY, &self.store.profile()).await?;
        save_key(&self.storage, SEQUENCE_KEY, &self.store.next_id()).await?;
        Ok(())
    }
}

async fn load_key<T: DeserializeOwned>(
    storage: &impl StateStorage,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(value) = storage.load(key).await? else {
        return Ok(None);
    };
    let value = serde_json::from_value(value)
        .with_context(|| format!("Stored {key} has an unexpected format"))?;
    Ok(Some(value))
}

async fn save_key<T: Serialize + ?Sized>(
    storage: &impl StateStorage,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let value: Value = serde_json::to_value(value)?;
    storage.save(key, &value).await
}
