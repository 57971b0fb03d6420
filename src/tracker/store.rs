use thiserror::Error;
use tracing::{debug, info};

use super::entities::{
    Profile, SubjectDraft, SubjectId, SubjectRecord, SubjectUpdate, ValidationError,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no subject with id {0}")]
    UnknownSubject(SubjectId),
    #[error("no subject ids are left")]
    IdsExhausted,
}

/// In-memory owner of the subjects and the profile. All mutation goes through here, and every
/// operation either fully applies or leaves the state as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    subjects: Vec<SubjectRecord>,
    profile: Profile,
    next_id: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self {
            subjects: Vec::new(),
            profile: Profile::default(),
            next_id: 1,
        }
    }
}

impl RecordStore {
    /// Restores a store from persisted parts. The sequence is moved past every existing id, so a
    /// stale or missing sequence can't hand out an id twice.
    pub fn from_parts(subjects: Vec<SubjectRecord>, profile: Profile, next_id: u64) -> Self {
        let after_existing = subjects
            .iter()
            .map(|s| s.id.0.saturating_add(1))
            .max()
            .unwrap_or(1);
        Self {
            subjects,
            profile,
            next_id: next_id.max(after_existing),
        }
    }

    pub fn subjects(&self) -> &[SubjectRecord] {
        &self.subjects
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Id the next created subject will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: SubjectId) -> Option<&SubjectRecord> {
        self.subjects.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SubjectId) -> Option<&mut SubjectRecord> {
        self.subjects.iter_mut().find(|s| s.id == id)
    }

    /// Checks that `count` more ids can be handed out. `u64::MAX` itself is never used as an id.
    fn reserve_ids(&self, count: usize) -> Result<(), StoreError> {
        u64::try_from(count)
            .ok()
            .and_then(|count| self.next_id.checked_add(count))
            .map(|_| ())
            .ok_or(StoreError::IdsExhausted)
    }

    /// Must be preceded by a successful [Self::reserve_ids].
    fn allocate_id(&mut self) -> SubjectId {
        let id = SubjectId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub fn add(&mut self, draft: SubjectDraft) -> Result<SubjectId, StoreError> {
        let draft = draft.validate()?;
        self.reserve_ids(1)?;
        let id = self.allocate_id();
        info!("Adding subject {id} ({})", draft.code);
        self.subjects.push(draft.into_record(id));
        Ok(id)
    }

    /// Adds every draft or none of them. Ids are assigned in input order.
    pub fn bulk_add(
        &mut self,
        drafts: impl IntoIterator<Item = SubjectDraft>,
    ) -> Result<Vec<SubjectId>, StoreError> {
        let drafts = drafts
            .into_iter()
            .map(SubjectDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        self.reserve_ids(drafts.len())?;

        let ids = drafts
            .into_iter()
            .map(|draft| {
                let id = self.allocate_id();
                self.subjects.push(draft.into_record(id));
                id
            })
            .collect::<Vec<_>>();
        info!("Added {} subjects in bulk", ids.len());
        Ok(ids)
    }

    pub fn update(&mut self, id: SubjectId, update: &SubjectUpdate) -> Result<(), StoreError> {
        let record = self.get_mut(id).ok_or(StoreError::UnknownSubject(id))?;
        *record = update.apply_to(record)?;
        info!("Updated subject {id}");
        Ok(())
    }

    pub fn delete(&mut self, id: SubjectId) -> Result<SubjectRecord, StoreError> {
        let index = self
            .subjects
            .iter()
            .position(|s| s.id == id)
            .ok_or(StoreError::UnknownSubject(id))?;
        info!("Deleting subject {id}");
        Ok(self.subjects.remove(index))
    }

    /// Records an attended class. Unknown ids are ignored and reported as `false`.
    pub fn mark_present(&mut self, id: SubjectId) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.present = record.present.saturating_add(1);
                record.total = record.total.saturating_add(1);
                true
            }
            None => {
                debug!("Ignoring present mark for unknown subject {id}");
                false
            }
        }
    }

    /// Records a missed class. Unknown ids are ignored and reported as `false`.
    pub fn mark_absent(&mut self, id: SubjectId) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.total = record.total.saturating_add(1);
                true
            }
            None => {
                debug!("Ignoring absent mark for unknown subject {id}");
                false
            }
        }
    }

    pub fn set_min_attendance(&mut self, min_attendance: i64) -> Result<(), StoreError> {
        let min_attendance = u8::try_from(min_attendance)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(ValidationError::ThresholdOutOfRange(min_attendance))?;
        self.profile.min_attendance = min_attendance;
        Ok(())
    }

    /// Drops every subject and restores the default profile. The id sequence keeps counting.
    pub fn reset_all(&mut self) {
        info!("Clearing {} subjects", self.subjects.len());
        self.subjects.clear();
        self.profile = Profile::default();
    }
}
