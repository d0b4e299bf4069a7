//! Draft index and the draft -> published state machine.
//!
//! Per (actor, type) there is a single draft slot: an actor may hold at
//! most one unfinished draft of each content type. Every transition that
//! reads then writes a slot runs under that slot's lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::entity::{Publishable, Record};
use crate::error::{GreenroomError, Result};
use crate::schema::Schema;
use crate::storage::{self, ObjectStore};

/// Per-actor registry of current draft IDs, one slot per content type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIndex {
    pub user_id: String,
    #[serde(default)]
    pub drafts: BTreeMap<String, String>,
}

impl DraftIndex {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            drafts: BTreeMap::new(),
        }
    }

    pub fn slot(&self, type_name: &str) -> Option<&str> {
        self.drafts.get(type_name).map(String::as_str)
    }

    fn set_slot(&mut self, type_name: &str, id: &str) {
        self.drafts.insert(type_name.to_string(), id.to_string());
    }

    fn clear_slot(&mut self, type_name: &str) {
        self.drafts.remove(type_name);
    }
}

impl Record for DraftIndex {
    const TYPE_NAME: &'static str = "DraftIndex";

    fn id(&self) -> &str {
        &self.user_id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
        // Draft indexes are never client-editable.
        SCHEMA.get_or_init(|| Schema::new(&[]))
    }
}

type SlotKey = (String, String);

/// The state machine around draft slots. All slot transitions serialize on
/// a per-(actor, type) lock so concurrent publish/unpublish requests can
/// never both claim or both clear the same slot.
pub struct DraftSlots {
    store: Arc<dyn ObjectStore>,
    locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl DraftSlots {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn slot_lock(&self, actor: &str, type_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only the map still references belong to finished
        // transitions; drop them so the table doesn't grow without bound.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry((actor.to_string(), type_name.to_string()))
            .or_default()
            .clone()
    }

    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn locked<'a>(&self, lock: &'a Mutex<()>) -> MutexGuard<'a, ()> {
        lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_index(&self, actor: &str) -> Result<DraftIndex> {
        Ok(storage::find_record::<DraftIndex>(self.store.as_ref(), actor)?
            .unwrap_or_else(|| DraftIndex::new(actor)))
    }

    /// Claim the (actor, type) slot for a newly created draft. Fails with
    /// a conflict while a previous draft of that type is unfinished.
    pub fn claim(&self, actor: &str, type_name: &str, id: &str) -> Result<()> {
        let lock = self.slot_lock(actor, type_name);
        let _guard = self.locked(&lock);

        let mut index = self.load_index(actor)?;

        if let Some(existing) = index.slot(type_name) {
            if self.store.get(type_name, existing)?.is_none() {
                // Slot references an object that no longer exists. The
                // delete path must clear slots, so this is an invariant
                // violation, not a user error.
                error!(actor, type_name, draft_id = existing, "dangling draft slot");
            }

            return Err(GreenroomError::Conflict(format!(
                "You still have an unfinished {type_name} draft"
            )));
        }

        index.set_slot(type_name, id);
        storage::save_record(self.store.as_ref(), &index)?;

        debug!(actor, type_name, id, "draft slot claimed");
        Ok(())
    }

    /// Publish a draft: validate, flip the draft flag, clear the slot.
    /// Refuses unless the actor's slot points exactly at this object,
    /// which protects against double-publish races and slot corruption.
    pub fn publish<T: Publishable>(&self, actor: &str, object: &mut T) -> Result<()> {
        let lock = self.slot_lock(actor, T::TYPE_NAME);
        let _guard = self.locked(&lock);

        if !object.is_draft() {
            return Err(GreenroomError::Validation("Not a draft".to_string()));
        }

        object.validate_publish(self.store.as_ref())?;

        let mut index = self.load_index(actor)?;

        if index.slot(T::TYPE_NAME) != Some(object.id()) {
            return Err(GreenroomError::Conflict(format!(
                "{} draft doesn't exist in the actor's draft index",
                T::TYPE_NAME
            )));
        }

        object.set_draft(false);
        storage::save_record(self.store.as_ref(), object)?;

        index.clear_slot(T::TYPE_NAME);
        storage::save_record(self.store.as_ref(), &index)?;

        debug!(actor, type_name = T::TYPE_NAME, id = object.id(), "published");
        Ok(())
    }

    /// Turn a published object back into a draft, claiming the slot.
    pub fn unpublish<T: Publishable>(&self, actor: &str, object: &mut T) -> Result<()> {
        let lock = self.slot_lock(actor, T::TYPE_NAME);
        let _guard = self.locked(&lock);

        if object.is_draft() {
            return Err(GreenroomError::Validation("Already a draft".to_string()));
        }

        let mut index = self.load_index(actor)?;

        if index.slot(T::TYPE_NAME).is_some() {
            return Err(GreenroomError::Conflict(format!(
                "You still have an unfinished {} draft",
                T::TYPE_NAME
            )));
        }

        object.set_draft(true);
        storage::save_record(self.store.as_ref(), object)?;

        index.set_slot(T::TYPE_NAME, object.id());
        storage::save_record(self.store.as_ref(), &index)?;

        debug!(actor, type_name = T::TYPE_NAME, id = object.id(), "unpublished");
        Ok(())
    }

    /// Clear the slot after a draft is deleted, iff it still points at the
    /// deleted object.
    pub fn release(&self, actor: &str, type_name: &str, id: &str) -> Result<()> {
        let lock = self.slot_lock(actor, type_name);
        let _guard = self.locked(&lock);

        let mut index = self.load_index(actor)?;

        if index.slot(type_name) == Some(id) {
            index.clear_slot(type_name);
            storage::save_record(self.store.as_ref(), &index)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CreatorInfo, SoundTrack, Work};
    use crate::ident;
    use crate::storage::MemoryStore;

    fn track(id: &str, owner: &str, draft: bool) -> SoundTrack {
        SoundTrack {
            id: id.to_string(),
            title: "OP1".to_string(),
            media: vec!["Youtube:abc123".to_string()],
            tags: vec!["work:w1".to_string(), "opening".to_string()],
            is_draft: draft,
            creator: CreatorInfo {
                created: ident::date_time_utc(),
                created_by: owner.to_string(),
            },
            ..SoundTrack::default()
        }
    }

    fn setup() -> (Arc<MemoryStore>, DraftSlots) {
        let store = Arc::new(MemoryStore::new());
        let work = Work {
            id: "w1".to_string(),
            title: "Stellar Drift".to_string(),
            ..Work::default()
        };
        storage::save_record(store.as_ref(), &work).unwrap();
        let slots = DraftSlots::new(store.clone());
        (store, slots)
    }

    #[test]
    fn second_draft_of_same_type_conflicts() {
        let (store, slots) = setup();
        storage::save_record(store.as_ref(), &track("s1", "u1", true)).unwrap();

        slots.claim("u1", "SoundTrack", "s1").unwrap();
        let err = slots.claim("u1", "SoundTrack", "s2").unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));

        // A different actor or type is unaffected.
        slots.claim("u2", "SoundTrack", "s3").unwrap();
        slots.claim("u1", "Group", "g1").unwrap();
    }

    #[test]
    fn publish_requires_slot_ownership() {
        let (store, slots) = setup();
        let mut stale = track("s1", "u1", true);
        storage::save_record(store.as_ref(), &stale).unwrap();

        // Slot points at a different object.
        slots.claim("u1", "SoundTrack", "s9").unwrap();

        let err = slots.publish("u1", &mut stale).unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));
        assert!(stale.is_draft);
    }

    #[test]
    fn publish_clears_slot_and_flips_flag() {
        let (store, slots) = setup();
        let mut t = track("s1", "u1", true);
        storage::save_record(store.as_ref(), &t).unwrap();
        slots.claim("u1", "SoundTrack", "s1").unwrap();

        slots.publish("u1", &mut t).unwrap();

        assert!(!t.is_draft);
        let index: DraftIndex = storage::get_record(store.as_ref(), "u1").unwrap();
        assert_eq!(index.slot("SoundTrack"), None);
    }

    #[test]
    fn publish_validation_failure_leaves_state_unchanged() {
        let (store, slots) = setup();
        let mut t = track("s1", "u1", true);
        t.tags = vec!["opening".to_string()]; // no work reference
        storage::save_record(store.as_ref(), &t).unwrap();
        slots.claim("u1", "SoundTrack", "s1").unwrap();

        let err = slots.publish("u1", &mut t).unwrap_err();
        assert!(matches!(err, GreenroomError::Validation(_)));
        assert!(t.is_draft);

        let index: DraftIndex = storage::get_record(store.as_ref(), "u1").unwrap();
        assert_eq!(index.slot("SoundTrack"), Some("s1"));
    }

    #[test]
    fn unpublish_fails_while_slot_occupied() {
        let (store, slots) = setup();
        let mut published = track("s1", "u1", false);
        storage::save_record(store.as_ref(), &published).unwrap();
        slots.claim("u1", "SoundTrack", "s2").unwrap();

        let err = slots.unpublish("u1", &mut published).unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));
        assert!(!published.is_draft);
    }

    #[test]
    fn unpublish_then_publish_round_trip() {
        let (store, slots) = setup();
        let mut t = track("s1", "u1", false);
        storage::save_record(store.as_ref(), &t).unwrap();

        slots.unpublish("u1", &mut t).unwrap();
        assert!(t.is_draft);

        slots.publish("u1", &mut t).unwrap();
        assert!(!t.is_draft);

        let index: DraftIndex = storage::get_record(store.as_ref(), "u1").unwrap();
        assert_eq!(index.slot("SoundTrack"), None);
    }

    #[test]
    fn finished_transitions_do_not_accumulate_locks() {
        let (_store, slots) = setup();

        for i in 0..32 {
            slots
                .claim(&format!("u{i}"), "SoundTrack", &format!("s{i}"))
                .unwrap();
        }

        // Each acquisition purges the idle entries left by earlier calls.
        assert_eq!(slots.lock_table_len(), 1);
    }

    #[test]
    fn release_clears_only_a_matching_slot() {
        let (_store, slots) = setup();
        slots.claim("u1", "SoundTrack", "s1").unwrap();

        // Pointing at a different object: untouched.
        slots.release("u1", "SoundTrack", "s2").unwrap();
        let err = slots.claim("u1", "SoundTrack", "s3").unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));

        slots.release("u1", "SoundTrack", "s1").unwrap();
        slots.claim("u1", "SoundTrack", "s3").unwrap();
    }
}
