//! The content-lifecycle service: the surface the request-handling layer
//! calls into.
//!
//! Every mutation flows authorization gate -> update engine -> audit log ->
//! lifecycle machine -> store, per capability bounds rather than concrete
//! types. The store handle is injected at construction; the process entry
//! point owns its lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::warn;

use crate::audit::{Action, AuditEntry, AuditLog};
use crate::auth::{self, AuthAction};
use crate::entity::{
    Creatable, Draftable, Editable, Joinable, Postable, Publishable, Record, ROLE_MEMBER,
};
use crate::error::Result;
use crate::ident;
use crate::lifecycle::DraftSlots;
use crate::storage::{self, ObjectStore};
use crate::update::{self, ApplyReport, FieldEvent, Interceptor};

pub struct ContentService {
    store: Arc<dyn ObjectStore>,
    slots: DraftSlots,
    audit: AuditLog,
    /// Per-object locks guarding membership read-modify-write cycles.
    member_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            slots: DraftSlots::new(store.clone()),
            audit: AuditLog::new(store.clone()),
            store,
            member_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Create a new draft. Claims the actor's draft slot for the type
    /// before anything is persisted, so a second unfinished draft of the
    /// same type conflicts without side effects. Returns the new ID along
    /// with the field-apply report; initial-field rejections are local,
    /// same as in `apply_updates`.
    pub fn create<T: Creatable + Editable + Publishable>(
        &self,
        actor: Option<&str>,
        initial: &serde_json::Map<String, Value>,
    ) -> Result<(String, ApplyReport)> {
        let actor = auth::require_actor(actor)?;

        let mut object = T::default();
        object.init_new(&ident::generate_id(), actor, &ident::date_time_utc());
        object.set_draft(true);

        let mut body = serde_json::to_value(&object)?;
        let report = update::apply_updates(&mut body, T::schema(), initial, None);
        for rejection in &report.rejected {
            warn!(path = %rejection.path, reason = %rejection.reason, "initial field rejected");
        }
        let object: T = serde_json::from_value(body)?;

        self.slots.claim(actor, T::TYPE_NAME, object.id())?;

        if let Err(e) = storage::save_record(self.store.as_ref(), &object) {
            // The object never landed: free the slot so the actor is not
            // locked out of the type by an aborted create.
            if let Err(release_err) = self.slots.release(actor, T::TYPE_NAME, object.id()) {
                warn!(error = %release_err, "slot release failed after aborted create");
            }
            return Err(e);
        }

        let entry = AuditEntry::new(actor, Action::Create, T::TYPE_NAME, object.id(), "", "", "");
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, "audit write failed for create");
        }

        Ok((object.id().to_string(), report))
    }

    /// Apply a batch of field updates. Rejections are local to their field;
    /// editor metadata refreshes exactly once when anything applied.
    pub fn apply_updates<T: Editable>(
        &self,
        actor: Option<&str>,
        id: &str,
        updates: &serde_json::Map<String, Value>,
        interceptor: Option<&mut Interceptor<'_>>,
    ) -> Result<ApplyReport> {
        let object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Edit)?;
        let actor = auth::require_actor(actor)?;

        let mut body = serde_json::to_value(&object)?;
        let mut report = update::apply_updates(&mut body, T::schema(), updates, interceptor);

        if report.applied > 0 {
            let mut object: T = serde_json::from_value(body)?;
            object.touch_edit(actor, &ident::date_time_utc());
            storage::save_record(self.store.as_ref(), &object)?;

            self.log_field_events(actor, T::TYPE_NAME, id, &report.events, &mut report.warnings);
        }

        Ok(report)
    }

    pub fn publish<T: Publishable + Editable>(&self, actor: Option<&str>, id: &str) -> Result<()> {
        let mut object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Edit)?;
        let actor = auth::require_actor(actor)?;

        self.slots.publish(actor, &mut object)
    }

    pub fn unpublish<T: Publishable + Editable>(
        &self,
        actor: Option<&str>,
        id: &str,
    ) -> Result<()> {
        let mut object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Edit)?;
        let actor = auth::require_actor(actor)?;

        self.slots.unpublish(actor, &mut object)
    }

    /// Delete an object. A draft releases its slot; the audit trail keeps
    /// the display label as the old value.
    pub fn delete<T: Publishable + Editable>(&self, actor: Option<&str>, id: &str) -> Result<()> {
        let object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Delete)?;
        let actor = auth::require_actor(actor)?;

        if object.is_draft() {
            self.slots.release(object.created_by(), T::TYPE_NAME, id)?;
        }

        self.store.delete(T::TYPE_NAME, id)?;

        let entry = AuditEntry::new(
            actor,
            Action::Delete,
            T::TYPE_NAME,
            id,
            "",
            &object.label(),
            "",
        );
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, "audit write failed for delete");
        }

        Ok(())
    }

    /// Delete a post-owning object along with its posts.
    pub fn delete_postable<T: Publishable + Editable + Postable>(
        &self,
        actor: Option<&str>,
        id: &str,
    ) -> Result<()> {
        self.delete::<T>(actor, id)?;
        self.delete_posts(T::TYPE_NAME, id)
    }

    fn delete_posts(&self, parent_type: &str, parent_id: &str) -> Result<()> {
        let mut orphaned = Vec::new();

        for body in self.store.stream_all("Post")? {
            let body = body?;
            let matches = body.get("parentType").and_then(Value::as_str) == Some(parent_type)
                && body.get("parentId").and_then(Value::as_str) == Some(parent_id);

            if matches {
                if let Some(post_id) = body.get("id").and_then(Value::as_str) {
                    orphaned.push(post_id.to_string());
                }
            }
        }

        for post_id in orphaned {
            self.store.delete("Post", &post_id)?;
        }

        Ok(())
    }

    /// Join a membership-bearing object. The whole check-then-append runs
    /// under the object's membership lock.
    pub fn join<T: Editable + Joinable>(&self, actor: Option<&str>, id: &str) -> Result<()> {
        let lock = self.member_lock(T::TYPE_NAME, id);
        let _guard = Self::locked(&lock);

        let mut object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Join)?;
        let actor = auth::require_actor(actor)?;

        let index = object.members().len();
        object.add_member(actor, ROLE_MEMBER, &ident::date_time_utc());
        storage::save_record(self.store.as_ref(), &object)?;

        let entry = AuditEntry::new(
            actor,
            Action::ArrayAppend,
            T::TYPE_NAME,
            id,
            &format!("members[{index}]"),
            "",
            actor,
        );
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, "audit write failed for join");
        }

        Ok(())
    }

    /// Leave a membership-bearing object. Leaving without being a member
    /// is a no-op, not an error.
    pub fn leave<T: Editable + Joinable>(&self, actor: Option<&str>, id: &str) -> Result<()> {
        let lock = self.member_lock(T::TYPE_NAME, id);
        let _guard = Self::locked(&lock);

        let mut object: T = storage::get_record(self.store.as_ref(), id)?;
        auth::authorize(actor, &object, AuthAction::Leave)?;
        let actor = auth::require_actor(actor)?;

        let index = match object.members().iter().position(|m| m.user_id == actor) {
            Some(index) => index,
            None => return Ok(()),
        };

        object.remove_member(actor);
        storage::save_record(self.store.as_ref(), &object)?;

        let entry = AuditEntry::new(
            actor,
            Action::ArrayRemove,
            T::TYPE_NAME,
            id,
            &format!("members[{index}]"),
            actor,
            "",
        );
        if let Err(e) = self.audit.record(&entry) {
            warn!(error = %e, "audit write failed for leave");
        }

        Ok(())
    }

    pub fn get<T: Record>(&self, id: &str) -> Result<T> {
        storage::get_record(self.store.as_ref(), id)
    }

    /// All published objects of a type, in scan order. Drafts stay
    /// invisible to general listing.
    pub fn list_published<T: Record + Draftable>(&self) -> Result<Vec<T>> {
        let mut published = Vec::new();

        for body in self.store.stream_all(T::TYPE_NAME)? {
            let object: T = serde_json::from_value(body?)?;
            if !object.is_draft() {
                published.push(object);
            }
        }

        Ok(published)
    }

    fn log_field_events(
        &self,
        actor: &str,
        type_name: &str,
        id: &str,
        events: &[FieldEvent],
        warnings: &mut Vec<String>,
    ) {
        for event in events {
            let entry = match event {
                FieldEvent::Edited { path, old, new } => {
                    AuditEntry::new(actor, Action::Edit, type_name, id, path, old, new)
                }
                FieldEvent::Appended { path, value } => {
                    AuditEntry::new(actor, Action::ArrayAppend, type_name, id, path, "", value)
                }
                FieldEvent::Removed { path, value } => {
                    AuditEntry::new(actor, Action::ArrayRemove, type_name, id, path, value, "")
                }
            };

            if let Err(e) = self.audit.record(&entry) {
                warn!(error = %e, key = %entry.key, "audit write failed");
                warnings.push(format!("audit entry for {} not recorded: {e}", entry.key));
            }
        }
    }

    fn member_lock(&self, type_name: &str, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.member_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only the map still references belong to finished
        // operations; drop them so the table doesn't grow without bound.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry((type_name.to_string(), id.to_string()))
            .or_default()
            .clone()
    }

    #[cfg(test)]
    fn member_lock_table_len(&self) -> usize {
        self.member_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn locked(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Action;
    use crate::entity::{Group, Joinable, Settings, SoundTrack, Work};
    use crate::error::GreenroomError;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn service_with_work() -> ContentService {
        let store = Arc::new(MemoryStore::new());
        let mut work = Work {
            id: "w1".to_string(),
            title: "Stellar Drift".to_string(),
            ..Work::default()
        };
        work.creator.created_by = "admin".to_string();
        storage::save_record(store.as_ref(), &work).unwrap();
        ContentService::new(store)
    }

    /// Store wrapper that fails writes for one configurable type name.
    struct FailingStore {
        inner: MemoryStore,
        fail_type: Mutex<Option<String>>,
    }

    impl FailingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_type: Mutex::new(None),
            }
        }

        fn fail_writes_for(&self, type_name: &str) {
            *self.fail_type.lock().unwrap() = Some(type_name.to_string());
        }

        fn heal(&self) {
            *self.fail_type.lock().unwrap() = None;
        }
    }

    impl ObjectStore for FailingStore {
        fn get(&self, type_name: &str, id: &str) -> Result<Option<Value>> {
            self.inner.get(type_name, id)
        }

        fn set(&self, type_name: &str, id: &str, body: &Value) -> Result<()> {
            if self.fail_type.lock().unwrap().as_deref() == Some(type_name) {
                return Err(GreenroomError::Storage("store unavailable".to_string()));
            }
            self.inner.set(type_name, id, body)
        }

        fn delete(&self, type_name: &str, id: &str) -> Result<bool> {
            self.inner.delete(type_name, id)
        }

        fn stream_all<'a>(&'a self, type_name: &str) -> Result<crate::storage::ObjectIter<'a>> {
            self.inner.stream_all(type_name)
        }
    }

    fn fields(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn create_requires_login() {
        let service = service_with_work();
        let err = service
            .create::<SoundTrack>(None, &fields(&[]))
            .unwrap_err();
        assert!(matches!(err, GreenroomError::Authorization(_)));
    }

    #[test]
    fn create_starts_as_draft_and_claims_slot() {
        let service = service_with_work();

        let (id, _) = service
            .create::<SoundTrack>(Some("u1"), &fields(&[("title", json!("OP1"))]))
            .unwrap();

        let track: SoundTrack = service.get(&id).unwrap();
        assert!(track.is_draft);
        assert_eq!(track.title, "OP1");
        assert_eq!(track.creator.created_by, "u1");

        // One draft per (actor, type).
        let err = service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));
    }

    #[test]
    fn full_soundtrack_lifecycle_with_audit_trail() {
        let service = service_with_work();

        let (id, _) = service
            .create::<SoundTrack>(
                Some("u1"),
                &fields(&[
                    ("title", json!("OP1")),
                    ("media", json!(["Youtube:abc123"])),
                ]),
            )
            .unwrap();

        // Publishing without a work tag fails validation.
        let err = service.publish::<SoundTrack>(Some("u1"), &id).unwrap_err();
        assert!(matches!(err, GreenroomError::Validation(_)));

        let report = service
            .apply_updates::<SoundTrack>(
                Some("u1"),
                &id,
                &fields(&[("tags", json!(["work:w1", "opening"]))]),
                None,
            )
            .unwrap();
        assert_eq!(report.applied, 1);

        service.publish::<SoundTrack>(Some("u1"), &id).unwrap();
        let track: SoundTrack = service.get(&id).unwrap();
        assert!(!track.is_draft);

        // Draft slot is free again.
        service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap();

        let log = service.audit();
        let creates = log.filter(|e| e.action == Action::Create).unwrap();
        assert_eq!(creates.len(), 2);

        let appends = log.filter(|e| e.action == Action::ArrayAppend).unwrap();
        assert_eq!(appends.len(), 2); // two tags appended
        assert!(appends.iter().all(|e| e.key.starts_with("tags[")));
        assert!(appends.iter().all(|e| log.entry_score(e) == 0));
    }

    #[test]
    fn apply_updates_refreshes_editor_once() {
        let service = service_with_work();
        let (id, _) = service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap();

        // Creator edits; someone else may not.
        let err = service
            .apply_updates::<SoundTrack>(Some("u2"), &id, &fields(&[("title", json!("x"))]), None)
            .unwrap_err();
        assert!(matches!(err, GreenroomError::Authorization(_)));

        let report = service
            .apply_updates::<SoundTrack>(
                Some("u1"),
                &id,
                &fields(&[("title", json!("OP2")), ("nope", json!(1))]),
                None,
            )
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected.len(), 1);

        let track: SoundTrack = service.get(&id).unwrap();
        assert_eq!(track.editor.edited_by, "u1");
        assert!(!track.editor.edited.is_empty());
    }

    #[test]
    fn settings_interceptor_fires_on_avatar_change() {
        use crate::entity::{avatar_interceptor, AvatarHook};
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingHook(AtomicUsize);
        impl AvatarHook for CountingHook {
            fn refresh_avatar(&self, _user_id: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let service = service_with_work();
        storage::save_record(service.store(), &Settings::new("u1")).unwrap();

        let hook = CountingHook(AtomicUsize::new(0));
        let mut interceptor = avatar_interceptor("u1", &hook);

        let report = service
            .apply_updates::<Settings>(
                Some("u1"),
                "u1",
                &fields(&[
                    ("avatar.source", json!("upload")),
                    ("theme", json!("dark")),
                ]),
                Some(&mut interceptor),
            )
            .unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);

        let settings: Settings = service.get("u1").unwrap();
        assert_eq!(settings.avatar.source, "upload");
        assert_eq!(settings.theme, "dark");
    }

    #[test]
    fn join_and_leave_scenario() {
        let service = service_with_work();
        let (id, _) = service
            .create::<Group>(
                Some("u1"),
                &fields(&[
                    ("name", json!("Speedwatchers")),
                    ("tagline", json!("We watch fast")),
                ]),
            )
            .unwrap();

        service.join::<Group>(Some("u2"), &id).unwrap();
        let group: Group = service.get(&id).unwrap();
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.find_member("u2").unwrap().role, ROLE_MEMBER);

        // Joining twice conflicts and changes nothing.
        let err = service.join::<Group>(Some("u2"), &id).unwrap_err();
        assert!(matches!(err, GreenroomError::Conflict(_)));
        let group: Group = service.get(&id).unwrap();
        assert_eq!(group.members.len(), 2);

        service.leave::<Group>(Some("u2"), &id).unwrap();
        let group: Group = service.get(&id).unwrap();
        assert_eq!(group.members.len(), 1);

        // Leaving twice is a quiet no-op.
        service.leave::<Group>(Some("u2"), &id).unwrap();
        let group: Group = service.get(&id).unwrap();
        assert_eq!(group.members.len(), 1);
    }

    #[test]
    fn delete_draft_releases_slot_and_posts() {
        let service = service_with_work();
        let (id, _) = service
            .create::<Group>(Some("u1"), &fields(&[("name", json!("G"))]))
            .unwrap();

        let post = crate::entity::Post {
            id: "p1".to_string(),
            author_id: "u2".to_string(),
            parent_type: "Group".to_string(),
            parent_id: id.clone(),
            text: "hi".to_string(),
            created: ident::date_time_utc(),
        };
        storage::save_record(service.store(), &post).unwrap();

        service.delete_postable::<Group>(Some("u1"), &id).unwrap();

        assert!(service.store().get("Group", &id).unwrap().is_none());
        assert!(service.store().get("Post", "p1").unwrap().is_none());

        // Slot is free for the next draft.
        service
            .create::<Group>(Some("u1"), &fields(&[]))
            .unwrap();
    }

    #[test]
    fn summary_edit_earns_the_field_bonus() {
        let service = service_with_work();

        service
            .apply_updates::<Work>(
                Some("admin"),
                "w1",
                &fields(&[("summary", json!("A space opera"))]),
                None,
            )
            .unwrap();

        let log = service.audit();
        let edits = log.filter(|e| e.action == Action::Edit).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].key, "summary");
        assert_eq!(log.entry_score(&edits[0]), 5);
    }

    #[test]
    fn create_reports_rejected_initial_fields() {
        let service = service_with_work();

        let (id, report) = service
            .create::<SoundTrack>(
                Some("u1"),
                &fields(&[("title", json!("OP1")), ("bogus", json!(1))]),
            )
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].path, "bogus");

        let track: SoundTrack = service.get(&id).unwrap();
        assert_eq!(track.title, "OP1");
    }

    #[test]
    fn failed_save_during_create_frees_the_slot() {
        let store = Arc::new(FailingStore::new());
        let service = ContentService::new(store.clone());

        store.fail_writes_for("SoundTrack");
        let err = service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap_err();
        assert!(matches!(err, GreenroomError::Storage(_)));

        // The aborted create must not leave a slot behind.
        store.heal();
        service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap();
    }

    #[test]
    fn audit_write_failure_is_a_warning_not_a_rollback() {
        let store = Arc::new(FailingStore::new());
        let service = ContentService::new(store.clone());

        let (id, _) = service
            .create::<SoundTrack>(Some("u1"), &fields(&[]))
            .unwrap();

        store.fail_writes_for("AuditEntry");
        let report = service
            .apply_updates::<SoundTrack>(Some("u1"), &id, &fields(&[("title", json!("OP2"))]), None)
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 1);

        let track: SoundTrack = service.get(&id).unwrap();
        assert_eq!(track.title, "OP2");
    }

    #[test]
    fn concurrent_creates_claim_one_slot() {
        use std::thread;

        let service = Arc::new(service_with_work());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let service = service.clone();
            handles.push(thread::spawn(move || {
                service
                    .create::<SoundTrack>(Some("u1"), &fields(&[]))
                    .is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn membership_locks_do_not_accumulate() {
        let service = service_with_work();

        for i in 0..8 {
            let owner = format!("owner{i}");
            let (id, _) = service
                .create::<Group>(Some(&owner), &fields(&[]))
                .unwrap();
            service.join::<Group>(Some("u9"), &id).unwrap();
        }

        // Each acquisition purges the idle entries left by earlier calls.
        assert_eq!(service.member_lock_table_len(), 1);
    }

    #[test]
    fn drafts_are_invisible_to_listing() {
        let service = service_with_work();

        let (draft_id, _) = service
            .create::<SoundTrack>(
                Some("u1"),
                &fields(&[("media", json!(["Youtube:a"])), ("tags", json!(["work:w1"]))]),
            )
            .unwrap();

        assert!(service.list_published::<SoundTrack>().unwrap().is_empty());

        service.publish::<SoundTrack>(Some("u1"), &draft_id).unwrap();
        assert_eq!(service.list_published::<SoundTrack>().unwrap().len(), 1);
    }
}
