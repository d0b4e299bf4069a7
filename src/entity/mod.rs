mod group;
mod person;
mod post;
mod settings;
mod soundtrack;
mod work;

pub use group::{Group, GroupMember, ROLE_FOUNDER, ROLE_MEMBER};
pub use person::{Person, PersonName};
pub use post::Post;
pub use settings::{avatar_interceptor, AvatarHook, Settings};
pub use soundtrack::{SoundTrack, WORK_TAG_PREFIX};
pub use work::Work;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::Schema;
use crate::storage::ObjectStore;

/// A persisted content object: stable ID scoped by a type name, plus a
/// declared editable-field schema.
pub trait Record: Serialize + DeserializeOwned + Send {
    const TYPE_NAME: &'static str;

    fn id(&self) -> &str;

    /// Static editable-field table for this type, built once.
    fn schema() -> &'static Schema;

    /// Display string, used as the old value of delete audit entries.
    fn label(&self) -> String {
        self.id().to_string()
    }
}

/// Creation metadata, immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    pub created: String,
    pub created_by: String,
}

/// Last-edit metadata, refreshed once per accepted update batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorInfo {
    pub edited: String,
    pub edited_by: String,
}

/// Has a creator and a last editor.
pub trait Ownable {
    fn creator_info(&self) -> &CreatorInfo;
    fn editor_info(&self) -> &EditorInfo;
    fn editor_info_mut(&mut self) -> &mut EditorInfo;

    fn created_by(&self) -> &str {
        &self.creator_info().created_by
    }

    fn created(&self) -> &str {
        &self.creator_info().created
    }

    /// Refresh editor identity and edit timestamp.
    fn touch(&mut self, editor: &str, at: &str) {
        let info = self.editor_info_mut();
        info.edited_by = editor.to_string();
        info.edited = at.to_string();
    }
}

/// Has a draft flag. Drafts are visible only to their creator.
pub trait Draftable {
    fn is_draft(&self) -> bool;
    fn set_draft(&mut self, draft: bool);
}

/// Has a list of actor IDs who liked the object. Membership is unique,
/// order is irrelevant.
pub trait Likeable {
    fn likes(&self) -> &[String];
    fn likes_mut(&mut self) -> &mut Vec<String>;
}

/// Owns a sub-collection of posts. Deleting the parent deletes its posts.
pub trait Postable: Record {}

/// Has a joinable membership list with per-member roles.
pub trait Joinable {
    fn members(&self) -> &[GroupMember];
    fn members_mut(&mut self) -> &mut Vec<GroupMember>;

    fn find_member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members().iter().find(|m| m.user_id == user_id)
    }

    fn add_member(&mut self, user_id: &str, role: &str, joined: &str) {
        self.members_mut().push(GroupMember {
            user_id: user_id.to_string(),
            role: role.to_string(),
            joined: joined.to_string(),
        });
    }

    /// Remove the member with the given user ID. Returns false if the user
    /// was not a member (leaving twice is a no-op, not an error).
    fn remove_member(&mut self, user_id: &str) -> bool {
        let members = self.members_mut();
        match members.iter().position(|m| m.user_id == user_id) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Capability projection handed to the authorization gate.
pub trait Authorizable: Record {
    /// Actor who owns the object for edit/delete purposes.
    fn owner_id(&self) -> &str;

    /// Role held by the given actor, for types with membership roles.
    fn role_of(&self, _actor: &str) -> Option<&str> {
        None
    }

    /// Whether the actor is currently a member, for joinable types.
    fn is_member(&self, _actor: &str) -> bool {
        false
    }
}

/// Participates in the draft/publish lifecycle. `validate_publish` carries
/// the per-type rules gating the Draft -> Published transition; it may read
/// the store to resolve references but must not write.
pub trait Publishable: Record + Ownable + Draftable {
    fn validate_publish(&self, store: &dyn ObjectStore) -> Result<()>;
}

/// Edit metadata refresh hook used by the update pipeline. Types without
/// editor metadata (Settings) keep the default no-op.
pub trait Editable: Record + Authorizable {
    fn touch_edit(&mut self, _editor: &str, _at: &str) {}
}

/// Created through the generic create pipeline. `init_new` stamps identity
/// and ownership onto a default-constructed value; types override it to
/// seed creation-time state (a group seeds its creator as founder).
pub trait Creatable: Record + Default {
    fn init_new(&mut self, id: &str, actor: &str, now: &str);
}
