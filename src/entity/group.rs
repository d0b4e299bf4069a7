use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{
    Authorizable, Creatable, CreatorInfo, Draftable, Editable, EditorInfo, Joinable, Ownable,
    Postable, Publishable, Record,
};
use crate::error::{GreenroomError, Result};
use crate::schema::{FieldKind, Schema};
use crate::storage::ObjectStore;

/// Role given to the member who created the group.
pub const ROLE_FOUNDER: &str = "founder";

/// Default role applied when a user joins.
pub const ROLE_MEMBER: &str = "member";

/// One entry in a group's membership roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub user_id: String,
    #[serde(default)]
    pub role: String,
    pub joined: String,
}

/// A group of platform members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub image: String,
    pub description: String,
    pub rules: String,
    pub tags: Vec<String>,
    pub members: Vec<GroupMember>,
    pub is_draft: bool,
    #[serde(flatten)]
    pub creator: CreatorInfo,
    #[serde(flatten)]
    pub editor: EditorInfo,
}

impl Record for Group {
    const TYPE_NAME: &'static str = "Group";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new(&[
                ("name", FieldKind::Str, true),
                ("tagline", FieldKind::Str, true),
                ("image", FieldKind::Str, true),
                ("description", FieldKind::Str, true),
                ("rules", FieldKind::Str, true),
                ("tags", FieldKind::StrList, true),
            ])
        })
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            "untitled".to_string()
        } else {
            self.name.clone()
        }
    }
}

impl Ownable for Group {
    fn creator_info(&self) -> &CreatorInfo {
        &self.creator
    }

    fn editor_info(&self) -> &EditorInfo {
        &self.editor
    }

    fn editor_info_mut(&mut self) -> &mut EditorInfo {
        &mut self.editor
    }
}

impl Draftable for Group {
    fn is_draft(&self) -> bool {
        self.is_draft
    }

    fn set_draft(&mut self, draft: bool) {
        self.is_draft = draft;
    }
}

impl Joinable for Group {
    fn members(&self) -> &[GroupMember] {
        &self.members
    }

    fn members_mut(&mut self) -> &mut Vec<GroupMember> {
        &mut self.members
    }
}

impl Postable for Group {}

impl Authorizable for Group {
    fn owner_id(&self) -> &str {
        &self.creator.created_by
    }

    fn role_of(&self, actor: &str) -> Option<&str> {
        self.find_member(actor).map(|m| m.role.as_str())
    }

    fn is_member(&self, actor: &str) -> bool {
        self.find_member(actor).is_some()
    }
}

impl Publishable for Group {
    fn validate_publish(&self, _store: &dyn ObjectStore) -> Result<()> {
        if self.name.chars().count() < 2 {
            return Err(GreenroomError::Validation(
                "Name too short: should be at least 2 characters".to_string(),
            ));
        }

        if self.name.chars().count() > 35 {
            return Err(GreenroomError::Validation(
                "Name too long: should not be more than 35 characters".to_string(),
            ));
        }

        if self.tagline.chars().count() < 5 {
            return Err(GreenroomError::Validation(
                "Tagline too short: should be at least 5 characters".to_string(),
            ));
        }

        if self.tagline.chars().count() > 60 {
            return Err(GreenroomError::Validation(
                "Tagline too long: should not be more than 60 characters".to_string(),
            ));
        }

        Ok(())
    }
}

impl Editable for Group {
    fn touch_edit(&mut self, editor: &str, at: &str) {
        self.touch(editor, at);
    }
}

impl Creatable for Group {
    fn init_new(&mut self, id: &str, actor: &str, now: &str) {
        self.id = id.to_string();
        self.creator = CreatorInfo {
            created: now.to_string(),
            created_by: actor.to_string(),
        };
        self.editor = EditorInfo {
            edited: now.to_string(),
            edited_by: actor.to_string(),
        };
        self.members = vec![GroupMember {
            user_id: actor.to_string(),
            role: ROLE_FOUNDER.to_string(),
            joined: now.to_string(),
        }];
    }
}
