use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{
    Authorizable, Creatable, CreatorInfo, Draftable, Editable, EditorInfo, Likeable, Ownable,
    Postable, Publishable, Record,
};
use crate::error::{GreenroomError, Result};
use crate::schema::{FieldKind, Schema};
use crate::storage::ObjectStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

impl PersonName {
    pub fn display(&self) -> String {
        if self.last.is_empty() {
            self.first.clone()
        } else {
            format!("{} {}", self.first, self.last)
        }
    }
}

/// A real-life person (artist, author, voice actor) in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: PersonName,
    pub image: String,
    pub likes: Vec<String>,
    pub is_draft: bool,
    #[serde(flatten)]
    pub creator: CreatorInfo,
    #[serde(flatten)]
    pub editor: EditorInfo,
}

impl Record for Person {
    const TYPE_NAME: &'static str = "Person";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new(&[
                ("name.first", FieldKind::Str, true),
                ("name.last", FieldKind::Str, true),
                ("image", FieldKind::Str, false),
            ])
        })
    }

    fn label(&self) -> String {
        self.name.display()
    }
}

impl Ownable for Person {
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

impl Draftable for Person {
    fn is_draft(&self) -> bool {
        self.is_draft
    }

    fn set_draft(&mut self, draft: bool) {
        self.is_draft = draft;
    }
}

impl Likeable for Person {
    fn likes(&self) -> &[String] {
        &self.likes
    }

    fn likes_mut(&mut self) -> &mut Vec<String> {
        &mut self.likes
    }
}

impl Postable for Person {}

impl Authorizable for Person {
    fn owner_id(&self) -> &str {
        &self.creator.created_by
    }
}

impl Publishable for Person {
    fn validate_publish(&self, _store: &dyn ObjectStore) -> Result<()> {
        if self.name.first.is_empty() {
            return Err(GreenroomError::Validation("No person name".to_string()));
        }

        if self.image.is_empty() {
            return Err(GreenroomError::Validation("No person image".to_string()));
        }

        Ok(())
    }
}

impl Editable for Person {
    fn touch_edit(&mut self, editor: &str, at: &str) {
        self.touch(editor, at);
    }
}

impl Creatable for Person {
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
    }
}
