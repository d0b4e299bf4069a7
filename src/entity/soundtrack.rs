use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{
    Authorizable, Creatable, CreatorInfo, Draftable, Editable, EditorInfo, Likeable, Ownable,
    Publishable, Record, Work,
};
use crate::error::{GreenroomError, Result};
use crate::schema::{FieldKind, Schema};
use crate::storage::{self, ObjectStore};

/// Tag prefix connecting a track to a catalog work, e.g. `work:<id>`.
pub const WORK_TAG_PREFIX: &str = "work:";

/// A soundtrack posted by the community.
///
/// Tags carry both free-form labels (`opening`, `cover`, `remix`) and
/// catalog references via the `work:` prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundTrack {
    pub id: String,
    pub title: String,
    /// External media references as `Service:serviceID` strings.
    pub media: Vec<String>,
    pub tags: Vec<String>,
    pub likes: Vec<String>,
    pub is_draft: bool,
    #[serde(flatten)]
    pub creator: CreatorInfo,
    #[serde(flatten)]
    pub editor: EditorInfo,
}

impl SoundTrack {
    pub fn has_tag(&self, search: &str) -> bool {
        self.tags.iter().any(|tag| tag == search)
    }

    /// IDs of all catalog works this track is tagged with.
    pub fn work_ids(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .filter_map(|tag| tag.strip_prefix(WORK_TAG_PREFIX))
    }
}

impl Record for SoundTrack {
    const TYPE_NAME: &'static str = "SoundTrack";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new(&[
                ("title", FieldKind::Str, true),
                ("media", FieldKind::StrList, true),
                ("tags", FieldKind::StrList, true),
                ("likes", FieldKind::StrList, false),
            ])
        })
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

impl Ownable for SoundTrack {
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

impl Draftable for SoundTrack {
    fn is_draft(&self) -> bool {
        self.is_draft
    }

    fn set_draft(&mut self, draft: bool) {
        self.is_draft = draft;
    }
}

impl Likeable for SoundTrack {
    fn likes(&self) -> &[String] {
        &self.likes
    }

    fn likes_mut(&mut self) -> &mut Vec<String> {
        &mut self.likes
    }
}

impl Authorizable for SoundTrack {
    fn owner_id(&self) -> &str {
        &self.creator.created_by
    }
}

impl Publishable for SoundTrack {
    fn validate_publish(&self, store: &dyn ObjectStore) -> Result<()> {
        if self.media.is_empty() {
            return Err(GreenroomError::Validation(
                "No media specified (at least 1 media source is required)".to_string(),
            ));
        }

        let mut work_found = false;

        for work_id in self.work_ids() {
            if storage::find_record::<Work>(store, work_id)?.is_none() {
                return Err(GreenroomError::Validation(format!(
                    "Invalid work ID: {work_id}"
                )));
            }

            work_found = true;
        }

        if !work_found {
            return Err(GreenroomError::Validation(
                "Need to specify at least one work".to_string(),
            ));
        }

        if self.tags.is_empty() {
            return Err(GreenroomError::Validation(
                "Need to specify at least one tag".to_string(),
            ));
        }

        Ok(())
    }
}

impl Editable for SoundTrack {
    fn touch_edit(&mut self, editor: &str, at: &str) {
        self.touch(editor, at);
    }
}

impl Creatable for SoundTrack {
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
