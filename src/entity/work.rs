use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{Authorizable, CreatorInfo, Editable, EditorInfo, Likeable, Ownable, Record};
use crate::schema::{FieldKind, Schema};

/// A catalog entry: the primary content type of the platform (an album,
/// show, or game). Works are catalog-managed and live outside the
/// draft/publish lifecycle; community content references them by ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub genres: Vec<String>,
    pub year: i64,
    pub likes: Vec<String>,
    #[serde(flatten)]
    pub creator: CreatorInfo,
    #[serde(flatten)]
    pub editor: EditorInfo,
}

impl Record for Work {
    const TYPE_NAME: &'static str = "Work";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new(&[
                ("title", FieldKind::Str, true),
                ("summary", FieldKind::Str, true),
                ("genres", FieldKind::StrList, true),
                ("year", FieldKind::Int, true),
            ])
        })
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

impl Ownable for Work {
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

impl Likeable for Work {
    fn likes(&self) -> &[String] {
        &self.likes
    }

    fn likes_mut(&mut self) -> &mut Vec<String> {
        &mut self.likes
    }
}

impl Authorizable for Work {
    fn owner_id(&self) -> &str {
        &self.creator.created_by
    }
}

impl Editable for Work {
    fn touch_edit(&mut self, editor: &str, at: &str) {
        self.touch(editor, at);
    }
}
