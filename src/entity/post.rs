use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::Record;
use crate::schema::{FieldKind, Schema};

/// A post under a Postable parent (group discussion, person page comment).
/// Only the parent/child relation matters to the lifecycle core: deleting
/// the parent removes its posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub parent_type: String,
    pub parent_id: String,
    pub text: String,
    pub created: String,
}

impl Record for Post {
    const TYPE_NAME: &'static str = "Post";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::new(&[("text", FieldKind::Str, true)]))
    }
}
