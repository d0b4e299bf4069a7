use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Authorizable, Editable, Record};
use crate::schema::{FieldKind, FieldSpec, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub source: String,
    pub source_url: String,
}

/// Per-user settings, keyed by the user's own ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub avatar: Avatar,
    pub theme: String,
    pub notify_replies: bool,
    pub items_per_page: i64,
}

impl Settings {
    pub fn new(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            theme: "light".to_string(),
            items_per_page: 30,
            ..Self::default()
        }
    }
}

impl Record for Settings {
    const TYPE_NAME: &'static str = "Settings";

    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new(&[
                ("avatar.source", FieldKind::Str, true),
                ("avatar.sourceUrl", FieldKind::Str, true),
                ("theme", FieldKind::Str, true),
                ("notifyReplies", FieldKind::Bool, true),
                ("itemsPerPage", FieldKind::Int, true),
            ])
        })
    }
}

impl Authorizable for Settings {
    // Settings belong to the user whose ID they are keyed by.
    fn owner_id(&self) -> &str {
        &self.id
    }
}

impl Editable for Settings {}

/// External avatar pipeline, out of scope for this core. The real
/// implementation fetches and rescales the new image; tests and the CLI
/// install no-ops.
pub trait AvatarHook {
    fn refresh_avatar(&self, user_id: &str);
}

/// Interceptor for settings updates: avatar source changes are applied
/// here so the dependent avatar refresh fires with the assignment.
pub fn avatar_interceptor<'a>(
    user_id: &'a str,
    hook: &'a dyn AvatarHook,
) -> impl FnMut(&str, &FieldSpec, &mut Value, &Value) -> std::result::Result<bool, String> + 'a {
    move |path, _spec, slot, proposed| match path {
        "avatar.source" | "avatar.sourceUrl" => {
            *slot = proposed.clone();
            hook.refresh_avatar(user_id);
            Ok(true)
        }
        _ => Ok(false),
    }
}
