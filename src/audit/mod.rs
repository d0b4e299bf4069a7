//! Append-only audit log of content mutations, with contribution scoring.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::ident;
use crate::storage::ObjectStore;

/// Action recorded by an audit entry, in the wire names the log has always
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "edit")]
    Edit,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "arrayAppend")]
    ArrayAppend,
    #[serde(rename = "arrayRemove")]
    ArrayRemove,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Edit => write!(f, "edit"),
            Action::Delete => write!(f, "delete"),
            Action::ArrayAppend => write!(f, "arrayAppend"),
            Action::ArrayRemove => write!(f, "arrayRemove"),
        }
    }
}

/// One immutable record of a mutation. Referenced objects may be deleted
/// later; the entry then stands as history with an unresolvable target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub user_id: String,
    pub action: Action,
    /// Type name of what was edited.
    pub object_type: String,
    /// ID of what was edited.
    pub object_id: String,
    pub key: String,
    pub old_value: String,
    pub new_value: String,
    pub created: String,
}

impl AuditEntry {
    pub fn new(
        user_id: &str,
        action: Action,
        object_type: &str,
        object_id: &str,
        key: &str,
        old_value: &str,
        new_value: &str,
    ) -> Self {
        Self {
            id: ident::generate_id(),
            user_id: user_id.to_string(),
            action,
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
            key: key.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            created: ident::date_time_utc(),
        }
    }
}

/// The primary catalog type. Edits to it earn a score bonus.
const PRIMARY_CATALOG_TYPE: &str = "Work";

/// Contribution score for one logged mutation. Pure: same inputs, same
/// score, so the policy can be re-run over historical entries.
///
/// `target_is_draft` tells whether the created object is still a draft at
/// scoring time; drafts earn no creation credit until published.
pub fn score(action: Action, object_type: &str, key: &str, target_is_draft: bool) -> u32 {
    match action {
        Action::Create => {
            if target_is_draft {
                0
            } else {
                5
            }
        }
        Action::Edit => {
            let mut score = 3;

            if object_type == PRIMARY_CATALOG_TYPE {
                score += 1;
            }

            // Bonus for the synopsis fields. Matched case-insensitively:
            // the update pipeline logs schema paths ("summary"), while
            // imported historical entries may carry capitalized keys.
            if key.eq_ignore_ascii_case("summary") || key.eq_ignore_ascii_case("synopsis") {
                score += 1;
            }

            score
        }
        Action::Delete | Action::ArrayRemove => 3,
        Action::ArrayAppend => 0,
    }
}

/// Query and append surface over the stored audit history.
pub struct AuditLog {
    store: Arc<dyn ObjectStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Append one entry. Failure here is non-fatal to the mutation that
    /// triggered it; callers surface the error as a secondary warning.
    pub fn record(&self, entry: &AuditEntry) -> Result<()> {
        debug!(
            action = %entry.action,
            object_type = %entry.object_type,
            object_id = %entry.object_id,
            key = %entry.key,
            "audit entry"
        );
        let body = serde_json::to_value(entry)?;
        self.store.set("AuditEntry", &entry.id, &body)
    }

    /// Score of one stored entry. Resolves the created object's draft flag
    /// through the store; a create whose target no longer resolves scores 0.
    pub fn entry_score(&self, entry: &AuditEntry) -> u32 {
        let target_is_draft = match entry.action {
            Action::Create => self.target_is_draft(entry),
            _ => false,
        };

        score(entry.action, &entry.object_type, &entry.key, target_is_draft)
    }

    fn target_is_draft(&self, entry: &AuditEntry) -> bool {
        match self.store.get(&entry.object_type, &entry.object_id) {
            Ok(Some(body)) => body.get("isDraft").and_then(Value::as_bool) == Some(true),
            // Unresolvable target: no creation credit, same as a draft.
            _ => true,
        }
    }

    /// Stream all entries, lazily. Forward-only and not restartable;
    /// request a fresh stream to re-read.
    pub fn stream(&self) -> Result<impl Iterator<Item = Result<AuditEntry>> + '_> {
        let bodies = self.store.stream_all("AuditEntry")?;
        Ok(bodies.map(|body| Ok(serde_json::from_value(body?)?)))
    }

    /// All entries matching a predicate, in scan order.
    pub fn filter(
        &self,
        mut predicate: impl FnMut(&AuditEntry) -> bool,
    ) -> Result<Vec<AuditEntry>> {
        let mut matched = Vec::new();

        for entry in self.stream()? {
            let entry = entry?;
            if predicate(&entry) {
                matched.push(entry);
            }
        }

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn score_is_deterministic() {
        for _ in 0..2 {
            assert_eq!(score(Action::Edit, "Work", "Summary", false), 5);
        }
    }

    #[test]
    fn create_scores_nothing_for_drafts() {
        assert_eq!(score(Action::Create, "SoundTrack", "", true), 0);
        assert_eq!(score(Action::Create, "SoundTrack", "", false), 5);
    }

    #[test]
    fn edit_bonuses_are_additive() {
        assert_eq!(score(Action::Edit, "Group", "name", false), 3);
        assert_eq!(score(Action::Edit, "Work", "title", false), 4);
        assert_eq!(score(Action::Edit, "Work", "Synopsis", false), 5);
        // The bonus fires on the schema path the pipeline actually logs.
        assert_eq!(score(Action::Edit, "Work", "summary", false), 5);
        // Field bonus applies without the type bonus.
        assert_eq!(score(Action::Edit, "Group", "Summary", false), 4);
    }

    #[test]
    fn remove_scores_append_does_not() {
        assert_eq!(score(Action::Delete, "Group", "", false), 3);
        assert_eq!(score(Action::ArrayRemove, "Group", "tags[0]", false), 3);
        assert_eq!(score(Action::ArrayAppend, "Group", "tags[0]", false), 0);
    }

    #[test]
    fn entry_score_resolves_draft_flag_through_store() {
        let store = Arc::new(MemoryStore::new());
        let log = AuditLog::new(store.clone());

        store
            .set("SoundTrack", "s1", &json!({"id": "s1", "isDraft": true}))
            .unwrap();
        store
            .set("SoundTrack", "s2", &json!({"id": "s2", "isDraft": false}))
            .unwrap();

        let draft = AuditEntry::new("u1", Action::Create, "SoundTrack", "s1", "", "", "");
        let published = AuditEntry::new("u1", Action::Create, "SoundTrack", "s2", "", "", "");
        let gone = AuditEntry::new("u1", Action::Create, "SoundTrack", "s3", "", "", "");

        assert_eq!(log.entry_score(&draft), 0);
        assert_eq!(log.entry_score(&published), 5);
        assert_eq!(log.entry_score(&gone), 0);
    }

    #[test]
    fn stream_and_filter() {
        let store = Arc::new(MemoryStore::new());
        let log = AuditLog::new(store);

        for i in 0..5 {
            let action = if i % 2 == 0 {
                Action::Edit
            } else {
                Action::Delete
            };
            let entry = AuditEntry::new("u1", action, "Group", &format!("g{i}"), "", "", "");
            log.record(&entry).unwrap();
        }

        assert_eq!(log.stream().unwrap().count(), 5);

        let edits = log.filter(|e| e.action == Action::Edit).unwrap();
        assert_eq!(edits.len(), 3);
    }
}
