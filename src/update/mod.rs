//! Generic field-update engine.
//!
//! Applies an untyped path -> value map to the JSON form of a content
//! object, honoring the object's declared editable-field schema. Bad paths
//! and bad values reject that field only; the rest of the batch proceeds.

use serde_json::Value;

use crate::schema::{FieldKind, FieldSpec, Schema};

/// Per-type interceptor. Called before each default assignment with
/// (full path, field descriptor, current value slot, proposed value).
/// `Ok(true)` means the interceptor handled the assignment (and any side
/// effect) itself; `Ok(false)` lets default assignment proceed; `Err`
/// rejects the field.
pub type Interceptor<'a> =
    dyn FnMut(&str, &FieldSpec, &mut Value, &Value) -> std::result::Result<bool, String> + 'a;

/// One mutation observed while applying a batch, in audit terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    /// Scalar or whole-object assignment.
    Edited {
        path: String,
        old: String,
        new: String,
    },
    /// Element added to a sequence field. Path carries the element index,
    /// e.g. `tags[2]`.
    Appended { path: String, value: String },
    /// Element removed from a sequence field.
    Removed { path: String, value: String },
}

/// A single update rejected out of a batch.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub path: String,
    pub reason: String,
}

/// Outcome of one update batch.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Number of updates applied (interceptor-consumed ones included).
    pub applied: usize,
    pub rejected: Vec<Rejection>,
    pub events: Vec<FieldEvent>,
    /// Secondary failures that did not stop the mutation, e.g. audit
    /// entries that could not be written. Filled in by the caller.
    pub warnings: Vec<String>,
}

impl ApplyReport {
    fn reject(&mut self, path: &str, reason: impl Into<String>) {
        self.rejected.push(Rejection {
            path: path.to_string(),
            reason: reason.into(),
        });
    }
}

/// Apply `updates` to `target` (the JSON form of a content object) per
/// `schema`. Every field is attempted; a rejection never aborts the batch.
pub fn apply_updates(
    target: &mut Value,
    schema: &Schema,
    updates: &serde_json::Map<String, Value>,
    mut interceptor: Option<&mut Interceptor<'_>>,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (path, proposed) in updates {
        let spec = match schema.field(path) {
            Some(spec) => *spec,
            None => {
                report.reject(path, "unknown field");
                continue;
            }
        };

        if !spec.editable {
            report.reject(path, "field is not editable");
            continue;
        }

        let slot = match resolve_path_mut(target, path) {
            Some(slot) => slot,
            None => {
                report.reject(path, "field missing from object");
                continue;
            }
        };

        let old = slot.clone();

        if let Some(hook) = interceptor.as_deref_mut() {
            match hook(path, &spec, slot, proposed) {
                Ok(true) => {
                    report.applied += 1;
                    report.events.push(FieldEvent::Edited {
                        path: path.clone(),
                        old: stringify(&old),
                        new: stringify(slot),
                    });
                    continue;
                }
                Ok(false) => {}
                Err(reason) => {
                    report.reject(path, reason);
                    continue;
                }
            }
        }

        let coerced = match coerce(spec.kind, proposed) {
            Ok(value) => value,
            Err(reason) => {
                report.reject(path, reason);
                continue;
            }
        };

        if spec.kind == FieldKind::StrList {
            diff_sequence(path, &old, &coerced, &mut report.events);
        } else {
            report.events.push(FieldEvent::Edited {
                path: path.clone(),
                old: stringify(&old),
                new: stringify(&coerced),
            });
        }

        *slot = coerced;
        report.applied += 1;
    }

    report
}

/// Navigate a dotted path to the addressed slot. Paths address fields that
/// exist in the serialized object; nothing is created along the way.
fn resolve_path_mut<'v>(root: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    let mut current = root;

    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }

    Some(current)
}

/// Coerce a proposed wire value to the field's semantic type.
fn coerce(kind: FieldKind, proposed: &Value) -> std::result::Result<Value, String> {
    let ok = match kind {
        FieldKind::Str => proposed.is_string(),
        FieldKind::Int => proposed.as_i64().is_some(),
        FieldKind::Bool => proposed.is_boolean(),
        FieldKind::StrList => proposed
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        FieldKind::Object => proposed.is_object(),
    };

    if ok {
        Ok(proposed.clone())
    } else {
        Err(format!("expected {kind}"))
    }
}

/// Emit append/remove events for a sequence assignment by value-set
/// difference. Added elements are indexed by their position in the new
/// list, removed elements by their position in the old one.
fn diff_sequence(path: &str, old: &Value, new: &Value, events: &mut Vec<FieldEvent>) {
    let old_items = str_items(old);
    let new_items = str_items(new);

    for (index, item) in new_items.iter().enumerate() {
        if !old_items.contains(item) {
            events.push(FieldEvent::Appended {
                path: format!("{path}[{index}]"),
                value: item.clone(),
            });
        }
    }

    for (index, item) in old_items.iter().enumerate() {
        if !new_items.contains(item) {
            events.push(FieldEvent::Removed {
                path: format!("{path}[{index}]"),
                value: item.clone(),
            });
        }
    }
}

fn str_items(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Audit representation of a JSON value: bare strings stay unquoted, the
/// rest uses compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
