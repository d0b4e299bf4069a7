use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::audit::{Action, AuditEntry};
use crate::entity::{
    avatar_interceptor, AvatarHook, Group, Person, Record, Settings, SoundTrack, Work,
};
use crate::error::{GreenroomError, Result};
use crate::ident;
use crate::service::ContentService;
use crate::storage::{self, SqliteStore};
use crate::update::{self, ApplyReport};

/// Find the project root by looking for .greenroom/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(".greenroom").exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

fn open_service() -> Result<ContentService> {
    let root = find_project_root();
    let store = SqliteStore::open(&root)?;
    Ok(ContentService::new(Arc::new(store)))
}

/// Avatar pipeline stand-in for the CLI: the real refresh runs elsewhere.
struct LoggingAvatarHook;

impl AvatarHook for LoggingAvatarHook {
    fn refresh_avatar(&self, user_id: &str) {
        tracing::info!(user_id, "avatar refresh queued");
    }
}

/// Parse repeated `path=value` arguments. Values are parsed as JSON with a
/// bare-string fallback, so `year=1998` is a number and `name=Jo` a string.
fn parse_set(entries: &[String]) -> Result<Map<String, Value>> {
    let mut updates = Map::new();

    for entry in entries {
        let (path, raw) = entry.split_once('=').ok_or_else(|| {
            GreenroomError::Validation(format!("Invalid --set '{entry}': expected PATH=VALUE"))
        })?;

        let value = serde_json::from_str(raw).unwrap_or(Value::String(raw.to_string()));
        updates.insert(path.to_string(), value);
    }

    Ok(updates)
}

fn str_list(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn canonical_type(type_name: &str) -> Result<&'static str> {
    match type_name.to_lowercase().as_str() {
        "group" => Ok(Group::TYPE_NAME),
        "person" => Ok(Person::TYPE_NAME),
        "soundtrack" => Ok(SoundTrack::TYPE_NAME),
        "work" => Ok(Work::TYPE_NAME),
        "settings" => Ok(Settings::TYPE_NAME),
        other => Err(GreenroomError::InvalidContentType(other.to_string())),
    }
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let _store = SqliteStore::init(&root)?;

    println!("Initialized greenroom store in {}", root.display());
    Ok(())
}

pub fn handle_create(
    type_name: String,
    actor: String,
    set: Vec<String>,
    tags: Vec<String>,
    media: Vec<String>,
    json: bool,
) -> Result<()> {
    let service = open_service()?;
    let mut initial = parse_set(&set)?;

    let canonical = canonical_type(&type_name)?;

    if !tags.is_empty() {
        let key = if canonical == Work::TYPE_NAME {
            "genres"
        } else {
            "tags"
        };
        initial.insert(key.to_string(), str_list(&tags));
    }

    if !media.is_empty() {
        initial.insert("media".to_string(), str_list(&media));
    }

    let actor = Some(actor.as_str());

    let (id, report) = match canonical {
        "Group" => service.create::<Group>(actor, &initial)?,
        "Person" => service.create::<Person>(actor, &initial)?,
        "SoundTrack" => service.create::<SoundTrack>(actor, &initial)?,
        "Work" => create_work(&service, actor, &initial)?,
        "Settings" => create_settings(&service, actor, &initial)?,
        _ => unreachable!(),
    };

    for rejection in &report.rejected {
        eprintln!("Warning: {} rejected: {}", rejection.path, rejection.reason);
    }
    print_report_warnings(&report);

    if json {
        let body = service.store().get(canonical, &id)?.unwrap_or(Value::Null);
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Created {canonical} {id}");
    }

    Ok(())
}

/// Works are catalog entries: created published, outside the draft
/// lifecycle, so they bypass the slot machinery.
fn create_work(
    service: &ContentService,
    actor: Option<&str>,
    initial: &Map<String, Value>,
) -> Result<(String, ApplyReport)> {
    let actor = crate::auth::require_actor(actor)?;
    let now = ident::date_time_utc();

    let mut work = Work {
        id: ident::generate_id(),
        ..Work::default()
    };
    work.creator.created = now.clone();
    work.creator.created_by = actor.to_string();
    work.editor.edited = now;
    work.editor.edited_by = actor.to_string();

    let mut body = serde_json::to_value(&work)?;
    let report = update::apply_updates(&mut body, Work::schema(), initial, None);
    let work: Work = serde_json::from_value(body)?;

    storage::save_record(service.store(), &work)?;

    let entry = AuditEntry::new(actor, Action::Create, Work::TYPE_NAME, &work.id, "", "", "");
    if let Err(e) = service.audit().record(&entry) {
        eprintln!("Warning: audit entry not recorded: {e}");
    }

    Ok((work.id, report))
}

fn create_settings(
    service: &ContentService,
    actor: Option<&str>,
    initial: &Map<String, Value>,
) -> Result<(String, ApplyReport)> {
    let actor = crate::auth::require_actor(actor)?;

    let settings = Settings::new(actor);
    storage::save_record(service.store(), &settings)?;

    let report = if initial.is_empty() {
        ApplyReport::default()
    } else {
        let hook = LoggingAvatarHook;
        let mut interceptor = avatar_interceptor(actor, &hook);
        service.apply_updates::<Settings>(Some(actor), actor, initial, Some(&mut interceptor))?
    };

    Ok((actor.to_string(), report))
}

pub fn handle_update(
    type_name: String,
    id: String,
    actor: String,
    set: Vec<String>,
    tags: Vec<String>,
    json: bool,
) -> Result<()> {
    let service = open_service()?;
    let mut updates = parse_set(&set)?;

    let canonical = canonical_type(&type_name)?;

    if !tags.is_empty() {
        let key = if canonical == Work::TYPE_NAME {
            "genres"
        } else {
            "tags"
        };
        updates.insert(key.to_string(), str_list(&tags));
    }

    let actor = Some(actor.as_str());

    let report = match canonical {
        "Group" => service.apply_updates::<Group>(actor, &id, &updates, None)?,
        "Person" => service.apply_updates::<Person>(actor, &id, &updates, None)?,
        "SoundTrack" => service.apply_updates::<SoundTrack>(actor, &id, &updates, None)?,
        "Work" => service.apply_updates::<Work>(actor, &id, &updates, None)?,
        "Settings" => {
            let hook = LoggingAvatarHook;
            let user = actor.unwrap_or_default().to_string();
            let mut interceptor = avatar_interceptor(&user, &hook);
            service.apply_updates::<Settings>(actor, &id, &updates, Some(&mut interceptor))?
        }
        _ => unreachable!(),
    };

    if json {
        let rejected: Vec<Value> = report
            .rejected
            .iter()
            .map(|r| json!({"path": r.path, "reason": r.reason}))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "applied": report.applied,
                "rejected": rejected,
                "warnings": report.warnings,
            }))?
        );
    } else {
        println!("Applied {} update(s)", report.applied);
        for rejection in &report.rejected {
            println!("Rejected {}: {}", rejection.path, rejection.reason);
        }
        print_report_warnings(&report);
    }

    Ok(())
}

fn print_report_warnings(report: &ApplyReport) {
    for warning in &report.warnings {
        eprintln!("Warning: {warning}");
    }
}

pub fn handle_publish(type_name: String, id: String, actor: String) -> Result<()> {
    let service = open_service()?;
    let actor = Some(actor.as_str());

    match canonical_type(&type_name)? {
        "Group" => service.publish::<Group>(actor, &id)?,
        "Person" => service.publish::<Person>(actor, &id)?,
        "SoundTrack" => service.publish::<SoundTrack>(actor, &id)?,
        other => return Err(GreenroomError::InvalidContentType(other.to_string())),
    }

    println!("Published {id}");
    Ok(())
}

pub fn handle_unpublish(type_name: String, id: String, actor: String) -> Result<()> {
    let service = open_service()?;
    let actor = Some(actor.as_str());

    match canonical_type(&type_name)? {
        "Group" => service.unpublish::<Group>(actor, &id)?,
        "Person" => service.unpublish::<Person>(actor, &id)?,
        "SoundTrack" => service.unpublish::<SoundTrack>(actor, &id)?,
        other => return Err(GreenroomError::InvalidContentType(other.to_string())),
    }

    println!("Unpublished {id}");
    Ok(())
}

pub fn handle_delete(type_name: String, id: String, actor: String) -> Result<()> {
    let service = open_service()?;
    let actor = Some(actor.as_str());

    match canonical_type(&type_name)? {
        "Group" => service.delete_postable::<Group>(actor, &id)?,
        "Person" => service.delete_postable::<Person>(actor, &id)?,
        "SoundTrack" => service.delete::<SoundTrack>(actor, &id)?,
        other => return Err(GreenroomError::InvalidContentType(other.to_string())),
    }

    println!("Deleted {id}");
    Ok(())
}

pub fn handle_join(id: String, actor: String) -> Result<()> {
    let service = open_service()?;
    service.join::<Group>(Some(&actor), &id)?;
    println!("{actor} joined {id}");
    Ok(())
}

pub fn handle_leave(id: String, actor: String) -> Result<()> {
    let service = open_service()?;
    service.leave::<Group>(Some(&actor), &id)?;
    println!("{actor} left {id}");
    Ok(())
}

pub fn handle_get(type_name: String, id: String, json: bool) -> Result<()> {
    let service = open_service()?;
    let canonical = canonical_type(&type_name)?;

    let body = service
        .store()
        .get(canonical, &id)?
        .ok_or_else(|| GreenroomError::NotFound {
            object_type: canonical.to_string(),
            id: id.clone(),
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{canonical} {id}");
        println!("  {}", display_line(&body));
    }

    Ok(())
}

pub fn handle_list(type_name: String, json: bool) -> Result<()> {
    let service = open_service()?;
    let canonical = canonical_type(&type_name)?;

    let mut bodies = Vec::new();
    for body in service.store().stream_all(canonical)? {
        let body = body?;
        // Drafts are invisible to general listing.
        if body.get("isDraft").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        bodies.push(body);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&bodies)?);
    } else {
        for body in &bodies {
            let id = body.get("id").and_then(Value::as_str).unwrap_or("?");
            println!("{id}  {}", display_line(body));
        }
        println!("{} {}(s)", bodies.len(), type_name.to_lowercase());
    }

    Ok(())
}

fn display_line(body: &Value) -> String {
    for key in ["title", "name", "theme"] {
        match body.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Object(name)) => {
                if let Some(Value::String(first)) = name.get("first") {
                    return first.clone();
                }
            }
            _ => {}
        }
    }
    String::new()
}

pub fn handle_log(type_name: Option<String>, actor: Option<String>, json: bool) -> Result<()> {
    let service = open_service()?;
    let log = service.audit();

    let type_filter = type_name.map(|t| canonical_type(&t)).transpose()?;

    let entries = log.filter(|entry| {
        type_filter.map_or(true, |t| entry.object_type == t)
            && actor.as_deref().map_or(true, |a| entry.user_id == a)
    })?;

    if json {
        let rows: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut row = serde_json::to_value(entry).unwrap_or(Value::Null);
                if let Some(map) = row.as_object_mut() {
                    map.insert("score".to_string(), json!(log.entry_score(entry)));
                }
                row
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for entry in &entries {
            let score = log.entry_score(entry);
            let key = if entry.key.is_empty() { "-" } else { &entry.key };
            println!(
                "{}  {}  {}:{}  {}  '{}' -> '{}'  (+{})",
                entry.created,
                entry.action,
                entry.object_type,
                entry.object_id,
                key,
                entry.old_value,
                entry.new_value,
                score
            );
        }
        println!("{} entr(ies)", entries.len());
    }

    Ok(())
}
