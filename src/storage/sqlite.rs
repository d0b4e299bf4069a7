use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{ObjectIter, ObjectStore};
use crate::error::{GreenroomError, Result};

const GREENROOM_DIR: &str = ".greenroom";
const OBJECTS_DB: &str = "objects.db";

/// How many rows a scan fetches per page.
const SCAN_PAGE_SIZE: usize = 256;

/// SQLite-backed object store.
///
/// One generic `objects` table keyed by (type_name, id) with a JSON body
/// column. The connection sits behind a mutex so the store can be shared
/// across request threads; each statement is its own transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl SqliteStore {
    /// Initialize a new greenroom store under `root`.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(GREENROOM_DIR);

        if dir.exists() {
            return Err(GreenroomError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        Self::open_db(dir.join(OBJECTS_DB))
    }

    /// Open an existing greenroom store under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(GREENROOM_DIR).join(OBJECTS_DB);

        if !path.exists() {
            return Err(GreenroomError::NotInitialized);
        }

        Self::open_db(path)
    }

    fn open_db(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS objects (
                type_name TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (type_name, id)
            )",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means another thread panicked mid-statement;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch one page of bodies with IDs strictly greater than `after`.
    fn scan_page(&self, type_name: &str, after: Option<&str>) -> Result<Vec<(String, Value)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, body FROM objects
             WHERE type_name = ?1 AND id > ?2
             ORDER BY id LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![type_name, after.unwrap_or(""), SCAN_PAGE_SIZE as i64],
            |row| {
                let id: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok((id, body))
            },
        )?;

        let mut page = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let value: Value = serde_json::from_str(&body)?;
            page.push((id, value));
        }
        Ok(page)
    }
}

impl ObjectStore for SqliteStore {
    fn get(&self, type_name: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM objects WHERE type_name = ?1 AND id = ?2",
                params![type_name, id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set(&self, type_name: &str, id: &str, body: &Value) -> Result<()> {
        let json = serde_json::to_string(body)?;
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO objects (type_name, id, body) VALUES (?1, ?2, ?3)",
            params![type_name, id, json],
        )?;
        Ok(())
    }

    fn delete(&self, type_name: &str, id: &str) -> Result<bool> {
        let conn = self.lock();
        let affected = conn.execute(
            "DELETE FROM objects WHERE type_name = ?1 AND id = ?2",
            params![type_name, id],
        )?;
        Ok(affected > 0)
    }

    fn stream_all<'a>(&'a self, type_name: &str) -> Result<ObjectIter<'a>> {
        Ok(Box::new(ScanIter {
            store: self,
            type_name: type_name.to_string(),
            buffer: Vec::new(),
            last_id: None,
            done: false,
        }))
    }
}

/// Keyset-paged scan: fetches `SCAN_PAGE_SIZE` rows at a time so the full
/// table is never resident. Forward-only and not restartable.
struct ScanIter<'a> {
    store: &'a SqliteStore,
    type_name: String,
    buffer: Vec<(String, Value)>,
    last_id: Option<String>,
    done: bool,
}

impl Iterator for ScanIter<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            match self
                .store
                .scan_page(&self.type_name, self.last_id.as_deref())
            {
                Ok(page) => {
                    if page.len() < SCAN_PAGE_SIZE {
                        self.done = true;
                    }
                    if let Some((id, _)) = page.last() {
                        self.last_id = Some(id.clone());
                    }
                    // Pop from the back; reverse to keep ID order.
                    self.buffer = page;
                    self.buffer.reverse();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.buffer.pop().map(|(_, body)| Ok(body))
    }
}
