mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde_json::Value;

use crate::entity::Record;
use crate::error::{GreenroomError, Result};

/// Lazy, forward-only scan over all objects of one type.
///
/// A scan holds no point-in-time snapshot: writes that commit while the
/// scan is running may or may not be observed. Request a fresh scan to
/// re-read.
pub type ObjectIter<'a> = Box<dyn Iterator<Item = Result<Value>> + 'a>;

/// Opaque key/value object store addressed by (type name, ID).
///
/// The storage engine behind this trait is an external collaborator; this
/// crate ships `SqliteStore` as the default and `MemoryStore` for tests.
/// Implementations must be safe to call from multiple threads; a single
/// `set` is atomic but no cross-key transaction is offered.
pub trait ObjectStore: Send + Sync {
    /// Fetch one object, `None` if absent.
    fn get(&self, type_name: &str, id: &str) -> Result<Option<Value>>;

    /// Insert or replace one object.
    fn set(&self, type_name: &str, id: &str, body: &Value) -> Result<()>;

    /// Remove one object. Returns whether it existed.
    fn delete(&self, type_name: &str, id: &str) -> Result<bool>;

    /// Scan all objects of one type in unspecified order.
    fn stream_all<'a>(&'a self, type_name: &str) -> Result<ObjectIter<'a>>;
}

/// Fetch and deserialize a record, erroring if absent.
pub fn get_record<T: Record>(store: &dyn ObjectStore, id: &str) -> Result<T> {
    match store.get(T::TYPE_NAME, id)? {
        Some(body) => Ok(serde_json::from_value(body)?),
        None => Err(GreenroomError::NotFound {
            object_type: T::TYPE_NAME.to_string(),
            id: id.to_string(),
        }),
    }
}

/// Fetch and deserialize a record, `None` if absent.
pub fn find_record<T: Record>(store: &dyn ObjectStore, id: &str) -> Result<Option<T>> {
    match store.get(T::TYPE_NAME, id)? {
        Some(body) => Ok(Some(serde_json::from_value(body)?)),
        None => Ok(None),
    }
}

/// Serialize and persist a record under its own type name and ID.
pub fn save_record<T: Record>(store: &dyn ObjectStore, record: &T) -> Result<()> {
    let body = serde_json::to_value(record)?;
    store.set(T::TYPE_NAME, record.id(), &body)
}
