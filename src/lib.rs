pub mod audit;
pub mod auth;
pub mod cli;
pub mod entity;
pub mod error;
pub mod ident;
pub mod lifecycle;
pub mod schema;
pub mod service;
pub mod storage;
pub mod update;

pub use error::{GreenroomError, Result};
pub use service::ContentService;
pub use storage::{MemoryStore, ObjectStore, SqliteStore};
