// State management module
// Handles the plant collection and its SQLite-backed persistence

pub mod book;
pub mod db;
pub mod kv;
pub mod models;
pub mod record_store;
pub mod storage;

pub use book::{BookError, ConfirmPrompt, PlantBook};
pub use db::{init_db, open_db, open_in_memory, DbConnection};
pub use kv::{KeyValueStore, SqliteKvStore, StoreError};
pub use models::{Collection, Picture, Plant, PlantId};
pub use record_store::{LogOnly, RecordStore, WriteErrorReporter, PLANTS_KEY};
