// Application state
// Owns the plant collection, the current selection and the record store.
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;

use super::kv::KeyValueStore;
use super::models::{Collection, Picture, Plant, PlantId};
use super::record_store::{RecordStore, WriteErrorReporter};

pub const DELETE_PROMPT: &str = "Sure you wanna delete this?";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("Plant name must not be empty")]
    EmptyName,
    #[error("Plant not found: {0}")]
    NotFound(PlantId),
    #[error("Plant id already in use: {0}")]
    DuplicateId(PlantId),
}

pub type BookResult<T> = Result<T, BookError>;

/// Blocking yes/no gate in front of destructive actions
pub trait ConfirmPrompt {
    fn confirm(&self, message: &str) -> bool;
}

impl<F: Fn(&str) -> bool> ConfirmPrompt for F {
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// The single mutable application state.
///
/// Every mutation updates the collection first and then queues a save, so
/// the in-memory state stays authoritative even when a write fails.
pub struct PlantBook<S: KeyValueStore> {
    plants: Collection,
    selected: Option<PlantId>,
    store: RecordStore<S>,
}

impl<S: KeyValueStore> PlantBook<S> {
    /// Start the record store and load the saved collection
    pub async fn open<R: WriteErrorReporter>(store: S, reporter: R) -> Self {
        let store = RecordStore::spawn(store, reporter);
        let plants = store.load().await;
        log::info!("Loaded {} plants", plants.len());

        Self {
            plants,
            selected: None,
            store,
        }
    }

    pub fn plants(&self) -> &Collection {
        &self.plants
    }

    pub fn selected(&self) -> Option<PlantId> {
        self.selected
    }

    pub fn record_store(&self) -> &RecordStore<S> {
        &self.store
    }

    /// Register a new plant. The first plant in the book becomes selected.
    pub fn create(&mut self, name: &str) -> BookResult<Plant> {
        if name.is_empty() {
            return Err(BookError::EmptyName);
        }

        let id = self
            .plants
            .next_id(Utc::now().timestamp_millis())
            .ok_or(BookError::DuplicateId(PlantId::MAX))?;
        let plant = Plant::new(id, name.to_string());
        let was_empty = self.plants.is_empty();

        self.plants
            .push(plant.clone())
            .map_err(|rejected| BookError::DuplicateId(rejected.id))?;

        if was_empty {
            self.selected = Some(id);
        }

        log::info!("Created plant {} '{}'", id, plant.name);
        self.store.save(&self.plants);
        Ok(plant)
    }

    /// Delete a plant after the user confirms.
    ///
    /// Returns `Ok(false)` when the user declined.
    pub fn delete(&mut self, id: PlantId, prompt: &dyn ConfirmPrompt) -> BookResult<bool> {
        if !self.plants.contains(id) {
            return Err(BookError::NotFound(id));
        }

        if !prompt.confirm(DELETE_PROMPT) {
            return Ok(false);
        }

        self.remove(id)?;
        Ok(true)
    }

    /// [`delete`](Self::delete) on a book shared between handlers.
    ///
    /// The lock is only held to check and to remove, never while the prompt
    /// is open. A plant removed by someone else in between is `NotFound`.
    pub fn delete_shared(
        book: &Mutex<Self>,
        id: PlantId,
        prompt: &dyn ConfirmPrompt,
    ) -> BookResult<bool> {
        if !lock(book).plants.contains(id) {
            return Err(BookError::NotFound(id));
        }

        if !prompt.confirm(DELETE_PROMPT) {
            return Ok(false);
        }

        lock(book).remove(id)?;
        Ok(true)
    }

    /// Remove a plant without asking. Clears the selection if it pointed there.
    pub fn remove(&mut self, id: PlantId) -> BookResult<()> {
        if self.plants.remove(id).is_none() {
            return Err(BookError::NotFound(id));
        }
        if self.selected == Some(id) {
            self.selected = None;
        }

        log::info!("Deleted plant {}", id);
        self.store.save(&self.plants);
        Ok(())
    }

    /// Append a picture to a plant. Unknown plants are left alone and
    /// reported as `NotFound`.
    pub fn append_picture(&mut self, id: PlantId, picture: Picture) -> BookResult<()> {
        if !self.plants.append_picture(id, picture) {
            log::debug!("Dropped picture for unknown plant {}", id);
            return Err(BookError::NotFound(id));
        }

        self.store.save(&self.plants);
        Ok(())
    }

    /// Select a plant's camera, or deselect it if it is already selected
    pub fn toggle_selection(&mut self, id: PlantId) -> BookResult<Option<PlantId>> {
        if !self.plants.contains(id) {
            return Err(BookError::NotFound(id));
        }

        self.selected = if self.selected == Some(id) {
            None
        } else {
            Some(id)
        };
        Ok(self.selected)
    }

    pub fn last_picture(&self, id: PlantId) -> Option<&Picture> {
        self.plants.last_picture(id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record_store::tests::FlakyStore;
    use crate::state::record_store::LogOnly;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    fn picture(data: &str) -> Picture {
        Picture {
            taken_at: Utc.timestamp_opt(1_571_133_600, 0).unwrap(),
            data: data.to_string(),
        }
    }

    async fn empty_book() -> PlantBook<Arc<FlakyStore>> {
        PlantBook::open(Arc::new(FlakyStore::default()), LogOnly).await
    }

    #[tokio::test]
    async fn test_create_first_plant() {
        let mut book = empty_book().await;
        let basil = book.create("Basil").unwrap();

        assert_eq!(book.plants().len(), 1);
        let stored = book.plants().find(basil.id).unwrap();
        assert_eq!(stored.name, "Basil");
        assert!(stored.pictures.is_empty());
        assert_eq!(book.selected(), Some(basil.id));
    }

    #[tokio::test]
    async fn test_second_plant_keeps_selection() {
        let mut book = empty_book().await;
        let basil = book.create("Basil").unwrap();
        let mint = book.create("Mint").unwrap();

        assert_ne!(basil.id, mint.id);
        assert_eq!(book.plants().len(), 2);
        assert_eq!(book.selected(), Some(basil.id));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let mut book = empty_book().await;
        assert_eq!(book.create(""), Err(BookError::EmptyName));
        assert!(book.plants().is_empty());
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let mut book = empty_book().await;
        let basil = book.create("Basil").unwrap();

        assert_eq!(book.delete(basil.id, &no), Ok(false));
        assert_eq!(book.plants().len(), 1);

        let asked = std::cell::Cell::new(None);
        let prompt = |message: &str| {
            asked.set(Some(message.to_string()));
            true
        };
        assert_eq!(book.delete(basil.id, &prompt), Ok(true));
        assert_eq!(asked.take().as_deref(), Some(DELETE_PROMPT));
        assert!(book.plants().is_empty());
        assert_eq!(book.selected(), None);
    }

    #[tokio::test]
    async fn test_delete_leaves_others_untouched() {
        let mut book = empty_book().await;
        let a = book.create("a").unwrap();
        let b = book.create("b").unwrap();
        let c = book.create("c").unwrap();
        book.append_picture(a.id, picture("a1")).unwrap();
        book.append_picture(c.id, picture("c1")).unwrap();
        book.append_picture(c.id, picture("c2")).unwrap();
        let before = book.plants().clone();

        book.delete(b.id, &yes).unwrap();

        assert_eq!(book.plants().ids(), vec![a.id, c.id]);
        assert_eq!(book.plants().find(a.id), before.find(a.id));
        assert_eq!(book.plants().find(c.id), before.find(c.id));
        assert_eq!(book.selected(), Some(a.id));
    }

    #[tokio::test]
    async fn test_delete_unknown() {
        let mut book = empty_book().await;
        assert_eq!(book.delete(42, &yes), Err(BookError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_append_picture() {
        let mut book = empty_book().await;
        let a = book.create("a").unwrap();
        let b = book.create("b").unwrap();
        book.append_picture(b.id, picture("b1")).unwrap();
        let before = book.plants().clone();

        assert_eq!(book.append_picture(a.id, picture("a1")), Ok(()));

        let after = book.plants();
        assert_eq!(after.find(a.id).unwrap().pictures.len(), 1);
        assert_eq!(after.find(b.id), before.find(b.id));
        assert_eq!(book.last_picture(a.id).unwrap().data, "a1");
    }

    #[tokio::test]
    async fn test_append_picture_unknown_plant_is_noop() {
        let mut book = empty_book().await;
        book.create("a").unwrap();
        let before = book.plants().clone();

        assert_eq!(
            book.append_picture(12345, picture("x")),
            Err(BookError::NotFound(12345))
        );
        assert_eq!(book.plants(), &before);
    }

    #[tokio::test]
    async fn test_append_picture_after_delete_is_reported() {
        let mut book = empty_book().await;
        let basil = book.create("Basil").unwrap();
        book.delete(basil.id, &yes).unwrap();

        assert_eq!(
            book.append_picture(basil.id, picture("late")),
            Err(BookError::NotFound(basil.id))
        );
        assert!(book.plants().is_empty());
    }

    #[tokio::test]
    async fn test_delete_shared_releases_lock_while_prompting() {
        let book = Arc::new(Mutex::new(empty_book().await));
        let basil = lock(&book).create("Basil").unwrap();
        let mint = lock(&book).create("Mint").unwrap();

        let other = Arc::clone(&book);
        let prompt = |_: &str| other.try_lock().is_ok();
        assert_eq!(PlantBook::delete_shared(&book, basil.id, &prompt), Ok(true));

        let book = lock(&book);
        assert_eq!(book.plants().ids(), vec![mint.id]);
        assert_eq!(book.selected(), None);
    }

    #[tokio::test]
    async fn test_delete_shared_declined_or_gone() {
        let book = Mutex::new(empty_book().await);
        let basil = lock(&book).create("Basil").unwrap();

        assert_eq!(PlantBook::delete_shared(&book, basil.id, &no), Ok(false));
        assert_eq!(lock(&book).plants().len(), 1);

        // Removed by another handler while the dialog was open
        let gone = |_: &str| {
            lock(&book).remove(basil.id).unwrap();
            true
        };
        assert_eq!(
            PlantBook::delete_shared(&book, basil.id, &gone),
            Err(BookError::NotFound(basil.id))
        );
        assert_eq!(
            PlantBook::delete_shared(&book, basil.id, &yes),
            Err(BookError::NotFound(basil.id))
        );
    }

    #[tokio::test]
    async fn test_create_when_ids_exhausted() {
        let backend = Arc::new(FlakyStore::default());
        let stored = Collection::from(vec![Plant::new(PlantId::MAX, "last".to_string())]);
        backend.items.lock().unwrap().insert(
            crate::state::record_store::PLANTS_KEY.to_string(),
            serde_json::to_string(&stored).unwrap(),
        );
        let mut book = PlantBook::open(backend, LogOnly).await;

        assert_eq!(
            book.create("Overflow"),
            Err(BookError::DuplicateId(PlantId::MAX))
        );
        assert_eq!(book.plants().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_selection() {
        let mut book = empty_book().await;
        let a = book.create("a").unwrap();
        let b = book.create("b").unwrap();

        assert_eq!(book.toggle_selection(b.id), Ok(Some(b.id)));
        assert_eq!(book.toggle_selection(b.id), Ok(None));
        assert_eq!(book.toggle_selection(a.id), Ok(Some(a.id)));
        assert_eq!(book.toggle_selection(999), Err(BookError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_mutations_reach_the_store() {
        let backend = Arc::new(FlakyStore::default());
        let mut book = PlantBook::open(Arc::clone(&backend), LogOnly).await;
        let basil = book.create("Basil").unwrap();
        book.append_picture(basil.id, picture("data:image/png;base64,AA=="))
            .unwrap();
        book.record_store().flush().await;

        let reopened = PlantBook::open(backend, LogOnly).await;
        assert_eq!(reopened.plants(), book.plants());
        assert_eq!(reopened.selected(), None);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let backend = Arc::new(FlakyStore::default());
        backend
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let mut book = PlantBook::open(Arc::clone(&backend), LogOnly).await;

        book.create("Basil").unwrap();
        book.record_store().flush().await;

        assert_eq!(book.plants().len(), 1);
        assert!(backend.items.lock().unwrap().is_empty());
    }
}
