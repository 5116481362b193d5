// Record store
// Mirrors the in-memory plant collection into the key/value store.
// Loads once at startup, writes the whole collection after every mutation.
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::kv::{KeyValueStore, StoreError};
use super::models::Collection;

/// Key the serialized collection lives under
pub const PLANTS_KEY: &str = "plants";

/// Receives write failures so they can be shown to the user
pub trait WriteErrorReporter: Send + Sync + 'static {
    fn report(&self, error: &StoreError);
}

impl<F> WriteErrorReporter for F
where
    F: Fn(&StoreError) + Send + Sync + 'static,
{
    fn report(&self, error: &StoreError) {
        self(error)
    }
}

/// Reporter that does nothing, for headless use. The writer already logs
/// every failure.
pub struct LogOnly;

impl WriteErrorReporter for LogOnly {
    fn report(&self, _error: &StoreError) {}
}

enum WriteRequest {
    Save(String),
    Flush(oneshot::Sender<()>),
}

/// Load-on-startup, save-on-change persistence for the plant collection.
///
/// Saves are queued to a single writer task and applied in submission order,
/// so the most recent mutation is always the one left in the store. A failed
/// write is reported once and never retried; the next save writes the full
/// collection again.
pub struct RecordStore<S: KeyValueStore> {
    store: Arc<S>,
    writes: mpsc::UnboundedSender<WriteRequest>,
    reporter: Arc<dyn WriteErrorReporter>,
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Start the writer task. Must be called from inside a tokio runtime.
    pub fn spawn<R: WriteErrorReporter>(store: S, reporter: R) -> Self {
        let store = Arc::new(store);
        let reporter: Arc<dyn WriteErrorReporter> = Arc::new(reporter);
        let (writes, requests) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(Arc::clone(&store), requests, Arc::clone(&reporter)));

        Self {
            store,
            writes,
            reporter,
        }
    }

    /// Read the stored collection.
    ///
    /// A missing key, a failed read or unparseable text all yield an empty
    /// collection; the failure is only logged.
    pub async fn load(&self) -> Collection {
        let text = match self.store.get_item(PLANTS_KEY).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                log::info!("No stored plants, starting empty");
                return Collection::new();
            }
            Err(e) => {
                log::warn!("Failed to read stored plants: {}", e);
                return Collection::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(collection) => collection,
            Err(e) => {
                log::warn!("Stored plants are not valid JSON, starting empty: {}", e);
                Collection::new()
            }
        }
    }

    /// Queue a write of the full collection. Never blocks.
    pub fn save(&self, collection: &Collection) {
        log::debug!("Storing plants ({} records)", collection.len());

        let text = match serde_json::to_string(collection) {
            Ok(text) => text,
            Err(e) => {
                let error = StoreError::Unavailable(format!("failed to serialize plants: {}", e));
                log::error!("{}", error);
                self.reporter.report(&error);
                return;
            }
        };

        if self.writes.send(WriteRequest::Save(text)).is_err() {
            let error = StoreError::Unavailable("store writer stopped".to_string());
            log::error!("{}", error);
            self.reporter.report(&error);
        }
    }

    /// Wait until every save queued so far has been attempted
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writes.send(WriteRequest::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer<S: KeyValueStore>(
    store: Arc<S>,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
    reporter: Arc<dyn WriteErrorReporter>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            WriteRequest::Save(text) => {
                if let Err(e) = store.set_item(PLANTS_KEY, text).await {
                    log::error!("Failed to store plants: {}", e);
                    reporter.report(&e);
                }
            }
            WriteRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
