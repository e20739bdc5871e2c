//! Binding Store
//!
//! Durable per-Binding persistence. `JsonFileStore` keeps one JSON document
//! keyed by world-instance identity with the opaque controller bytes
//! hex-encoded; `MemoryStore` backs tests and can be told to fail writes.
//!
//! `JsonFileStore::save` never touches the disk itself. The in-memory records
//! are authoritative and every save queues the whole document for a writer
//! thread, which coalesces bursts and reports failures on the next save.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::binding::BindingSnapshot;
use crate::world::instance::WorldKey;

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded.
    #[error("Store document invalid: {0}")]
    Json(#[from] serde_json::Error),

    /// A record's controller bytes are not valid hex.
    #[error("Corrupt record for {key}: {reason}")]
    CorruptRecord {
        /// World key of the record.
        key: String,
        /// What was wrong.
        reason: String,
    },

    /// Controller state could not be encoded.
    #[error(transparent)]
    State(#[from] crate::game::controller::StateError),

    /// Store refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// An earlier queued document could not be written.
    #[error("Store write failed: {0}")]
    WriteFailed(String),
}

/// Durable storage for binding snapshots.
pub trait BindingStore: Send {
    /// Read the record for `key`, if one exists.
    fn load(&self, key: &WorldKey) -> Result<Option<BindingSnapshot>, StoreError>;

    /// Replace the record for `key`.
    fn save(&mut self, key: &WorldKey, snapshot: &BindingSnapshot) -> Result<(), StoreError>;
}

// =============================================================================
// JSON FILE STORE
// =============================================================================

/// One record in the JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    active_variant_id: i64,
    controller_state: String,
    saved_at: DateTime<Utc>,
}

/// Whole-document JSON store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<String, StoredRecord>,
    writer: DocumentWriter,
}

impl JsonFileStore {
    /// Open the document at `path`; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened binding store {} with {} records", path.display(), records.len());
        let writer = DocumentWriter::spawn(path.clone())?;
        Ok(Self { path, records, writer })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When `key` was last saved.
    pub fn saved_at(&self, key: &WorldKey) -> Option<DateTime<Utc>> {
        self.records.get(key.as_str()).map(|r| r.saved_at)
    }

    /// Block until every queued document is on disk.
    ///
    /// Uses a plain blocking wait, so call it from synchronous code or
    /// `spawn_blocking`.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.writer.flush()
    }
}

impl BindingStore for JsonFileStore {
    fn load(&self, key: &WorldKey) -> Result<Option<BindingSnapshot>, StoreError> {
        let Some(record) = self.records.get(key.as_str()) else {
            return Ok(None);
        };
        let controller_state = hex::decode(&record.controller_state).map_err(|e| StoreError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(BindingSnapshot {
            active_variant_id: record.active_variant_id,
            controller_state,
        }))
    }

    fn save(&mut self, key: &WorldKey, snapshot: &BindingSnapshot) -> Result<(), StoreError> {
        let earlier_failure = self.writer.take_failure();

        self.records.insert(
            key.to_string(),
            StoredRecord {
                active_variant_id: snapshot.active_variant_id,
                controller_state: hex::encode(&snapshot.controller_state),
                saved_at: Utc::now(),
            },
        );
        self.writer.submit(serde_json::to_string_pretty(&self.records)?)?;

        match earlier_failure {
            Some(reason) => Err(StoreError::WriteFailed(reason)),
            None => Ok(()),
        }
    }
}

// =============================================================================
// DOCUMENT WRITER
// =============================================================================

#[derive(Debug)]
enum WriteRequest {
    Document(String),
    Flush(std_mpsc::SyncSender<Option<String>>),
}

/// Background thread that owns all writes of one document.
#[derive(Debug)]
struct DocumentWriter {
    tx: Option<mpsc::UnboundedSender<WriteRequest>>,
    failure: Arc<Mutex<Option<String>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DocumentWriter {
    fn spawn(path: PathBuf) -> Result<Self, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let failure = Arc::new(Mutex::new(None));
        let shared = Arc::clone(&failure);
        let thread = thread::Builder::new()
            .name("binding-store-writer".into())
            .spawn(move || run_writer(path, rx, shared))?;
        Ok(Self { tx: Some(tx), failure, thread: Some(thread) })
    }

    fn submit(&self, text: String) -> Result<(), StoreError> {
        self.send(WriteRequest::Document(text))
    }

    fn flush(&self) -> Result<(), StoreError> {
        let (reply_tx, reply_rx) = std_mpsc::sync_channel(1);
        self.send(WriteRequest::Flush(reply_tx))?;
        match reply_rx.recv() {
            Ok(None) => Ok(()),
            Ok(Some(reason)) => Err(StoreError::WriteFailed(reason)),
            Err(_) => Err(StoreError::Unavailable("writer stopped".into())),
        }
    }

    fn take_failure(&self) -> Option<String> {
        lock_failure(&self.failure).take()
    }

    fn send(&self, request: WriteRequest) -> Result<(), StoreError> {
        self.tx
            .as_ref()
            .and_then(|tx| tx.send(request).ok())
            .ok_or_else(|| StoreError::Unavailable("writer stopped".into()))
    }
}

impl Drop for DocumentWriter {
    fn drop(&mut self) {
        // closing the queue lets the writer finish what is pending
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Binding store writer panicked");
            }
        }
    }
}

fn lock_failure(failure: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteRequest>, failure: Arc<Mutex<Option<String>>>) {
    let mut last_error: Option<String> = None;

    while let Some(request) = rx.blocking_recv() {
        let mut latest = None;
        let mut waiting = Vec::new();
        let mut next = Some(request);
        while let Some(request) = next {
            match request {
                WriteRequest::Document(text) => latest = Some(text),
                WriteRequest::Flush(reply) => waiting.push(reply),
            }
            next = rx.try_recv().ok();
        }

        if let Some(text) = latest {
            last_error = match write_document(&path, &text) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Failed to write binding store {}: {}", path.display(), e);
                    *lock_failure(&failure) = Some(e.to_string());
                    Some(e.to_string())
                }
            };
        }
        for reply in waiting {
            let _ = reply.send(last_error.clone());
        }
    }
    debug!("Binding store writer for {} stopped", path.display());
}

fn write_document(path: &Path, text: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    records: BTreeMap<WorldKey, BindingSnapshot>,
    fail_writes: bool,
    writes: u64,
}

/// In-memory store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Current record for `key`.
    pub fn record(&self, key: &WorldKey) -> Option<BindingSnapshot> {
        self.lock().records.get(key).cloned()
    }

    /// Seed a record directly.
    pub fn insert(&self, key: WorldKey, snapshot: BindingSnapshot) {
        self.lock().records.insert(key, snapshot);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }
}

impl BindingStore for MemoryStore {
    fn load(&self, key: &WorldKey) -> Result<Option<BindingSnapshot>, StoreError> {
        Ok(self.record(key))
    }

    fn save(&mut self, key: &WorldKey, snapshot: &BindingSnapshot) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        inner.records.insert(key.clone(), snapshot.clone());
        inner.writes += 1;
        Ok(())
    }
}
