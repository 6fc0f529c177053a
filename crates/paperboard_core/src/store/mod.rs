//! Note store contract, change feed and implementations.
//!
//! # Responsibility
//! - Define the async persistence contract consumed by the board controller.
//! - Define the realtime change feed shape shared by every backend.
//! - Keep wire/row mapping and SQL details behind the store boundary.
//!
//! # Invariants
//! - `list()` is ordered by creation timestamp ascending.
//! - Every committed write is published on the change feed exactly once.
//! - A subscriber that falls behind is told so instead of silently missing
//!   changes.
//! - Store APIs report semantic errors (`NotFound`) in addition to transport
//!   errors; they never panic.

pub mod sqlite;
pub mod wire;

use crate::db::DbError;
use crate::model::note::{Note, NoteId, NotePatch, NoteValidationError};
use async_trait::async_trait;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast;

pub use sqlite::SqliteNoteStore;
pub use wire::{NoteRow, NoteRowPatch};

const CHANGE_FEED_CAPACITY: usize = 256;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence error for note store operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
    Json(serde_json::Error),
    /// Backend unreachable or refused the request.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Json(err) => write!(f, "reaction encoding failed: {err}"),
            Self::Unavailable(message) => write!(f, "note store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<NoteValidationError> for StoreError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Change pushed by the store's realtime feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Note),
    Update(Note),
    Delete(NoteId),
}

impl ChangeEvent {
    pub fn note_id(&self) -> NoteId {
        match self {
            Self::Insert(note) | Self::Update(note) => note.id,
            Self::Delete(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// One item received from a change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// The receiver fell behind and `skipped` changes were overwritten.
    /// Local state must be rebuilt from `NoteStore::list`.
    Lagged { skipped: u64 },
}

/// Receiving side of a store change feed.
///
/// Dropping the feed unsubscribes it.
pub struct ChangeFeed {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next item; `None` once the store side is gone.
    pub async fn next(&mut self) -> Option<FeedItem> {
        match self.receiver.recv().await {
            Ok(event) => Some(FeedItem::Change(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("event=feed_lagged module=store status=error skipped={skipped}");
                Some(FeedItem::Lagged { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Sending side used by store implementations to publish changes.
#[derive(Debug, Clone)]
pub struct ChangePublisher {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangePublisher {
    fn default() -> Self {
        Self::with_capacity(CHANGE_FEED_CAPACITY)
    }
}

impl ChangePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher keeping at most `capacity` unread changes per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes one change; having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Async persistence contract for board notes.
#[async_trait]
pub trait NoteStore: Send + Sync + 'static {
    /// All notes ordered by creation timestamp ascending.
    async fn list(&self) -> StoreResult<Vec<Note>>;
    /// Persists a new note and returns its canonical stored form.
    async fn create(&self, note: &Note) -> StoreResult<Note>;
    /// Persists the patch's fields and returns the stored note.
    async fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<Note>;
    async fn delete(&self, id: NoteId) -> StoreResult<()>;
    /// Opens a realtime change feed.
    fn subscribe(&self) -> StoreResult<ChangeFeed>;
}
