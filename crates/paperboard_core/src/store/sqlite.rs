//! SQLite-backed note store.
//!
//! # Responsibility
//! - Implement `NoteStore` over the `cards` table.
//! - Publish a change event for every committed write so that every
//!   controller sharing this store observes remote changes.
//!
//! # Invariants
//! - Write paths validate notes/patches before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - SQL runs on the blocking pool; async callers never hold the connection.
//! - Changes are published while the connection is held, so feed order
//!   matches commit order.

use crate::db::{open_db, open_db_in_memory};
use crate::model::note::{Note, NoteId, NotePatch};
use crate::store::wire::{NoteRow, NoteRowPatch};
use crate::store::{ChangeEvent, ChangeFeed, ChangePublisher, NoteStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::spawn_blocking;

const CARD_SELECT_SQL: &str = "SELECT
    id,
    text,
    author,
    x,
    y,
    rotation,
    timestamp,
    date_key,
    width,
    height,
    reply_to,
    emoji_reactions
FROM cards";

/// Note store persisting to a migrated SQLite connection.
pub struct SqliteNoteStore {
    conn: Arc<Mutex<Connection>>,
    changes: ChangePublisher,
}

impl SqliteNoteStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: ChangePublisher::new(),
        }
    }

    /// Opens (and migrates) a board database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Keeps at most `capacity` unread changes per subscriber.
    ///
    /// Applies to feeds subscribed afterwards.
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.changes = ChangePublisher::with_capacity(capacity);
        self
    }

    /// Reads one note by id. Blocks the calling thread.
    pub fn get(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let conn = lock(&self.conn)?;
        load_note(&conn, id)
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &ChangePublisher) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let changes = self.changes.clone();
        spawn_blocking(move || {
            let conn = lock(&conn)?;
            op(&conn, &changes)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn list(&self) -> StoreResult<Vec<Note>> {
        self.blocking(|conn, _| list_rows(conn)).await
    }

    async fn create(&self, note: &Note) -> StoreResult<Note> {
        note.validate()?;
        let id = note.id;
        let row = NoteRow::from_note(note)?;
        let stored = self
            .blocking(move |conn, changes| {
                let stored = insert_row(conn, id, &row)?;
                changes.publish(ChangeEvent::Insert(stored.clone()));
                Ok(stored)
            })
            .await?;
        debug!("event=store_insert module=store status=ok note_id={}", stored.id);
        Ok(stored)
    }

    async fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<Note> {
        patch.validate()?;
        let row_patch = NoteRowPatch::from_patch(patch)?;
        let stored = self
            .blocking(move |conn, changes| {
                let stored = update_row(conn, id, row_patch)?;
                changes.publish(ChangeEvent::Update(stored.clone()));
                Ok(stored)
            })
            .await?;
        debug!("event=store_update module=store status=ok note_id={id}");
        Ok(stored)
    }

    async fn delete(&self, id: NoteId) -> StoreResult<()> {
        self.blocking(move |conn, changes| {
            delete_row(conn, id)?;
            changes.publish(ChangeEvent::Delete(id));
            Ok(())
        })
        .await?;
        debug!("event=store_delete module=store status=ok note_id={id}");
        Ok(())
    }

    fn subscribe(&self) -> StoreResult<ChangeFeed> {
        Ok(self.changes.subscribe())
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
}

fn insert_row(conn: &Connection, id: NoteId, row: &NoteRow) -> StoreResult<Note> {
    conn.execute(
        "INSERT INTO cards (
            id,
            text,
            author,
            x,
            y,
            rotation,
            timestamp,
            date_key,
            width,
            height,
            reply_to,
            emoji_reactions
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        params![
            row.id,
            row.text,
            row.author,
            row.x,
            row.y,
            row.rotation,
            row.timestamp,
            row.date_key,
            row.width,
            row.height,
            row.reply_to,
            row.emoji_reactions,
        ],
    )?;
    require_note(conn, id)
}

fn update_row(conn: &Connection, id: NoteId, row_patch: NoteRowPatch) -> StoreResult<Note> {
    if row_patch.is_empty() {
        return require_note(conn, id);
    }

    let mut assignments: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(x) = row_patch.x {
        assignments.push("x = ?");
        bind_values.push(Value::Real(x));
    }
    if let Some(y) = row_patch.y {
        assignments.push("y = ?");
        bind_values.push(Value::Real(y));
    }
    if let Some(width) = row_patch.width {
        assignments.push("width = ?");
        bind_values.push(Value::Real(width));
    }
    if let Some(height) = row_patch.height {
        assignments.push("height = ?");
        bind_values.push(Value::Real(height));
    }
    if let Some(reactions) = row_patch.emoji_reactions {
        assignments.push("emoji_reactions = ?");
        bind_values.push(reactions.map_or(Value::Null, Value::Text));
    }
    bind_values.push(Value::Text(id.to_string()));

    let sql = format!("UPDATE cards SET {} WHERE id = ?;", assignments.join(", "));
    let changed = conn.execute(&sql, params_from_iter(bind_values))?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    require_note(conn, id)
}

fn delete_row(conn: &Connection, id: NoteId) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM cards WHERE id = ?1;", [id.to_string()])?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

fn list_rows(conn: &Connection) -> StoreResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{CARD_SELECT_SQL} ORDER BY timestamp ASC, created_at ASC, id ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_card_row(row)?);
    }
    Ok(notes)
}

fn load_note(conn: &Connection, id: NoteId) -> StoreResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{CARD_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_card_row(row)?)),
        None => Ok(None),
    }
}

fn require_note(conn: &Connection, id: NoteId) -> StoreResult<Note> {
    load_note(conn, id)?.ok_or(StoreError::NotFound(id))
}

fn parse_card_row(row: &Row<'_>) -> StoreResult<Note> {
    let record = NoteRow {
        id: row.get("id")?,
        text: row.get("text")?,
        author: row.get("author")?,
        x: row.get("x")?,
        y: row.get("y")?,
        rotation: row.get("rotation")?,
        timestamp: row.get("timestamp")?,
        date_key: row.get("date_key")?,
        width: row.get("width")?,
        height: row.get("height")?,
        reply_to: row.get("reply_to")?,
        emoji_reactions: row.get("emoji_reactions")?,
    };
    record.into_note()
}
