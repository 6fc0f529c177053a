//! Wire/row format of persisted notes (`cards` records).
//!
//! # Invariants
//! - `date_key` is derived from `timestamp` when a row is built and is never
//!   re-derived on read.
//! - Absent optional fields (`width`, `height`, `reply_to`,
//!   `emoji_reactions`) are stored as null.
//! - Notes decoded from rows are always fully revealed.

use crate::model::note::{Author, Note, NoteId, NotePatch, Position, Reaction, Size};
use crate::store::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted record of one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub text: String,
    pub author: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub timestamp: i64,
    pub date_key: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub reply_to: Option<String>,
    /// JSON list of `{emoji, author, timestamp}` records.
    pub emoji_reactions: Option<String>,
}

impl NoteRow {
    /// Builds a row from a note, deriving `date_key` from its timestamp.
    pub fn from_note(note: &Note) -> StoreResult<Self> {
        Ok(Self {
            id: note.id.to_string(),
            text: note.text.clone(),
            author: note.author.as_str().to_string(),
            x: note.position.x,
            y: note.position.y,
            rotation: note.rotation,
            timestamp: note.created_at,
            date_key: note.day_key().to_string(),
            width: note.size.map(|size| size.width),
            height: note.size.map(|size| size.height),
            reply_to: note.reply_to.map(|id| id.to_string()),
            emoji_reactions: encode_reactions(&note.reactions)?,
        })
    }

    /// Decodes a row into a revealed note.
    pub fn into_note(self) -> StoreResult<Note> {
        let id = parse_id(&self.id, "id")?;
        let author = Author::parse(&self.author).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid author `{}` in cards.author", self.author))
        })?;
        let reply_to = self
            .reply_to
            .as_deref()
            .map(|value| parse_id(value, "reply_to"))
            .transpose()?;
        let size = match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Size::new(width, height)),
            _ => None,
        };

        let note = Note {
            id,
            text: self.text,
            author,
            position: Position::new(self.x, self.y),
            rotation: self.rotation,
            created_at: self.timestamp,
            is_revealing: false,
            size,
            reply_to,
            reactions: decode_reactions(self.emoji_reactions.as_deref())?,
        };
        note.validate()?;
        Ok(note)
    }
}

/// Column-level update derived from a `NotePatch`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteRowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Outer `None` leaves the column untouched; inner `None` writes null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji_reactions: Option<Option<String>>,
}

impl NoteRowPatch {
    pub fn from_patch(patch: &NotePatch) -> StoreResult<Self> {
        let emoji_reactions = match patch.reactions.as_ref() {
            Some(reactions) => Some(encode_reactions(reactions)?),
            None => None,
        };
        Ok(Self {
            x: patch.position.map(|p| p.x),
            y: patch.position.map(|p| p.y),
            width: patch.size.map(|s| s.width),
            height: patch.size.map(|s| s.height),
            emoji_reactions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.emoji_reactions.is_none()
    }
}

fn encode_reactions(reactions: &[Reaction]) -> StoreResult<Option<String>> {
    if reactions.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(reactions)?))
}

fn decode_reactions(value: Option<&str>) -> StoreResult<Vec<Reaction>> {
    match value {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(Vec::new()),
    }
}

fn parse_id(value: &str, column: &str) -> StoreResult<NoteId> {
    Uuid::parse_str(value).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{value}` in cards.{column}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{NoteRow, NoteRowPatch};
    use crate::model::note::{Author, Note, NotePatch, Position, Reaction, Size};
    use crate::store::StoreError;

    #[test]
    fn row_nulls_absent_optionals_and_derives_date_key() {
        let note = Note::new(Author::Xu, "hi", Position::new(1.0, 2.0), 1_700_000_000_000);
        let row = NoteRow::from_note(&note).unwrap();
        assert_eq!(row.width, None);
        assert_eq!(row.reply_to, None);
        assert_eq!(row.emoji_reactions, None);
        assert_eq!(row.date_key, note.day_key().to_string());
        assert_eq!(row.author, "xu");
    }

    #[test]
    fn decoded_rows_are_revealed_and_keep_reactions() {
        let mut note = Note::new(Author::Ziji, "hi", Position::new(1.0, 2.0), 5)
            .with_size(Size::new(280.0, 200.0));
        note.reactions.push(Reaction {
            emoji: "\u{1f525}".to_string(),
            author: Author::Xu,
            timestamp: 9,
        });
        let decoded = NoteRow::from_note(&note).unwrap().into_note().unwrap();
        assert!(!decoded.is_revealing);
        assert_eq!(decoded.reactions, note.reactions);
        assert_eq!(decoded.size, note.size);
    }

    #[test]
    fn decoding_rejects_unknown_author() {
        let note = Note::new(Author::Ziji, "hi", Position::new(0.0, 0.0), 5);
        let mut row = NoteRow::from_note(&note).unwrap();
        row.author = "mallory".to_string();
        assert!(matches!(row.into_note(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn row_patch_serializes_only_present_columns() {
        let patch = NoteRowPatch::from_patch(&NotePatch::position(Position::new(3.0, 4.0))).unwrap();
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "x": 3.0, "y": 4.0 }));
    }
}
