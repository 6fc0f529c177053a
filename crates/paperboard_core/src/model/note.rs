//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its mutable patch shape.
//! - Provide validation and merge helpers used by board and store layers.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `is_revealing` is local-only state and is never persisted as `true`.
//! - `reactions` is append-only from the board's point of view.

use crate::model::day::DayKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every note on the board.
pub type NoteId = Uuid;

/// Emoji offered by the reaction picker, in display order.
pub const REACTION_PALETTE: [&str; 10] = [
    "\u{2764}\u{fe0f}",
    "\u{1f60a}",
    "\u{1f44d}",
    "\u{1f389}",
    "\u{1f602}",
    "\u{1f914}",
    "\u{1f4a1}",
    "\u{2728}",
    "\u{1f525}",
    "\u{1f440}",
];

/// Participant identity owning a note or reaction.
///
/// Closed set: the board is shared by exactly these participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    Ziji,
    Xu,
}

impl Author {
    /// All known participants in stable order.
    pub const ALL: [Author; 2] = [Author::Ziji, Author::Xu];

    /// Returns the storage/wire name of this participant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ziji => "ziji",
            Self::Xu => "xu",
        }
    }

    /// Parses a storage/wire name, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ziji" => Some(Self::Ziji),
            "xu" => Some(Self::Xu),
            _ => None,
        }
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point in world coordinates (pan-invariant board space).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    pub fn minus(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }

    /// Component-wise sum `self + other`.
    pub fn plus(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Measured layout size of a rendered note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One emoji reaction left on a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub author: Author,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

/// Validation failures for note records.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteValidationError {
    EmptyText,
    NonFinitePosition { x: f64, y: f64 },
    NonFiniteRotation(f64),
    InvalidSize { width: f64, height: f64 },
    EmptyEmoji,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "note text must not be empty"),
            Self::NonFinitePosition { x, y } => {
                write!(f, "note position must be finite, got ({x}, {y})")
            }
            Self::NonFiniteRotation(value) => {
                write!(f, "note rotation must be finite, got {value}")
            }
            Self::InvalidSize { width, height } => write!(
                f,
                "note size must be finite and positive, got {width}x{height}"
            ),
            Self::EmptyEmoji => write!(f, "reaction emoji must not be empty"),
        }
    }
}

impl Error for NoteValidationError {}

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub text: String,
    pub author: Author,
    pub position: Position,
    /// Degrees; cosmetic only.
    pub rotation: f64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// True while the typewriter reveal runs. Never persisted.
    #[serde(skip)]
    pub is_revealing: bool,
    /// Absent until the first measurement after reveal.
    pub size: Option<Size>,
    pub reply_to: Option<NoteId>,
    pub reactions: Vec<Reaction>,
}

impl Note {
    /// Creates a freshly composed note with a generated id.
    ///
    /// The note starts revealing; rotation defaults to zero.
    pub fn new(
        author: Author,
        text: impl Into<String>,
        position: Position,
        created_at: i64,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), author, text, position, created_at)
    }

    /// Creates a note with a caller-provided id.
    ///
    /// Used by storage and tests where identity already exists.
    pub fn with_id(
        id: NoteId,
        author: Author,
        text: impl Into<String>,
        position: Position,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            author,
            position,
            rotation: 0.0,
            created_at,
            is_revealing: true,
            size: None,
            reply_to: None,
            reactions: Vec::new(),
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn replying_to(mut self, parent: Option<NoteId>) -> Self {
        self.reply_to = parent;
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Marks the note as fully revealed, as notes loaded from storage are.
    pub fn revealed(mut self) -> Self {
        self.is_revealing = false;
        self
    }

    /// Calendar day this note belongs to, in the local timezone.
    pub fn day_key(&self) -> DayKey {
        DayKey::from_timestamp_ms(self.created_at)
    }

    /// Center point, available only once the note has been measured.
    pub fn center(&self) -> Option<Position> {
        self.size.map(|size| {
            Position::new(
                self.position.x + size.width / 2.0,
                self.position.y + size.height / 2.0,
            )
        })
    }

    /// Validates persisted-field invariants.
    ///
    /// # Errors
    /// - Empty (whitespace-only) text.
    /// - Non-finite position or rotation.
    /// - Non-finite or non-positive size.
    /// - Reaction with an empty emoji.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.text.trim().is_empty() {
            return Err(NoteValidationError::EmptyText);
        }
        if !self.position.is_finite() {
            return Err(NoteValidationError::NonFinitePosition {
                x: self.position.x,
                y: self.position.y,
            });
        }
        if !self.rotation.is_finite() {
            return Err(NoteValidationError::NonFiniteRotation(self.rotation));
        }
        if let Some(size) = self.size {
            if !size.is_valid() {
                return Err(NoteValidationError::InvalidSize {
                    width: size.width,
                    height: size.height,
                });
            }
        }
        if self.reactions.iter().any(|r| r.emoji.trim().is_empty()) {
            return Err(NoteValidationError::EmptyEmoji);
        }
        Ok(())
    }

    /// Applies mutable fields from a patch in place.
    pub fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = Some(size);
        }
        if let Some(reactions) = patch.reactions.as_ref() {
            self.reactions = reactions.clone();
        }
    }

    /// Merges a remote copy of this note into the local record.
    ///
    /// Persisted fields take the remote value. `is_revealing` stays local and
    /// an unmeasured remote size never erases a local measurement.
    pub fn merge_remote(&mut self, remote: &Note) {
        let is_revealing = self.is_revealing;
        let local_size = self.size;
        *self = remote.clone();
        self.is_revealing = is_revealing;
        self.size = remote.size.or(local_size);
    }
}

/// Partial update of a note's mutable fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotePatch {
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub reactions: Option<Vec<Reaction>>,
}

impl NotePatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn reactions(reactions: Vec<Reaction>) -> Self {
        Self {
            reactions: Some(reactions),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.size.is_none() && self.reactions.is_none()
    }

    /// Validates only the fields this patch carries.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if let Some(position) = self.position {
            if !position.is_finite() {
                return Err(NoteValidationError::NonFinitePosition {
                    x: position.x,
                    y: position.y,
                });
            }
        }
        if let Some(size) = self.size {
            if !size.is_valid() {
                return Err(NoteValidationError::InvalidSize {
                    width: size.width,
                    height: size.height,
                });
            }
        }
        if let Some(reactions) = self.reactions.as_ref() {
            if reactions.iter().any(|r| r.emoji.trim().is_empty()) {
                return Err(NoteValidationError::EmptyEmoji);
            }
        }
        Ok(())
    }
}
