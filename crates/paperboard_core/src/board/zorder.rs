//! Overlap-aware z-order resolution.
//!
//! The note collection order is the stacking order: later entries are drawn
//! on top. A plain click only promotes a note when something drawn above it
//! actually overlaps it; a forced focus (drag start) always promotes.

use crate::model::note::{Note, NoteId, Size};

/// Axis-aligned box of a note in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    /// Box of `note`, using `fallback` until the note has been measured.
    pub fn of(note: &Note, fallback: Size) -> Self {
        let size = note.size.unwrap_or(fallback);
        Self {
            left: note.position.x,
            top: note.position.y,
            right: note.position.x + size.width,
            bottom: note.position.y + size.height,
        }
    }

    /// Closed overlap test: boxes touching at an edge overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }
}

/// Result of a focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    /// No note with that id.
    Missing,
    /// Already drawn on top of everything.
    AlreadyTop,
    /// Nothing above overlaps it; order kept.
    Unchanged,
    /// Moved to the top of the stack.
    Promoted,
}

/// Decides whether the note `id` should be promoted, without mutating.
pub fn resolve_focus(notes: &[Note], id: NoteId, force: bool, fallback: Size) -> FocusOutcome {
    let Some(index) = notes.iter().position(|note| note.id == id) else {
        return FocusOutcome::Missing;
    };
    if index + 1 == notes.len() {
        return FocusOutcome::AlreadyTop;
    }
    if force {
        return FocusOutcome::Promoted;
    }

    let target = BoundingBox::of(&notes[index], fallback);
    let covered = notes[index + 1..]
        .iter()
        .any(|above| target.overlaps(&BoundingBox::of(above, fallback)));
    if covered {
        FocusOutcome::Promoted
    } else {
        FocusOutcome::Unchanged
    }
}

/// Moves the note `id` to the end of `notes`, keeping the others' order.
pub fn move_to_top(notes: &mut Vec<Note>, id: NoteId) -> bool {
    match notes.iter().position(|note| note.id == id) {
        Some(index) => {
            let note = notes.remove(index);
            notes.push(note);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;

    fn boxed(left: f64, top: f64, right: f64, bottom: f64) -> BoundingBox {
        BoundingBox {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn touching_edges_count_as_overlap() {
        let a = boxed(0.0, 0.0, 100.0, 100.0);
        let b = boxed(100.0, 0.0, 200.0, 100.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn separated_boxes_do_not_overlap() {
        let a = boxed(0.0, 0.0, 100.0, 100.0);
        let b = boxed(100.5, 0.0, 200.0, 100.0);
        assert!(!a.overlaps(&b));
        let c = boxed(0.0, 101.0, 100.0, 200.0);
        assert!(!a.overlaps(&c));
    }
}
