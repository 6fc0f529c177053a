//! Reply connectors between notes.
//!
//! Pure projection: a connector exists for every note whose `reply_to`
//! parent is present in the same subset and where both notes are measured.
//! Unresolved parents are skipped, never reported.

use crate::model::note::{Author, Note, NoteId, Position};
use std::collections::HashMap;

const SAG_FACTOR: f64 = 0.15;

/// String-like connector from a parent note to its reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub parent_id: NoteId,
    pub child_id: NoteId,
    /// Author of the reply; decides the stroke colour.
    pub author: Author,
    /// Parent center.
    pub start: Position,
    /// Child center.
    pub end: Position,
    /// Quadratic control point sagging below the midpoint.
    pub control: Position,
}

/// Derives connectors for `notes`, in the notes' order.
pub fn derive_connections<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Vec<Connection> {
    let notes: Vec<&Note> = notes.into_iter().collect();
    let by_id: HashMap<NoteId, &Note> = notes.iter().map(|note| (note.id, *note)).collect();

    notes
        .iter()
        .filter_map(|child| {
            let parent = by_id.get(&child.reply_to?)?;
            let start = parent.center()?;
            let end = child.center()?;
            let sag = (end.x - start.x).abs() * SAG_FACTOR;
            Some(Connection {
                parent_id: parent.id,
                child_id: child.id,
                author: child.author,
                start,
                end,
                control: Position::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0 + sag),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::derive_connections;
    use crate::model::note::{Author, Note, Position, Size};

    #[test]
    fn connector_runs_between_centers_with_sag() {
        let parent = Note::new(Author::Ziji, "a", Position::new(0.0, 0.0), 1)
            .with_size(Size::new(100.0, 100.0));
        let child = Note::new(Author::Xu, "b", Position::new(200.0, 0.0), 2)
            .with_size(Size::new(100.0, 100.0))
            .replying_to(Some(parent.id));

        let lines = derive_connections(&[parent.clone(), child.clone()]);
        assert_eq!(lines.len(), 1);
        let line = lines[0];
        assert_eq!(line.parent_id, parent.id);
        assert_eq!(line.author, Author::Xu);
        assert_eq!(line.start, Position::new(50.0, 50.0));
        assert_eq!(line.end, Position::new(250.0, 50.0));
        assert_eq!(line.control, Position::new(150.0, 80.0));
    }

    #[test]
    fn unmeasured_notes_have_no_connector() {
        let parent = Note::new(Author::Ziji, "a", Position::new(0.0, 0.0), 1);
        let child = Note::new(Author::Xu, "b", Position::new(200.0, 0.0), 2)
            .with_size(Size::new(100.0, 100.0))
            .replying_to(Some(parent.id));
        assert!(derive_connections(&[parent, child]).is_empty());
    }
}
