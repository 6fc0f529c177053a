//! In-memory board state.
//!
//! # Responsibility
//! - Own the ordered note collection (insertion order = z-order), the reply
//!   selection, the top-of-stack counter and per-session view state.
//! - Apply optimistic local mutations and remote change events.
//!
//! # Invariants
//! - Note ids are unique within the collection.
//! - Only `focus` reorders the collection, and only by moving one note to
//!   the end.
//! - `top_z` never decreases.
//! - Remote event application is idempotent.
//! - Remote events applied while a hydration is in flight are replayed on
//!   top of the hydrated snapshot.

use crate::board::connections::{derive_connections, Connection};
use crate::board::viewport::Viewport;
use crate::board::zorder::{move_to_top, resolve_focus, FocusOutcome};
use crate::config::CardConfig;
use crate::model::day::DayKey;
use crate::model::note::{Note, NoteId, NotePatch, Position, Size};
use crate::reveal::prefix_of;
use crate::store::ChangeEvent;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Stacking value of the bottom-most note.
pub const BASE_Z_INDEX: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    id: NoteId,
    grab_offset: Position,
}

/// Board state owned by the controller.
#[derive(Debug, Clone)]
pub struct Board {
    notes: Vec<Note>,
    selected: Option<NoteId>,
    top_z: u64,
    revealed_chars: HashMap<NoteId, usize>,
    deleted: HashSet<NoteId>,
    /// Locally created ids the store has not acknowledged yet.
    unconfirmed: HashSet<NoteId>,
    hydration: Option<Vec<ChangeEvent>>,
    drag: Option<DragState>,
    viewport: Viewport,
    current_day: DayKey,
    card: CardConfig,
}

impl Board {
    pub fn new(card: CardConfig, viewport: Viewport, current_day: DayKey) -> Self {
        Self {
            notes: Vec::new(),
            selected: None,
            top_z: BASE_Z_INDEX,
            revealed_chars: HashMap::new(),
            deleted: HashSet::new(),
            unconfirmed: HashSet::new(),
            hydration: None,
            drag: None,
            viewport,
            current_day,
            card,
        }
    }

    /// Notes in stacking order, bottom first.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Replaces the collection with hydrated notes and resets transient state.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        let mut seen = HashSet::new();
        self.notes = notes
            .into_iter()
            .filter(|note| seen.insert(note.id))
            .collect();
        self.selected = None;
        self.drag = None;
        self.revealed_chars.clear();
        self.deleted.clear();
        self.unconfirmed.clear();
    }

    /// Starts recording remote events until `finish_hydration`.
    pub fn begin_hydration(&mut self) {
        self.hydration.get_or_insert_with(Vec::new);
    }

    /// Installs a hydrated snapshot, then replays the remote events applied
    /// since `begin_hydration`. Returns the number of replayed events.
    pub fn finish_hydration(&mut self, notes: Vec<Note>) -> usize {
        let pending = self.hydration.take().unwrap_or_default();
        self.replace_all(notes);
        for event in &pending {
            self.apply_remote(event);
        }
        pending.len()
    }

    /// Drops recorded events without installing a snapshot.
    pub fn abort_hydration(&mut self) {
        self.hydration = None;
    }

    pub fn is_hydrating(&self) -> bool {
        self.hydration.is_some()
    }

    /// Aligns the collection with a fresh store listing without resetting
    /// local state.
    ///
    /// Acknowledged notes missing from `snapshot` are removed; pending local
    /// creates and tombstoned ids are kept as they are. Returns removed ids.
    pub fn reconcile(&mut self, snapshot: Vec<Note>) -> Vec<NoteId> {
        let remote_ids: HashSet<NoteId> = snapshot.iter().map(|note| note.id).collect();
        let stale: Vec<NoteId> = self
            .notes
            .iter()
            .map(|note| note.id)
            .filter(|id| !remote_ids.contains(id) && !self.unconfirmed.contains(id))
            .collect();
        for id in &stale {
            self.remove(*id);
        }
        for remote in snapshot {
            self.unconfirmed.remove(&remote.id);
            match self.notes.iter_mut().find(|note| note.id == remote.id) {
                Some(local) => local.merge_remote(&remote),
                None if !self.deleted.contains(&remote.id) => self.notes.push(remote),
                None => {}
            }
        }
        stale
    }

    /// Drops every note and all transient state.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    /// Appends a locally created note on top. Returns `false` on duplicate id.
    pub fn push_local(&mut self, note: Note) -> bool {
        if self.contains(note.id) {
            return false;
        }
        if note.is_revealing {
            self.revealed_chars.insert(note.id, 0);
        }
        self.unconfirmed.insert(note.id);
        self.notes.push(note);
        true
    }

    /// Merges a patch into the note `id`. Returns `false` for unknown ids.
    pub fn apply_patch(&mut self, id: NoteId, patch: &NotePatch) -> bool {
        match self.notes.iter_mut().find(|note| note.id == id) {
            Some(note) => {
                note.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    /// Removes the note `id` locally, clearing any state that refers to it.
    pub fn remove(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == id)?;
        self.deleted.insert(id);
        Some(self.detach(index))
    }

    /// Removes an optimistic note whose creation was rejected.
    pub fn roll_back(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == id)?;
        Some(self.detach(index))
    }

    fn detach(&mut self, index: usize) -> Note {
        let note = self.notes.remove(index);
        if self.selected == Some(note.id) {
            self.selected = None;
        }
        if self.drag.map(|drag| drag.id) == Some(note.id) {
            self.drag = None;
        }
        self.revealed_chars.remove(&note.id);
        self.unconfirmed.remove(&note.id);
        note
    }

    /// Marks a local create as acknowledged by the store.
    pub fn confirm(&mut self, id: NoteId) -> bool {
        self.unconfirmed.remove(&id)
    }

    pub fn is_confirmed(&self, id: NoteId) -> bool {
        self.contains(id) && !self.unconfirmed.contains(&id)
    }

    /// Records reveal progress for a revealing note.
    pub fn set_reveal_progress(&mut self, id: NoteId, revealed_chars: usize) -> bool {
        match self.revealed_chars.get_mut(&id) {
            Some(progress) => {
                *progress = revealed_chars;
                true
            }
            None => false,
        }
    }

    /// Ends the reveal of `id`. Returns `true` only on the first call.
    pub fn finish_reveal(&mut self, id: NoteId) -> bool {
        self.revealed_chars.remove(&id);
        match self.notes.iter_mut().find(|note| note.id == id) {
            Some(note) if note.is_revealing => {
                note.is_revealing = false;
                true
            }
            _ => false,
        }
    }

    /// Text currently visible for `id`: a prefix while revealing.
    pub fn displayed_text(&self, id: NoteId) -> Option<&str> {
        let note = self.get(id)?;
        match self.revealed_chars.get(&id) {
            Some(&count) if note.is_revealing => Some(prefix_of(&note.text, count)),
            _ if note.is_revealing => Some(""),
            _ => Some(note.text.as_str()),
        }
    }

    /// Brings `id` to the front when forced or visually covered.
    pub fn focus(&mut self, id: NoteId, force: bool) -> FocusOutcome {
        let fallback = Size::new(self.card.default_width, self.card.default_height);
        let outcome = resolve_focus(&self.notes, id, force, fallback);
        if outcome == FocusOutcome::Promoted && move_to_top(&mut self.notes, id) {
            self.top_z += 1;
        }
        outcome
    }

    pub fn top_z(&self) -> u64 {
        self.top_z
    }

    /// Stacking value for rendering `id`.
    pub fn z_index(&self, id: NoteId) -> Option<u64> {
        self.notes
            .iter()
            .position(|note| note.id == id)
            .map(|index| BASE_Z_INDEX + index as u64)
    }

    /// Sets or clears the reply target. Unknown ids are ignored.
    pub fn select(&mut self, id: Option<NoteId>) -> bool {
        match id {
            Some(id) if !self.contains(id) => false,
            other => {
                self.selected = other;
                true
            }
        }
    }

    pub fn selected(&self) -> Option<NoteId> {
        self.selected
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Applies one remote change. Returns whether local state changed.
    pub fn apply_remote(&mut self, event: &ChangeEvent) -> bool {
        if let Some(recorded) = self.hydration.as_mut() {
            recorded.push(event.clone());
        }
        match event {
            ChangeEvent::Insert(note) => {
                if self.contains(note.id) {
                    self.unconfirmed.remove(&note.id);
                    return false;
                }
                if self.deleted.contains(&note.id) {
                    return false;
                }
                self.notes.push(note.clone());
                true
            }
            ChangeEvent::Update(remote) => {
                match self.notes.iter_mut().find(|note| note.id == remote.id) {
                    Some(local) => {
                        let before = local.clone();
                        local.merge_remote(remote);
                        *local != before
                    }
                    None => false,
                }
            }
            ChangeEvent::Delete(id) => self.remove(*id).is_some(),
        }
    }

    /// Starts dragging `id`, remembering where it was grabbed.
    pub fn begin_drag(&mut self, id: NoteId, pointer: Position) -> bool {
        let Some(note) = self.get(id) else {
            return false;
        };
        if note.is_revealing {
            return false;
        }
        let grab_offset = pointer.minus(note.position);
        self.drag = Some(DragState { id, grab_offset });
        true
    }

    /// Target position of the dragged note for a pointer position.
    pub fn drag_target(&self, pointer: Position) -> Option<(NoteId, Position)> {
        self.drag
            .map(|drag| (drag.id, pointer.minus(drag.grab_offset)))
    }

    pub fn end_drag(&mut self) -> Option<NoteId> {
        self.drag.take().map(|drag| drag.id)
    }

    pub fn dragging(&self) -> Option<NoteId> {
        self.drag.map(|drag| drag.id)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn card(&self) -> &CardConfig {
        &self.card
    }

    pub fn current_day(&self) -> DayKey {
        self.current_day
    }

    /// Switches the visible day and recenters the viewport.
    pub fn set_current_day(&mut self, day: DayKey) {
        self.current_day = day;
        self.viewport.reset_pan();
    }

    /// Notes created on `day`, in stacking order.
    pub fn notes_for_day(&self, day: DayKey) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |note| note.day_key() == day)
    }

    pub fn visible_notes(&self) -> Vec<&Note> {
        self.notes_for_day(self.current_day).collect()
    }

    /// Sorted distinct days that have at least one note.
    pub fn available_days(&self) -> Vec<DayKey> {
        self.notes
            .iter()
            .map(Note::day_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Reply connectors among the visible notes.
    pub fn connections(&self) -> Vec<Connection> {
        derive_connections(self.notes_for_day(self.current_day))
    }
}

#[cfg(test)]
mod tests {
    use super::{Board, BASE_Z_INDEX};
    use crate::board::viewport::Viewport;
    use crate::config::CardConfig;
    use crate::model::day::DayKey;
    use crate::model::note::{Author, Note, Position};
    use crate::store::ChangeEvent;

    fn board() -> Board {
        Board::new(
            CardConfig::default(),
            Viewport::default(),
            DayKey::from_timestamp_ms(0),
        )
    }

    #[test]
    fn displayed_text_tracks_reveal_progress() {
        let mut board = board();
        let note = Note::new(Author::Ziji, "hello", Position::default(), 0);
        let id = note.id;
        board.push_local(note);

        assert_eq!(board.displayed_text(id), Some(""));
        board.set_reveal_progress(id, 3);
        assert_eq!(board.displayed_text(id), Some("hel"));
        assert!(board.finish_reveal(id));
        assert!(!board.finish_reveal(id));
        assert_eq!(board.displayed_text(id), Some("hello"));
    }

    #[test]
    fn removing_selected_note_clears_selection() {
        let mut board = board();
        let note = Note::new(Author::Xu, "a", Position::default(), 0).revealed();
        let id = note.id;
        board.push_local(note);
        assert!(board.select(Some(id)));
        board.remove(id);
        assert_eq!(board.selected(), None);
    }

    #[test]
    fn locally_deleted_note_is_not_resurrected_by_late_insert_echo() {
        let mut board = board();
        let note = Note::new(Author::Xu, "a", Position::default(), 0).revealed();
        board.push_local(note.clone());
        board.remove(note.id);
        assert!(!board.apply_remote(&ChangeEvent::Insert(note.clone())));
        assert!(board.is_empty());
    }

    #[test]
    fn events_applied_during_hydration_survive_the_snapshot() {
        let mut board = board();
        let stale = Note::new(Author::Xu, "stale", Position::default(), 0).revealed();
        let fresh = Note::new(Author::Ziji, "fresh", Position::default(), 1).revealed();

        board.begin_hydration();
        assert!(board.apply_remote(&ChangeEvent::Insert(fresh.clone())));
        assert!(!board.apply_remote(&ChangeEvent::Delete(stale.id)));
        assert_eq!(board.finish_hydration(vec![stale.clone()]), 2);

        let ids: Vec<_> = board.notes().iter().map(|note| note.id).collect();
        assert_eq!(ids, vec![fresh.id]);
        assert!(!board.is_hydrating());
    }

    #[test]
    fn reconcile_keeps_pending_creates_and_drops_acknowledged_strays() {
        let mut board = board();
        let pending = Note::new(Author::Ziji, "pending", Position::default(), 0);
        let acked = Note::new(Author::Ziji, "acked", Position::default(), 0);
        let remote = Note::new(Author::Xu, "remote", Position::default(), 0).revealed();
        board.push_local(pending.clone());
        board.push_local(acked.clone());
        assert!(board.confirm(acked.id));

        let removed = board.reconcile(vec![remote.clone()]);
        assert_eq!(removed, vec![acked.id]);
        let ids: Vec<_> = board.notes().iter().map(|note| note.id).collect();
        assert_eq!(ids, vec![pending.id, remote.id]);
        assert!(!board.is_confirmed(pending.id));
        assert!(board.is_confirmed(remote.id));
    }

    #[test]
    fn z_index_starts_at_base() {
        let mut board = board();
        let note = Note::new(Author::Xu, "a", Position::default(), 0).revealed();
        let id = note.id;
        board.push_local(note);
        assert_eq!(board.z_index(id), Some(BASE_Z_INDEX));
        assert_eq!(board.top_z(), BASE_Z_INDEX);
    }

    #[test]
    fn drag_target_keeps_the_grab_offset() {
        let mut board = board();
        let note = Note::new(Author::Xu, "a", Position::new(100.0, 100.0), 0).revealed();
        let id = note.id;
        board.push_local(note);
        assert!(board.begin_drag(id, Position::new(110.0, 120.0)));
        assert_eq!(
            board.drag_target(Position::new(210.0, 220.0)),
            Some((id, Position::new(200.0, 200.0)))
        );
        assert_eq!(board.end_drag(), Some(id));
        assert_eq!(board.drag_target(Position::default()), None);
    }
}
