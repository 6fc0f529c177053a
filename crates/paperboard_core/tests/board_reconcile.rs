use paperboard_core::board::{Board, Viewport};
use paperboard_core::config::CardConfig;
use paperboard_core::{Author, ChangeEvent, DayKey, Note, Position, Size};

fn board() -> Board {
    Board::new(
        CardConfig::default(),
        Viewport::default(),
        DayKey::from_timestamp_ms(0),
    )
}

fn remote(text: &str) -> Note {
    Note::new(Author::Xu, text, Position::new(1.0, 2.0), 0).revealed()
}

#[test]
fn insert_for_a_known_id_does_not_duplicate() {
    let mut board = board();
    let note = remote("hello");

    assert!(board.apply_remote(&ChangeEvent::Insert(note.clone())));
    let before = board.notes().to_vec();
    assert!(!board.apply_remote(&ChangeEvent::Insert(note.clone())));
    assert_eq!(board.notes(), before.as_slice());
}

#[test]
fn insert_echo_of_a_local_create_keeps_the_local_copy() {
    let mut board = board();
    let local = Note::new(Author::Ziji, "mine", Position::default(), 0);
    board.push_local(local.clone());

    let echo = local.clone().revealed();
    assert!(!board.apply_remote(&ChangeEvent::Insert(echo)));
    assert_eq!(board.len(), 1);
    assert!(board.get(local.id).unwrap().is_revealing);
}

#[test]
fn repeated_delete_is_the_same_as_one() {
    let mut board = board();
    let kept = remote("kept");
    let gone = remote("gone");
    board.apply_remote(&ChangeEvent::Insert(kept.clone()));
    board.apply_remote(&ChangeEvent::Insert(gone.clone()));

    assert!(board.apply_remote(&ChangeEvent::Delete(gone.id)));
    let once = board.notes().to_vec();
    assert!(!board.apply_remote(&ChangeEvent::Delete(gone.id)));
    assert_eq!(board.notes(), once.as_slice());
    assert_eq!(once.len(), 1);
    assert_eq!(once[0].id, kept.id);
}

#[test]
fn update_merges_fields_in_place_and_keeps_stacking_order() {
    let mut board = board();
    let first = remote("first").with_size(Size::new(200.0, 90.0));
    let second = remote("second");
    board.apply_remote(&ChangeEvent::Insert(first.clone()));
    board.apply_remote(&ChangeEvent::Insert(second.clone()));

    let mut moved = first.clone();
    moved.position = Position::new(400.0, 300.0);
    moved.size = None;
    assert!(board.apply_remote(&ChangeEvent::Update(moved.clone())));
    assert!(!board.apply_remote(&ChangeEvent::Update(moved)));

    let merged = &board.notes()[0];
    assert_eq!(merged.id, first.id);
    assert_eq!(merged.position, Position::new(400.0, 300.0));
    assert_eq!(merged.size, Some(Size::new(200.0, 90.0)));
    assert_eq!(board.notes()[1].id, second.id);
}

#[test]
fn update_for_an_unknown_id_is_ignored() {
    let mut board = board();
    assert!(!board.apply_remote(&ChangeEvent::Update(remote("stray"))));
    assert!(board.is_empty());
}

#[test]
fn remote_delete_clears_selection_of_that_note() {
    let mut board = board();
    let note = remote("target");
    board.apply_remote(&ChangeEvent::Insert(note.clone()));
    assert!(board.select(Some(note.id)));

    board.apply_remote(&ChangeEvent::Delete(note.id));
    assert_eq!(board.selected(), None);
}
