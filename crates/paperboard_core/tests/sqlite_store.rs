use paperboard_core::{
    Author, ChangeEvent, FeedItem, Note, NotePatch, NoteStore, Position, Reaction, Size, SqliteNoteStore,
    StoreError,
};

fn note(author: Author, text: &str, created_at: i64) -> Note {
    Note::new(author, text, Position::new(10.0, 20.0), created_at).with_rotation(1.5)
}

#[tokio::test]
async fn create_then_list_returns_revealed_notes_in_timestamp_order() {
    let store = SqliteNoteStore::open_in_memory().unwrap();
    let later = note(Author::Xu, "second", 2_000);
    let earlier = note(Author::Ziji, "first", 1_000);

    store.create(&later).await.unwrap();
    let stored = store.create(&earlier).await.unwrap();
    assert!(!stored.is_revealing);
    assert_eq!(stored.text, "first");
    assert_eq!(stored.rotation, 1.5);

    let listed = store.list().await.unwrap();
    let texts: Vec<&str> = listed.iter().map(|note| note.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(listed.iter().all(|note| !note.is_revealing));
}

#[tokio::test]
async fn update_merges_only_patched_fields() {
    let store = SqliteNoteStore::open_in_memory().unwrap();
    let parent = note(Author::Ziji, "parent", 1_000);
    let reply = note(Author::Xu, "reply", 2_000).replying_to(Some(parent.id));
    store.create(&parent).await.unwrap();
    store.create(&reply).await.unwrap();

    let moved = store
        .update(reply.id, &NotePatch::position(Position::new(300.0, 400.0)))
        .await
        .unwrap();
    assert_eq!(moved.position, Position::new(300.0, 400.0));
    assert_eq!(moved.reply_to, Some(parent.id));
    assert_eq!(moved.size, None);

    let sized = store
        .update(reply.id, &NotePatch::size(Size::new(280.0, 120.0)))
        .await
        .unwrap();
    assert_eq!(sized.size, Some(Size::new(280.0, 120.0)));
    assert_eq!(sized.position, Position::new(300.0, 400.0));

    let reactions = vec![Reaction {
        emoji: "👍".to_string(),
        author: Author::Ziji,
        timestamp: 3_000,
    }];
    let reacted = store
        .update(reply.id, &NotePatch::reactions(reactions.clone()))
        .await
        .unwrap();
    assert_eq!(reacted.reactions, reactions);
    assert_eq!(store.get(reply.id).unwrap(), Some(reacted));
}

#[tokio::test]
async fn missing_ids_are_reported_as_not_found() {
    let store = SqliteNoteStore::open_in_memory().unwrap();
    let ghost = note(Author::Ziji, "ghost", 1_000);

    let update = store
        .update(ghost.id, &NotePatch::position(Position::new(1.0, 1.0)))
        .await;
    assert!(matches!(update, Err(StoreError::NotFound(id)) if id == ghost.id));
    assert!(matches!(
        store.delete(ghost.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn invalid_notes_are_rejected_before_writing() {
    let store = SqliteNoteStore::open_in_memory().unwrap();
    let blank = Note::new(Author::Xu, "   ", Position::default(), 1_000);

    assert!(matches!(
        store.create(&blank).await,
        Err(StoreError::Validation(_))
    ));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn every_committed_write_is_published_to_subscribers() {
    let store = SqliteNoteStore::open_in_memory().unwrap();
    let mut feed = store.subscribe().unwrap();
    let card = note(Author::Ziji, "hello", 1_000);

    store.create(&card).await.unwrap();
    store
        .update(card.id, &NotePatch::position(Position::new(5.0, 5.0)))
        .await
        .unwrap();
    store.delete(card.id).await.unwrap();
    let _ = store.delete(card.id).await;

    match feed.next().await.unwrap() {
        FeedItem::Change(ChangeEvent::Insert(inserted)) => assert_eq!(inserted.id, card.id),
        other => panic!("unexpected item: {other:?}"),
    }
    match feed.next().await.unwrap() {
        FeedItem::Change(ChangeEvent::Update(updated)) => {
            assert_eq!(updated.position, Position::new(5.0, 5.0))
        }
        other => panic!("unexpected item: {other:?}"),
    }
    assert_eq!(
        feed.next().await.unwrap(),
        FeedItem::Change(ChangeEvent::Delete(card.id))
    );

    drop(store);
    assert_eq!(feed.next().await, None);
}

#[tokio::test]
async fn slow_subscriber_is_told_how_many_changes_it_missed() {
    let store = SqliteNoteStore::open_in_memory()
        .unwrap()
        .with_feed_capacity(2);
    let mut feed = store.subscribe().unwrap();

    let mut cards = Vec::new();
    for index in 0..5 {
        let card = note(Author::Xu, &format!("card {index}"), 1_000 + index);
        store.create(&card).await.unwrap();
        cards.push(card);
    }

    assert_eq!(feed.next().await.unwrap(), FeedItem::Lagged { skipped: 3 });
    match feed.next().await.unwrap() {
        FeedItem::Change(ChangeEvent::Insert(inserted)) => assert_eq!(inserted.id, cards[3].id),
        other => panic!("unexpected item: {other:?}"),
    }
    assert_eq!(store.list().await.unwrap().len(), 5);
}

#[tokio::test]
async fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");
    let card = note(Author::Xu, "persisted", 1_000);

    {
        let store = SqliteNoteStore::open(&path).unwrap();
        store.create(&card).await.unwrap();
    }

    let reopened = SqliteNoteStore::open(&path).unwrap();
    let listed = reopened.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, card.id);
    assert_eq!(listed[0].day_key(), card.day_key());
}
