//! Board controller: optimistic mutations, persistence and reconciliation.
//!
//! # Responsibility
//! - Mediate every mutation of the shared note collection.
//! - Apply user actions locally first, then persist them through a single
//!   FIFO persistence worker.
//! - Merge the store's realtime change feed into local state.
//! - Drive one typewriter reveal per freshly created note.
//!
//! # Invariants
//! - A rejected create removes its optimistic note and raises exactly one
//!   user alert; rejected updates/deletes are logged and never rolled back.
//! - Persistence requests reach the store in issuance order.
//! - `is_revealing` flips to `false` once, when the reveal completes, and the
//!   flip is never persisted.
//! - Reveal tasks and the feed pump are released on delete, rollback,
//!   logout and drop.
//! - Feed events that arrive while `load()` waits on the store are replayed
//!   over the loaded notes; a lagging feed triggers a full resync.
//!
//! Every method that spawns work must be called inside a tokio runtime.

use crate::board::feed::FeedSubscription;
use crate::board::notify::{Notifier, CREATE_FAILED_ALERT};
use crate::board::state::Board;
use crate::board::viewport::Viewport;
use crate::board::zorder::FocusOutcome;
use crate::board::connections::Connection;
use crate::config::BoardConfig;
use crate::model::day::DayKey;
use crate::model::note::{
    Author, Note, NoteId, NotePatch, NoteValidationError, Position, Reaction, Size,
};
use crate::reveal::{RevealSchedule, RevealTask};
use crate::session::Session;
use crate::store::{ChangeEvent, NoteStore, StoreError};
use chrono::Utc;
use log::{debug, error, info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

pub type BoardResult<T> = Result<T, BoardError>;

/// Errors returned to board callers.
#[derive(Debug)]
pub enum BoardError {
    /// Nobody is signed in.
    NoIdentity,
    Validation(NoteValidationError),
    Store(StoreError),
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIdentity => write!(f, "no participant is signed in"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoIdentity => None,
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<NoteValidationError> for BoardError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// State shared between the controller and its background tasks.
struct Shared {
    board: Mutex<Board>,
    reveals: Mutex<HashMap<NoteId, RevealTask>>,
}

impl Shared {
    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reveals(&self) -> MutexGuard<'_, HashMap<NoteId, RevealTask>> {
        self.reveals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_reveal(&self, id: NoteId) {
        let task = self.reveals().remove(&id);
        drop(task);
    }

    fn cancel_all_reveals(&self) {
        let tasks: Vec<RevealTask> = self.reveals().drain().map(|(_, task)| task).collect();
        drop(tasks);
    }

    fn complete_reveal(&self, id: NoteId) {
        let flipped = self.board().finish_reveal(id);
        if let Some(task) = self.reveals().remove(&id) {
            task.detach();
        }
        if flipped {
            debug!("event=reveal_complete module=board status=ok note_id={id}");
        }
    }

    fn roll_back(&self, id: NoteId) -> bool {
        let removed = self.board().roll_back(id).is_some();
        self.cancel_reveal(id);
        removed
    }

    fn resync(&self, notes: Vec<Note>) {
        let count = notes.len();
        let notes = notes.into_iter().map(Note::revealed).collect();
        let removed = self.board().reconcile(notes);
        for id in &removed {
            self.cancel_reveal(*id);
        }
        info!(
            "event=feed_resync module=board status=ok count={count} removed={}",
            removed.len()
        );
    }

    fn apply_remote(&self, event: ChangeEvent) {
        let changed = self.board().apply_remote(&event);
        if let ChangeEvent::Delete(id) = event {
            self.cancel_reveal(id);
        }
        debug!(
            "event=feed_apply module=board status={} kind={} note_id={}",
            if changed { "ok" } else { "skip" },
            event.kind(),
            event.note_id()
        );
    }
}

enum PersistCommand {
    Create(Note),
    Update {
        id: NoteId,
        patch: NotePatch,
        op: &'static str,
    },
    Delete(NoteId),
    Flush(oneshot::Sender<()>),
}

/// Sender side of the FIFO persistence worker.
///
/// The worker drains queued requests and exits once the queue is dropped.
struct PersistQueue {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistQueue {
    fn start<S: NoteStore>(store: Arc<S>, shared: Arc<Shared>, notifier: Arc<dyn Notifier>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_persistence(store, shared, notifier, receiver));
        Self { sender }
    }

    fn submit(&self, command: PersistCommand) {
        if self.sender.send(command).is_err() {
            error!("event=persist_submit module=board status=error error_code=worker_stopped");
        }
    }

    async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.submit(PersistCommand::Flush(done));
        let _ = wait.await;
    }
}

async fn run_persistence<S: NoteStore>(
    store: Arc<S>,
    shared: Arc<Shared>,
    notifier: Arc<dyn Notifier>,
    mut receiver: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            PersistCommand::Create(note) => match store.create(&note).await {
                Ok(_) => {
                    shared.board().confirm(note.id);
                    debug!("event=note_persist module=board status=ok op=create note_id={}", note.id);
                }
                Err(err) => {
                    let removed = shared.roll_back(note.id);
                    error!(
                        "event=note_persist module=board status=error op=create note_id={} rolled_back={} error={}",
                        note.id, removed, err
                    );
                    notifier.alert(CREATE_FAILED_ALERT);
                }
            },
            PersistCommand::Update { id, patch, op } => {
                if let Err(err) = store.update(id, &patch).await {
                    warn!(
                        "event=note_persist module=board status=error op={op} note_id={id} error={err}"
                    );
                }
            }
            PersistCommand::Delete(id) => {
                if let Err(err) = store.delete(id).await {
                    warn!(
                        "event=note_persist module=board status=error op=delete note_id={id} error={err}"
                    );
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("event=persist_worker module=board status=stopped");
}

/// Interaction surface of the shared note board.
pub struct BoardController<S: NoteStore> {
    store: Arc<S>,
    shared: Arc<Shared>,
    session: Mutex<Session>,
    config: BoardConfig,
    persist: PersistQueue,
    feed: Mutex<Option<FeedSubscription>>,
}

impl<S: NoteStore> BoardController<S> {
    /// Creates a controller with an empty board showing today.
    pub fn new(store: Arc<S>, config: BoardConfig, notifier: Arc<dyn Notifier>) -> Self {
        let board = Board::new(config.card, Viewport::default(), DayKey::today());
        let shared = Arc::new(Shared {
            board: Mutex::new(board),
            reveals: Mutex::new(HashMap::new()),
        });
        let persist = PersistQueue::start(Arc::clone(&store), Arc::clone(&shared), notifier);
        Self {
            store,
            shared,
            session: Mutex::new(Session::default()),
            config,
            persist,
            feed: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn feed_slot(&self) -> MutexGuard<'_, Option<FeedSubscription>> {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn login(&self, author: Author) {
        self.session().login(author);
    }

    /// Signs out: stops the feed, cancels reveals and empties the board.
    pub fn logout(&self) -> Option<Author> {
        let previous = self.session().logout();
        self.detach_feed();
        self.shared.cancel_all_reveals();
        self.shared.board().clear();
        previous
    }

    pub fn current_author(&self) -> Option<Author> {
        self.session().participant()
    }

    fn require_author(&self) -> BoardResult<Author> {
        self.current_author().ok_or(BoardError::NoIdentity)
    }

    /// Replaces local state with the store's notes.
    ///
    /// Feed events applied while the listing is pending are replayed on top
    /// of it. Failure is logged, leaves the board empty and is returned.
    pub async fn load(&self) -> BoardResult<usize> {
        self.shared.board().begin_hydration();
        let loaded = self.store.list().await;
        self.shared.cancel_all_reveals();
        match loaded {
            Ok(notes) => {
                let count = notes.len();
                let notes = notes.into_iter().map(Note::revealed).collect();
                let replayed = self.shared.board().finish_hydration(notes);
                info!("event=board_load module=board status=ok count={count} replayed={replayed}");
                Ok(count)
            }
            Err(err) => {
                {
                    let mut board = self.shared.board();
                    board.abort_hydration();
                    board.clear();
                }
                error!("event=board_load module=board status=error error={err}");
                Err(BoardError::Store(err))
            }
        }
    }

    /// Subscribes to the store's change feed. No-op while already attached.
    ///
    /// Attach before `load()` so no change between the two is missed.
    pub fn attach_feed(&self) -> BoardResult<()> {
        let mut slot = self.feed_slot();
        if slot.as_ref().is_some_and(FeedSubscription::is_active) {
            return Ok(());
        }
        let feed = self.store.subscribe()?;
        let shared = Arc::clone(&self.shared);
        let resync_store = Arc::clone(&self.store);
        let resync_shared = Arc::clone(&self.shared);
        *slot = Some(FeedSubscription::spawn(
            feed,
            move |event| shared.apply_remote(event),
            move || {
                let store = Arc::clone(&resync_store);
                let shared = Arc::clone(&resync_shared);
                async move {
                    match store.list().await {
                        Ok(notes) => shared.resync(notes),
                        Err(err) => {
                            warn!("event=feed_resync module=board status=error error={err}")
                        }
                    }
                }
            },
        ));
        info!("event=feed_subscribe module=board status=ok");
        Ok(())
    }

    /// Unsubscribes from the change feed. Returns `false` if not attached.
    pub fn detach_feed(&self) -> bool {
        let subscription = self.feed_slot().take();
        subscription.is_some_and(|mut subscription| subscription.unsubscribe())
    }

    pub fn is_feed_attached(&self) -> bool {
        self.feed_slot()
            .as_ref()
            .is_some_and(FeedSubscription::is_active)
    }

    /// Prints a new note for the signed-in participant.
    ///
    /// Blank text is ignored (`Ok(None)`). The note replies to the selected
    /// note, if any, and the selection is cleared.
    ///
    /// # Errors
    /// - `NoIdentity` when nobody is signed in.
    pub fn create_note(&self, text: &str) -> BoardResult<Option<Note>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let author = self.require_author()?;
        let rotation = self.rotation_jitter();
        let created_at = Utc::now().timestamp_millis();

        let note = {
            let mut board = self.shared.board();
            let position = board
                .viewport()
                .spawn_point(&self.config.spawn, self.config.card.default_width);
            let reply_to = board.selected();
            let note = Note::new(author, text, position, created_at)
                .with_rotation(rotation)
                .replying_to(reply_to);
            note.validate()?;
            board.push_local(note.clone());
            if reply_to.is_some() {
                board.select(None);
            }
            note
        };

        self.start_reveal(&note);
        self.persist.submit(PersistCommand::Create(note.clone()));
        info!(
            "event=note_create module=board status=ok note_id={} author={} len={} reply={}",
            note.id,
            note.author,
            note.text.chars().count(),
            note.reply_to.is_some()
        );
        Ok(Some(note))
    }

    fn rotation_jitter(&self) -> f64 {
        let jitter = self.config.spawn.rotation_jitter_deg;
        if jitter > 0.0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0.0
        }
    }

    fn start_reveal(&self, note: &Note) {
        let schedule = RevealSchedule::new(
            note.text.clone(),
            &self.config.reveal,
            &mut rand::thread_rng(),
        );
        let id = note.id;
        let progress = Arc::clone(&self.shared);
        let completion = Arc::clone(&self.shared);

        // Held across spawn so completion cannot run before registration.
        let mut reveals = self.shared.reveals();
        let task = RevealTask::spawn(
            schedule,
            move |prefix| {
                progress
                    .board()
                    .set_reveal_progress(id, prefix.chars().count());
            },
            move || completion.complete_reveal(id),
        );
        reveals.insert(id, task);
    }

    /// Merges `patch` into the note locally, then persists it.
    ///
    /// Returns `Ok(false)` for unknown ids or empty patches.
    pub fn update_note(&self, id: NoteId, patch: NotePatch) -> BoardResult<bool> {
        self.apply_and_persist(id, patch, "update")
    }

    fn apply_and_persist(&self, id: NoteId, patch: NotePatch, op: &'static str) -> BoardResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        patch.validate()?;
        if !self.shared.board().apply_patch(id, &patch) {
            debug!("event=note_{op} module=board status=skip reason=unknown_note note_id={id}");
            return Ok(false);
        }
        self.persist.submit(PersistCommand::Update { id, patch, op });
        Ok(true)
    }

    /// Removes the note locally, then deletes it from the store.
    pub fn delete_note(&self, id: NoteId) -> bool {
        if self.shared.board().remove(id).is_none() {
            return false;
        }
        self.shared.cancel_reveal(id);
        self.persist.submit(PersistCommand::Delete(id));
        info!("event=note_delete module=board status=ok note_id={id}");
        true
    }

    /// Appends a reaction from the signed-in participant.
    pub fn react_to_note(&self, id: NoteId, emoji: &str) -> BoardResult<bool> {
        let author = self.require_author()?;
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(BoardError::Validation(NoteValidationError::EmptyEmoji));
        }

        let reactions = {
            let board = self.shared.board();
            let Some(note) = board.get(id) else {
                return Ok(false);
            };
            let mut reactions = note.reactions.clone();
            reactions.push(Reaction {
                emoji: emoji.to_string(),
                author,
                timestamp: Utc::now().timestamp_millis(),
            });
            reactions
        };
        self.apply_and_persist(id, NotePatch::reactions(reactions), "react")
    }

    /// Persists a measured size once the note is revealed and the size changed.
    pub fn record_size(&self, id: NoteId, size: Size) -> BoardResult<bool> {
        let needs_update = self
            .shared
            .board()
            .get(id)
            .is_some_and(|note| !note.is_revealing && note.size != Some(size));
        if !needs_update {
            return Ok(false);
        }
        self.apply_and_persist(id, NotePatch::size(size), "resize")
    }

    /// Brings the note forward; `force` skips the overlap check.
    pub fn focus_note(&self, id: NoteId, force: bool) -> FocusOutcome {
        let mut board = self.shared.board();
        let outcome = board.focus(id, force);
        if outcome == FocusOutcome::Promoted {
            debug!(
                "event=note_focus module=board status=ok note_id={id} force={force} top_z={}",
                board.top_z()
            );
        }
        outcome
    }

    /// Sets or clears the reply target. Local only.
    pub fn select_for_reply(&self, id: Option<NoteId>) -> bool {
        self.shared.board().select(id)
    }

    /// Plain click: unforced focus, then select for reply.
    ///
    /// Ignored while the note is revealing or a drag is in progress.
    pub fn click_note(&self, id: NoteId) -> bool {
        let mut board = self.shared.board();
        let clickable = board
            .get(id)
            .is_some_and(|note| !note.is_revealing)
            && board.dragging().is_none();
        if !clickable {
            return false;
        }
        board.focus(id, false);
        board.select(Some(id))
    }

    /// Grabs a note at a screen-space pointer position and brings it forward.
    pub fn begin_drag(&self, id: NoteId, pointer: Position) -> bool {
        let mut board = self.shared.board();
        let world = board.viewport().screen_to_world(pointer);
        if !board.begin_drag(id, world) {
            return false;
        }
        board.focus(id, true);
        true
    }

    /// Moves the grabbed note to follow a screen-space pointer position.
    pub fn drag_to(&self, pointer: Position) -> BoardResult<bool> {
        let target = {
            let board = self.shared.board();
            let world = board.viewport().screen_to_world(pointer);
            board.drag_target(world)
        };
        match target {
            Some((id, position)) => self.apply_and_persist(id, NotePatch::position(position), "move"),
            None => Ok(false),
        }
    }

    pub fn end_drag(&self) -> Option<NoteId> {
        self.shared.board().end_drag()
    }

    pub fn set_viewport_size(&self, width: f64, height: f64) {
        let mut board = self.shared.board();
        let viewport = board.viewport_mut();
        viewport.width = width;
        viewport.height = height;
    }

    pub fn pan_by(&self, dx: f64, dy: f64) {
        self.shared.board().viewport_mut().pan_by(dx, dy);
    }

    /// Switches the visible day and recenters the viewport.
    pub fn set_current_day(&self, day: DayKey) {
        self.shared.board().set_current_day(day);
    }

    /// Runs `read` against the current board state.
    pub fn read<R>(&self, read: impl FnOnce(&Board) -> R) -> R {
        read(&self.shared.board())
    }

    /// All notes in stacking order.
    pub fn snapshot(&self) -> Vec<Note> {
        self.shared.board().notes().to_vec()
    }

    /// Notes of the current day in stacking order.
    pub fn visible_notes(&self) -> Vec<Note> {
        self.shared
            .board()
            .visible_notes()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn available_days(&self) -> Vec<DayKey> {
        self.shared.board().available_days()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.shared.board().connections()
    }

    pub fn displayed_text(&self, id: NoteId) -> Option<String> {
        self.shared.board().displayed_text(id).map(str::to_string)
    }

    pub fn selected(&self) -> Option<NoteId> {
        self.shared.board().selected()
    }

    pub fn top_z(&self) -> u64 {
        self.shared.board().top_z()
    }

    /// Number of reveal animations still running.
    pub fn active_reveals(&self) -> usize {
        self.shared.reveals().len()
    }

    /// Waits until every persistence request issued so far has completed.
    pub async fn settle(&self) {
        self.persist.flush().await;
    }

    /// Detaches the feed, flushes pending writes and stops reveals.
    pub async fn close(self) {
        self.detach_feed();
        self.settle().await;
        self.shared.cancel_all_reveals();
    }
}

impl<S: NoteStore> Drop for BoardController<S> {
    fn drop(&mut self) {
        self.detach_feed();
        self.shared.cancel_all_reveals();
    }
}
