//! Core of a two-person shared note board.
//! Owns note state, ordering, persistence and realtime reconciliation.

pub mod board;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reveal;
pub mod session;
pub mod store;

pub use board::{
    BoardController, BoardError, BoardResult, Connection, FocusOutcome, LogNotifier, Notifier,
    CREATE_FAILED_ALERT,
};
pub use config::{BoardConfig, ConfigError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::day::DayKey;
pub use model::note::{
    Author, Note, NoteId, NotePatch, NoteValidationError, Position, Reaction, Size,
    REACTION_PALETTE,
};
pub use reveal::{RevealSchedule, RevealTask};
pub use session::Session;
pub use store::{
    ChangeEvent, ChangeFeed, FeedItem, NoteStore, SqliteNoteStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
