//! Domain model for the shared paper note board.
//!
//! # Responsibility
//! - Define the canonical note record shared by board state, storage and
//!   rendering projections.
//! - Own value types (positions, sizes, reactions, day keys) used across
//!   layers.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - `text`, `author`, `rotation`, `created_at` and `reply_to` never change
//!   after creation; only `NotePatch` fields are mutable.

pub mod day;
pub mod note;
