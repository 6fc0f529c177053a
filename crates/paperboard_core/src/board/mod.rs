//! Interactive board: state, stacking, connectors and the controller.

pub mod connections;
pub mod controller;
pub mod feed;
pub mod notify;
pub mod state;
pub mod viewport;
pub mod zorder;

pub use connections::{derive_connections, Connection};
pub use controller::{BoardController, BoardError, BoardResult};
pub use feed::FeedSubscription;
pub use notify::{LogNotifier, Notifier, CREATE_FAILED_ALERT};
pub use state::{Board, BASE_Z_INDEX};
pub use viewport::Viewport;
pub use zorder::{move_to_top, resolve_focus, BoundingBox, FocusOutcome};
