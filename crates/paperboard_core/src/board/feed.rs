//! Realtime change-feed subscription owned by the controller.
//!
//! # Invariants
//! - One pump task per subscription, aborted on `unsubscribe` or drop.
//! - `unsubscribe` is idempotent, including after the feed closed by itself.
//! - Changes are applied in feed order; after a lag, `resync` completes
//!   before the next change is applied.

use crate::store::{ChangeEvent, ChangeFeed, FeedItem};
use log::{debug, info};
use std::future::Future;
use tokio::task::JoinHandle;

/// Handle keeping a store change feed applied to local state.
pub struct FeedSubscription {
    pump: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// Spawns a pump applying every received change with `apply`, and
    /// awaiting `resync` whenever the feed reports lost changes.
    pub fn spawn<F, R, Fut>(mut feed: ChangeFeed, mut apply: F, mut resync: R) -> Self
    where
        F: FnMut(ChangeEvent) + Send + 'static,
        R: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let pump = tokio::spawn(async move {
            while let Some(item) = feed.next().await {
                match item {
                    FeedItem::Change(event) => {
                        debug!(
                            "event=feed_receive module=board status=ok kind={} note_id={}",
                            event.kind(),
                            event.note_id()
                        );
                        apply(event);
                    }
                    FeedItem::Lagged { skipped } => {
                        info!("event=feed_resync module=board status=start skipped={skipped}");
                        resync().await;
                    }
                }
            }
            info!("event=feed_closed module=board status=ok");
        });
        Self { pump: Some(pump) }
    }

    /// Stops applying changes. Returns `false` when already unsubscribed.
    pub fn unsubscribe(&mut self) -> bool {
        match self.pump.take() {
            Some(pump) => {
                pump.abort();
                info!("event=feed_unsubscribe module=board status=ok");
                true
            }
            None => false,
        }
    }

    /// Whether changes are still being applied.
    pub fn is_active(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
