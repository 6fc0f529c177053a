//! Typewriter reveal of a note's text.
//!
//! # Responsibility
//! - Plan a per-character reveal schedule with tiered randomized delays.
//! - Run the schedule as a cancellable task that reports growing prefixes and
//!   completes exactly once.
//!
//! # Invariants
//! - A text of N characters yields N+1 prefixes, starting with the empty
//!   prefix and ending with the full text, strictly increasing in length.
//! - Completion fires once, after the full text, and never after
//!   cancellation.
//! - Dropping a `RevealTask` cancels it and releases its pending timer.

use crate::config::RevealConfig;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Planned reveal of one text: the delay before each character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSchedule {
    text: String,
    /// `delays[i]` elapses before character `i` appears.
    delays: Vec<Duration>,
}

impl RevealSchedule {
    /// Plans a reveal for `text` using the tier matching its length.
    pub fn new(text: impl Into<String>, config: &RevealConfig, rng: &mut impl Rng) -> Self {
        let text = text.into();
        let len = text.chars().count();
        let range = config.range_for(len);
        let delays = (0..len)
            .map(|index| {
                if index == 0 {
                    config.start_delay()
                } else {
                    let jitter = if range.variance_ms == 0 {
                        0
                    } else {
                        rng.gen_range(0..range.variance_ms)
                    };
                    Duration::from_millis(range.min_delay_ms + jitter)
                }
            })
            .collect();
        Self { text, delays }
    }

    /// Schedule with a fixed delay per character; used by previews and tests.
    pub fn uniform(text: impl Into<String>, delay: Duration) -> Self {
        let text = text.into();
        let delays = vec![delay; text.chars().count()];
        Self { text, delays }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.delays.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.delays.iter().sum()
    }

    /// Every prefix in reveal order, including the empty one.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once("").chain(self.steps().map(|(_, prefix)| prefix))
    }

    /// `(delay, prefix)` for each revealed character.
    pub fn steps(&self) -> impl Iterator<Item = (Duration, &str)> + '_ {
        self.text
            .char_indices()
            .map(|(offset, ch)| &self.text[..offset + ch.len_utf8()])
            .zip(self.delays.iter().copied())
            .map(|(prefix, delay)| (delay, prefix))
    }
}

/// Number of characters of `text` to show for `revealed_chars`, as a prefix.
pub fn prefix_of(text: &str, revealed_chars: usize) -> &str {
    match text.char_indices().nth(revealed_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Handle owning one running reveal.
pub struct RevealTask {
    handle: Option<JoinHandle<()>>,
}

impl RevealTask {
    /// Starts revealing on the current tokio runtime.
    ///
    /// `on_prefix` receives every prefix (the empty one immediately);
    /// `on_complete` runs once after the last prefix unless cancelled first.
    pub fn spawn<P, C>(schedule: RevealSchedule, mut on_prefix: P, on_complete: C) -> Self
    where
        P: FnMut(&str) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            on_prefix("");
            for (delay, prefix) in schedule.steps() {
                tokio::time::sleep(delay).await;
                on_prefix(prefix);
            }
            on_complete();
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Stops the reveal; completion will not fire. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Releases the handle without cancelling the task.
    pub fn detach(mut self) {
        self.handle.take();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits until the reveal completes or is cancelled.
    pub async fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RevealTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
