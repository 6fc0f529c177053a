//! Screen viewport over the world-coordinate board.

use crate::config::SpawnConfig;
use crate::model::note::Position;

/// Visible screen area and its pan offset relative to world coordinates.
///
/// `screen = world + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub offset: Position,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            offset: Position::default(),
        }
    }

    pub fn screen_to_world(&self, screen: Position) -> Position {
        screen.minus(self.offset)
    }

    pub fn world_to_screen(&self, world: Position) -> Position {
        world.plus(self.offset)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset = self.offset.plus(Position::new(dx, dy));
    }

    pub fn reset_pan(&mut self) {
        self.offset = Position::default();
    }

    /// World position of the on-screen anchor where new notes are printed:
    /// horizontally centered, `bottom_margin` above the bottom edge.
    pub fn spawn_point(&self, spawn: &SpawnConfig, card_width: f64) -> Position {
        let anchor = Position::new(
            self.width / 2.0 - card_width / 2.0,
            self.height - spawn.bottom_margin,
        );
        self.screen_to_world(anchor)
    }
}
