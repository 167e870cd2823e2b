//! Rendering collaborator
//!
//! The simulation never holds visual handles. Entities are identified by id
//! and positions are in logical playfield units (0..600 on both axes).

use crate::sim::{EntityId, EntityKind};

/// Receives visual events from the session. All methods default to no-ops.
pub trait Renderer {
    fn entity_created(&mut self, _id: EntityId, _kind: EntityKind) {}

    fn entity_moved(&mut self, _id: EntityId, _x: f32, _y: f32) {}

    fn entity_removed(&mut self, _id: EntityId) {}

    /// Explosion where an entity was destroyed
    fn hit_effect(&mut self, _x: f32, _y: f32) {}

    /// Beam from the cannon up to `target_y`
    fn laser_effect(&mut self, _target_y: f32) {}

    /// Brief shake of the cannon after a miss
    fn misfire_feedback(&mut self) {}

    /// HUD refresh
    fn stats_changed(&mut self, _score: u64, _energy: i32, _round: u32) {}

    /// A new game began; clear any leftover entities and overlays
    fn game_started(&mut self) {}

    /// Disable the cannon and show the game-over overlay
    fn game_over_ui(&mut self) {}

    /// Move keyboard focus to the start control
    fn focus_start_control(&mut self) {}
}

/// Renderer that draws nothing (headless runs and tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {}
