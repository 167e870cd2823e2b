//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Seeded RNG only
//! - Stable iteration order (insertion order of entities)
//! - No audio, rendering or platform dependencies

pub mod combat;
pub mod spawn;
pub mod state;
pub mod tick;

pub use combat::{FireOutcome, fire, select_target};
pub use state::{
    AlertLevel, Entity, EntityId, EntityKind, GameEvent, GamePhase, GameState, HitReward,
};
pub use tick::tick;
