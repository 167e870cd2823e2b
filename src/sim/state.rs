//! Game state and core simulation types
//!
//! Everything the per-frame update and combat resolution mutate lives here.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Opaque entity identifier, unique within a session
pub type EntityId = u32;

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// No game has been started yet
    Idle,
    /// Ticking gameplay
    Active,
    /// Energy ran out; waiting for a restart
    GameOver,
}

/// Hostile entity variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Beeps periodically, worth 100
    Normal,
    /// Rare and fast, drives the presence hum instead of beeping, worth 200
    Runner,
}

/// Energy-derived urgency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertLevel {
    #[default]
    None,
    Warning,
    Danger,
}

impl AlertLevel {
    /// Classify an energy value
    pub fn for_energy(energy: i32) -> Self {
        if energy <= DANGER_ENERGY {
            AlertLevel::Danger
        } else if energy <= WARNING_ENERGY {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        }
    }
}

/// A descending hostile actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Position in the 600x600 logical field (y grows downward)
    pub pos: Vec2,
    /// Units per second; x flips on wall contact
    pub vel: Vec2,
    /// Pitch bias in Hz so simultaneous aliens are distinguishable
    pub tone_offset: f32,
    /// Simulation timestamp (ms) of the next beep
    pub next_beep_at: f64,
}

impl Entity {
    /// Advance by `dt` seconds, bouncing off the side walls
    pub fn advance(&mut self, dt: f32) {
        self.pos += self.vel * dt;

        if self.pos.x <= 0.0 || self.pos.x >= GAME_WIDTH {
            self.vel.x = -self.vel.x;
            self.pos.x = self.pos.x.clamp(0.0, GAME_WIDTH);
        }
    }

    /// Whether the entity has reached the bottom edge
    pub fn breached(&self) -> bool {
        self.pos.y >= GAME_HEIGHT
    }

    /// Whether the entity sits inside the cannon's hit zone
    pub fn in_hit_zone(&self) -> bool {
        (self.pos.x - CENTER_X).abs() < HIT_THRESHOLD
    }
}

/// How a successful hit was rewarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitReward {
    /// Runner destroyed (+200, +20 energy)
    Runner,
    /// Ordinary normal hit (+100, +10 energy)
    Normal,
    /// Third streak hit after round 5; `maxed` when energy saturated at the ceiling
    StreakBonus { maxed: bool },
}

/// Something the simulation reports to the session for audio, rendering and narration
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Spawned { id: EntityId, kind: EntityKind },
    Moved { id: EntityId, pos: Vec2 },
    /// A normal entity's beep is due
    Beep {
        id: EntityId,
        pan: f32,
        y_percent: f32,
        tone_offset: f32,
    },
    /// Live runner position for the presence voice
    RunnerTracked { pan: f32, pitch: f32 },
    /// An entity reached the bottom and was removed
    Breach {
        id: EntityId,
        kind: EntityKind,
        pos: Vec2,
    },
    /// The cannon fired (always precedes `Miss` or `Hit`)
    Shot,
    Miss,
    Hit {
        id: EntityId,
        kind: EntityKind,
        pos: Vec2,
        reward: HitReward,
    },
    RoundChanged { round: u32 },
    GameOver { score: u64, round: u32 },
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    /// Simulation RNG (spawn sides, jitter, beep timing)
    pub rng: Pcg32,
    pub phase: GamePhase,
    pub score: u64,
    /// Always within [0, MAX_ENERGY]
    pub energy: i32,
    /// Always `score / POINTS_PER_ROUND + 1` after an update
    pub round: u32,
    /// Consecutive hits since the last miss or bonus
    pub streak: u32,
    /// Seconds until the next spawn evaluation
    pub spawn_timer: f32,
    /// Live entities in insertion order
    pub entities: Vec<Entity>,
    /// Next entity ID
    next_id: EntityId,
}

impl GameState {
    /// Create an idle state with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: GamePhase::Idle,
            score: 0,
            energy: START_ENERGY,
            round: 1,
            streak: 0,
            spawn_timer: 0.0,
            entities: Vec::new(),
            next_id: 1,
        }
    }

    /// Reset counters and enter the active phase. The RNG stream carries over.
    pub fn start(&mut self) {
        self.phase = GamePhase::Active;
        self.score = 0;
        self.energy = START_ENERGY;
        self.round = 1;
        self.streak = 0;
        self.spawn_timer = 0.0;
        self.entities.clear();
    }

    pub fn is_active(&self) -> bool {
        self.phase == GamePhase::Active
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The live runner, if any (re-resolved on every call)
    pub fn runner(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind == EntityKind::Runner)
    }

    pub fn runner_active(&self) -> bool {
        self.runner().is_some()
    }

    pub fn normal_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| e.kind == EntityKind::Normal)
            .count()
    }

    pub fn alert_level(&self) -> AlertLevel {
        AlertLevel::for_energy(self.energy)
    }

    /// Round implied by the current score
    pub fn expected_round(&self) -> u32 {
        (self.score / POINTS_PER_ROUND) as u32 + 1
    }

    /// Raise the round if the score has earned it
    pub fn sync_round(&mut self, events: &mut Vec<GameEvent>) {
        let expected = self.expected_round();
        if expected > self.round {
            self.round = expected;
            events.push(GameEvent::RoundChanged { round: expected });
        }
    }

    /// Subtract energy (floored at zero) and end the game when it runs out.
    ///
    /// Does nothing unless the game is active, so a second drain after the
    /// game ended never re-triggers game over.
    pub fn drain_energy(&mut self, amount: i32, events: &mut Vec<GameEvent>) {
        if !self.is_active() {
            return;
        }
        self.energy = (self.energy - amount).max(0);
        if self.energy <= 0 {
            self.phase = GamePhase::GameOver;
            events.push(GameEvent::GameOver {
                score: self.score,
                round: self.round,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_thresholds() {
        assert_eq!(AlertLevel::for_energy(100), AlertLevel::None);
        assert_eq!(AlertLevel::for_energy(26), AlertLevel::None);
        assert_eq!(AlertLevel::for_energy(25), AlertLevel::Warning);
        assert_eq!(AlertLevel::for_energy(11), AlertLevel::Warning);
        assert_eq!(AlertLevel::for_energy(10), AlertLevel::Danger);
        assert_eq!(AlertLevel::for_energy(0), AlertLevel::Danger);
    }

    #[test]
    fn test_wall_bounce_reflects_and_clamps() {
        let mut e = Entity {
            id: 1,
            kind: EntityKind::Normal,
            pos: Vec2::new(590.0, 0.0),
            vel: Vec2::new(100.0, 10.0),
            tone_offset: 0.0,
            next_beep_at: 0.0,
        };
        e.advance(0.5);
        assert_eq!(e.pos.x, GAME_WIDTH);
        assert_eq!(e.vel.x, -100.0);
        assert_eq!(e.pos.y, 5.0);
    }

    #[test]
    fn test_drain_energy_game_over_once() {
        let mut state = GameState::new(1);
        state.start();
        let mut events = Vec::new();
        state.drain_energy(150, &mut events);
        assert_eq!(state.energy, 0);
        assert_eq!(state.phase, GamePhase::GameOver);
        state.drain_energy(20, &mut events);
        assert_eq!(state.energy, 0);
        let overs = events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameOver { .. }))
            .count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn test_sync_round() {
        let mut state = GameState::new(1);
        state.start();
        let mut events = Vec::new();
        state.score = 1499;
        state.sync_round(&mut events);
        assert_eq!(state.round, 3);
        assert_eq!(events, vec![GameEvent::RoundChanged { round: 3 }]);
        state.sync_round(&mut events);
        assert_eq!(events.len(), 1);
    }
}
