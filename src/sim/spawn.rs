//! Spawn policy and difficulty curves
//!
//! Normal aliens fill up to a round-dependent cap; at most one runner is
//! ever alive and it rolls independently of that cap.

use glam::Vec2;
use rand::Rng;

use super::state::{Entity, EntityId, EntityKind, GameEvent, GameState};
use crate::consts::*;
use crate::ramp;

/// Maximum number of live normal aliens for a round
pub fn normal_cap(round: u32) -> usize {
    if round >= 5 {
        (round / 2).min(3) as usize
    } else {
        1
    }
}

/// Horizontal speed magnitude before jitter
pub fn normal_speed_x(round: u32) -> f32 {
    100.0 + 20.0 * round as f32
}

/// Vertical fall speed
pub fn normal_speed_y(round: u32) -> f32 {
    15.0 + 5.0 * round as f32
}

/// How much of the [1, 2] speed jitter is unlocked (0 before round 7, 1 from round 12)
pub fn speed_jitter_ramp(round: u32) -> f32 {
    if round >= 7 {
        ((round - 7) as f32 / 5.0).min(1.0)
    } else {
        0.0
    }
}

/// Half-width of the per-alien pitch offset range, 10 Hz up to 80 Hz over rounds 4..12
pub fn tone_jitter_range(round: u32) -> f32 {
    const BASE: f32 = 10.0;
    const MAX: f32 = 80.0;
    BASE + (MAX - BASE) * ramp(round as f32, 4.0, 12.0)
}

/// Chance per spawn evaluation that a runner appears
pub fn runner_chance(round: u32) -> f64 {
    match round {
        r if r >= 18 => 0.12,
        r if r >= 14 => 0.08,
        _ => 0.05,
    }
}

pub fn runner_speed_x(round: u32) -> f32 {
    140.0 + 20.0 * round as f32
}

pub fn runner_speed_y(round: u32) -> f32 {
    20.0 + 6.0 * round as f32
}

/// Run one spawn evaluation (called when the spawn timer elapses)
pub fn evaluate(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if state.normal_count() < normal_cap(state.round) {
        spawn_normal(state, events);
    }
    maybe_spawn_runner(state, events);
}

/// Spawn a normal alien at a random top corner
pub fn spawn_normal(state: &mut GameState, events: &mut Vec<GameEvent>) -> EntityId {
    let round = state.round;
    let start_left = state.rng.random_bool(0.5);
    let direction = if start_left { 1.0 } else { -1.0 };

    let jitter = 1.0 + state.rng.random::<f32>() * speed_jitter_ramp(round);
    let speed_x = direction * normal_speed_x(round) * jitter;

    let range = tone_jitter_range(round);
    let tone_offset = (state.rng.random::<f32>() * 2.0 - 1.0) * range;

    let id = state.next_entity_id();
    state.entities.push(Entity {
        id,
        kind: EntityKind::Normal,
        pos: Vec2::new(if start_left { 0.0 } else { GAME_WIDTH }, 0.0),
        vel: Vec2::new(speed_x, normal_speed_y(round)),
        tone_offset,
        next_beep_at: 0.0,
    });
    log::debug!("Spawned alien {} (round {}, vx {:.1})", id, round, speed_x);
    events.push(GameEvent::Spawned {
        id,
        kind: EntityKind::Normal,
    });
    id
}

/// Roll for a runner; skipped while one is alive
pub fn maybe_spawn_runner(state: &mut GameState, events: &mut Vec<GameEvent>) -> Option<EntityId> {
    if state.runner_active() {
        return None;
    }
    if !state.rng.random_bool(runner_chance(state.round)) {
        return None;
    }
    Some(spawn_runner(state, events))
}

/// Spawn a runner unconditionally
pub fn spawn_runner(state: &mut GameState, events: &mut Vec<GameEvent>) -> EntityId {
    let round = state.round;
    let start_left = state.rng.random_bool(0.5);
    let direction = if start_left { 1.0 } else { -1.0 };

    let id = state.next_entity_id();
    state.entities.push(Entity {
        id,
        kind: EntityKind::Runner,
        pos: Vec2::new(if start_left { 0.0 } else { GAME_WIDTH }, 0.0),
        vel: Vec2::new(direction * runner_speed_x(round), runner_speed_y(round)),
        tone_offset: 0.0,
        next_beep_at: 0.0,
    });
    log::debug!("Spawned runner {} (round {})", id, round);
    events.push(GameEvent::Spawned {
        id,
        kind: EntityKind::Runner,
    });
    id
}
