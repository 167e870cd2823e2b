//! Per-frame simulation tick
//!
//! Advances spawning, movement, beep scheduling and breach detection. The tick
//! never touches audio or the page; it reports what happened as `GameEvent`s.

use rand::Rng;

use super::spawn;
use super::state::{EntityKind, GameEvent, GameState};
use crate::consts::*;
use crate::{pan_for_x, y_percent};

/// Energy lost when an entity reaches the bottom
pub fn breach_penalty(kind: EntityKind) -> i32 {
    match kind {
        EntityKind::Normal => 20,
        EntityKind::Runner => 30,
    }
}

/// Beep rate multiplier from round and crowding
pub fn difficulty(round: u32, live_entities: usize) -> f64 {
    let round_factor = round.saturating_sub(1) as f64;
    let density_factor = live_entities.saturating_sub(1) as f64;
    1.0 + round_factor * 0.15 + density_factor * 0.1
}

/// Un-jittered delay until the next beep, in ms. Lower aliens beep faster.
pub fn beep_interval_ms(y: f32, round: u32, live_entities: usize) -> f64 {
    let base = 1000.0 - (y / GAME_HEIGHT) as f64 * 850.0;
    (base / difficulty(round, live_entities)).max(120.0)
}

/// Runner presence pitch: 110 Hz at the top rising to 370 Hz at the bottom
pub fn runner_pitch(y: f32) -> f32 {
    110.0 + 260.0 * (y / GAME_HEIGHT).min(1.0)
}

/// Advance the game state by `dt` seconds at simulation time `now_ms`
pub fn tick(state: &mut GameState, dt: f32, now_ms: f64, events: &mut Vec<GameEvent>) {
    if !state.is_active() {
        return;
    }

    // Spawning
    state.spawn_timer -= dt;
    if state.spawn_timer <= 0.0 {
        spawn::evaluate(state, events);
        state.spawn_timer = SPAWN_INTERVAL;
    }

    // Movement and audio cues
    let live = state.entities.len();
    let round = state.round;
    let GameState { entities, rng, .. } = &mut *state;
    for entity in entities.iter_mut() {
        entity.advance(dt);
        events.push(GameEvent::Moved {
            id: entity.id,
            pos: entity.pos,
        });

        match entity.kind {
            EntityKind::Runner => events.push(GameEvent::RunnerTracked {
                pan: pan_for_x(entity.pos.x),
                pitch: runner_pitch(entity.pos.y),
            }),
            EntityKind::Normal => {
                if now_ms >= entity.next_beep_at {
                    events.push(GameEvent::Beep {
                        id: entity.id,
                        pan: pan_for_x(entity.pos.x),
                        y_percent: y_percent(entity.pos.y),
                        tone_offset: entity.tone_offset,
                    });
                    let interval = beep_interval_ms(entity.pos.y, round, live);
                    // +/-15%
                    let jitter = interval * 0.3 * (rng.random::<f64>() - 0.5);
                    entity.next_beep_at = now_ms + interval + jitter;
                }
            }
        }
    }

    // Breaches, only after every entity has moved
    let mut breached = Vec::new();
    state.entities.retain(|e| {
        if e.breached() {
            breached.push(e.clone());
            false
        } else {
            true
        }
    });
    for entity in breached {
        log::debug!("{:?} {} breached at x={:.0}", entity.kind, entity.id, entity.pos.x);
        events.push(GameEvent::Breach {
            id: entity.id,
            kind: entity.kind,
            pos: entity.pos,
        });
        state.drain_energy(breach_penalty(entity.kind), events);
    }

    // Round progression
    if state.is_active() {
        state.sync_round(events);
    }
}
