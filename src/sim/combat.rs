//! Cannon fire resolution
//!
//! The cannon hits the deepest entity inside the centered hit zone. Misses
//! cost energy and break the streak; hits pay out by entity kind and round.

use super::state::{EntityKind, GameEvent, GameState, HitReward};
use crate::consts::*;

/// Energy cost of firing at nothing
pub const MISS_PENALTY: i32 = 5;
/// Streak length that earns the bonus after round 5
pub const STREAK_BONUS_AT: u32 = 3;
pub const STREAK_BONUS_ENERGY: i32 = 15;

/// Outcome of a fire request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The game is not active; nothing happened
    Ignored,
    Miss,
    Hit { kind: EntityKind, reward: HitReward },
}

/// Index of the entity the cannon would hit: deepest in the zone, earliest
/// inserted on ties
pub fn select_target(state: &GameState) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, entity) in state.entities.iter().enumerate() {
        if !entity.in_hit_zone() {
            continue;
        }
        match best {
            Some((_, y)) if entity.pos.y <= y => {}
            _ => best = Some((idx, entity.pos.y)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Add `amount` energy, saturating at `ceiling` once energy is already past
/// `ceiling - amount`
fn boost_energy(energy: i32, amount: i32, ceiling: i32) -> i32 {
    if energy <= ceiling - amount {
        energy + amount
    } else {
        ceiling
    }
}

/// Resolve a cannon shot against the current entities
pub fn fire(state: &mut GameState, events: &mut Vec<GameEvent>) -> FireOutcome {
    if !state.is_active() {
        return FireOutcome::Ignored;
    }
    events.push(GameEvent::Shot);

    let Some(idx) = select_target(state) else {
        state.streak = 0;
        events.push(GameEvent::Miss);
        state.drain_energy(MISS_PENALTY, events);
        return FireOutcome::Miss;
    };

    if state.round >= 5 {
        state.streak += 1;
    }

    let target = state.entities.remove(idx);
    let reward = match target.kind {
        EntityKind::Runner => {
            state.score += 200;
            state.energy = boost_energy(state.energy, 20, MAX_ENERGY);
            HitReward::Runner
        }
        EntityKind::Normal if state.round <= 5 => {
            state.score += 100;
            state.energy = (state.energy + 10).min(BASE_ENERGY_CAP);
            HitReward::Normal
        }
        EntityKind::Normal => {
            state.score += 100;
            state.energy = (state.energy + 10).min(MAX_ENERGY);
            if state.streak == STREAK_BONUS_AT {
                let maxed = state.energy > MAX_ENERGY - STREAK_BONUS_ENERGY;
                state.energy = boost_energy(state.energy, STREAK_BONUS_ENERGY, MAX_ENERGY);
                state.streak = 0;
                HitReward::StreakBonus { maxed }
            } else {
                HitReward::Normal
            }
        }
    };

    events.push(GameEvent::Hit {
        id: target.id,
        kind: target.kind,
        pos: target.pos,
        reward,
    });
    state.sync_round(events);

    FireOutcome::Hit {
        kind: target.kind,
        reward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Entity, GamePhase};
    use glam::Vec2;
    use proptest::prelude::*;

    fn active_state() -> GameState {
        let mut state = GameState::new(42);
        state.start();
        state
    }

    fn place(state: &mut GameState, kind: EntityKind, x: f32, y: f32) -> u32 {
        let id = state.next_entity_id();
        state.entities.push(Entity {
            id,
            kind,
            pos: Vec2::new(x, y),
            vel: Vec2::ZERO,
            tone_offset: 0.0,
            next_beep_at: 0.0,
        });
        id
    }

    #[test]
    fn test_miss_costs_energy_and_streak() {
        let mut state = active_state();
        state.streak = 2;
        place(&mut state, EntityKind::Normal, 10.0, 300.0);
        let mut events = Vec::new();
        assert_eq!(fire(&mut state, &mut events), FireOutcome::Miss);
        assert_eq!(state.energy, 95);
        assert_eq!(state.streak, 0);
        assert_eq!(events, vec![GameEvent::Shot, GameEvent::Miss]);
    }

    #[test]
    fn test_hit_zone_is_exclusive() {
        let mut state = active_state();
        place(&mut state, EntityKind::Normal, CENTER_X + HIT_THRESHOLD, 300.0);
        assert_eq!(select_target(&state), None);
        place(&mut state, EntityKind::Normal, CENTER_X - 59.0, 100.0);
        assert_eq!(select_target(&state), Some(1));
    }

    #[test]
    fn test_deepest_target_wins() {
        let mut state = active_state();
        place(&mut state, EntityKind::Normal, 290.0, 100.0);
        let deepest = place(&mut state, EntityKind::Normal, 300.0, 300.0);
        place(&mut state, EntityKind::Normal, 310.0, 200.0);
        let mut events = Vec::new();
        fire(&mut state, &mut events);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Hit { id, .. } if *id == deepest)));
        assert_eq!(state.entities.len(), 2);
    }

    #[test]
    fn test_tie_breaks_by_insertion_order() {
        let mut state = active_state();
        let first = place(&mut state, EntityKind::Normal, 280.0, 250.0);
        place(&mut state, EntityKind::Normal, 320.0, 250.0);
        assert_eq!(state.entities[select_target(&state).unwrap()].id, first);
    }

    #[test]
    fn test_normal_hit_early_rounds_capped_at_100() {
        let mut state = active_state();
        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        let outcome = fire(&mut state, &mut Vec::new());
        assert_eq!(
            outcome,
            FireOutcome::Hit {
                kind: EntityKind::Normal,
                reward: HitReward::Normal
            }
        );
        assert_eq!(state.score, 100);
        assert_eq!(state.energy, 100);
        assert_eq!(state.streak, 0);
    }

    #[test]
    fn test_runner_reward() {
        let mut state = active_state();
        state.energy = 150;
        place(&mut state, EntityKind::Runner, 300.0, 400.0);
        fire(&mut state, &mut Vec::new());
        assert_eq!(state.energy, 170);
        assert_eq!(state.score, 200);

        state.energy = 160;
        place(&mut state, EntityKind::Runner, 300.0, 400.0);
        fire(&mut state, &mut Vec::new());
        assert_eq!(state.energy, 175);
    }

    #[test]
    fn test_streak_bonus_after_round_five() {
        let mut state = active_state();
        state.score = 2500;
        state.round = 6;
        state.energy = 50;
        for _ in 0..2 {
            place(&mut state, EntityKind::Normal, 300.0, 400.0);
            fire(&mut state, &mut Vec::new());
        }
        assert_eq!(state.streak, 2);
        assert_eq!(state.energy, 70);

        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        let outcome = fire(&mut state, &mut Vec::new());
        assert_eq!(
            outcome,
            FireOutcome::Hit {
                kind: EntityKind::Normal,
                reward: HitReward::StreakBonus { maxed: false }
            }
        );
        assert_eq!(state.energy, 95);
        assert_eq!(state.streak, 0);
    }

    #[test]
    fn test_streak_bonus_saturates() {
        let mut state = active_state();
        state.score = 3000;
        state.round = 7;
        state.energy = 155;
        state.streak = 2;
        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        let outcome = fire(&mut state, &mut Vec::new());
        assert_eq!(
            outcome,
            FireOutcome::Hit {
                kind: EntityKind::Normal,
                reward: HitReward::StreakBonus { maxed: true }
            }
        );
        assert_eq!(state.energy, MAX_ENERGY);
    }

    #[test]
    fn test_streak_only_counts_from_round_five() {
        let mut state = active_state();
        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        fire(&mut state, &mut Vec::new());
        assert_eq!(state.streak, 0);

        state.score = 2000;
        state.round = 5;
        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        fire(&mut state, &mut Vec::new());
        assert_eq!(state.streak, 1);
    }

    #[test]
    fn test_hit_advances_round() {
        let mut state = active_state();
        state.score = 400;
        place(&mut state, EntityKind::Normal, 300.0, 400.0);
        let mut events = Vec::new();
        fire(&mut state, &mut events);
        assert_eq!(state.round, 2);
        assert_eq!(events.last(), Some(&GameEvent::RoundChanged { round: 2 }));
    }

    #[test]
    fn test_miss_can_end_game() {
        let mut state = active_state();
        state.energy = 5;
        let mut events = Vec::new();
        fire(&mut state, &mut events);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(fire(&mut state, &mut events), FireOutcome::Ignored);
    }

    proptest! {
        #[test]
        fn prop_fire_keeps_invariants(
            energy in 1i32..=175,
            score_rounds in 0u64..30,
            xs in proptest::collection::vec((0.0f32..600.0, 0.0f32..600.0), 0..6),
        ) {
            let mut state = active_state();
            state.energy = energy;
            state.score = score_rounds * 500;
            state.round = state.expected_round();
            for (x, y) in xs {
                let kind = if x > 590.0 { EntityKind::Runner } else { EntityKind::Normal };
                place(&mut state, kind, x, y);
            }
            let score_before = state.score;
            fire(&mut state, &mut Vec::new());
            prop_assert!((0..=MAX_ENERGY).contains(&state.energy));
            prop_assert!(state.score >= score_before);
            prop_assert_eq!(state.round, state.expected_round());
        }
    }
}
