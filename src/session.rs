//! Game session
//!
//! Owns the simulation state, the synthesizer, the ambience controller and the
//! collaborators, and routes every simulation event to them in order. The
//! browser loop calls `tick` once per animation frame and `request_fire` from
//! input handlers; nothing else mutates the game.

use crate::announce::{Announcer, Topic, Verbosity};
use crate::audio::{Ambience, SoundEffect, Synthesizer};
use crate::consts::*;
use crate::input::{Command, FireGate};
use crate::render::Renderer;
use crate::sim::{self, EntityKind, FireOutcome, GameEvent, GameState, HitReward};

/// Something that happened which code outside the session may react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Game over completed (audio, announcement and timers armed)
    GameOver { score: u64, round: u32 },
}

/// One player's game, from start to game over and restart
pub struct GameSession<R: Renderer, A: Announcer> {
    state: GameState,
    synth: Synthesizer,
    ambience: Ambience,
    renderer: R,
    announcer: A,
    verbosity: Verbosity,
    fire_gate: FireGate,
    /// Timestamp of the previous frame (ms)
    last_frame_ms: Option<f64>,
    /// Latest known time on the frame clock (seconds)
    now: f64,
    game_over_ui_at: Option<f64>,
    focus_start_at: Option<f64>,
    pending: Vec<SessionEvent>,
    /// Scratch buffer reused across frames
    events: Vec<GameEvent>,
}

impl<R: Renderer, A: Announcer> GameSession<R, A> {
    pub fn new(seed: u64, synth: Synthesizer, renderer: R, announcer: A) -> Self {
        Self {
            state: GameState::new(seed),
            synth,
            ambience: Ambience::new(),
            renderer,
            announcer,
            verbosity: Verbosity::default(),
            fire_gate: FireGate::new(),
            last_frame_ms: None,
            now: 0.0,
            game_over_ui_at: None,
            focus_start_at: None,
            pending: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn synth(&self) -> &Synthesizer {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut Synthesizer {
        &mut self.synth
    }

    pub fn ambience(&self) -> &Ambience {
        &self.ambience
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn announcer(&self) -> &A {
        &self.announcer
    }

    pub fn announcer_mut(&mut self) -> &mut A {
        &mut self.announcer
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// Begin a new game at frame time `timestamp_ms`
    pub fn start(&mut self, timestamp_ms: f64) {
        self.now = timestamp_ms / 1000.0;
        self.synth.resume();
        self.state.start();
        self.ambience.open(&mut self.synth);
        self.fire_gate.reset();
        self.last_frame_ms = Some(timestamp_ms);
        self.game_over_ui_at = None;
        self.focus_start_at = None;

        log::info!("Game started (seed {})", self.state.seed);
        self.renderer.game_started();
        self.narrate(Topic::Other, "Game Started, listen for the beeps!", None);
        self.refresh();
    }

    /// Advance one animation frame
    pub fn tick(&mut self, timestamp_ms: f64) {
        self.now = timestamp_ms / 1000.0;

        if self.state.is_active() {
            let dt = self
                .last_frame_ms
                .map_or(0.0, |last| ((timestamp_ms - last) / 1000.0) as f32)
                .clamp(0.0, MAX_FRAME_DT);
            let mut events = std::mem::take(&mut self.events);
            sim::tick(&mut self.state, dt, timestamp_ms, &mut events);
            self.dispatch(&mut events);
            self.events = events;
        }
        self.last_frame_ms = Some(timestamp_ms);

        self.ambience.pump(self.now, &mut self.synth);
        self.run_timers();
    }

    /// Fire the cannon, subject to the debounce
    pub fn request_fire(&mut self, timestamp_ms: f64) -> FireOutcome {
        if !self.state.is_active() || !self.fire_gate.try_fire(timestamp_ms) {
            return FireOutcome::Ignored;
        }
        self.now = self.now.max(timestamp_ms / 1000.0);

        let mut events = std::mem::take(&mut self.events);
        let outcome = sim::fire(&mut self.state, &mut events);
        self.dispatch(&mut events);
        self.events = events;
        outcome
    }

    /// Handle a mapped key press
    pub fn command(&mut self, command: Command, timestamp_ms: f64) {
        match command {
            Command::Fire => {
                self.request_fire(timestamp_ms);
            }
            Command::AnnounceScore | Command::AnnounceEnergy | Command::AnnounceRound => {
                self.announce_stat(command);
            }
        }
    }

    /// Read a stat aloud (stat hotkeys; bypasses verbosity)
    pub fn announce_stat(&mut self, stat: Command) {
        if !self.state.is_active() {
            return;
        }
        let text = match stat {
            Command::AnnounceScore => format!("Score: {}", self.state.score),
            Command::AnnounceEnergy => format!("Energy: {}", self.state.energy),
            Command::AnnounceRound => format!("Round {}", self.state.round),
            Command::Fire => return,
        };
        self.announcer.announce(&text);
    }

    /// Keep focus where it is (the high-score prompt has taken over)
    pub fn cancel_focus_timer(&mut self) {
        self.focus_start_at = None;
    }

    pub fn focus_timer_pending(&self) -> bool {
        self.focus_start_at.is_some()
    }

    /// Next completion event, oldest first
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    fn narrate(&mut self, topic: Topic, text: &str, low_text: Option<&str>) {
        if let Some(text) = self.verbosity.filter(topic, text, low_text) {
            self.announcer.announce(text);
        }
    }

    /// Stats refresh and alert re-evaluation after any energy or score change
    fn refresh(&mut self) {
        self.renderer
            .stats_changed(self.state.score, self.state.energy, self.state.round);
        if self.state.is_active() {
            self.ambience
                .set_alert(self.state.alert_level(), self.now, &mut self.synth);
        }
    }

    fn dispatch(&mut self, events: &mut Vec<GameEvent>) {
        let mut over = false;
        for event in events.drain(..) {
            match event {
                GameEvent::Spawned { id, kind } => {
                    self.renderer.entity_created(id, kind);
                    if kind == EntityKind::Runner {
                        self.ambience.start_runner(self.now);
                    }
                }
                GameEvent::Moved { id, pos } => self.renderer.entity_moved(id, pos.x, pos.y),
                GameEvent::Beep {
                    pan,
                    y_percent,
                    tone_offset,
                    ..
                } => self.synth.play(SoundEffect::AlienBeep {
                    pan,
                    y_percent,
                    tone_offset,
                }),
                GameEvent::RunnerTracked { pan, pitch } => {
                    self.ambience.track_runner(pan, pitch, &mut self.synth)
                }
                GameEvent::Breach { id, .. } if over => {
                    // Bell and final score stay the last things heard
                    self.renderer.entity_removed(id);
                }
                GameEvent::Breach { id, kind, .. } => {
                    self.renderer.entity_removed(id);
                    match kind {
                        EntityKind::Runner => self.ambience.stop_runner(&mut self.synth),
                        EntityKind::Normal => {
                            self.synth.play(SoundEffect::AlienExplosion);
                            self.narrate(Topic::Other, "Kaboom! Energy lost.", None);
                        }
                    }
                    self.refresh();
                }
                GameEvent::Shot => self.synth.play(SoundEffect::Shoot),
                GameEvent::Miss => {
                    self.synth.play(SoundEffect::Miss);
                    self.narrate(Topic::Other, "Miss!", None);
                    self.renderer.misfire_feedback();
                    self.refresh();
                }
                GameEvent::Hit {
                    id, pos, reward, ..
                } => {
                    self.renderer.laser_effect(pos.y);
                    self.renderer.hit_effect(pos.x, pos.y);
                    self.renderer.entity_removed(id);
                    self.reward(reward);
                    self.refresh();
                }
                GameEvent::RoundChanged { round } => {
                    log::info!("Round {}", round);
                    self.narrate(Topic::Round, &format!("Round {}", round), None);
                    self.refresh();
                }
                GameEvent::GameOver { score, round } => {
                    over = true;
                    self.game_over(score, round);
                }
            }
        }
    }

    fn reward(&mut self, reward: HitReward) {
        let score = self.state.score.to_string();
        match reward {
            HitReward::Runner => {
                self.ambience.stop_runner(&mut self.synth);
                self.synth.play(SoundEffect::RunnerExplosion);
                self.narrate(
                    Topic::Score,
                    &format!("Runner destroyed! Score: {}", score),
                    Some(score.as_str()),
                );
            }
            HitReward::Normal => {
                self.synth.play(SoundEffect::Hit);
                self.narrate(
                    Topic::Score,
                    &format!("Hit! Score: {}", score),
                    Some(score.as_str()),
                );
            }
            HitReward::StreakBonus { maxed } => {
                let text = if maxed { "Max Energy!" } else { "+15 Energy Boost!" };
                self.narrate(Topic::Other, text, None);
                self.synth.play(SoundEffect::PowerUp);
            }
        }
    }

    fn game_over(&mut self, score: u64, round: u32) {
        log::info!("Game over: score {} in round {}", score, round);
        self.ambience.shutdown(&mut self.synth);
        self.synth.play(SoundEffect::Bell);
        self.announcer
            .announce(&format!("Game over, man, game over! Final Score {}.", score));
        self.game_over_ui_at = Some(self.now + GAME_OVER_UI_DELAY);
        self.focus_start_at = Some(self.now + START_FOCUS_DELAY);
        self.pending.push(SessionEvent::GameOver { score, round });
    }

    fn run_timers(&mut self) {
        if self.game_over_ui_at.is_some_and(|at| self.now >= at) {
            self.game_over_ui_at = None;
            self.renderer.game_over_ui();
        }
        if self.focus_start_at.is_some_and(|at| self.now >= at) {
            self.focus_start_at = None;
            self.renderer.focus_start_control();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::AnnouncementSlot;
    use crate::audio::{AudioLog, ContinuousVoice, Param, RecordingBackend};
    use crate::audio::graph::ParamEvent;
    use crate::sim::{AlertLevel, Entity, EntityId, GamePhase, select_target};
    use glam::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Renderer for Recorder {
        fn entity_created(&mut self, id: EntityId, kind: EntityKind) {
            self.calls.push(format!("created {} {:?}", id, kind));
        }

        fn entity_removed(&mut self, id: EntityId) {
            self.calls.push(format!("removed {}", id));
        }

        fn laser_effect(&mut self, _target_y: f32) {
            self.calls.push("laser".into());
        }

        fn misfire_feedback(&mut self) {
            self.calls.push("misfire".into());
        }

        fn game_over_ui(&mut self) {
            self.calls.push("game_over_ui".into());
        }

        fn focus_start_control(&mut self) {
            self.calls.push("focus_start".into());
        }
    }

    impl Recorder {
        fn count(&self, call: &str) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }
    }

    type Session = GameSession<Recorder, AnnouncementSlot>;

    fn session() -> (Session, RecordingBackend, Rc<RefCell<AudioLog>>) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let synth = Synthesizer::new(Some(Box::new(backend.clone())), 3);
        let mut session = GameSession::new(42, synth, Recorder::default(), AnnouncementSlot::new());
        session.start(0.0);
        (session, backend, log)
    }

    fn place(session: &mut Session, kind: EntityKind, pos: Vec2, vel: Vec2) -> EntityId {
        let state = &mut session.state;
        let id = state.next_entity_id();
        state.entities.push(Entity {
            id,
            kind,
            pos,
            vel,
            tone_offset: 0.0,
            // Far future so test entities stay quiet
            next_beep_at: f64::MAX,
        });
        id
    }

    #[test]
    fn test_start_resets_and_announces() {
        let (session, _backend, log) = session();
        assert_eq!(session.state().phase, GamePhase::Active);
        assert_eq!(session.state().energy, 100);
        assert_eq!(session.state().round, 1);
        assert_eq!(
            session.announcer().current(),
            Some("Game Started, listen for the beeps!")
        );
        assert_eq!(log.borrow().open.len(), 2);
    }

    #[test]
    fn test_miss_with_empty_zone() {
        let (mut session, _backend, log) = session();
        let outcome = session.request_fire(100.0);
        assert_eq!(outcome, FireOutcome::Miss);
        assert_eq!(session.state().energy, 95);
        assert_eq!(session.state().streak, 0);
        assert_eq!(log.borrow().played, vec!["shoot", "miss"]);
        assert_eq!(session.announcer().current(), Some("Miss!"));
        assert_eq!(session.renderer().count("misfire"), 1);
    }

    #[test]
    fn test_fire_is_debounced() {
        let (mut session, _backend, _log) = session();
        session.request_fire(100.0);
        assert_eq!(session.request_fire(150.0), FireOutcome::Ignored);
        assert_eq!(session.state().energy, 95);
        assert_eq!(session.request_fire(180.0), FireOutcome::Miss);
        assert_eq!(session.state().energy, 90);
    }

    #[test]
    fn test_spawned_alien_reaches_zone_and_is_hit() {
        let (mut session, _backend, log) = session();
        session.tick(0.0);
        assert_eq!(session.state().normal_count(), 1);
        session.state.entities.retain(|e| e.kind == EntityKind::Normal);
        let id = session.state().entities[0].id;

        let mut t = 0.0;
        while select_target(session.state()).is_none() {
            t += 16.0;
            session.tick(t);
            assert!(t < 10_000.0, "alien never reached the hit zone");
        }
        assert!(log.borrow().played_count("alien_beep") > 0);

        let outcome = session.request_fire(t);
        assert!(matches!(outcome, FireOutcome::Hit { kind: EntityKind::Normal, .. }));
        assert_eq!(session.state().score, 100);
        assert_eq!(session.state().energy, 100);
        assert!(session.state().entities.iter().all(|e| e.id != id));
        assert_eq!(log.borrow().last_played(), Some("hit"));
        assert_eq!(session.announcer().current(), Some("Hit! Score: 100"));
        assert_eq!(session.renderer().count(&format!("removed {}", id)), 1);
    }

    #[test]
    fn test_alert_follows_energy() {
        let (mut session, _backend, log) = session();
        let voice = ContinuousVoice::EnergyAlert;
        let mut t = 0.0;
        let mut miss_until = |session: &mut Session, energy: i32| {
            while session.state().energy > energy {
                t += 100.0;
                session.request_fire(t);
            }
        };

        miss_until(&mut session, 25);
        assert_eq!(session.ambience().alert(), AlertLevel::Warning);
        let gain = log.borrow().last_scheduled(voice, Param::Gain).unwrap().clone();
        assert!(matches!(gain.events()[0], ParamEvent::Cancel { .. }));

        miss_until(&mut session, 10);
        assert_eq!(session.ambience().alert(), AlertLevel::Danger);
        let gain = log.borrow().last_scheduled(voice, Param::Gain).unwrap().clone();
        assert!(matches!(gain.events()[0], ParamEvent::Cancel { .. }));

        session.state.energy = 60;
        session.refresh();
        assert_eq!(session.ambience().alert(), AlertLevel::None);
        let fade = log.borrow().last_scheduled(voice, Param::Gain).unwrap().clone();
        assert!(matches!(fade.events()[0], ParamEvent::Cancel { .. }));
        assert!(matches!(fade.events()[1], ParamEvent::Linear { value, .. } if value == 0.0));
    }

    #[test]
    fn test_breach_penalties() {
        let (mut session, _backend, log) = session();
        session.tick(0.0);
        session.state.entities.clear();
        session.state.spawn_timer = 100.0;

        place(&mut session, EntityKind::Normal, Vec2::new(100.0, 599.0), Vec2::new(0.0, 100.0));
        session.tick(50.0);
        assert_eq!(session.state().energy, 80);
        assert_eq!(log.borrow().last_played(), Some("alien_explosion"));
        assert_eq!(session.announcer().current(), Some("Kaboom! Energy lost."));

        let played = log.borrow().played.len();
        place(&mut session, EntityKind::Runner, Vec2::new(100.0, 599.0), Vec2::new(0.0, 100.0));
        session.tick(100.0);
        assert_eq!(session.state().energy, 50);
        assert_eq!(log.borrow().played.len(), played);
    }

    #[test]
    fn test_runner_presence_lifecycle() {
        let (mut session, _backend, log) = session();
        session.tick(0.0);
        session.state.spawn_timer = 100.0;
        session.state.entities.clear();
        let mut events = Vec::new();
        sim::spawn::spawn_runner(&mut session.state, &mut events);
        session.dispatch(&mut events);
        assert!(session.ambience().runner_active());

        session.tick(16.0);
        let voice = ContinuousVoice::RunnerPresence;
        assert!(log.borrow().last_scheduled(voice, Param::Pan).is_some());

        // Pulse comes due 300 ms after the runner appeared
        session.tick(400.0);
        let pulse = log.borrow().last_scheduled(voice, Param::Gain).unwrap().clone();
        assert_eq!(pulse.events().len(), 5);

        let runner = session.state().runner().unwrap().id;
        let pos = session.state().runner().unwrap().pos;
        session.state.entities[0].pos = Vec2::new(CENTER_X, pos.y);
        let outcome = session.request_fire(500.0);
        assert_eq!(
            outcome,
            FireOutcome::Hit {
                kind: EntityKind::Runner,
                reward: HitReward::Runner
            }
        );
        assert!(!session.ambience().runner_active());
        assert_eq!(log.borrow().last_played(), Some("runner_explosion"));
        assert_eq!(session.renderer().count(&format!("removed {}", runner)), 1);
    }

    #[test]
    fn test_game_over_flow() {
        let (mut session, _backend, log) = session();
        session.state.energy = 5;
        session.request_fire(1000.0);

        assert_eq!(session.state().phase, GamePhase::GameOver);
        assert_eq!(log.borrow().played_count("bell"), 1);
        assert!(log.borrow().open.is_empty());
        assert_eq!(
            session.announcer().current(),
            Some("Game over, man, game over! Final Score 0.")
        );
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::GameOver { score: 0, round: 1 })
        );
        assert_eq!(session.poll_event(), None);
        assert_eq!(session.request_fire(2000.0), FireOutcome::Ignored);

        session.tick(2100.0);
        assert_eq!(session.renderer().count("game_over_ui"), 0);
        session.tick(2300.0);
        assert_eq!(session.renderer().count("game_over_ui"), 1);
        session.tick(6000.0);
        assert_eq!(session.renderer().count("focus_start"), 1);
        session.tick(7000.0);
        assert_eq!(session.renderer().count("game_over_ui"), 1);
    }

    #[test]
    fn test_focus_timer_can_be_cancelled() {
        let (mut session, _backend, _log) = session();
        session.state.energy = 5;
        session.request_fire(1000.0);
        assert!(session.focus_timer_pending());
        session.cancel_focus_timer();
        session.tick(7000.0);
        assert_eq!(session.renderer().count("focus_start"), 0);
        assert_eq!(session.renderer().count("game_over_ui"), 1);
    }

    #[test]
    fn test_game_over_happens_once() {
        let (mut session, _backend, log) = session();
        session.tick(0.0);
        session.state.entities.clear();
        session.state.spawn_timer = 100.0;
        session.state.energy = 20;
        let ids: Vec<EntityId> = [100.0, 200.0]
            .into_iter()
            .map(|x| {
                place(&mut session, EntityKind::Normal, Vec2::new(x, 599.0), Vec2::new(0.0, 100.0))
            })
            .collect();
        session.tick(50.0);
        assert_eq!(session.state().energy, 0);
        assert_eq!(log.borrow().played_count("bell"), 1);
        assert_eq!(log.borrow().played_count("alien_explosion"), 1);
        assert_eq!(log.borrow().last_played(), Some("bell"));
        assert_eq!(
            session.announcer().current(),
            Some("Game over, man, game over! Final Score 0.")
        );
        for id in ids {
            assert_eq!(session.renderer().count(&format!("removed {}", id)), 1);
        }
        assert!(session.poll_event().is_some());
        assert!(session.poll_event().is_none());
        assert!(session.state().entities.is_empty());
    }

    #[test]
    fn test_low_verbosity_and_hotkeys() {
        let (mut session, _backend, _log) = session();
        session.set_verbosity(Verbosity::Low);
        place(&mut session, EntityKind::Normal, Vec2::new(CENTER_X, 300.0), Vec2::ZERO);
        session.request_fire(100.0);
        assert_eq!(session.announcer().current(), Some("100"));

        let total = session.announcer().total();
        session.request_fire(300.0);
        assert_eq!(session.announcer().total(), total);

        session.command(Command::AnnounceEnergy, 400.0);
        assert_eq!(session.announcer().current(), Some("Energy: 95"));
        session.command(Command::AnnounceRound, 400.0);
        assert_eq!(session.announcer().current(), Some("Round 1"));
        session.command(Command::AnnounceScore, 400.0);
        assert_eq!(session.announcer().current(), Some("Score: 100"));
    }

    #[test]
    fn test_round_change_is_narrated() {
        let (mut session, _backend, _log) = session();
        session.state.score = 400;
        place(&mut session, EntityKind::Normal, Vec2::new(CENTER_X, 300.0), Vec2::ZERO);
        session.request_fire(100.0);
        assert_eq!(session.state().round, 2);
        assert_eq!(session.announcer().current(), Some("Round 2"));
    }

    #[test]
    fn test_silent_session_plays_through() {
        let mut session = GameSession::new(
            9,
            Synthesizer::silent(),
            crate::render::NullRenderer,
            AnnouncementSlot::new(),
        );
        session.start(0.0);
        let mut t = 0.0;
        while session.is_active() {
            t += 100.0;
            session.tick(t);
            session.request_fire(t);
            assert!(t < 120_000.0);
        }
        assert_eq!(session.state().energy, 0);
        assert!(session.poll_event().is_some());
    }
}
