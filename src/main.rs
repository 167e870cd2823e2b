//! Audio Invaders entry point
//!
//! In the browser this wires the session to the page. Natively it plays a
//! short headless game with an autopilot and logs what happened.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, HtmlElement, HtmlInputElement, KeyboardEvent};

    use audio_invaders::announce::{Announcer, Verbosity};
    use audio_invaders::audio::{AudioBackend, Synthesizer, WebAudioBackend};
    use audio_invaders::consts::*;
    use audio_invaders::highscores::{HighScoreFlow, HighScores, HttpScoreboard, SubmitOutcome};
    use audio_invaders::input::{Command, command_for_key};
    use audio_invaders::render::Renderer;
    use audio_invaders::session::{GameSession, SessionEvent};
    use audio_invaders::settings::Settings;
    use audio_invaders::sim::{EntityId, EntityKind};

    type Session = GameSession<DomRenderer, LiveRegion>;
    type Flow = Rc<RefCell<HighScoreFlow<HttpScoreboard>>>;

    fn document() -> Option<Document> {
        web_sys::window()?.document()
    }

    fn element(id: &str) -> Option<HtmlElement> {
        document()?.get_element_by_id(id)?.dyn_into().ok()
    }

    fn performance_now() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map_or(0.0, |p| p.now())
    }

    /// Run `f` once after `millis` of wall time
    fn after(millis: i32, f: impl FnOnce() + 'static) {
        if let Some(window) = web_sys::window() {
            let callback = Closure::once_into_js(f);
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                millis,
            );
        }
    }

    fn set_inert(id: &str, inert: bool) {
        if let Some(el) = element(id) {
            let _ = if inert {
                el.set_attribute("inert", "")
            } else {
                el.remove_attribute("inert")
            };
        }
    }

    fn set_overlay(visible: bool, title: Option<&str>) {
        let Some(overlay) = element("start-overlay") else {
            return;
        };
        let display = if visible { "flex" } else { "none" };
        let _ = overlay.style().set_property("display", display);
        if let Some(title) = title {
            if let Ok(Some(h1)) = overlay.query_selector("h1") {
                h1.set_text_content(Some(title));
            }
        }
    }

    fn percent(value: f32, extent: f32) -> String {
        format!("{}%", value / extent * 100.0)
    }

    /// ARIA live region; each message replaces the previous one
    struct LiveRegion {
        el: Option<HtmlElement>,
    }

    impl LiveRegion {
        fn new() -> Self {
            Self {
                el: element("aria-announcer"),
            }
        }
    }

    impl Announcer for LiveRegion {
        fn announce(&mut self, text: &str) {
            if let Some(el) = &self.el {
                el.set_text_content(Some(text));
            }
        }
    }

    /// Absolutely positioned divs on the game board
    struct DomRenderer {
        board: Option<HtmlElement>,
        entities: HashMap<EntityId, HtmlElement>,
    }

    impl DomRenderer {
        fn new() -> Self {
            Self {
                board: element("game-board"),
                entities: HashMap::new(),
            }
        }

        fn spawn_div(&self, class: &str) -> Option<HtmlElement> {
            let div: HtmlElement = document()?.create_element("div").ok()?.dyn_into().ok()?;
            div.set_class_name(class);
            self.board.as_ref()?.append_child(&div).ok()?;
            Some(div)
        }

        fn place(div: &HtmlElement, x: f32, y: f32) {
            let style = div.style();
            let _ = style.set_property("left", &percent(x, GAME_WIDTH));
            let _ = style.set_property("top", &percent(y, GAME_HEIGHT));
        }
    }

    fn set_stat(id: &str, value: String) {
        if let Some(el) = element(id) {
            if el.text_content().as_deref() != Some(value.as_str()) {
                el.set_text_content(Some(&value));
            }
        }
    }

    impl Renderer for DomRenderer {
        fn entity_created(&mut self, id: EntityId, kind: EntityKind) {
            let class = match kind {
                EntityKind::Normal => "alien",
                EntityKind::Runner => "alien runner",
            };
            if let Some(div) = self.spawn_div(class) {
                self.entities.insert(id, div);
            }
        }

        fn entity_moved(&mut self, id: EntityId, x: f32, y: f32) {
            if let Some(div) = self.entities.get(&id) {
                Self::place(div, x, y);
            }
        }

        fn entity_removed(&mut self, id: EntityId) {
            if let Some(div) = self.entities.remove(&id) {
                div.remove();
            }
        }

        fn hit_effect(&mut self, x: f32, y: f32) {
            if let Some(div) = self.spawn_div("alien-explode") {
                Self::place(&div, x, y);
                after(500, move || div.remove());
            }
        }

        fn laser_effect(&mut self, target_y: f32) {
            let Some(board) = &self.board else { return };
            let height = board.client_height() as f32 * (1.0 - target_y / GAME_HEIGHT);
            if let Some(beam) = self.spawn_div("laser-beam") {
                let _ = beam.style().set_property("height", &format!("{}px", height));
                after(150, move || beam.remove());
            }
        }

        fn misfire_feedback(&mut self) {
            if let Some(cannon) = element("cannon-btn") {
                let _ = cannon.class_list().add_1("misfire");
                after(200, move || {
                    let _ = cannon.class_list().remove_1("misfire");
                });
            }
        }

        fn stats_changed(&mut self, score: u64, energy: i32, round: u32) {
            set_stat("score-display", score.to_string());
            set_stat("energy-display", energy.to_string());
            set_stat("round-display", round.to_string());
        }

        fn game_started(&mut self) {
            for (_, div) in self.entities.drain() {
                div.remove();
            }
            set_inert("cannon-btn", false);
            set_inert("high-scores", true);
            set_inert("footer", true);
            if let Some(cannon) = element("cannon-btn") {
                let _ = cannon.focus();
            }
            if let Some(hud) = element("hud") {
                hud.set_hidden(false);
            }
            set_overlay(false, None);
        }

        fn game_over_ui(&mut self) {
            set_inert("cannon-btn", true);
            set_inert("high-scores", false);
            set_inert("footer", false);
            if let Some(hud) = element("hud") {
                hud.set_hidden(true);
            }
            set_overlay(true, Some("Game Over, man, game over!"));
        }

        fn focus_start_control(&mut self) {
            if let Some(btn) = element("start-btn") {
                let _ = btn.focus();
            }
        }
    }

    fn render_high_scores(scores: &HighScores) {
        let (Some(document), Some(list)) = (document(), element("highscore-list")) else {
            return;
        };
        list.set_inner_html("");
        for line in scores.lines() {
            if let Ok(li) = document.create_element("li") {
                li.set_text_content(Some(&line));
                let _ = list.append_child(&li);
            }
        }
    }

    fn show_prompt() {
        set_overlay(true, Some("Game Over \u{2013} New High Score!"));
        if let Some(form) = element("highscore-form") {
            form.set_hidden(false);
        }
        if let Some(error) = element("hs-error") {
            error.set_text_content(Some(""));
        }
        if let Some(input) = initials_input() {
            input.set_value("");
            let _ = input.focus();
        }
    }

    fn hide_prompt() {
        if let Some(form) = element("highscore-form") {
            form.set_hidden(true);
        }
        set_overlay(true, Some("Game Over, man, game over!"));
        if let Some(btn) = element("start-btn") {
            let _ = btn.focus();
        }
        set_inert("high-scores", false);
        set_inert("footer", false);
    }

    fn initials_input() -> Option<HtmlInputElement> {
        document()?
            .get_element_by_id("hs-initials")?
            .dyn_into()
            .ok()
    }

    struct App {
        session: Session,
        settings: Settings,
    }

    impl App {
        /// Audio may only start after a user gesture, so the context is
        /// created on the first start
        fn ensure_audio(&mut self) {
            if self.session.synth().is_available() {
                return;
            }
            let backend = WebAudioBackend::new().map(|b| Box::new(b) as Box<dyn AudioBackend>);
            let mut synth = Synthesizer::new(backend, js_sys::Date::now() as u64);
            synth.set_master_volume(self.settings.master_volume);
            synth.set_muted(self.settings.muted);
            *self.session.synth_mut() = synth;
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Audio Invaders starting...");

        let settings = Settings::load();
        let seed = js_sys::Date::now() as u64;
        let mut session = GameSession::new(
            seed,
            Synthesizer::silent(),
            DomRenderer::new(),
            LiveRegion::new(),
        );
        session.set_verbosity(settings.verbosity);

        let flow: Flow = Rc::new(RefCell::new(HighScoreFlow::new(
            HttpScoreboard::new(&settings.scoreboard_url, &settings.scoreboard_token),
            settings.scoreboard_token.clone(),
        )));
        let app = Rc::new(RefCell::new(App { session, settings }));

        setup_start_button(app.clone());
        setup_cannon(app.clone());
        setup_keyboard(app.clone());
        setup_verbosity(app.clone());
        setup_high_score_form(flow.clone());

        {
            let flow = flow.clone();
            wasm_bindgen_futures::spawn_local(async move {
                HighScoreFlow::refresh_shared(&*flow).await;
                render_high_scores(flow.borrow().latest());
            });
        }

        request_animation_frame(app, flow);
        log::info!("Audio Invaders ready");
    }

    fn on_click(id: &str, mut handler: impl FnMut() + 'static) {
        let Some(el) = element(id) else {
            log::warn!("Missing #{}", id);
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| handler());
        let _ = el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_start_button(app: Rc<RefCell<App>>) {
        on_click("start-btn", move || {
            let mut app = app.borrow_mut();
            app.ensure_audio();
            app.session.start(performance_now());
        });
    }

    fn press_effect() {
        if let Some(cannon) = element("cannon-btn") {
            let _ = cannon.style().set_property("transform", "scale(0.95)");
            after(100, move || {
                let _ = cannon.style().set_property("transform", "scale(1)");
            });
        }
    }

    fn setup_cannon(app: Rc<RefCell<App>>) {
        on_click("cannon-btn", move || {
            let mut app = app.borrow_mut();
            if app.session.is_active() {
                app.session.request_fire(performance_now());
                press_effect();
            }
        });
    }

    fn setup_keyboard(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let focused = document().and_then(|d| d.active_element());
            if let Some(el) = &focused {
                let tag = el.tag_name().to_ascii_lowercase();
                if tag == "input" || tag == "textarea" {
                    return;
                }
            }

            let mut app = app.borrow_mut();
            let active = app.session.is_active();
            let Some(command) = command_for_key(&event.key(), &event.code(), active) else {
                return;
            };
            if command == Command::Fire {
                // The focused fire button handles its own activation
                let on_cannon = focused.is_some_and(|el| el.id() == "cannon-btn");
                if !active || on_cannon {
                    return;
                }
                press_effect();
            }
            event.prevent_default();
            app.session.command(command, performance_now());
        });
        let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_verbosity(app: Rc<RefCell<App>>) {
        let Some(radios) = document()
            .and_then(|d| d.query_selector_all("input[name=\"verbosity\"]").ok())
        else {
            return;
        };
        for i in 0..radios.length() {
            let Some(radio) = radios.item(i).and_then(|n| n.dyn_into::<HtmlInputElement>().ok())
            else {
                continue;
            };
            let app = app.clone();
            let source = radio.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if let Some(verbosity) = Verbosity::parse(&source.value()) {
                    let mut app = app.borrow_mut();
                    app.session.set_verbosity(verbosity);
                    app.settings.verbosity = verbosity;
                    app.settings.save();
                }
            });
            let _ = radio.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_high_score_form(flow: Flow) {
        if let Some(form) = element("highscore-form") {
            let flow = flow.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
                event.prevent_default();
                let raw = initials_input().map(|i| i.value()).unwrap_or_default();
                let flow = flow.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    let result =
                        HighScoreFlow::submit_shared(&*flow, &raw, &mut LiveRegion::new()).await;
                    match result {
                        Ok(outcome) => {
                            if let Some(input) = initials_input() {
                                let _ = input.remove_attribute("aria-invalid");
                            }
                            if outcome == SubmitOutcome::Saved {
                                render_high_scores(flow.borrow().latest());
                            }
                            hide_prompt();
                        }
                        Err(err) => {
                            if let Some(error) = element("hs-error") {
                                error.set_text_content(Some(&err.to_string()));
                            }
                            if let Some(input) = initials_input() {
                                let _ = input.set_attribute("aria-invalid", "true");
                                let _ = input.focus();
                            }
                        }
                    }
                });
            });
            let _ = form.add_event_listener_with_callback("submit", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        on_click("hs-cancel-btn", move || {
            flow.borrow_mut().cancel();
            hide_prompt();
        });
    }

    /// Runs once game over has completed: reload the board and prompt for
    /// initials if the score made it
    async fn check_high_score(app: Rc<RefCell<App>>, flow: Flow, score: u64) {
        let qualifies = HighScoreFlow::game_over_shared(&*flow, score).await;
        render_high_scores(flow.borrow().latest());
        if qualifies {
            app.borrow_mut().session.cancel_focus_timer();
            show_prompt();
        }
    }

    fn request_animation_frame(app: Rc<RefCell<App>>, flow: Flow) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, flow, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, flow: Flow, time: f64) {
        let mut finished = Vec::new();
        {
            let mut app = app.borrow_mut();
            app.session.tick(time);
            while let Some(event) = app.session.poll_event() {
                match event {
                    SessionEvent::GameOver { score, .. } => finished.push(score),
                }
            }
        }
        for score in finished {
            wasm_bindgen_futures::spawn_local(check_high_score(app.clone(), flow.clone(), score));
        }

        request_animation_frame(app, flow);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Audio Invaders (native) starting...");
    log::info!("Native mode is headless - serve the wasm build for the real game");

    println!("\nRunning autopilot demo...");
    autopilot_demo(clock_seed());
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Play at 60 fps, firing whenever something is in the hit zone
#[cfg(not(target_arch = "wasm32"))]
fn autopilot_demo(seed: u64) {
    use audio_invaders::announce::AnnouncementSlot;
    use audio_invaders::audio::{RecordingBackend, Synthesizer};
    use audio_invaders::render::NullRenderer;
    use audio_invaders::session::{GameSession, SessionEvent};
    use audio_invaders::sim::select_target;

    const FRAME_MS: f64 = 1000.0 / 60.0;
    const LIMIT_MS: f64 = 180_000.0;

    let backend = RecordingBackend::new();
    let audio_log = backend.log();
    let synth = Synthesizer::new(Some(Box::new(backend.clone())), seed);
    let mut session = GameSession::new(seed, synth, NullRenderer, AnnouncementSlot::new());
    session.start(0.0);

    let mut t = 0.0;
    while session.is_active() && t < LIMIT_MS {
        t += FRAME_MS;
        backend.set_time(t / 1000.0);
        session.tick(t);
        if select_target(session.state()).is_some() {
            session.request_fire(t);
        }
        if let Some(text) = session.announcer_mut().take() {
            log::info!("[{:>7.2}s] {}", t / 1000.0, text);
        }
    }

    let state = session.state();
    println!(
        "Seed {}: score {}, round {}, energy {} after {:.1}s",
        seed,
        state.score,
        state.round,
        state.energy,
        t / 1000.0
    );
    if let Some(SessionEvent::GameOver { score, round }) = session.poll_event() {
        println!("Game over with {} points in round {}", score, round);
    }
    let audio = audio_log.borrow();
    for name in ["alien_beep", "shoot", "hit", "alien_explosion", "power_up", "runner_explosion"] {
        println!("  {:<17} x{}", name, audio.played_count(name));
    }
}
