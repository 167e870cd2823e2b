//! High score leaderboard
//!
//! The list lives on a remote scoreboard. Failures never reach gameplay:
//! a failed fetch keeps the last known list, a failed submit is announced and
//! the prompt closes anyway.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::announce::Announcer;

/// Number of places on the leaderboard
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub initials: String,
    pub score: u64,
}

/// Leaderboard, sorted by descending score
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries in any order
    pub fn from_entries(mut entries: Vec<HighScoreEntry>) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Self { entries }
    }

    /// Parse a scoreboard response. Anything other than a JSON array is an
    /// empty list; an array with malformed entries is an error.
    pub fn from_json(body: &str) -> Result<Self, ScoreboardError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if !value.is_array() {
            return Ok(Self::new());
        }
        let entries: Vec<HighScoreEntry> = serde_json::from_value(value)?;
        Ok(Self::from_entries(entries))
    }

    /// A score qualifies while the board has free places, or when it beats
    /// the current 10th place
    pub fn qualifies(&self, score: u64) -> bool {
        match self.entries.get(MAX_HIGH_SCORES - 1) {
            Some(tenth) => score > tenth.score,
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Display lines ("MBS, 9800"), or a placeholder when empty
    pub fn lines(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec!["No high scores yet.".to_string()];
        }
        self.entries
            .iter()
            .map(|e| format!("{}, {}", e.initials, e.score))
            .collect()
    }
}

/// Scoreboard request failures
#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error("scoreboard unreachable: {0}")]
    Network(String),
    #[error("scoreboard returned HTTP {0}")]
    Status(u16),
    #[error("malformed scoreboard response: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ScoreboardError {
    fn from(err: serde_json::Error) -> Self {
        ScoreboardError::Parse(err.to_string())
    }
}

/// Rejected initials; the message is shown next to the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitialsError {
    #[error("Please enter 2 or 3 letters.")]
    Invalid,
}

/// Trim and uppercase `raw`, then require 2 or 3 ASCII letters
pub fn validate_initials(raw: &str) -> Result<String, InitialsError> {
    let initials = raw.trim().to_uppercase();
    let valid = (2..=3).contains(&initials.len())
        && initials.bytes().all(|b| b.is_ascii_uppercase());
    if valid {
        Ok(initials)
    } else {
        Err(InitialsError::Invalid)
    }
}

/// Body posted to the scoreboard. The token is also sent as a header; it is
/// visible to any client and only keeps casual spam out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub initials: String,
    pub score: u64,
    pub token: String,
}

/// Remote leaderboard
#[allow(async_fn_in_trait)]
pub trait Scoreboard {
    async fn fetch_top(&self) -> Result<HighScores, ScoreboardError>;

    /// Post a score and return the updated board
    async fn submit(&self, submission: &Submission) -> Result<HighScores, ScoreboardError>;
}

/// What happened to a submitted set of initials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved,
    Failed,
    /// No prompt was open; nothing was sent
    NothingPending,
}

/// Post-game flow: check qualification, collect initials, submit
pub struct HighScoreFlow<S: Scoreboard> {
    scoreboard: S,
    token: String,
    latest: HighScores,
    /// Score waiting for initials while the prompt is open
    pending: Option<u64>,
}

impl<S: Scoreboard> HighScoreFlow<S> {
    pub fn new(scoreboard: S, token: impl Into<String>) -> Self {
        Self {
            scoreboard,
            token: token.into(),
            latest: HighScores::new(),
            pending: None,
        }
    }

    /// Last successfully loaded board
    pub fn latest(&self) -> &HighScores {
        &self.latest
    }

    pub fn pending_score(&self) -> Option<u64> {
        self.pending
    }

    pub fn is_prompt_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Reload the board, keeping the previous one if the scoreboard fails
    pub async fn refresh(&mut self) -> &HighScores {
        let result = self.scoreboard.fetch_top().await;
        self.store_board(result)
    }

    /// Runs after game over. Returns true when the prompt opened, in which
    /// case the caller cancels the start-focus timer.
    pub async fn on_game_over(&mut self, score: u64) -> bool {
        self.refresh().await;
        self.open_prompt_if_qualifies(score)
    }

    /// Validate and submit initials for the pending score.
    ///
    /// Invalid initials leave the prompt open and contact nobody. Otherwise
    /// the prompt closes whatever the scoreboard says.
    pub async fn submit(
        &mut self,
        raw_initials: &str,
        announcer: &mut impl Announcer,
    ) -> Result<SubmitOutcome, InitialsError> {
        let Some(submission) = self.prepare_submission(raw_initials)? else {
            return Ok(SubmitOutcome::NothingPending);
        };
        let result = self.scoreboard.submit(&submission).await;
        Ok(self.finish_submission(&submission, result, announcer))
    }

    fn store_board(&mut self, result: Result<HighScores, ScoreboardError>) -> &HighScores {
        match result {
            Ok(scores) => {
                log::info!("Loaded {} high scores", scores.len());
                self.latest = scores;
            }
            Err(err) => log::warn!("Keeping last known high scores: {}", err),
        }
        &self.latest
    }

    fn open_prompt_if_qualifies(&mut self, score: u64) -> bool {
        if !self.latest.qualifies(score) {
            return false;
        }
        log::info!("Score {} qualifies for the leaderboard", score);
        self.pending = Some(score);
        true
    }

    fn prepare_submission(&self, raw_initials: &str) -> Result<Option<Submission>, InitialsError> {
        let Some(score) = self.pending else {
            return Ok(None);
        };
        Ok(Some(Submission {
            initials: validate_initials(raw_initials)?,
            score,
            token: self.token.clone(),
        }))
    }

    fn finish_submission(
        &mut self,
        submission: &Submission,
        result: Result<HighScores, ScoreboardError>,
        announcer: &mut impl Announcer,
    ) -> SubmitOutcome {
        let outcome = match result {
            Ok(scores) => {
                log::info!(
                    "Saved high score {} for {}",
                    submission.score,
                    submission.initials
                );
                self.latest = scores;
                announcer.announce("High score saved.");
                SubmitOutcome::Saved
            }
            Err(err) => {
                log::warn!("High score submission failed: {}", err);
                announcer.announce("Unable to save high score at this time.");
                SubmitOutcome::Failed
            }
        };
        // A newer game may have reopened the prompt meanwhile
        if self.pending == Some(submission.score) {
            self.pending = None;
        }
        outcome
    }

    /// Close the prompt without submitting
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// The same steps for a flow shared through a `RefCell`, as event handlers
/// hold it. The cell is only borrowed between awaits, so handlers and other
/// requests can use the flow while one is in flight.
impl<S: Scoreboard + Clone> HighScoreFlow<S> {
    pub async fn refresh_shared(flow: &RefCell<Self>) {
        let scoreboard = flow.borrow().scoreboard.clone();
        let result = scoreboard.fetch_top().await;
        flow.borrow_mut().store_board(result);
    }

    pub async fn game_over_shared(flow: &RefCell<Self>, score: u64) -> bool {
        Self::refresh_shared(flow).await;
        flow.borrow_mut().open_prompt_if_qualifies(score)
    }

    pub async fn submit_shared(
        flow: &RefCell<Self>,
        raw_initials: &str,
        announcer: &mut impl Announcer,
    ) -> Result<SubmitOutcome, InitialsError> {
        let (scoreboard, submission) = {
            let flow = flow.borrow();
            let Some(submission) = flow.prepare_submission(raw_initials)? else {
                return Ok(SubmitOutcome::NothingPending);
            };
            (flow.scoreboard.clone(), submission)
        };
        let result = scoreboard.submit(&submission).await;
        Ok(flow
            .borrow_mut()
            .finish_submission(&submission, result, announcer))
    }
}

#[cfg(target_arch = "wasm32")]
pub use http::HttpScoreboard;

#[cfg(target_arch = "wasm32")]
mod http {
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Request, RequestInit, RequestMode, Response};

    use super::{HighScores, Scoreboard, ScoreboardError, Submission};

    /// Scoreboard over `fetch`
    #[derive(Debug, Clone)]
    pub struct HttpScoreboard {
        url: String,
        token: String,
    }

    fn js_error(value: JsValue) -> ScoreboardError {
        ScoreboardError::Network(format!("{:?}", value))
    }

    impl HttpScoreboard {
        pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
            Self {
                url: url.into(),
                token: token.into(),
            }
        }

        async fn send(&self, init: &RequestInit, authed: bool) -> Result<String, ScoreboardError> {
            let request = Request::new_with_str_and_init(&self.url, init).map_err(js_error)?;
            let headers = request.headers();
            headers.set("Accept", "application/json").map_err(js_error)?;
            if authed {
                headers.set("Content-Type", "application/json").map_err(js_error)?;
                headers.set("X-API-TOKEN", &self.token).map_err(js_error)?;
            }

            let window =
                web_sys::window().ok_or_else(|| ScoreboardError::Network("no window".into()))?;
            let response: Response = JsFuture::from(window.fetch_with_request(&request))
                .await
                .map_err(js_error)?
                .dyn_into()
                .map_err(js_error)?;
            if !response.ok() {
                return Err(ScoreboardError::Status(response.status()));
            }

            let body = JsFuture::from(response.text().map_err(js_error)?)
                .await
                .map_err(js_error)?;
            body.as_string()
                .ok_or_else(|| ScoreboardError::Parse("response body is not text".into()))
        }
    }

    impl Scoreboard for HttpScoreboard {
        async fn fetch_top(&self) -> Result<HighScores, ScoreboardError> {
            let init = RequestInit::new();
            init.set_method("GET");
            init.set_mode(RequestMode::Cors);
            let body = self.send(&init, false).await?;
            HighScores::from_json(&body)
        }

        async fn submit(&self, submission: &Submission) -> Result<HighScores, ScoreboardError> {
            let payload = serde_json::to_string(submission)?;
            let init = RequestInit::new();
            init.set_method("POST");
            init.set_mode(RequestMode::Cors);
            init.set_body(&JsValue::from_str(&payload));
            let body = self.send(&init, true).await?;

            let value: serde_json::Value = serde_json::from_str(&body)?;
            if !value.is_array() {
                return Err(ScoreboardError::Parse("expected a list of scores".into()));
            }
            HighScores::from_json(&body)
        }
    }
}
