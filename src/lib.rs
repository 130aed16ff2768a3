//! Client orchestration core for Verdict, a round-based party game in
//! which a remote judge evaluates player submissions.
//!
//! The server is authoritative and reachable only over polled HTTP; this
//! crate owns the client side of that arrangement: fetching snapshots on
//! an interval ([`sync::Poller`]), overlaying optimistic local mutations
//! until the server confirms them ([`pending::PendingTracker`]), and
//! classifying the merged state into the one interaction mode a given
//! player should see ([`phase::classify`]). [`Session`] ties the pieces
//! together for a single player in a single game.

pub mod api;
pub mod config;
pub mod pending;
pub mod phase;
pub mod sync;
pub mod types;

use std::sync::Arc;

use thiserror::Error as ThisError;
use tokio::sync::{watch, Mutex};

use crate::api::{Api, DebugOptions};
use crate::config::Config;
use crate::pending::{Change, PendingTracker};
use crate::phase::{GameView, VoteKind};
use crate::sync::Poller;
use crate::types::Snapshot;

/// Error type for client operations.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with an `{error}`/`{detail}` payload.
    #[error("server error: {0}")]
    Server(String),
    #[error("request failed: {status}: {body}")]
    Failed {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One player's connection to one game.
///
/// Owns the API handle, the pending-mutation tracker and the poller.
/// Every mutating call records its optimistic change *before* the
/// request goes on the wire, so even a poll tick racing the request
/// sees the local value. Failures surface to the caller untouched; no
/// retries, no rollback. The next successful poll reconciles.
pub struct Session {
    api: Api,
    config: Config,
    tracker: Arc<Mutex<PendingTracker>>,
    code: String,
    player_id: String,
    is_admin: bool,
    updates: watch::Sender<Option<Snapshot>>,
    poller: Option<Poller>,
}

impl Session {
    /// Create a new game and join it as the first (admin) player.
    pub async fn host(
        config: Config,
        name: &str,
        character_description: Option<&str>,
        character_image_url: Option<&str>,
    ) -> Result<Self> {
        let api = Api::new(&config.base_url)?;
        let created = api.create_game().await?;
        Self::join_with(api, config, created.code, name, character_description, character_image_url)
            .await
    }

    /// Join an existing game by its short code.
    pub async fn join(
        config: Config,
        code: &str,
        name: &str,
        character_description: Option<&str>,
        character_image_url: Option<&str>,
    ) -> Result<Self> {
        let api = Api::new(&config.base_url)?;
        Self::join_with(
            api,
            config,
            code.to_string(),
            name,
            character_description,
            character_image_url,
        )
        .await
    }

    async fn join_with(
        api: Api,
        config: Config,
        code: String,
        name: &str,
        character_description: Option<&str>,
        character_image_url: Option<&str>,
    ) -> Result<Self> {
        let joined = api
            .join_game(&code, name, character_description, character_image_url)
            .await?;
        tracing::info!(code = %code, player = %joined.player_id, "joined game");

        let (updates, _) = watch::channel(None);
        Ok(Self {
            api,
            tracker: Arc::new(Mutex::new(PendingTracker::new(config.vote_policy))),
            config,
            code,
            player_id: joined.player_id,
            is_admin: joined.is_admin,
            updates,
            poller: None,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to merged snapshots. `None` until the first successful
    /// poll; last-writer-wins after that.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.updates.subscribe()
    }

    /// Latest merged snapshot, if any poll has succeeded yet.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.updates.borrow().clone()
    }

    /// Classify the latest merged snapshot for this player. Neutral
    /// [`GameView::Unknown`] before the first poll lands.
    pub fn view(&self) -> GameView {
        match self.updates.borrow().as_ref() {
            Some(snapshot) => phase::view(snapshot, &self.player_id, &self.config.vote_policy),
            None => GameView::Unknown,
        }
    }

    /// Begin polling. Stops any previous poller first so a session
    /// never leaks concurrent timers.
    pub fn start_polling(&mut self) {
        self.stop_polling();
        tracing::info!(code = %self.code, "starting poll loop");
        self.poller = Some(Poller::start(
            self.api.clone(),
            self.tracker.clone(),
            self.code.clone(),
            self.player_id.clone(),
            self.config.poll_interval,
            self.updates.clone(),
        ));
    }

    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// Admin action: start the game.
    pub async fn start_game(&self) -> Result<()> {
        self.api.start_game(&self.code).await
    }

    /// Admin action: advance past the results screen.
    pub async fn next_round(&self) -> Result<()> {
        self.api.next_round(&self.code).await
    }

    pub async fn enter_lobby(&self) -> Result<()> {
        self.api.enter_lobby(&self.code, &self.player_id).await
    }

    pub async fn submit_strategy(&self, strategy: &str) -> Result<()> {
        self.record_optimistic(Change::Strategy(strategy.to_string()))
            .await;
        self.api
            .submit_strategy(&self.code, &self.player_id, strategy)
            .await
    }

    pub async fn submit_trap(&self, trap_text: &str) -> Result<()> {
        self.record_optimistic(Change::Trap(trap_text.to_string()))
            .await;
        self.api
            .submit_trap(&self.code, &self.player_id, trap_text)
            .await
    }

    pub async fn submit_sacrifice_speech(&self, speech: &str) -> Result<()> {
        self.record_optimistic(Change::Speech(speech.to_string()))
            .await;
        self.api
            .submit_sacrifice_speech(&self.code, &self.player_id, speech)
            .await
    }

    pub async fn cast_vote(&self, kind: VoteKind, target_id: &str) -> Result<()> {
        self.record_optimistic(Change::Vote {
            kind,
            target: target_id.to_string(),
        })
        .await;
        self.api
            .cast_vote(kind, &self.code, &self.player_id, target_id)
            .await
    }

    pub async fn volunteer_sacrifice(&self) -> Result<()> {
        self.record_optimistic(Change::Volunteer).await;
        self.api
            .volunteer_sacrifice(&self.code, &self.player_id)
            .await
    }

    pub async fn submit_quickfire_choice(&self, choice: usize) -> Result<()> {
        self.record_optimistic(Change::QuickfireChoice(choice))
            .await;
        self.api
            .submit_quickfire_choice(&self.code, &self.player_id, choice)
            .await
    }

    /// Close the volunteer window and move to sacrifice voting.
    pub async fn advance_sacrifice_volunteer(&self) -> Result<()> {
        self.api
            .advance_sacrifice_volunteer(&self.code, &self.player_id)
            .await
    }

    /// Close revival voting and move to revival judgement.
    pub async fn advance_revival(&self) -> Result<()> {
        self.api.advance_revival(&self.code, &self.player_id).await
    }

    /// Debug harness: force the server into a given state. The returned
    /// snapshot runs through the normal merge pipeline and is published
    /// like any poll result.
    pub async fn debug_skip_to_state(&self, options: &DebugOptions) -> Result<()> {
        let raw = self
            .api
            .debug_skip_to_state(&self.code, &self.player_id, options)
            .await?;
        let mut tracker = self.tracker.lock().await;
        let merged = tracker.merge(&raw);
        self.updates.send_replace(Some(merged));
        Ok(())
    }

    /// Record an optimistic change for the current round and republish
    /// the merged snapshot so the very next render reflects it,
    /// independent of network latency. Must run strictly before the
    /// corresponding request is issued.
    async fn record_optimistic(&self, change: Change) {
        let mut tracker = self.tracker.lock().await;
        // Read the snapshot only after taking the lock; every publish
        // happens under it, so nothing fresher can land between this
        // read and the send below.
        let current = self.updates.borrow().clone();
        let round_idx = current
            .as_ref()
            .map(|s| s.current_round_idx)
            .unwrap_or(-1);

        tracker.record(&self.player_id, round_idx, change);
        if let Some(snapshot) = current {
            self.updates.send_replace(Some(tracker.merge(&snapshot)));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
