use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::phase::VoteKind;
use crate::types::{GameStatus, RoundStatus, RoundType, Snapshot};
use crate::{Error, Result};

/// Response to `create_game`.
#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    pub code: String,
    pub game_id: String,
}

/// Response to `join_game`.
#[derive(Debug, Clone, Deserialize)]
pub struct Joined {
    pub player_id: String,
    pub is_admin: bool,
}

/// Options for `debug_skip_to_state`. The server answers with a full
/// snapshot, which the client treats identically to a poll response.
#[derive(Debug, Clone, Serialize)]
pub struct DebugOptions {
    pub game_status: GameStatus,
    pub round_type: RoundType,
    pub round_status: RoundStatus,
    pub round_number: u32,
    pub num_dummy_players: u32,
}

/// Thin HTTP wrapper over the game server's `/api/<name>` endpoints.
///
/// All endpoints take the session code as a query parameter and JSON
/// bodies. Mutating endpoints are idempotent-safe server-side; this
/// layer never retries or deduplicates on its own.
#[derive(Debug, Clone)]
pub struct Api {
    http: reqwest::Client,
    base_url: Url,
}

impl Api {
    pub fn new(base_url: &str) -> Result<Self> {
        // A base URL without a trailing slash would swallow its last
        // path segment on join().
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&normalized)?,
        })
    }

    pub async fn create_game(&self) -> Result<Created> {
        self.post("create_game", None, json!({})).await
    }

    pub async fn join_game(
        &self,
        code: &str,
        name: &str,
        character_description: Option<&str>,
        character_image_url: Option<&str>,
    ) -> Result<Joined> {
        let mut body = json!({ "name": name });
        if let Some(desc) = character_description {
            body["character_description"] = json!(desc);
        }
        if let Some(url) = character_image_url {
            body["character_image_url"] = json!(url);
        }
        self.post("join_game", Some(code), body).await
    }

    pub async fn start_game(&self, code: &str) -> Result<()> {
        self.post_ok("start_game", Some(code), json!({})).await
    }

    /// One poll fetch. `player_id` lets the server tailor per-player
    /// fields when it wants to.
    pub async fn fetch_state(&self, code: &str, player_id: Option<&str>) -> Result<Snapshot> {
        let mut url = self.endpoint("get_game_state")?;
        url.query_pairs_mut().append_pair("code", code);
        if let Some(pid) = player_id {
            url.query_pairs_mut().append_pair("player_id", pid);
        }
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    pub async fn submit_strategy(&self, code: &str, player_id: &str, strategy: &str) -> Result<()> {
        self.post_ok(
            "submit_strategy",
            Some(code),
            json!({ "player_id": player_id, "strategy": strategy }),
        )
        .await
    }

    pub async fn submit_trap(&self, code: &str, player_id: &str, trap_text: &str) -> Result<()> {
        self.post_ok(
            "submit_trap",
            Some(code),
            json!({ "player_id": player_id, "trap_text": trap_text }),
        )
        .await
    }

    pub async fn submit_sacrifice_speech(
        &self,
        code: &str,
        player_id: &str,
        speech: &str,
    ) -> Result<()> {
        self.post_ok(
            "submit_sacrifice_speech",
            Some(code),
            json!({ "player_id": player_id, "speech": speech }),
        )
        .await
    }

    pub async fn cast_vote(
        &self,
        kind: VoteKind,
        code: &str,
        voter_id: &str,
        target_id: &str,
    ) -> Result<()> {
        let endpoint = match kind {
            VoteKind::Trap => "vote_trap",
            VoteKind::Coop => "vote_coop",
            VoteKind::Sacrifice => "vote_sacrifice",
            VoteKind::Revival => "vote_revival",
        };
        self.post_ok(
            endpoint,
            Some(code),
            json!({ "voter_id": voter_id, "target_id": target_id }),
        )
        .await
    }

    pub async fn volunteer_sacrifice(&self, code: &str, player_id: &str) -> Result<()> {
        self.post_ok(
            "volunteer_sacrifice",
            Some(code),
            json!({ "player_id": player_id }),
        )
        .await
    }

    pub async fn advance_sacrifice_volunteer(&self, code: &str, player_id: &str) -> Result<()> {
        self.post_ok(
            "advance_sacrifice_volunteer",
            Some(code),
            json!({ "player_id": player_id }),
        )
        .await
    }

    pub async fn advance_revival(&self, code: &str, player_id: &str) -> Result<()> {
        self.post_ok(
            "advance_revival",
            Some(code),
            json!({ "player_id": player_id }),
        )
        .await
    }

    pub async fn submit_quickfire_choice(
        &self,
        code: &str,
        player_id: &str,
        choice: usize,
    ) -> Result<()> {
        self.post_ok(
            "submit_quickfire_choice",
            Some(code),
            json!({ "player_id": player_id, "choice": choice }),
        )
        .await
    }

    pub async fn next_round(&self, code: &str) -> Result<()> {
        self.post_ok("next_round", Some(code), json!({})).await
    }

    /// Marks a player as present in the lobby again (after revival or a
    /// reconnect).
    pub async fn enter_lobby(&self, code: &str, player_id: &str) -> Result<()> {
        self.post_ok("enter_lobby", Some(code), json!({ "player_id": player_id }))
            .await
    }

    /// Debug harness entry point; the returned snapshot goes through
    /// the exact same merge/classify pipeline as a poll response.
    pub async fn debug_skip_to_state(
        &self,
        code: &str,
        player_id: &str,
        options: &DebugOptions,
    ) -> Result<Snapshot> {
        let mut body = serde_json::to_value(options)?;
        body["player_id"] = json!(player_id);
        self.post("debug_skip_to_state", Some(code), body).await
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("api/{name}"))?)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        code: Option<&str>,
        body: serde_json::Value,
    ) -> Result<T> {
        let mut url = self.endpoint(name)?;
        if let Some(code) = code {
            url.query_pairs_mut().append_pair("code", code);
        }
        let response = self.http.post(url).json(&body).send().await?;
        decode(response).await
    }

    async fn post_ok(
        &self,
        name: &str,
        code: Option<&str>,
        body: serde_json::Value,
    ) -> Result<()> {
        let _: serde_json::Value = self.post(name, code, body).await?;
        Ok(())
    }
}

/// Decode a response, mapping the server's error conventions onto the
/// client error taxonomy: `{error}`/`{detail}` in any JSON body is an
/// application error; a non-2xx without one is a transport failure.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        if let Some(message) = server_error(&value) {
            return Err(Error::Server(message));
        }
        if !status.is_success() {
            return Err(failed(status, &bytes));
        }
        return Ok(serde_json::from_value(value)?);
    }

    Err(failed(status, &bytes))
}

fn server_error(value: &serde_json::Value) -> Option<String> {
    value
        .get("error")
        .or_else(|| value.get("detail"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn failed(status: StatusCode, bytes: &[u8]) -> Error {
    Error::Failed {
        status,
        body: String::from_utf8_lossy(bytes).into_owned(),
    }
}
