use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A player as reported by the server. Dead players stay in the map
/// with `is_alive = false`; they are never removed mid-game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub death_reason: Option<String>,
    /// Strategy submitted for the current round, cleared by the server
    /// on round transition.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub character_description: Option<String>,
    #[serde(default)]
    pub character_image_url: Option<String>,
    #[serde(default = "default_true")]
    pub in_lobby: bool,
}

fn default_true() -> bool {
    true
}

/// The gameplay variant governing which status sequence a round follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Survival,
    BlindArchitect,
    Cooperative,
    Sacrifice,
    LastStand,
    Ranked,
    Quickfire,
    /// Round type this client version does not know about.
    #[serde(other)]
    Unknown,
}

/// A round status as reported by the server. Which members are legal
/// depends on the round type; see `phase::classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Scenario,
    Strategy,
    Judgement,
    Results,
    TrapCreation,
    TrapVoting,
    CoopVoting,
    CoopJudgement,
    SacrificeVolunteer,
    SacrificeVoting,
    SacrificeSubmission,
    SacrificeJudgement,
    LastStandRevival,
    RevivalJudgement,
    RankedJudgement,
    Quickfire,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scenario => "scenario",
            Self::Strategy => "strategy",
            Self::Judgement => "judgement",
            Self::Results => "results",
            Self::TrapCreation => "trap_creation",
            Self::TrapVoting => "trap_voting",
            Self::CoopVoting => "coop_voting",
            Self::CoopJudgement => "coop_judgement",
            Self::SacrificeVolunteer => "sacrifice_volunteer",
            Self::SacrificeVoting => "sacrifice_voting",
            Self::SacrificeSubmission => "sacrifice_submission",
            Self::SacrificeJudgement => "sacrifice_judgement",
            Self::LastStandRevival => "last_stand_revival",
            Self::RevivalJudgement => "revival_judgement",
            Self::RankedJudgement => "ranked_judgement",
            Self::Quickfire => "quickfire",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One round of the game. Immutable once superseded by the next round
/// index, except for in-place field growth as players submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u32,
    #[serde(rename = "type")]
    pub round_type: RoundType,
    pub status: RoundStatus,
    #[serde(default)]
    pub scenario_text: String,
    #[serde(default)]
    pub scenario_image_url: Option<String>,
    /// Winning trap author in a blind-architect round.
    #[serde(default)]
    pub architect_id: Option<String>,
    /// player_id -> trap description
    #[serde(default)]
    pub trap_proposals: HashMap<String, String>,
    /// player_id -> image url
    #[serde(default)]
    pub trap_images: HashMap<String, String>,
    /// voter_id -> target_id (trap voting)
    #[serde(default)]
    pub votes: HashMap<String, String>,
    /// player_id -> image url (cooperative voting)
    #[serde(default)]
    pub strategy_images: HashMap<String, String>,
    /// voter_id -> target_id
    #[serde(default)]
    pub coop_votes: HashMap<String, String>,
    /// player_id -> true once volunteered
    #[serde(default)]
    pub sacrifice_volunteers: HashMap<String, bool>,
    /// voter_id -> target_id
    #[serde(default)]
    pub sacrifice_votes: HashMap<String, String>,
    /// The player chosen to be sacrificed.
    #[serde(default)]
    pub martyr_id: Option<String>,
    #[serde(default)]
    pub martyr_speech: Option<String>,
    /// voter_id -> target_id (dead player to revive)
    #[serde(default)]
    pub revival_votes: HashMap<String, String>,
    #[serde(default)]
    pub quickfire_choices: Vec<String>,
    /// player_id -> index into quickfire_choices
    #[serde(default)]
    pub quickfire_player_choices: HashMap<String, usize>,
    /// Unix seconds; start of the current submission window, set by the
    /// server. Used only for presentation countdowns.
    #[serde(default)]
    pub submission_start_time: Option<f64>,
}

impl Round {
    /// Fresh round with empty payload fields, mainly for tests and
    /// locally-constructed placeholder state.
    pub fn new(number: u32, round_type: RoundType, status: RoundStatus) -> Self {
        Self {
            number,
            round_type,
            status,
            scenario_text: String::new(),
            scenario_image_url: None,
            architect_id: None,
            trap_proposals: HashMap::new(),
            trap_images: HashMap::new(),
            votes: HashMap::new(),
            strategy_images: HashMap::new(),
            coop_votes: HashMap::new(),
            sacrifice_volunteers: HashMap::new(),
            sacrifice_votes: HashMap::new(),
            martyr_id: None,
            martyr_speech: None,
            revival_votes: HashMap::new(),
            quickfire_choices: Vec::new(),
            quickfire_player_choices: HashMap::new(),
            submission_start_time: None,
        }
    }

    /// Seconds left in the submission window given a configured
    /// duration, or `None` when the server has not opened one. Purely
    /// presentational; expiry is authoritative only when the server
    /// advances the round.
    pub fn remaining_seconds(&self, duration_secs: u64, now_unix: f64) -> Option<u64> {
        let start = self.submission_start_time?;
        let elapsed = (now_unix - start).max(0.0);
        Some((duration_secs as f64 - elapsed).max(0.0).ceil() as u64)
    }
}

/// Top-level game status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Lobby,
    Playing,
    Finished,
    #[serde(other)]
    Unknown,
}

/// One authoritative point-in-time view of the full game state.
///
/// The client never mutates a snapshot in place; the merge step always
/// produces a new copy so downstream consumers can keep references to
/// the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: GameStatus,
    #[serde(default)]
    pub players: HashMap<String, Player>,
    #[serde(default)]
    pub rounds: Vec<Round>,
    /// -1 while in the lobby.
    #[serde(default = "default_round_idx")]
    pub current_round_idx: i64,
    #[serde(default)]
    pub max_rounds: u32,
}

fn default_round_idx() -> i64 {
    -1
}

impl Snapshot {
    pub fn current_round(&self) -> Option<&Round> {
        usize::try_from(self.current_round_idx)
            .ok()
            .and_then(|idx| self.rounds.get(idx))
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }
}
