use crate::config::VotePolicy;
use crate::types::{GameStatus, Player, Round, RoundStatus, RoundType, Snapshot};

/// The kinds of votes a round can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteKind {
    Trap,
    Coop,
    Sacrifice,
    Revival,
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trap => write!(f, "trap"),
            Self::Coop => write!(f, "coop"),
            Self::Sacrifice => write!(f, "sacrifice"),
            Self::Revival => write!(f, "revival"),
        }
    }
}

/// The derived, per-player interaction mode for the current round.
///
/// Exactly one phase is active for a given (round, player) pair; the UI
/// layer matches on it exhaustively, so adding a variant forces every
/// consumer to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// The scenario is being presented; no input yet.
    Scenario { spectating: bool },
    /// This player owes a strategy for the current round.
    StrategyInput,
    /// Waiting for the rest of the table. `submitted = false` means the
    /// player is dead and watching, not that they still owe input.
    Spectating { submitted: bool },
    /// The judge is evaluating; waiting phase with no input. May be
    /// skipped entirely when the server advances between polls.
    Judging,
    /// Round is over; the caller decides whether to request the next one.
    Results,
    /// Blind architect: this player owes a trap description.
    TrapInput,
    TrapVoting { voted: bool, can_change: bool },
    CoopVoting { voted: bool, can_change: bool },
    SacrificeVolunteer { volunteered: bool },
    SacrificeVoting { voted: bool, can_change: bool },
    /// The martyr gives their last words; everyone else watches the
    /// countdown.
    SacrificeSpeech { martyr: bool, submitted: bool },
    RevivalVoting { voted: bool, can_change: bool },
    /// Timed multiple-choice round; `choice` is this player's pick, if
    /// any.
    Quickfire { choice: Option<usize> },
    /// The (type, status) combination is not one this client knows.
    /// Render a neutral fallback; never crash the session.
    Unknown,
}

/// Game-level dispatch: what the whole screen should show for one
/// player, given a merged snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum GameView {
    Lobby,
    Playing(Phase),
    Finished,
    /// Snapshot is malformed for this player (no current round while
    /// playing, unknown game status, unknown player id).
    Unknown,
}

/// Classify the current snapshot into a view for `player_id`.
///
/// `status == finished` short-circuits round classification entirely;
/// a missing round or player degrades to `GameView::Unknown` since a
/// stale poll can race with a round transition.
pub fn view(snapshot: &Snapshot, player_id: &str, policy: &VotePolicy) -> GameView {
    match snapshot.status {
        GameStatus::Lobby => GameView::Lobby,
        GameStatus::Finished => GameView::Finished,
        GameStatus::Playing => {
            let (Some(round), Some(player)) =
                (snapshot.current_round(), snapshot.player(player_id))
            else {
                return GameView::Unknown;
            };
            GameView::Playing(classify(round, player, policy))
        }
        GameStatus::Unknown => GameView::Unknown,
    }
}

/// Classify one round into the single interaction mode active for
/// `player`.
///
/// Pure function of (round.type, round.status, player.is_alive,
/// player submission state); no hidden state influences the result.
/// A status outside the type's declared sequence yields
/// `Phase::Unknown` rather than an error.
pub fn classify(round: &Round, player: &Player, policy: &VotePolicy) -> Phase {
    use RoundStatus as S;
    use RoundType as T;

    // Validity table from the per-type status sequences. Anything not
    // listed is an invalid combination, surfaced as Unknown.
    let valid = match round.round_type {
        T::Survival => matches!(round.status, S::Scenario | S::Strategy | S::Judgement | S::Results),
        T::BlindArchitect => matches!(
            round.status,
            S::TrapCreation | S::TrapVoting | S::Strategy | S::Judgement | S::Results
        ),
        T::Cooperative => matches!(
            round.status,
            S::Scenario | S::Strategy | S::CoopVoting | S::CoopJudgement | S::Results
        ),
        T::Sacrifice => matches!(
            round.status,
            S::SacrificeVolunteer
                | S::SacrificeVoting
                | S::SacrificeSubmission
                | S::SacrificeJudgement
                | S::Results
        ),
        T::LastStand => matches!(
            round.status,
            S::Scenario
                | S::Strategy
                | S::Judgement
                | S::LastStandRevival
                | S::RevivalJudgement
                | S::Results
        ),
        T::Ranked => matches!(
            round.status,
            S::Scenario | S::Strategy | S::RankedJudgement | S::Results
        ),
        T::Quickfire => matches!(round.status, S::Quickfire),
        T::Unknown => false,
    };
    if !valid {
        return Phase::Unknown;
    }

    let dead = !player.is_alive;

    match round.status {
        S::Scenario => Phase::Scenario { spectating: dead },
        S::Strategy => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            let submitted = player.strategy.as_deref().is_some_and(|s| !s.is_empty());
            if submitted {
                Phase::Spectating { submitted: true }
            } else {
                Phase::StrategyInput
            }
        }
        S::Judgement
        | S::CoopJudgement
        | S::SacrificeJudgement
        | S::RevivalJudgement
        | S::RankedJudgement => Phase::Judging,
        S::Results => Phase::Results,
        S::TrapCreation => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            if round.trap_proposals.contains_key(&player.id) {
                Phase::Spectating { submitted: true }
            } else {
                Phase::TrapInput
            }
        }
        S::TrapVoting => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::TrapVoting {
                voted: round.votes.contains_key(&player.id),
                can_change: policy.allows_change(VoteKind::Trap),
            }
        }
        S::CoopVoting => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::CoopVoting {
                voted: round.coop_votes.contains_key(&player.id),
                can_change: policy.allows_change(VoteKind::Coop),
            }
        }
        S::SacrificeVolunteer => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::SacrificeVolunteer {
                volunteered: round
                    .sacrifice_volunteers
                    .get(&player.id)
                    .copied()
                    .unwrap_or(false),
            }
        }
        S::SacrificeVoting => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::SacrificeVoting {
                voted: round.sacrifice_votes.contains_key(&player.id),
                can_change: policy.allows_change(VoteKind::Sacrifice),
            }
        }
        S::SacrificeSubmission => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            let martyr = round.martyr_id.as_deref() == Some(player.id.as_str());
            Phase::SacrificeSpeech {
                martyr,
                submitted: round
                    .martyr_speech
                    .as_deref()
                    .is_some_and(|s| !s.is_empty()),
            }
        }
        // Revival is the one voting phase where the dead are the ballot,
        // not the electorate; they still spectate.
        S::LastStandRevival => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::RevivalVoting {
                voted: round.revival_votes.contains_key(&player.id),
                can_change: policy.allows_change(VoteKind::Revival),
            }
        }
        S::Quickfire => {
            if dead {
                return Phase::Spectating { submitted: false };
            }
            Phase::Quickfire {
                choice: round.quickfire_player_choices.get(&player.id).copied(),
            }
        }
        S::Unknown => Phase::Unknown,
    }
}
