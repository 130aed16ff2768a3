use std::collections::HashMap;

use crate::config::VotePolicy;
use crate::phase::VoteKind;
use crate::types::Snapshot;

/// A locally-applied change the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Strategy(String),
    Trap(String),
    Speech(String),
    Vote { kind: VoteKind, target: String },
    Volunteer,
    QuickfireChoice(usize),
}

/// One optimistic mutation, keyed to the round it was produced for.
/// Never replayed into a later round.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub player_id: String,
    pub round_idx: i64,
    pub change: Change,
}

/// Holds at most one pending mutation per player and overlays them onto
/// incoming snapshots until the server confirms or the round advances.
///
/// Owned value, passed through explicitly; all reads and writes happen
/// from the poll-merge step and the submit step on the same logical
/// task, so no internal locking.
#[derive(Debug, Clone)]
pub struct PendingTracker {
    pending: HashMap<String, PendingMutation>,
    policy: VotePolicy,
}

impl PendingTracker {
    pub fn new(policy: VotePolicy) -> Self {
        Self {
            pending: HashMap::new(),
            policy,
        }
    }

    /// Store a mutation for `player_id`, replacing any existing one.
    /// Submitting a new action abandons tracking of the previous one
    /// rather than queueing.
    pub fn record(&mut self, player_id: &str, round_idx: i64, change: Change) {
        if let Some(old) = self.pending.insert(
            player_id.to_string(),
            PendingMutation {
                player_id: player_id.to_string(),
                round_idx,
                change,
            },
        ) {
            tracing::debug!(player = %player_id, "replaced pending mutation {:?}", old.change);
        }
    }

    /// Drop any pending mutation for `player_id`.
    pub fn clear(&mut self, player_id: &str) {
        self.pending.remove(player_id);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Overlay tracked mutations onto a copy of `snapshot`.
    ///
    /// Per mutation: stale round index drops it unconditionally; a
    /// server field already carrying the value confirms and drops it;
    /// an empty server field gets the value overlaid and the mutation
    /// stays tracked until a later poll confirms it. The input snapshot
    /// is never modified, and repeated merges with no new records are
    /// idempotent.
    pub fn merge(&mut self, snapshot: &Snapshot) -> Snapshot {
        let mut merged = snapshot.clone();
        let policy = self.policy;
        self.pending.retain(|_, mutation| {
            if mutation.round_idx != snapshot.current_round_idx {
                tracing::debug!(
                    player = %mutation.player_id,
                    pending_round = mutation.round_idx,
                    current_round = snapshot.current_round_idx,
                    "dropping stale pending mutation"
                );
                return false;
            }
            apply(&mut merged, mutation, &policy)
        });
        merged
    }
}

/// Overlay one mutation; returns whether it should stay tracked.
fn apply(merged: &mut Snapshot, mutation: &PendingMutation, policy: &VotePolicy) -> bool {
    let pid = mutation.player_id.as_str();
    match &mutation.change {
        Change::Strategy(text) => {
            let Some(player) = merged.players.get_mut(pid) else {
                return true;
            };
            match player.strategy.as_deref() {
                Some(server) if !server.is_empty() => false,
                _ => {
                    player.strategy = Some(text.clone());
                    true
                }
            }
        }
        Change::Trap(text) => {
            let Some(round) = current_round_mut(merged) else {
                return true;
            };
            if round.trap_proposals.contains_key(pid) {
                false
            } else {
                round.trap_proposals.insert(pid.to_string(), text.clone());
                true
            }
        }
        Change::Speech(text) => {
            let Some(round) = current_round_mut(merged) else {
                return true;
            };
            match round.martyr_speech.as_deref() {
                Some(server) if !server.is_empty() => false,
                _ => {
                    round.martyr_speech = Some(text.clone());
                    true
                }
            }
        }
        Change::Volunteer => {
            let Some(round) = current_round_mut(merged) else {
                return true;
            };
            if round.sacrifice_volunteers.get(pid).copied().unwrap_or(false) {
                false
            } else {
                round.sacrifice_volunteers.insert(pid.to_string(), true);
                true
            }
        }
        Change::QuickfireChoice(choice) => {
            let Some(round) = current_round_mut(merged) else {
                return true;
            };
            if round.quickfire_player_choices.contains_key(pid) {
                false
            } else {
                round.quickfire_player_choices.insert(pid.to_string(), *choice);
                true
            }
        }
        Change::Vote { kind, target } => {
            let can_change = policy.allows_change(*kind);
            let Some(round) = current_round_mut(merged) else {
                return true;
            };
            let votes = match kind {
                VoteKind::Trap => &mut round.votes,
                VoteKind::Coop => &mut round.coop_votes,
                VoteKind::Sacrifice => &mut round.sacrifice_votes,
                VoteKind::Revival => &mut round.revival_votes,
            };
            match votes.get(pid) {
                Some(server) if server == target => false,
                Some(_) if !can_change => false,
                _ => {
                    votes.insert(pid.to_string(), target.clone());
                    true
                }
            }
        }
    }
}

fn current_round_mut(snapshot: &mut Snapshot) -> Option<&mut crate::types::Round> {
    let idx = usize::try_from(snapshot.current_round_idx).ok()?;
    snapshot.rounds.get_mut(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameStatus, Player, Round, RoundStatus, RoundType};
    use std::collections::HashMap;

    fn player(id: &str) -> Player {
        Player {
            id: id.to_string(),
            name: id.to_string(),
            score: 0,
            is_admin: false,
            is_alive: true,
            death_reason: None,
            strategy: None,
            character_description: None,
            character_image_url: None,
            in_lobby: true,
        }
    }

    fn snapshot(round_type: RoundType, status: RoundStatus, round_idx: i64) -> Snapshot {
        let mut players = HashMap::new();
        players.insert("p1".to_string(), player("p1"));
        players.insert("p2".to_string(), player("p2"));
        let rounds = (0..=round_idx.max(0))
            .map(|i| Round::new(i as u32 + 1, round_type, status))
            .collect();
        Snapshot {
            status: GameStatus::Playing,
            players,
            rounds,
            current_round_idx: round_idx,
            max_rounds: 5,
        }
    }

    fn tracker() -> PendingTracker {
        PendingTracker::new(VotePolicy::default())
    }

    #[test]
    fn matching_round_with_empty_field_overlays_value() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Strategy("hide".to_string()));

        let snap = snapshot(RoundType::Survival, RoundStatus::Strategy, 0);
        let merged = tracker.merge(&snap);

        assert_eq!(
            merged.player("p1").unwrap().strategy.as_deref(),
            Some("hide")
        );
        // Input untouched.
        assert_eq!(snap.player("p1").unwrap().strategy, None);
        // Not confirmed yet, so the mutation keeps reapplying.
        assert!(!tracker.is_empty());
    }

    #[test]
    fn stale_round_index_purges_without_applying() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Strategy("hide".to_string()));

        let snap = snapshot(RoundType::Survival, RoundStatus::Strategy, 1);
        let merged = tracker.merge(&snap);

        assert_eq!(merged, snap);
        assert!(tracker.is_empty());

        // Subsequent merges ignore the purged mutation even if the
        // index were to match again.
        let snap0 = snapshot(RoundType::Survival, RoundStatus::Strategy, 0);
        assert_eq!(tracker.merge(&snap0), snap0);
    }

    #[test]
    fn populated_field_confirms_and_drops_mutation() {
        let mut tracker = tracker();
        tracker.record(
            "p1",
            0,
            Change::Vote { kind: VoteKind::Coop, target: "p2".to_string() },
        );

        let mut snap = snapshot(RoundType::Cooperative, RoundStatus::CoopVoting, 0);
        snap.rounds[0]
            .coop_votes
            .insert("p1".to_string(), "p2".to_string());

        let merged = tracker.merge(&snap);
        assert_eq!(merged, snap);
        assert!(tracker.is_empty());
    }

    #[test]
    fn merge_is_idempotent_without_new_records() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Strategy("run".to_string()));

        let snap = snapshot(RoundType::Survival, RoundStatus::Strategy, 0);
        let once = tracker.merge(&snap);
        let twice = tracker.merge(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn vote_change_overlays_when_policy_allows() {
        // Coop votes are changeable by default.
        let mut tracker = tracker();
        tracker.record(
            "p1",
            0,
            Change::Vote { kind: VoteKind::Coop, target: "p3".to_string() },
        );

        let mut snap = snapshot(RoundType::Cooperative, RoundStatus::CoopVoting, 0);
        snap.rounds[0]
            .coop_votes
            .insert("p1".to_string(), "p2".to_string());

        let merged = tracker.merge(&snap);
        assert_eq!(merged.rounds[0].coop_votes.get("p1").unwrap(), "p3");
        assert!(!tracker.is_empty());
    }

    #[test]
    fn vote_change_defers_to_server_when_policy_forbids() {
        // Trap votes are not changeable by default.
        let mut tracker = tracker();
        tracker.record(
            "p1",
            0,
            Change::Vote { kind: VoteKind::Trap, target: "p3".to_string() },
        );

        let mut snap = snapshot(RoundType::BlindArchitect, RoundStatus::TrapVoting, 0);
        snap.rounds[0]
            .votes
            .insert("p1".to_string(), "p2".to_string());

        let merged = tracker.merge(&snap);
        assert_eq!(merged.rounds[0].votes.get("p1").unwrap(), "p2");
        assert!(tracker.is_empty());
    }

    #[test]
    fn recording_replaces_previous_mutation_for_player() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Strategy("hide".to_string()));
        tracker.record("p1", 0, Change::Strategy("fight".to_string()));

        let snap = snapshot(RoundType::Survival, RoundStatus::Strategy, 0);
        let merged = tracker.merge(&snap);
        assert_eq!(
            merged.player("p1").unwrap().strategy.as_deref(),
            Some("fight")
        );
    }

    #[test]
    fn volunteer_and_trap_overlay_round_payload() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Volunteer);
        tracker.record("p2", 0, Change::Trap("lava floor".to_string()));

        let snap = snapshot(RoundType::Sacrifice, RoundStatus::SacrificeVolunteer, 0);
        let merged = tracker.merge(&snap);

        assert_eq!(
            merged.rounds[0].sacrifice_volunteers.get("p1"),
            Some(&true)
        );
        assert_eq!(
            merged.rounds[0].trap_proposals.get("p2").unwrap(),
            "lava floor"
        );
    }

    #[test]
    fn server_advance_within_same_round_still_applies() {
        // strategy -> judgement between polls, same round index: the
        // mutation still applies; the judging phase supersedes the
        // input UI regardless.
        let mut tracker = tracker();
        tracker.record("p1", 2, Change::Strategy("swim".to_string()));

        let snap = snapshot(RoundType::Survival, RoundStatus::Judgement, 2);
        let merged = tracker.merge(&snap);
        assert_eq!(
            merged.player("p1").unwrap().strategy.as_deref(),
            Some("swim")
        );
    }

    #[test]
    fn missing_round_keeps_mutation_for_next_poll() {
        let mut tracker = tracker();
        tracker.record("p1", 0, Change::Trap("pit".to_string()));

        // Index claims round 0 but the rounds list is empty; a stale
        // or partial snapshot must not eat the mutation.
        let mut snap = snapshot(RoundType::BlindArchitect, RoundStatus::TrapCreation, 0);
        snap.rounds.clear();

        let merged = tracker.merge(&snap);
        assert_eq!(merged, snap);
        assert!(!tracker.is_empty());
    }
}
