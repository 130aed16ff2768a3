use std::time::Duration;

use crate::phase::VoteKind;

/// Whether a cast vote may be replaced before the round advances.
///
/// The server accepts re-votes as overwrites, so this is a client-side
/// policy decision per vote kind. By default cooperative votes are
/// changeable and the rest are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePolicy {
    pub trap: bool,
    pub coop: bool,
    pub sacrifice: bool,
    pub revival: bool,
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self {
            trap: false,
            coop: true,
            sacrifice: false,
            revival: false,
        }
    }
}

impl VotePolicy {
    pub fn allows_change(&self, kind: VoteKind) -> bool {
        match kind {
            VoteKind::Trap => self.trap,
            VoteKind::Coop => self.coop,
            VoteKind::Sacrifice => self.sacrifice,
            VoteKind::Revival => self.revival,
        }
    }
}

/// Client configuration. `Config::from_env` reads `VERDICT_*` variables
/// and falls back to defaults for anything unset.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the game server, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Delay between poll ticks.
    pub poll_interval: Duration,
    /// Presentation countdown for the strategy submission window.
    pub strategy_timeout: Duration,
    /// Presentation countdown for the martyr's speech.
    pub speech_timeout: Duration,
    /// Presentation countdown for a quickfire round.
    pub quickfire_timeout: Duration,
    pub vote_policy: VotePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            poll_interval: Duration::from_secs(2),
            strategy_timeout: Duration::from_secs(90),
            speech_timeout: Duration::from_secs(60),
            quickfire_timeout: Duration::from_secs(15),
            vote_policy: VotePolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: get("VERDICT_BASE_URL").unwrap_or(defaults.base_url),
            poll_interval: secs(&get, "VERDICT_POLL_INTERVAL_SECS", defaults.poll_interval),
            strategy_timeout: secs(&get, "VERDICT_STRATEGY_TIMEOUT_SECS", defaults.strategy_timeout),
            speech_timeout: secs(&get, "VERDICT_SPEECH_TIMEOUT_SECS", defaults.speech_timeout),
            quickfire_timeout: secs(
                &get,
                "VERDICT_QUICKFIRE_TIMEOUT_SECS",
                defaults.quickfire_timeout,
            ),
            vote_policy: VotePolicy {
                trap: flag(&get, "VERDICT_TRAP_VOTE_CHANGE", defaults.vote_policy.trap),
                coop: flag(&get, "VERDICT_COOP_VOTE_CHANGE", defaults.vote_policy.coop),
                sacrifice: flag(
                    &get,
                    "VERDICT_SACRIFICE_VOTE_CHANGE",
                    defaults.vote_policy.sacrifice,
                ),
                revival: flag(
                    &get,
                    "VERDICT_REVIVAL_VOTE_CHANGE",
                    defaults.vote_policy.revival,
                ),
            },
        }
    }
}

fn secs(get: &impl Fn(&str) -> Option<String>, var: &str, default: Duration) -> Duration {
    match get(var) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!("Ignoring invalid {}: {}", var, raw);
                default
            }
        },
        None => default,
    }
}

fn flag(get: &impl Fn(&str) -> Option<String>, var: &str, default: bool) -> bool {
    match get(var).as_deref() {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        Some(raw) => {
            tracing::warn!("Ignoring invalid {}: {}", var, raw);
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_changing_coop_votes_only() {
        let policy = VotePolicy::default();
        assert!(policy.allows_change(VoteKind::Coop));
        assert!(!policy.allows_change(VoteKind::Trap));
        assert!(!policy.allows_change(VoteKind::Sacrifice));
        assert!(!policy.allows_change(VoteKind::Revival));
    }

    #[test]
    fn default_config_polls_every_two_seconds() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn lookup_overrides_intervals_and_vote_policy() {
        let config = Config::from_lookup(|var| match var {
            "VERDICT_POLL_INTERVAL_SECS" => Some("5".to_string()),
            "VERDICT_TRAP_VOTE_CHANGE" => Some("true".to_string()),
            "VERDICT_COOP_VOTE_CHANGE" => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.vote_policy.allows_change(VoteKind::Trap));
        assert!(!config.vote_policy.allows_change(VoteKind::Coop));
        // Untouched kinds keep their defaults.
        assert!(!config.vote_policy.allows_change(VoteKind::Sacrifice));
    }

    #[test]
    fn invalid_lookup_values_fall_back_to_defaults() {
        let config = Config::from_lookup(|var| match var {
            "VERDICT_POLL_INTERVAL_SECS" => Some("soon".to_string()),
            "VERDICT_COOP_VOTE_CHANGE" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.vote_policy.allows_change(VoteKind::Coop));
    }
}
