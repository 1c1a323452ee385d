use rand::seq::IndexedRandom;

use crate::utils::constants::{ACCEPT_LANGUAGE, USER_AGENT_POOL};

/// Per-session browser identity
///
/// Rotating the user agent only defeats the most trivial bot checks; it is
/// not an evasion layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub accept_language: String,
}

impl Fingerprint {
    /// Pick a user agent from the fixed pool at random
    pub fn random() -> Self {
        let user_agent = USER_AGENT_POOL
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENT_POOL[0]);
        Self {
            user_agent: user_agent.to_string(),
            accept_language: ACCEPT_LANGUAGE.to_string(),
        }
    }
}
