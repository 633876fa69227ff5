use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mutable state scoped to a single conversational turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TurnState {
    #[serde(default)]
    pub temp: TempState,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Ephemeral values that do not outlive the turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TempState {
    /// Tokens acquired during this turn, keyed by connection name.
    #[serde(default)]
    pub auth_tokens: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_scoped_to_the_turn() {
        let mut state = TurnState::new();
        assert!(state.temp.auth_tokens.is_empty());
        state
            .temp
            .auth_tokens
            .insert("graph".into(), "token-1".into());
        assert_eq!(state.temp.auth_tokens.get("graph").map(String::as_str), Some("token-1"));

        let fresh = TurnState::new();
        assert!(fresh.temp.auth_tokens.is_empty());
    }
}
