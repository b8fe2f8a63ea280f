use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bidirectional token/id table. Only `token_to_id` is persisted; the reverse
/// index is rebuilt after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocab {
    pub token_to_id: HashMap<String, u32>,
    #[serde(skip)]
    pub id_to_token: HashMap<u32, String>,
}

impl Vocab {
    pub fn new() -> Self {
        Self {
            token_to_id: HashMap::new(),
            id_to_token: HashMap::new(),
        }
    }

    /// Appends `token` with the next free id, returning its id. Tokens that
    /// are already present keep their existing id.
    pub fn push(&mut self, token: &str) -> u32 {
        if let Some(id) = self.get_id(token) {
            return id;
        }
        let id = self.len() as u32;
        self.insert(token.to_string(), id);
        id
    }

    pub fn insert(&mut self, token: String, id: u32) {
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.insert(id, token);
    }

    pub fn get_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn get_token(&self, id: u32) -> Option<&String> {
        self.id_to_token.get(&id)
    }

    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.id_to_token = self
            .token_to_id
            .iter()
            .map(|(token, id)| (*id, token.clone()))
            .collect();
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_ids_once() {
        let mut vocab = Vocab::new();
        assert_eq!(vocab.push("a"), 0);
        assert_eq!(vocab.push("b"), 1);
        assert_eq!(vocab.push("a"), 0);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get_token(1).map(String::as_str), Some("b"));
    }

    #[test]
    fn reverse_index_survives_round_trip() {
        let mut vocab = Vocab::new();
        vocab.push("<pad>");
        vocab.push("x");

        let json = serde_json::to_string(&vocab).unwrap();
        let mut restored: Vocab = serde_json::from_str(&json).unwrap();
        assert!(restored.get_token(1).is_none());

        restored.rebuild_index();
        assert_eq!(restored.get_token(1).map(String::as_str), Some("x"));
    }
}
