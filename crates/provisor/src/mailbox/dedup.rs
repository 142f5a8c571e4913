//! At-most-once message inspection per session.

use std::collections::HashSet;

/// Set of message identities a session has already inspected. A message whose
/// identity is present here is never considered again, whether it predates
/// the session (priming) or was seen in an earlier poll cycle (replay).
#[derive(Debug, Default)]
pub struct SeenMessages {
    ids: HashSet<String>,
}

impl SeenMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an identity during the priming fetch.
    pub fn prime(&mut self, id: String) {
        self.ids.insert(id);
    }

    /// Admits a message for inspection. Marks the identity as seen
    /// immediately, regardless of what the inspection later finds, and
    /// returns `false` when the message was already seen. Messages without
    /// any identity cannot be deduplicated and are always admitted.
    pub fn admit(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.ids.insert(id.to_string()),
            None => true,
        }
    }

    /// Whether an identity has been seen, without marking it. For callers
    /// that must defer the mark until the message is actually in hand.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primed_ids_are_not_admitted() {
        let mut seen = SeenMessages::new();
        seen.prime("m1".to_string());
        seen.prime("m2".to_string());

        assert!(!seen.admit(Some("m1")));
        assert!(!seen.admit(Some("m2")));
        assert!(seen.admit(Some("m3")));
    }

    #[test]
    fn test_replay_across_cycles_admitted_once() {
        let mut seen = SeenMessages::new();
        // first cycle
        assert!(seen.admit(Some("m1")));
        // the same id appears again in a later fetch cycle
        assert!(!seen.admit(Some("m1")));
    }

    #[test]
    fn test_admit_marks_seen_regardless_of_outcome() {
        let mut seen = SeenMessages::new();
        assert!(seen.admit(Some("m1")));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_contains_leaves_identity_unseen() {
        let mut seen = SeenMessages::new();
        // A cycle that checks an identity but fails to obtain the message
        // must not mark it; a later cycle still admits it.
        assert!(!seen.contains("m1"));
        assert!(!seen.contains("m1"));
        assert!(seen.admit(Some("m1")));
        assert!(seen.contains("m1"));
    }

    #[test]
    fn test_identityless_messages_always_admitted() {
        let mut seen = SeenMessages::new();
        assert!(seen.admit(None));
        assert!(seen.admit(None));
        assert!(seen.is_empty());
    }
}
