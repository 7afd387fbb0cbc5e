use rand::Rng;
use serde::{Deserialize, Serialize};

/// Correlation key sent with every request of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Upper bound (inclusive) of randomly drawn ids
    pub const MAX: u32 = 1000;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Draw a fresh id uniformly from `0..=MAX`
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..=Self::MAX))
    }

    /// Draw a fresh id that differs from `previous`
    pub fn random_except(previous: SessionId) -> Self {
        loop {
            let candidate = Self::random();
            if candidate != previous {
                return candidate;
            }
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_stays_in_range() {
        for _ in 0..200 {
            assert!(SessionId::random().value() <= SessionId::MAX);
        }
    }

    #[test]
    fn test_random_except_never_repeats() {
        let previous = SessionId::new(7);
        for _ in 0..500 {
            assert_ne!(SessionId::random_except(previous), previous);
        }
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&SessionId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
