use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Largest integer peers that store ids in a double can represent exactly
/// (2^53 - 1). The sequential counter wraps back to zero past this point.
pub const MAX_SEQUENTIAL_ID: u64 = 9_007_199_254_740_991;

const RANDOM_ID_LENGTH: usize = 10;
const RANDOM_ID_ALPHABET: &[u8] = b"1234567890abcdefghijklmnopqrstuvwxyz";

/// How correlation tokens are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// Monotonically increasing counter, rendered as a decimal string.
    #[default]
    Sequential,
    /// Fixed-length random alphanumeric string with no two adjacent
    /// characters equal. Collisions against live tokens are possible and
    /// are the pending-call table's job to detect.
    Random,
}

/// Produces correlation tokens for in-flight calls.
///
/// State is scoped to one connection instance so that independent
/// connections cannot leak collisions into one another.
#[derive(Debug)]
pub struct RequestIdGenerator {
    strategy: IdStrategy,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        RequestIdGenerator {
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    /// Produce the next token, advancing the sequence in sequential mode.
    pub fn next(&self) -> String {
        match self.strategy {
            IdStrategy::Sequential => {
                let mut id = 0;
                let _ = self
                    .counter
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                        id = if n >= MAX_SEQUENTIAL_ID { 0 } else { n + 1 };
                        Some(id)
                    });
                id.to_string()
            }
            IdStrategy::Random => random_id(),
        }
    }

    #[cfg(test)]
    fn with_counter(strategy: IdStrategy, counter: u64) -> Self {
        RequestIdGenerator {
            strategy,
            counter: AtomicU64::new(counter),
        }
    }
}

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(RANDOM_ID_LENGTH);
    let mut last: Option<u8> = None;

    while id.len() < RANDOM_ID_LENGTH {
        let c = RANDOM_ID_ALPHABET[rng.gen_range(0..RANDOM_ID_ALPHABET.len())];
        // Redraw when the candidate repeats the previous character
        if last == Some(c) {
            continue;
        }
        id.push(c as char);
        last = Some(c);
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_is_strictly_increasing() {
        let ids = RequestIdGenerator::new(IdStrategy::Sequential);
        assert_eq!(ids.next(), "1");
        assert_eq!(ids.next(), "2");
        assert_eq!(ids.next(), "3");
    }

    #[test]
    fn test_sequential_wraps_to_zero() {
        let ids = RequestIdGenerator::with_counter(IdStrategy::Sequential, MAX_SEQUENTIAL_ID - 1);
        assert_eq!(ids.next(), MAX_SEQUENTIAL_ID.to_string());
        assert_eq!(ids.next(), "0");
        assert_eq!(ids.next(), "1");
    }

    #[test]
    fn test_random_shape() {
        let ids = RequestIdGenerator::new(IdStrategy::Random);
        for _ in 0..500 {
            let id = ids.next();
            assert_eq!(id.len(), 10);
            assert!(id.bytes().all(|b| RANDOM_ID_ALPHABET.contains(&b)));

            let chars: Vec<char> = id.chars().collect();
            for pair in chars.windows(2) {
                assert_ne!(pair[0], pair[1], "adjacent repeat in {}", id);
            }
        }
    }
}
