/// ENTROPY INJECTION
///
/// Oracle index assignment needs salts that are unpredictable to the
/// registrant yet reproducible inside a test. The source is injected at
/// construction time: production draws from the OS, tests feed a fixed
/// sequence.

use rand::Rng;

pub trait EntropySource {
    /// Next per-draw salt.
    fn next_salt(&mut self) -> u64;
}

/// OS-backed entropy for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_salt(&mut self) -> u64 {
        rand::thread_rng().gen()
    }
}

/// Replays a fixed salt sequence, cycling once exhausted. An empty
/// sequence yields zero forever.
#[derive(Debug, Clone)]
pub struct SequenceEntropy {
    salts: Vec<u64>,
    cursor: usize,
}

impl SequenceEntropy {
    pub fn new(salts: Vec<u64>) -> Self {
        SequenceEntropy { salts, cursor: 0 }
    }
}

impl EntropySource for SequenceEntropy {
    fn next_salt(&mut self) -> u64 {
        if self.salts.is_empty() {
            return 0;
        }
        let salt = self.salts[self.cursor % self.salts.len()];
        self.cursor += 1;
        salt
    }
}
