use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use regex::Regex;

pub const CANONICAL_ID_LEN: usize = 24;

static CANONICAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{24}$").expect("canonical id pattern is a valid regex")
});

/// Returns true when `id` is a 24 character hexadecimal string (either case).
pub fn is_canonical(id: &str) -> bool {
    CANONICAL_ID.is_match(id)
}

/// Source of fresh canonical ids for one run.
///
/// Implementations must never hand out the same id twice and must only
/// produce strings accepted by [`is_canonical`].
pub trait IdSource {
    fn generate(&mut self) -> String;
}

/// ObjectId shaped generator: 4 bytes of unix seconds, 5 bytes of per-run
/// randomness and a 3 byte counter.
#[derive(Debug)]
pub struct ObjectIdAllocator {
    process_unique: [u8; 5],
    counter: u32,
    issued: HashSet<String>,
}

impl ObjectIdAllocator {
    const COUNTER_MASK: u32 = 0x00FF_FFFF;

    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut process_unique = [0u8; 5];
        rng.fill(&mut process_unique);
        Self {
            process_unique,
            counter: rng.gen_range(0..=Self::COUNTER_MASK),
            issued: HashSet::new(),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    fn next_candidate(&mut self) -> String {
        let seconds = Utc::now().timestamp() as u32;
        self.counter = (self.counter + 1) & Self::COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process_unique);
        bytes[9..].copy_from_slice(&self.counter.to_be_bytes()[1..]);

        let mut out = String::with_capacity(CANONICAL_ID_LEN);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for ObjectIdAllocator {
    fn generate(&mut self) -> String {
        loop {
            let candidate = self.next_candidate();
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
            // Counter wrapped within the same second; reseed the random part.
            rand::thread_rng().fill(&mut self.process_unique);
        }
    }
}

/// Deterministic source: `prefix` followed by a zero padded counter.
/// The prefix must be hexadecimal and shorter than 24 characters.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        debug_assert!(prefix.len() < CANONICAL_ID_LEN);
        debug_assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        Self {
            prefix: prefix.to_ascii_lowercase(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIds {
    fn generate(&mut self) -> String {
        let width = CANONICAL_ID_LEN - self.prefix.len();
        let id = format!("{}{:0width$x}", self.prefix, self.next, width = width);
        self.next += 1;
        id
    }
}
