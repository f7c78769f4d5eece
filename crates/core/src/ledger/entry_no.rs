//! Voucher number generation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Sequence values per millisecond of wall-clock time.
const PER_MILLI: u64 = 1_000;

/// Generates globally unique, strictly increasing document numbers.
///
/// A number is `prefix` + a 16-digit sequence + a 4-hex-digit node suffix.
/// The sequence is `max(last + 1, now_ms * 1000)`, so numbers keep increasing
/// within one generator even if the wall clock steps backwards, and two
/// generators (processes) only collide if they also share a node suffix.
#[derive(Debug)]
pub struct EntryNoGenerator {
    prefix: String,
    node: u16,
    last: AtomicU64,
}

impl EntryNoGenerator {
    /// Prefix used for journal entry numbers.
    pub const JOURNAL_PREFIX: &'static str = "JE";
    /// Prefix used for settlement numbers.
    pub const SETTLEMENT_PREFIX: &'static str = "ST";

    /// Creates a generator with a random node suffix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        Self::with_node(prefix, u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Creates a generator with a fixed node suffix.
    #[must_use]
    pub fn with_node(prefix: impl Into<String>, node: u16) -> Self {
        Self {
            prefix: prefix.into(),
            node,
            last: AtomicU64::new(0),
        }
    }

    /// Generator for `JE…` journal entry numbers.
    #[must_use]
    pub fn journal() -> Self {
        Self::new(Self::JOURNAL_PREFIX)
    }

    /// Generator for `ST…` settlement numbers.
    #[must_use]
    pub fn settlement() -> Self {
        Self::new(Self::SETTLEMENT_PREFIX)
    }

    /// Returns the next number.
    pub fn next_no(&self) -> String {
        let floor = u64::try_from(Utc::now().timestamp_millis())
            .unwrap_or(0)
            .saturating_mul(PER_MILLI);
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.saturating_add(1).max(floor))
            })
            .unwrap_or_else(|last| last);
        let value = previous.saturating_add(1).max(floor);
        format!("{}{value:016}{:04X}", self.prefix, self.node)
    }
}
