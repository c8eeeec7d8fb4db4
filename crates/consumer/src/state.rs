//! Consumer lifecycle state and counters.

/// Where the consumer is in its fetch, decode, apply and commit cycle.
///
/// `Cancelling` is entered once shutdown is observed; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerState {
    Idle,
    Fetching,
    Decoding,
    Applying,
    Committing,
    Cancelling,
    Stopped,
}

impl ConsumerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsumerState::Stopped)
    }
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConsumerState::Idle => "idle",
            ConsumerState::Fetching => "fetching",
            ConsumerState::Decoding => "decoding",
            ConsumerState::Applying => "applying",
            ConsumerState::Committing => "committing",
            ConsumerState::Cancelling => "cancelling",
            ConsumerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters accumulated over one run of the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Events whose line items were all applied (or skipped as duplicates).
    pub events_completed: u64,
    /// Events that stopped at a failing line item.
    pub events_failed: u64,
    /// Payloads skipped because they could not be decoded.
    pub events_malformed: u64,
    /// Line items skipped because they were already applied.
    pub duplicate_items: u64,
    /// Compensation notices successfully handed to the publisher.
    pub compensations_published: u64,
}

impl ConsumerStats {
    /// Total records taken off the stream.
    pub fn records_seen(&self) -> u64 {
        self.events_completed + self.events_failed + self.events_malformed
    }
}
