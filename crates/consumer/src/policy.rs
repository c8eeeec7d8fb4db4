//! Consumer tuning and the cursor-advance policy.

use std::time::Duration;

/// What happens to the cursor when an event fails partway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Apply each event once and always advance. Failed items are reported
    /// through compensation notices only.
    #[default]
    AdvanceAlways,

    /// Record every applied line item under an idempotency key built from
    /// the event ID and the item. Already-applied items are skipped, which
    /// makes redelivered events safe. Transient failures are retried in
    /// place up to `max_attempts` times before compensating and advancing.
    IdempotentRetry { max_attempts: u32, backoff: Duration },
}

impl CommitPolicy {
    pub fn idempotent_retry(max_attempts: u32, backoff: Duration) -> Self {
        CommitPolicy::IdempotentRetry {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn tracks_idempotency_keys(&self) -> bool {
        matches!(self, CommitPolicy::IdempotentRetry { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommitPolicy::AdvanceAlways => "advance",
            CommitPolicy::IdempotentRetry { .. } => "idempotent-retry",
        }
    }
}

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Upper bound on a single fetch, and so on how long shutdown can wait.
    pub poll_timeout: Duration,
    /// Pause after a failed fetch before trying again.
    pub fetch_error_backoff: Duration,
    pub commit_policy: CommitPolicy,
    /// Number of most recent events whose applied items are remembered
    /// under [`CommitPolicy::IdempotentRetry`]. Older events are evicted
    /// oldest-first, and a redelivery of an evicted event is applied again.
    pub idempotency_window: usize,
}

impl ConsumerConfig {
    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    #[must_use]
    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    #[must_use]
    pub fn with_idempotency_window(mut self, events: usize) -> Self {
        self.idempotency_window = events.max(1);
        self
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(1000),
            fetch_error_backoff: Duration::from_millis(500),
            commit_policy: CommitPolicy::default(),
            idempotency_window: 10_000,
        }
    }
}
