//! Idle-round counting for quiescence detection

/// Counts consecutive polling rounds in which no result arrived
///
/// The run is considered complete once `threshold` empty rounds happened in a
/// row. This is a heuristic: a worker stuck on a slow fetch for longer than
/// `threshold * poll_interval` looks exactly like a finished crawl.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    rounds: u32,
    threshold: u32,
}

impl IdleTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            rounds: 0,
            threshold: threshold.max(1),
        }
    }

    /// Records one polling round; returns true once quiescent
    pub fn record_round(&mut self, received_results: bool) -> bool {
        if received_results {
            self.rounds = 0;
        } else {
            self.rounds = self.rounds.saturating_add(1);
        }
        self.is_quiescent()
    }

    pub fn is_quiescent(&self) -> bool {
        self.rounds >= self.threshold
    }

    pub fn idle_rounds(&self) -> u32 {
        self.rounds
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
