//! Outcome summaries for drains and pulls.

use std::fmt;

/// Why a drain stopped before emptying the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The connectivity gate was closed
    Offline,
    /// A remote call failed without a definitive answer; the operation stays queued
    Transient(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::Transient(message) => write!(f, "transient failure: {message}"),
        }
    }
}

/// Result of one `trigger_sync` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations completed and removed
    pub synced: usize,
    /// Operations dropped because their meeting no longer exists
    pub discarded: usize,
    /// Operations dropped after the backend refused them
    pub rejected: usize,
    pub halted: Option<HaltReason>,
    /// Another drain was running; this trigger was folded into it
    pub coalesced: bool,
}

impl DrainReport {
    pub(crate) const fn coalesced() -> Self {
        Self {
            synced: 0,
            discarded: 0,
            rejected: 0,
            halted: None,
            coalesced: true,
        }
    }

    /// Fold a later pass into this report
    pub(crate) fn absorb(&mut self, pass: Self) {
        self.synced += pass.synced;
        self.discarded += pass.discarded;
        self.rejected += pass.rejected;
        self.halted = pass.halted;
    }

    /// Whether anything left the queue
    pub const fn made_progress(&self) -> bool {
        self.synced + self.discarded + self.rejected > 0
    }
}

/// Result of pulling authoritative state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullReport {
    Applied { inserted: usize, updated: usize },
    /// Nothing was written; the local view is kept as is
    Stale { reason: String },
}

impl PullReport {
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_sums_counts_and_keeps_last_halt() {
        let mut report = DrainReport {
            synced: 1,
            halted: Some(HaltReason::Offline),
            ..DrainReport::default()
        };
        report.absorb(DrainReport {
            synced: 2,
            rejected: 1,
            ..DrainReport::default()
        });

        assert_eq!(report.synced, 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.halted, None);
        assert!(report.made_progress());
    }
}
