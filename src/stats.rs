use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::fmt::{human_duration, percent};

/// Rough time a person spends classifying one transaction by hand.
pub const SECONDS_SAVED_PER_AUTO: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionStats {
    pub total_transactions: usize,
    pub auto_classified: usize,
    pub user_classified: usize,
    pub new_vendor_rules: usize,
    pub duration: Duration,
}

impl CompletionStats {
    pub fn time_saved(&self) -> Duration {
        Duration::from_secs(self.auto_classified as u64 * SECONDS_SAVED_PER_AUTO)
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "Classification complete".to_string(),
            format!("  Transactions:     {}", self.total_transactions),
            format!(
                "  Auto-classified:  {} ({})",
                self.auto_classified,
                percent(self.auto_classified, self.total_transactions)
            ),
            format!("  User-classified:  {}", self.user_classified),
            format!("  New vendor rules: {}", self.new_vendor_rules),
            format!("  Elapsed:          {}", human_duration(self.duration)),
        ];
        if self.auto_classified > 0 {
            lines.push(format!("  Time saved:       ~{}", human_duration(self.time_saved())));
        }
        lines.join("\n")
    }
}

/// Running counters for one session, guarded by their own lock.
#[derive(Debug)]
pub struct StatsTracker {
    stats: Mutex<CompletionStats>,
    started: Instant,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(CompletionStats::default()),
            started: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CompletionStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_total(&self, n: usize) {
        self.lock().total_transactions = n;
    }

    pub fn add_auto(&self, n: usize) {
        self.lock().auto_classified += n;
    }

    pub fn add_user(&self, n: usize) {
        self.lock().user_classified += n;
    }

    pub fn add_vendor_rule(&self) {
        self.lock().new_vendor_rules += 1;
    }

    pub fn snapshot(&self) -> CompletionStats {
        let mut copy = self.lock().clone();
        copy.duration = self.started.elapsed();
        copy
    }
}
