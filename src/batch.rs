use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::Result;
use crate::interrupt::InterruptSupervisor;
use crate::models::{Classification, PendingClassification, Transaction};
use crate::resolver::ClassificationResolver;
use crate::session::ConfirmationSession;
use crate::stats::{CompletionStats, StatsTracker};

/// Groups by trimmed, case-folded merchant. Groups appear in order of first
/// sighting and keep their members' input order.
pub fn group_by_merchant(txns: Vec<Transaction>) -> Vec<Vec<Transaction>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Transaction>> = Vec::new();
    for txn in txns {
        let key = txn.merchant.trim().to_uppercase();
        match index.get(&key) {
            Some(&i) => groups[i].push(txn),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![txn]);
            }
        }
    }
    groups
}

pub struct BatchCoordinator<'a> {
    resolver: &'a ClassificationResolver<'a>,
    session: ConfirmationSession<'a>,
    stats: &'a StatsTracker,
    supervisor: &'a InterruptSupervisor,
    auto_accept: bool,
    processed: usize,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        resolver: &'a ClassificationResolver<'a>,
        session: ConfirmationSession<'a>,
        stats: &'a StatsTracker,
        supervisor: &'a InterruptSupervisor,
    ) -> Self {
        Self {
            resolver,
            session,
            stats,
            supervisor,
            auto_accept: true,
            processed: 0,
        }
    }

    /// With auto-accept off every item goes through confirmation.
    pub fn auto_accept(mut self, enabled: bool) -> Self {
        self.auto_accept = enabled;
        self
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn stats(&self) -> CompletionStats {
        self.stats.snapshot()
    }

    /// Resolves and confirms every group, handing each group's results to
    /// `persist` before moving on.
    pub fn run<F>(&mut self, txns: Vec<Transaction>, mut persist: F) -> Result<CompletionStats>
    where
        F: FnMut(&[Classification]) -> Result<()>,
    {
        let total = txns.len();
        self.stats.set_total(total);
        let groups = group_by_merchant(txns);
        info!(total, groups = groups.len(), "classifying");

        let cancel = self.supervisor.token();
        for group in groups {
            cancel.check()?;
            self.session.say(format!(
                "\n[{}/{}] {}",
                self.processed + 1,
                total,
                group[0].merchant
            ));
            let pending = self.resolver.resolve_group(&group, &cancel)?;
            let results = self.confirm_group(&pending)?;
            persist(&results)?;
            self.supervisor.mark_progress_saved();
            self.processed += results.len();
            debug!(processed = self.processed, total, "group persisted");
        }
        Ok(self.stats.snapshot())
    }

    pub fn finalize(&self) -> String {
        self.stats().render()
    }

    /// Auto-acceptable items settle without prompting; the rest are
    /// confirmed together. Output keeps the group's order.
    fn confirm_group(&mut self, pending: &[PendingClassification]) -> Result<Vec<Classification>> {
        let (auto, review): (Vec<_>, Vec<_>) = pending
            .iter()
            .enumerate()
            .partition(|(_, p)| self.auto_accept && p.auto_acceptable);

        let mut slots: Vec<Option<Classification>> = vec![None; pending.len()];
        for (i, p) in auto {
            slots[i] = Some(self.session.auto_accept(p));
        }
        if !review.is_empty() {
            let items: Vec<PendingClassification> = review.iter().map(|(_, p)| (*p).clone()).collect();
            let confirmed = self.session.confirm_batch(&items)?;
            for ((i, _), c) in review.into_iter().zip(confirmed) {
                slots[i] = Some(c);
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
