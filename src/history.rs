use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

pub const RECENT_LIMIT: usize = 10;
/// How many trailing same-category classifications make a pattern.
pub const PATTERN_RUN: usize = 3;

#[derive(Debug, Default)]
struct HistoryState {
    by_merchant: HashMap<String, Vec<String>>,
    recent: VecDeque<String>,
}

/// Session-scoped record of which categories each merchant received.
/// Every access goes through the one lock; readers get copies.
#[derive(Debug, Default)]
pub struct CategoryHistory {
    state: Mutex<HistoryState>,
}

fn merchant_key(merchant: &str) -> String {
    merchant.trim().to_uppercase()
}

impl CategoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, merchant: &str, category: &str) {
        if category.is_empty() {
            return;
        }
        let mut state = self.lock();
        state
            .by_merchant
            .entry(merchant_key(merchant))
            .or_default()
            .push(category.to_string());
        state.recent.push_front(category.to_string());
        state.recent.truncate(RECENT_LIMIT);
    }

    pub fn categories_for(&self, merchant: &str) -> Vec<String> {
        self.lock()
            .by_merchant
            .get(&merchant_key(merchant))
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent first, duplicates removed for display.
    pub fn recent(&self) -> Vec<String> {
        let state = self.lock();
        let mut seen: Vec<String> = Vec::new();
        for cat in &state.recent {
            if !seen.iter().any(|s| s.eq_ignore_ascii_case(cat)) {
                seen.push(cat.clone());
            }
        }
        seen
    }

    /// The shared category when the merchant's last few classifications agree.
    pub fn pattern_for(&self, merchant: &str) -> Option<String> {
        let state = self.lock();
        let cats = state.by_merchant.get(&merchant_key(merchant))?;
        if cats.len() < PATTERN_RUN {
            return None;
        }
        let tail = &cats[cats.len() - PATTERN_RUN..];
        let first = &tail[0];
        tail.iter()
            .all(|c| c.eq_ignore_ascii_case(first))
            .then(|| first.clone())
    }
}
