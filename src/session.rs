use colored::Colorize;
use tracing::{debug, warn};

use crate::db::RuleStore;
use crate::error::{Result, TallyError};
use crate::fmt::{date_range, money};
use crate::history::{CategoryHistory, PATTERN_RUN};
use crate::models::{
    CategoryRanking, Classification, ClassificationStatus, Direction, PendingClassification,
    Transaction, VendorRule,
};
use crate::prompt::{MenuOption, Terminal};
use crate::resolver::DIRECTION_THRESHOLD;
use crate::stats::StatsTracker;

/// Ranked categories shown before the "show more" entry.
pub const VISIBLE_CATEGORIES: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    DirectionPending,
    CategoryPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CategoryAction {
    Accept,
    UseExisting,
    Custom,
    Skip,
    ChangeDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchAction {
    AcceptAll,
    ExistingForAll,
    CustomForAll,
    ReviewEach,
    SkipAll,
}

/// Where a selected category came from.
#[derive(Debug, Clone, PartialEq)]
enum Picked {
    Listed(String),
    Created(String),
}

impl Picked {
    /// Only a listed pick of the suggestion keeps its original confidence;
    /// a typed-in new name is always the user's own.
    fn accepts(&self, pending: &PendingClassification) -> bool {
        match self {
            Picked::Listed(name) => is_suggestion(pending, name),
            Picked::Created(_) => false,
        }
    }

    fn into_name(self) -> String {
        match self {
            Picked::Listed(name) | Picked::Created(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Selection {
    Category(String),
    ShowMore,
    CreateNew,
}

/// Drives the terminal conversation for one pending item or merchant group,
/// feeding outcomes back into history, stats and vendor rules.
pub struct ConfirmationSession<'a> {
    term: Terminal,
    store: &'a dyn RuleStore,
    history: &'a CategoryHistory,
    stats: &'a StatsTracker,
}

impl<'a> ConfirmationSession<'a> {
    pub fn new(
        term: Terminal,
        store: &'a dyn RuleStore,
        history: &'a CategoryHistory,
        stats: &'a StatsTracker,
    ) -> Self {
        Self {
            term,
            store,
            history,
            stats,
        }
    }

    pub fn say(&mut self, text: impl AsRef<str>) {
        self.term.say(text);
    }

    pub fn confirm(&mut self, pending: &PendingClassification) -> Result<Classification> {
        let (classification, learned) = self.decide(pending)?;
        self.settle(std::slice::from_ref(&classification), learned);
        Ok(classification)
    }

    /// Runs the prompts for one item without touching history, stats or
    /// vendor rules.
    fn decide(&mut self, pending: &PendingClassification) -> Result<(Classification, Option<VendorRule>)> {
        let settled = pending.direction_confidence >= DIRECTION_THRESHOLD;
        let mut txn = pending.transaction.clone();
        let mut step = if settled {
            Step::CategoryPending
        } else {
            Step::DirectionPending
        };
        self.show_details(&txn, pending);

        loop {
            match step {
                Step::DirectionPending => {
                    txn.direction = self.ask_direction(pending)?;
                    step = Step::CategoryPending;
                }
                Step::CategoryPending => {
                    let action = self.ask_category_action(pending, settled)?;
                    debug!(?action, merchant = %txn.merchant, "category action chosen");
                    let outcome = match action {
                        CategoryAction::ChangeDirection => {
                            step = Step::DirectionPending;
                            continue;
                        }
                        CategoryAction::Skip => (Classification::skipped(txn), None),
                        CategoryAction::Accept => (self.accept(txn, pending)?, None),
                        CategoryAction::UseExisting => {
                            let picked = self.select_category(pending, false)?;
                            self.resolve_choice(txn, pending, picked)?
                        }
                        CategoryAction::Custom => {
                            let picked = self.select_category(pending, true)?;
                            self.resolve_choice(txn, pending, picked)?
                        }
                    };
                    return Ok(outcome);
                }
            }
        }
    }

    /// Applies resolutions the resolver cleared for auto-acceptance.
    pub fn auto_accept(&mut self, pending: &PendingClassification) -> Classification {
        let classification = Classification::accepted(
            pending.transaction.clone(),
            &pending.suggested_category,
            pending.confidence,
        );
        self.settle(std::slice::from_ref(&classification), None);
        classification
    }

    /// Results align 1:1 with `group`; any error discards the whole group.
    pub fn confirm_batch(&mut self, group: &[PendingClassification]) -> Result<Vec<Classification>> {
        match group {
            [] => Ok(Vec::new()),
            [single] => Ok(vec![self.confirm(single)?]),
            _ => self.confirm_group(group),
        }
    }

    fn confirm_group(&mut self, group: &[PendingClassification]) -> Result<Vec<Classification>> {
        let lead = &group[0];
        self.show_group_summary(group);

        let action = self.term.choose("What would you like to do?", &batch_options(lead))?;
        debug!(?action, merchant = %lead.transaction.merchant, "batch action chosen");
        if action == BatchAction::ReviewEach {
            let mut results = Vec::with_capacity(group.len());
            let mut learned = Vec::new();
            for (i, item) in group.iter().enumerate() {
                self.term.say(format!("\n({} of {})", i + 1, group.len()));
                let (classification, rule) = self.decide(item)?;
                self.announce(std::slice::from_ref(&classification));
                results.push(classification);
                learned.extend(rule);
            }
            // Side effects land only once every item has an answer.
            self.record(&results, learned);
            return Ok(results);
        }
        if action == BatchAction::SkipAll {
            let results: Vec<Classification> = group
                .iter()
                .map(|p| Classification::skipped(p.transaction.clone()))
                .collect();
            self.settle(&results, None);
            return Ok(results);
        }

        let mut txns: Vec<Transaction> = group.iter().map(|p| p.transaction.clone()).collect();
        if group.iter().any(|p| p.direction_confidence < DIRECTION_THRESHOLD) {
            let direction = self.ask_direction(lead)?;
            for txn in &mut txns {
                txn.direction = direction;
            }
        }

        let (results, learned): (Vec<Classification>, Option<VendorRule>) = match action {
            BatchAction::AcceptAll => {
                if lead.is_new_category {
                    self.create_suggested(lead)?;
                }
                let results = txns
                    .into_iter()
                    .map(|t| Classification::accepted(t, &lead.suggested_category, lead.confidence))
                    .collect();
                (results, None)
            }
            BatchAction::ExistingForAll | BatchAction::CustomForAll => {
                let picked = self.select_category(lead, action == BatchAction::CustomForAll)?;
                if picked.accepts(lead) {
                    if lead.is_new_category {
                        self.create_suggested(lead)?;
                    }
                    let results = txns
                        .into_iter()
                        .map(|t| Classification::accepted(t, &lead.suggested_category, lead.confidence))
                        .collect();
                    (results, None)
                } else {
                    let chosen = picked.into_name();
                    let rule = VendorRule {
                        merchant: lead.transaction.merchant.trim().to_string(),
                        category: chosen.clone(),
                    };
                    let results = txns
                        .into_iter()
                        .map(|t| Classification::user_modified(t, &chosen))
                        .collect();
                    (results, Some(rule))
                }
            }
            BatchAction::ReviewEach | BatchAction::SkipAll => unreachable!("handled above"),
        };
        self.settle(&results, learned);
        Ok(results)
    }

    fn accept(&mut self, txn: Transaction, pending: &PendingClassification) -> Result<Classification> {
        if pending.is_new_category {
            self.create_suggested(pending)?;
        }
        Ok(Classification::accepted(
            txn,
            &pending.suggested_category,
            pending.confidence,
        ))
    }

    fn create_suggested(&mut self, pending: &PendingClassification) -> Result<()> {
        self.store
            .create_category(&pending.suggested_category, &pending.category_description)?;
        self.term.say(
            format!("Created category \"{}\"", pending.suggested_category)
                .green()
                .to_string(),
        );
        Ok(())
    }

    /// Picking the listed suggestion again counts as accepting it; anything
    /// else is a user override and teaches a vendor rule.
    fn resolve_choice(
        &mut self,
        txn: Transaction,
        pending: &PendingClassification,
        picked: Picked,
    ) -> Result<(Classification, Option<VendorRule>)> {
        if picked.accepts(pending) {
            return Ok((self.accept(txn, pending)?, None));
        }
        let chosen = picked.into_name();
        let rule = VendorRule {
            merchant: txn.merchant.trim().to_string(),
            category: chosen.clone(),
        };
        Ok((Classification::user_modified(txn, &chosen), Some(rule)))
    }

    fn settle(&mut self, results: &[Classification], learned: Option<VendorRule>) {
        self.record(results, learned);
        self.announce(results);
    }

    /// History, stats and vendor rules for a finished item or group.
    fn record(&mut self, results: &[Classification], learned: impl IntoIterator<Item = VendorRule>) {
        let mut auto = 0;
        let mut user = 0;
        for c in results {
            match c.status {
                ClassificationStatus::ClassifiedByAI => auto += 1,
                ClassificationStatus::UserModified => user += 1,
                ClassificationStatus::Unclassified => continue,
            }
            self.history.record(&c.transaction.merchant, &c.category);
        }
        self.stats.add_auto(auto);
        self.stats.add_user(user);

        for rule in learned {
            match self.store.add_vendor_rule(&rule) {
                Ok(()) => self.stats.add_vendor_rule(),
                Err(e) => warn!(merchant = %rule.merchant, "could not save vendor rule: {e}"),
            }
        }
    }

    fn announce(&mut self, results: &[Classification]) {
        match results.first() {
            Some(c) if c.is_skipped() => self.term.say("Skipped.".yellow().to_string()),
            Some(c) => self.term.say(
                format!("\u{2192} Classified {} as {}", plural(results.len()), c.category)
                    .green()
                    .to_string(),
            ),
            None => {}
        }
    }

    fn ask_direction(&mut self, pending: &PendingClassification) -> Result<Direction> {
        let mut title = "Is this income, an expense, or a transfer?".to_string();
        if pending.suggested_direction != Direction::Unknown {
            title.push_str(&format!(
                "\n  Best guess: {} ({:.0}%)",
                pending.suggested_direction.label(),
                pending.direction_confidence * 100.0
            ));
            if !pending.direction_reasoning.is_empty() {
                title.push_str(&format!(": {}", pending.direction_reasoning));
            }
        }
        let options = vec![
            MenuOption::new("1", "Income", Direction::Income),
            MenuOption::new("2", "Expense", Direction::Expense),
            MenuOption::new("3", "Transfer", Direction::Transfer),
        ];
        self.term.choose(&title, &options)
    }

    fn ask_category_action(
        &mut self,
        pending: &PendingClassification,
        offer_change_direction: bool,
    ) -> Result<CategoryAction> {
        let suggested = &pending.suggested_category;
        let mut options = Vec::new();
        if suggested.is_empty() {
            options.push(MenuOption::new("c", "Choose a category", CategoryAction::Custom));
        } else if pending.is_new_category {
            options.push(MenuOption::new(
                "a",
                format!("Create \"{suggested}\" and use it"),
                CategoryAction::Accept,
            ));
            options.push(MenuOption::new(
                "e",
                "Use an existing category instead",
                CategoryAction::UseExisting,
            ));
            options.push(MenuOption::new("c", "Custom category", CategoryAction::Custom));
        } else {
            options.push(MenuOption::new(
                "a",
                format!("Accept \"{suggested}\""),
                CategoryAction::Accept,
            ));
            options.push(MenuOption::new("c", "Custom category", CategoryAction::Custom));
        }
        options.push(MenuOption::new("s", "Skip", CategoryAction::Skip));
        if offer_change_direction {
            options.push(MenuOption::new(
                "d",
                "Change direction",
                CategoryAction::ChangeDirection,
            ));
        }
        self.term.choose("Category?", &options)
    }

    fn select_category(&mut self, pending: &PendingClassification, allow_new: bool) -> Result<Picked> {
        let mut show_all = choices(pending, allow_new).len() <= VISIBLE_CATEGORIES;
        self.render_rankings(pending, show_all, allow_new);
        loop {
            let input = self.term.ask("Category # or name")?;
            match parse_selection(&input, pending, show_all, allow_new) {
                Ok(Selection::Category(name)) => return Ok(Picked::Listed(name)),
                Ok(Selection::ShowMore) => {
                    show_all = true;
                    self.render_rankings(pending, show_all, allow_new);
                }
                Ok(Selection::CreateNew) => return self.ask_new_category().map(Picked::Created),
                Err(TallyError::InvalidChoice(bad)) => self.term.reject(&bad),
                Err(e) => return Err(e),
            }
        }
    }

    fn ask_new_category(&mut self) -> Result<String> {
        loop {
            let name = self.term.ask("New category name")?;
            if name.is_empty() {
                self.term.say("Category name cannot be empty.".red().to_string());
                continue;
            }
            self.store.create_category(&name, "")?;
            return Ok(name);
        }
    }

    fn render_rankings(&mut self, pending: &PendingClassification, show_all: bool, allow_new: bool) {
        let choices = choices(pending, allow_new);
        let limit = if show_all {
            choices.len()
        } else {
            VISIBLE_CATEGORIES
        };
        for (i, r) in choices.iter().take(limit).enumerate() {
            let mut line = format!("  {:>2}. {}", i + 1, r.category);
            if r.score > 0.0 {
                line.push_str(&format!(" ({:.0}%)", r.score * 100.0));
            }
            for check in pending
                .check_patterns
                .iter()
                .filter(|c| c.category.eq_ignore_ascii_case(&r.category))
            {
                line.push_str(&format!(" [check pattern: {}]", check.name));
            }
            self.term.say(line);
        }
        let hidden = choices.len().saturating_sub(limit);
        if hidden > 0 {
            self.term.say(format!("   m. Show {hidden} more"));
        }
        if allow_new {
            self.term.say("   n. Create a new category");
        }
    }

    fn show_details(&mut self, txn: &Transaction, pending: &PendingClassification) {
        self.term.say("\u{2500}".repeat(60));
        self.term.say(format!("  Date:        {}", txn.date.format("%Y-%m-%d")));
        self.term.say(format!("  Merchant:    {}", txn.merchant));
        self.term.say(format!("  Description: {}", txn.description));
        self.term.say(format!("  Amount:      {}", money(txn.amount)));
        self.term.say(format!("  Direction:   {}", txn.direction.label()));
        self.term.say(format!("  Account:     {}", txn.account));
        if let Some(check) = &txn.check_number {
            self.term.say(format!("  Check #:     {check}"));
        }
        self.show_suggestion(pending);
    }

    fn show_group_summary(&mut self, group: &[PendingClassification]) {
        let lead = &group[0];
        let total: f64 = group.iter().map(|p| p.transaction.amount).sum();
        let dates: Vec<_> = group.iter().map(|p| p.transaction.date).collect();
        self.term.say("\u{2500}".repeat(60));
        self.term.say(format!("  Merchant:    {}", lead.transaction.merchant));
        self.term.say(format!("  Count:       {} transactions", group.len()));
        self.term.say(format!("  Total:       {}", money(total)));
        self.term.say(format!("  Dates:       {}", date_range(&dates)));
        self.show_suggestion(lead);
    }

    fn show_suggestion(&mut self, pending: &PendingClassification) {
        if pending.suggested_category.is_empty() {
            self.term.say("  Suggestion:  (none)");
        } else {
            let mut line = format!(
                "  Suggestion:  {} ({:.0}%)",
                pending.suggested_category,
                pending.confidence * 100.0
            );
            if pending.is_new_category {
                line.push_str(" [new category]");
            }
            self.term.say(line);
            if !pending.category_description.is_empty() {
                self.term.say(format!("               {}", pending.category_description));
            }
        }
        if let Some(category) = self.history.pattern_for(&pending.transaction.merchant) {
            self.term.say(
                format!("  Last {PATTERN_RUN} were categorized as {category}")
                    .cyan()
                    .to_string(),
            );
        }
        let recent = self.history.recent();
        if !recent.is_empty() {
            self.term.say(format!("  Recent:      {}", recent.join(", ")));
        }
    }
}

fn batch_options(lead: &PendingClassification) -> Vec<MenuOption<BatchAction>> {
    let suggested = &lead.suggested_category;
    let mut options = Vec::new();
    if suggested.is_empty() {
        options.push(MenuOption::new("c", "Choose a category for all", BatchAction::CustomForAll));
    } else if lead.is_new_category {
        options.push(MenuOption::new(
            "a",
            format!("Create \"{suggested}\" and apply to all"),
            BatchAction::AcceptAll,
        ));
        options.push(MenuOption::new(
            "e",
            "Use an existing category for all",
            BatchAction::ExistingForAll,
        ));
        options.push(MenuOption::new("c", "Custom category for all", BatchAction::CustomForAll));
    } else {
        options.push(MenuOption::new(
            "a",
            format!("Accept \"{suggested}\" for all"),
            BatchAction::AcceptAll,
        ));
        options.push(MenuOption::new("c", "Custom category for all", BatchAction::CustomForAll));
    }
    options.push(MenuOption::new("r", "Review individually", BatchAction::ReviewEach));
    options.push(MenuOption::new("s", "Skip all", BatchAction::SkipAll));
    options
}

fn parse_selection(
    input: &str,
    pending: &PendingClassification,
    show_all: bool,
    allow_new: bool,
) -> Result<Selection> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TallyError::InvalidChoice(input.to_string()));
    }
    let choices = choices(pending, allow_new);
    if let Ok(n) = input.parse::<usize>() {
        let visible = if show_all { choices.len() } else { VISIBLE_CATEGORIES };
        return match choices.get(n.wrapping_sub(1)) {
            Some(r) if n >= 1 && n <= visible => Ok(Selection::Category(r.category.clone())),
            _ => Err(TallyError::InvalidChoice(input.to_string())),
        };
    }
    if !show_all && input.eq_ignore_ascii_case("m") {
        return Ok(Selection::ShowMore);
    }
    if allow_new && input.eq_ignore_ascii_case("n") {
        return Ok(Selection::CreateNew);
    }
    choices
        .iter()
        .find(|r| r.category.eq_ignore_ascii_case(input))
        .map(|r| Selection::Category(r.category.clone()))
        .ok_or_else(|| TallyError::InvalidChoice(input.to_string()))
}

fn is_suggestion(pending: &PendingClassification, chosen: &str) -> bool {
    !pending.suggested_category.is_empty() && chosen.eq_ignore_ascii_case(&pending.suggested_category)
}

/// Selectable rankings. A not-yet-created suggestion is only offered where
/// creating categories is allowed.
fn choices(pending: &PendingClassification, allow_new: bool) -> Vec<&CategoryRanking> {
    pending
        .rankings
        .iter()
        .filter(|r| allow_new || !(pending.is_new_category && is_suggestion(pending, &r.category)))
        .collect()
}

fn plural(n: usize) -> String {
    if n == 1 {
        "1 transaction".to_string()
    } else {
        format!("{n} transactions")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::tests::{sample_txn, test_store};
    use crate::interrupt::tests::SharedBuf;
    use crate::interrupt::CancelToken;
    use crate::models::{AmountMatch, CheckPattern};
    use crate::prompt::tests::{scripted, ScriptedInput};

    pub(crate) fn pending_for(merchant: &str, amount: f64, category: &str, confidence: f64) -> PendingClassification {
        let mut txn = sample_txn(merchant, amount, merchant);
        txn.id = 1;
        let mut rankings = vec![CategoryRanking {
            category: category.to_string(),
            score: confidence,
            description: String::new(),
        }];
        for name in ["Groceries", "Shopping", "Travel"] {
            if name != category {
                rankings.push(CategoryRanking {
                    category: name.to_string(),
                    score: 0.0,
                    description: String::new(),
                });
            }
        }
        PendingClassification {
            transaction: txn,
            suggested_category: category.to_string(),
            confidence,
            is_new_category: false,
            category_description: String::new(),
            rankings,
            check_patterns: Vec::new(),
            suggested_direction: Direction::Expense,
            direction_confidence: 1.0,
            direction_reasoning: String::new(),
            similar_count: 1,
            auto_acceptable: false,
        }
    }

    fn group(merchant: &str, n: usize, category: &str, confidence: f64) -> Vec<PendingClassification> {
        (0..n)
            .map(|i| {
                let mut p = pending_for(merchant, 10.0 + i as f64, category, confidence);
                p.transaction.id = i as i64 + 1;
                p.transaction.date = NaiveDate::from_ymd_opt(2025, 1, 1 + i as u32).unwrap();
                p.similar_count = n;
                p
            })
            .collect()
    }

    #[test]
    fn test_accept_keeps_original_confidence() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session
            .confirm(&pending_for("STARBUCKS #12345", 5.75, "Food & Dining", 0.95))
            .unwrap();
        assert_eq!(c.category, "Food & Dining");
        assert_eq!(c.status, ClassificationStatus::ClassifiedByAI);
        assert_eq!(c.confidence, 0.95);
        assert_eq!(history.categories_for("STARBUCKS #12345"), vec!["Food & Dining"]);
        assert_eq!(stats.snapshot().auto_classified, 1);
    }

    #[test]
    fn test_skip_yields_unclassified() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["s"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("UBER", 12.0, "Travel", 0.6)).unwrap();
        assert_eq!(c.status, ClassificationStatus::Unclassified);
        assert_eq!(c.category, "");
        assert_eq!(c.confidence, 0.0);
        assert!(history.recent().is_empty());
    }

    #[test]
    fn test_custom_by_ordinal_is_user_modified() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["c", "2"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("TARGET", 30.0, "Travel", 0.4)).unwrap();
        assert_eq!(c.category, "Groceries");
        assert_eq!(c.status, ClassificationStatus::UserModified);
        assert_eq!(c.confidence, 1.0);
        let snap = stats.snapshot();
        assert_eq!(snap.user_classified, 1);
        assert_eq!(snap.new_vendor_rules, 1);
        assert_eq!(store.vendor_rules().unwrap()[0].category, "Groceries");
    }

    #[test]
    fn test_custom_by_name_and_invalid_input_reprompts() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["zz", "c", "99", "", "shopping"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("TARGET", 30.0, "Travel", 0.4)).unwrap();
        assert_eq!(c.category, "Shopping");
        assert_eq!(c.status, ClassificationStatus::UserModified);
        assert_eq!(buf.contents().matches("Invalid choice").count(), 3);
    }

    #[test]
    fn test_custom_picking_suggestion_counts_as_accept() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["c", "1"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("TARGET", 30.0, "Travel", 0.4)).unwrap();
        assert_eq!(c.status, ClassificationStatus::ClassifiedByAI);
        assert_eq!(c.confidence, 0.4);
        assert_eq!(stats.snapshot().new_vendor_rules, 0);
    }

    #[test]
    fn test_create_new_category_requires_a_name() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["c", "n", "", "  ", "Pet Care"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("CHEWY", 45.0, "Shopping", 0.5)).unwrap();
        assert_eq!(c.category, "Pet Care");
        assert_eq!(c.status, ClassificationStatus::UserModified);
        assert_eq!(buf.contents().matches("cannot be empty").count(), 2);
        assert!(store.category_exists("Pet Care").unwrap());
    }

    #[test]
    fn test_typing_suggestion_as_new_category_is_user_modified() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["c", "n", "Travel"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("DELTA", 300.0, "Travel", 0.4)).unwrap();
        assert_eq!(c.category, "Travel");
        assert_eq!(c.status, ClassificationStatus::UserModified);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(stats.snapshot().new_vendor_rules, 1);
    }

    #[test]
    fn test_low_direction_confidence_asks_first() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["4", "3", "a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut pending = pending_for("ZELLE", 300.0, "Transfer", 0.7);
        pending.transaction.direction = Direction::Unknown;
        pending.direction_confidence = 0.5;
        let c = session.confirm(&pending).unwrap();
        assert_eq!(c.transaction.direction, Direction::Transfer);
        assert!(!buf.contents().contains("Change direction"));
    }

    #[test]
    fn test_change_direction_restarts_category_step() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["d", "1", "a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let c = session.confirm(&pending_for("ACME PAYROLL", 2000.0, "Groceries", 0.9)).unwrap();
        assert_eq!(c.transaction.direction, Direction::Income);
        assert_eq!(c.category, "Groceries");
        assert_eq!(buf.contents().matches("Category?").count(), 2);
    }

    #[test]
    fn test_new_category_accept_creates_it() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut pending = pending_for("PETCO", 60.0, "Pets", 0.8);
        pending.is_new_category = true;
        pending.category_description = "Pet food and vet".into();
        let c = session.confirm(&pending).unwrap();
        assert_eq!(c.status, ClassificationStatus::ClassifiedByAI);
        assert!(store.category_exists("Pets").unwrap());
        assert!(buf.contents().contains("Use an existing category instead"));
    }

    #[test]
    fn test_use_existing_offers_no_create_path() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["e", "n", "Shopping"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut pending = pending_for("PETCO", 60.0, "Pets", 0.8);
        pending.is_new_category = true;
        let c = session.confirm(&pending).unwrap();
        assert_eq!(c.category, "Shopping");
        assert!(!store.category_exists("Pets").unwrap());
    }

    #[test]
    fn test_long_ranking_list_is_paged() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["c", "20", "m", "20"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut pending = pending_for("COSTCO", 120.0, "Groceries", 0.5);
        pending.rankings = (1..=20)
            .map(|i| CategoryRanking {
                category: format!("Cat {i}"),
                score: 0.0,
                description: String::new(),
            })
            .collect();
        let c = session.confirm(&pending).unwrap();
        assert_eq!(c.category, "Cat 20");
        assert!(buf.contents().contains("Show 5 more"));
        assert_eq!(buf.contents().matches("Invalid choice").count(), 1);
    }

    #[test]
    fn test_hidden_ordinal_rejected_until_shown() {
        let mut pending = pending_for("COSTCO", 120.0, "Groceries", 0.5);
        pending.rankings = (1..=20)
            .map(|i| CategoryRanking {
                category: format!("Cat {i}"),
                score: 0.0,
                description: String::new(),
            })
            .collect();
        assert!(parse_selection("16", &pending, false, true).is_err());
        assert_eq!(
            parse_selection("15", &pending, false, true).unwrap(),
            Selection::Category("Cat 15".into())
        );
        assert_eq!(
            parse_selection("16", &pending, true, true).unwrap(),
            Selection::Category("Cat 16".into())
        );
        assert_eq!(
            parse_selection("cat 18", &pending, false, true).unwrap(),
            Selection::Category("Cat 18".into())
        );
    }

    #[test]
    fn test_check_pattern_annotation() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["c", "1"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut pending = pending_for("CHECK 1042", 100.0, "Home Services", 0.95);
        pending.check_patterns = vec![CheckPattern {
            id: 1,
            name: "cleaner".into(),
            category: "Home Services".into(),
            amount: AmountMatch::AnyOf(vec![100.0, 200.0]),
            day_of_month: None,
            active: true,
        }];
        session.confirm(&pending).unwrap();
        assert!(buf.contents().contains("Home Services (95%) [check pattern: cleaner]"));
    }

    #[test]
    fn test_cancel_mid_prompt_surfaces_cancellation() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let token = CancelToken::new();
        let input = ScriptedInput::new(&["c", "2"]).interrupt_at(1, token.clone());
        let term = Terminal::new(Box::new(input), Box::new(SharedBuf::default()), token);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let err = session.confirm(&pending_for("TARGET", 30.0, "Travel", 0.4)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(history.recent().is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.auto_classified + snap.user_classified, 0);
    }

    #[test]
    fn test_batch_accept_all() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let items = group("SHELL", 4, "Gas & Fuel", 0.85);
        let results = session.confirm_batch(&items).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .all(|c| c.category == "Gas & Fuel" && c.status == ClassificationStatus::ClassifiedByAI));
        for (c, p) in results.iter().zip(&items) {
            assert_eq!(c.transaction.id, p.transaction.id);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.auto_classified, 4);
        assert_eq!(snap.new_vendor_rules, 0);
    }

    #[test]
    fn test_batch_custom_for_all_learns_one_vendor_rule() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["c", "Travel"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let results = session.confirm_batch(&group("UBER", 3, "Shopping", 0.5)).unwrap();
        assert!(results
            .iter()
            .all(|c| c.category == "Travel" && c.confidence == 1.0));
        let snap = stats.snapshot();
        assert_eq!(snap.user_classified, 3);
        assert_eq!(snap.new_vendor_rules, 1);
    }

    #[test]
    fn test_batch_skip_all() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["s"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let results = session.confirm_batch(&group("UBER", 2, "Travel", 0.5)).unwrap();
        assert!(results
            .iter()
            .all(|c| c.status == ClassificationStatus::Unclassified && c.category.is_empty() && c.confidence == 0.0));
    }

    #[test]
    fn test_batch_review_individually_aborts_on_failure() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["r", "a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let err = session.confirm_batch(&group("UBER", 3, "Travel", 0.5)).unwrap_err();
        assert!(matches!(err, TallyError::InputTerminated));
    }

    #[test]
    fn test_batch_review_cancel_leaves_no_side_effects() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let token = CancelToken::new();
        let input = ScriptedInput::new(&["r", "c", "Groceries", "a"]).interrupt_at(3, token.clone());
        let term = Terminal::new(Box::new(input), Box::new(SharedBuf::default()), token);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let err = session.confirm_batch(&group("UBER", 3, "Travel", 0.5)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(history.recent().is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.auto_classified + snap.user_classified, 0);
        assert_eq!(snap.new_vendor_rules, 0);
        assert!(store.vendor_rules().unwrap().is_empty());
    }

    #[test]
    fn test_batch_review_individually_in_order() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["r", "a", "s", "c", "Groceries"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let results = session.confirm_batch(&group("COSTCO", 3, "Shopping", 0.5)).unwrap();
        assert_eq!(results[0].status, ClassificationStatus::ClassifiedByAI);
        assert_eq!(results[1].status, ClassificationStatus::Unclassified);
        assert_eq!(results[2].category, "Groceries");
        let snap = stats.snapshot();
        assert_eq!((snap.auto_classified, snap.user_classified), (1, 1));
        assert_eq!(snap.new_vendor_rules, 1);
        assert_eq!(history.categories_for("COSTCO"), vec!["Shopping", "Groceries"]);
    }

    #[test]
    fn test_batch_asks_direction_once_when_unsettled() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, _, _) = scripted(&["a", "3"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        let mut items = group("VENMO", 2, "Transfer", 0.7);
        for p in &mut items {
            p.direction_confidence = 0.4;
        }
        let results = session.confirm_batch(&items).unwrap();
        assert!(results.iter().all(|c| c.transaction.direction == Direction::Transfer));
    }

    #[test]
    fn test_fourth_prompt_shows_pattern_hint() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        let (term, buf, _) = scripted(&["a", "a", "a", "a"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        for round in 0..4 {
            let before = buf.contents().len();
            session.confirm_batch(&group("SHELL", 1, "Gas & Fuel", 0.8)).unwrap();
            let shown = buf.contents()[before..].contains("Last 3 were categorized as Gas & Fuel");
            assert_eq!(shown, round == 3, "round {round}");
        }
    }

    #[test]
    fn test_group_summary_shows_pattern_hint() {
        let (_dir, store) = test_store();
        let (history, stats) = (CategoryHistory::new(), StatsTracker::new());
        for _ in 0..3 {
            history.record("SHELL", "Gas & Fuel");
        }
        let (term, buf, _) = scripted(&["s"]);
        let mut session = ConfirmationSession::new(term, &store, &history, &stats);
        session.confirm_batch(&group("SHELL", 2, "Gas & Fuel", 0.8)).unwrap();
        let out = buf.contents();
        assert!(out.contains("Count:       2 transactions"));
        assert!(out.contains("Last 3 were categorized as Gas & Fuel"));
    }
}
