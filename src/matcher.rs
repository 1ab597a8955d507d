use std::cmp::Ordering;

use chrono::Datelike;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::{Result, TallyError};
use crate::models::{CheckPattern, MerchantMatcher, PatternRule, Transaction, VendorRule};

pub const CHECK_PATTERN_CONFIDENCE: f64 = 0.95;
pub const CHECK_PATTERN_PRIORITY: i32 = 1000;
pub const VENDOR_RULE_CONFIDENCE: f64 = 0.6;
pub const VENDOR_RULE_PRIORITY: i32 = -1000;
pub const AI_PRIORITY: i32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSource {
    CheckPattern(String),
    PatternRule(String),
    VendorRule,
    Ai,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub category: String,
    pub confidence: f64,
    pub priority: i32,
    pub source: CandidateSource,
}

/// Highest priority first, then highest confidence. The sort is stable, so
/// equal keys keep the order they were produced in.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then_with(|| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        })
    });
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub patterns: Vec<PatternRule>,
    pub checks: Vec<CheckPattern>,
    pub vendors: Vec<VendorRule>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Ranked best first.
    pub candidates: Vec<Candidate>,
    pub check_matches: Vec<CheckPattern>,
    /// Pattern rule whose use count should be bumped.
    pub used_rule: Option<i64>,
}

impl MatchOutcome {
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// True when check patterns pointing at different categories all matched.
    pub fn has_conflicting_checks(&self) -> bool {
        self.check_matches
            .iter()
            .any(|c| !c.category.eq_ignore_ascii_case(&self.check_matches[0].category))
    }
}

struct CompiledRule {
    rule: PatternRule,
    regex: Option<std::result::Result<Regex, String>>,
}

pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
    checks: Vec<CheckPattern>,
    vendors: Vec<VendorRule>,
}

impl RuleMatcher {
    pub fn new(set: RuleSet) -> Self {
        let rules = set
            .patterns
            .into_iter()
            .filter(|r| r.active)
            .map(|rule| {
                let regex = match &rule.matcher {
                    MerchantMatcher::Regex(pattern) => Some(
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| e.to_string()),
                    ),
                    MerchantMatcher::Literal(_) => None,
                };
                CompiledRule { rule, regex }
            })
            .collect();
        Self {
            rules,
            checks: set.checks.into_iter().filter(|c| c.active).collect(),
            vendors: set.vendors,
        }
    }

    pub fn evaluate(&self, txn: &Transaction) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        if txn.is_check() {
            for check in &self.checks {
                if check_matches(check, txn) {
                    outcome.candidates.push(Candidate {
                        category: check.category.clone(),
                        confidence: CHECK_PATTERN_CONFIDENCE,
                        priority: CHECK_PATTERN_PRIORITY,
                        source: CandidateSource::CheckPattern(check.name.clone()),
                    });
                    outcome.check_matches.push(check.clone());
                }
            }
        }

        let mut matched: Vec<&PatternRule> = Vec::new();
        for compiled in &self.rules {
            match rule_matches(compiled, txn) {
                Ok(true) => matched.push(&compiled.rule),
                Ok(false) => {}
                Err(e) => warn!("skipping rule: {e}"),
            }
        }
        // Stable sort: rules with equal priority and confidence keep definition order.
        matched.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                b.confidence()
                    .partial_cmp(&a.confidence())
                    .unwrap_or(Ordering::Equal)
            })
        });
        if let Some(best) = matched.first() {
            debug!(rule = %best.name, merchant = %txn.merchant, "pattern rule matched");
            outcome.candidates.push(Candidate {
                category: best.category.clone(),
                confidence: best.confidence(),
                priority: best.priority,
                source: CandidateSource::PatternRule(best.name.clone()),
            });
            outcome.used_rule = Some(best.id);
        }

        if let Some(vendor) = self
            .vendors
            .iter()
            .find(|v| v.merchant.eq_ignore_ascii_case(txn.merchant.trim()))
        {
            outcome.candidates.push(Candidate {
                category: vendor.category.clone(),
                confidence: VENDOR_RULE_CONFIDENCE,
                priority: VENDOR_RULE_PRIORITY,
                source: CandidateSource::VendorRule,
            });
        }

        rank_candidates(&mut outcome.candidates);
        outcome
    }
}

fn check_matches(check: &CheckPattern, txn: &Transaction) -> bool {
    if !check.amount.matches(txn.amount) {
        return false;
    }
    match check.day_of_month {
        Some(window) => window.contains(txn.date.day()),
        None => true,
    }
}

fn rule_matches(compiled: &CompiledRule, txn: &Transaction) -> Result<bool> {
    let rule = &compiled.rule;
    let merchant = txn.merchant.trim();
    let merchant_ok = match (&rule.matcher, &compiled.regex) {
        (MerchantMatcher::Literal(lit), _) => lit.trim().eq_ignore_ascii_case(merchant),
        (MerchantMatcher::Regex(_), Some(Ok(re))) => re.is_match(merchant),
        (MerchantMatcher::Regex(_), Some(Err(reason))) => {
            return Err(TallyError::RuleEvaluation {
                rule: rule.name.clone(),
                reason: reason.clone(),
            })
        }
        (MerchantMatcher::Regex(_), None) => false,
    };
    if !merchant_ok || !rule.amount.holds(txn.amount) {
        return Ok(false);
    }
    Ok(match rule.direction {
        Some(dir) => dir == txn.direction,
        None => true,
    })
}
