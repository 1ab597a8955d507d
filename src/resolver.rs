use std::cell::RefCell;

use tracing::{debug, info, warn};

use crate::ai::{ClassificationContext, Classifier, DirectionInferrer, TypeCodeDirection};
use crate::db::RuleStore;
use crate::error::{Result, TallyError};
use crate::history::CategoryHistory;
use crate::interrupt::CancelToken;
use crate::matcher::{rank_candidates, Candidate, CandidateSource, RuleMatcher, AI_PRIORITY};
use crate::models::{
    AiSuggestion, Category, CategoryRanking, Direction, DirectionSuggestion,
    PendingClassification, Transaction,
};

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.9;
/// Direction suggestions at or above this are not asked about.
pub const DIRECTION_THRESHOLD: f64 = 0.8;
/// An amount's sign alone is a hint, never enough to skip the question.
pub const SIGN_DIRECTION_CONFIDENCE: f64 = 0.6;

/// Merges rule candidates with the AI suggestion into a `PendingClassification`.
pub struct ClassificationResolver<'a> {
    matcher: RuleMatcher,
    store: &'a dyn RuleStore,
    history: &'a CategoryHistory,
    classifier: Option<&'a dyn Classifier>,
    inferrer: &'a dyn DirectionInferrer,
    threshold: f64,
}

/// Per-group memo so the external services are asked once per merchant.
#[derive(Default)]
struct GroupMemo {
    direction: Option<DirectionSuggestion>,
    ai: Option<std::result::Result<AiSuggestion, String>>,
}

impl<'a> ClassificationResolver<'a> {
    pub fn new(store: &'a dyn RuleStore, history: &'a CategoryHistory, threshold: f64) -> Result<Self> {
        Ok(Self {
            matcher: RuleMatcher::new(store.load_rules()?),
            store,
            history,
            classifier: None,
            inferrer: &TypeCodeDirection,
            threshold,
        })
    }

    pub fn with_classifier(mut self, classifier: &'a dyn Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_direction_inferrer(mut self, inferrer: &'a dyn DirectionInferrer) -> Self {
        self.inferrer = inferrer;
        self
    }

    /// One pending item per transaction; all share the merchant of `group[0]`.
    /// The category catalogue is read per group so categories created while
    /// confirming earlier groups show up here.
    pub fn resolve_group(
        &self,
        group: &[Transaction],
        cancel: &CancelToken,
    ) -> Result<Vec<PendingClassification>> {
        let catalogue = self.store.categories()?;
        let memo = RefCell::new(GroupMemo::default());
        group
            .iter()
            .map(|txn| self.resolve_one(txn, group, &catalogue, &memo, cancel))
            .collect()
    }

    fn resolve_one(
        &self,
        txn: &Transaction,
        group: &[Transaction],
        catalogue: &[Category],
        memo: &RefCell<GroupMemo>,
        cancel: &CancelToken,
    ) -> Result<PendingClassification> {
        let direction = self.resolve_direction(txn, group, memo, cancel)?;
        let working = if direction.confidence >= DIRECTION_THRESHOLD {
            txn.with_direction(direction.direction)
        } else {
            txn.clone()
        };

        let outcome = self.matcher.evaluate(&working);
        if let Some(rule_id) = outcome.used_rule {
            if let Err(e) = self.store.increment_use_count(rule_id) {
                warn!(rule_id, "could not record rule use: {e}");
            }
        }

        let mut candidates = outcome.candidates.clone();
        let rule_settles = outcome
            .best()
            .is_some_and(|best| best.confidence >= self.threshold);

        let mut ai_answer: Option<AiSuggestion> = None;
        if !rule_settles {
            if let Some(classifier) = self.classifier {
                cancel.check()?;
                match self.ai_suggestion(classifier, &working, catalogue, memo) {
                    Ok(ai) => {
                        candidates.push(Candidate {
                            category: ai.category.clone(),
                            confidence: ai.confidence,
                            priority: AI_PRIORITY,
                            source: CandidateSource::Ai,
                        });
                        ai_answer = Some(ai);
                    }
                    Err(reason) if candidates.is_empty() => {
                        return Err(TallyError::ExternalService(reason));
                    }
                    Err(reason) => {
                        warn!(merchant = %txn.merchant, "AI unavailable, using rule candidates: {reason}");
                    }
                }
            }
        }
        rank_candidates(&mut candidates);

        let top = candidates.first();
        let (suggested, confidence) = top
            .map(|c| (c.category.clone(), c.confidence))
            .unwrap_or_default();
        let from_ai = top.is_some_and(|c| c.source == CandidateSource::Ai);
        if from_ai {
            debug!(merchant = %txn.merchant, category = %suggested, "AI suggestion leads");
        }
        let ai_is_new = ai_answer.as_ref().is_some_and(|ai| ai.is_new_category);
        let suggestion_is_new = from_ai && ai_is_new;
        if ai_is_new && !from_ai {
            // A category that does not exist yet is only offered as the suggestion.
            candidates.retain(|c| c.source != CandidateSource::Ai);
        }
        let description = match &ai_answer {
            Some(ai) if suggestion_is_new => ai.category_description.clone(),
            _ => describe(catalogue, &suggested),
        };
        let rankings = build_rankings(&candidates, catalogue, &suggested, &description);

        let auto_acceptable = !suggested.is_empty()
            && !suggestion_is_new
            && confidence >= self.threshold
            && !outcome.has_conflicting_checks()
            && direction.confidence >= DIRECTION_THRESHOLD;
        if auto_acceptable {
            info!(merchant = %txn.merchant, category = %suggested, confidence, "auto-accepting");
        }

        Ok(PendingClassification {
            transaction: working,
            suggested_category: suggested,
            confidence,
            is_new_category: suggestion_is_new,
            category_description: description,
            rankings,
            check_patterns: outcome.check_matches,
            suggested_direction: direction.direction,
            direction_confidence: direction.confidence,
            direction_reasoning: direction.reasoning,
            similar_count: group.len(),
            auto_acceptable,
        })
    }

    /// Asks the inferrer once per group. When it has no answer, the imported
    /// sign is offered as a guess below the prompt threshold.
    fn resolve_direction(
        &self,
        txn: &Transaction,
        group: &[Transaction],
        memo: &RefCell<GroupMemo>,
        cancel: &CancelToken,
    ) -> Result<DirectionSuggestion> {
        let cached = memo.borrow().direction.clone();
        let inferred = match cached {
            Some(cached) => cached,
            None => {
                cancel.check()?;
                let suggestion = self
                    .inferrer
                    .infer_direction(&txn.merchant, txn, group.len())
                    .unwrap_or_else(|e| {
                        warn!(merchant = %txn.merchant, "direction inference failed: {e}");
                        unknown_direction()
                    });
                memo.borrow_mut().direction = Some(suggestion.clone());
                suggestion
            }
        };
        if inferred.direction != Direction::Unknown || txn.direction == Direction::Unknown {
            return Ok(inferred);
        }
        Ok(DirectionSuggestion {
            direction: txn.direction,
            confidence: SIGN_DIRECTION_CONFIDENCE,
            reasoning: "Sign of the imported amount".into(),
        })
    }

    fn ai_suggestion(
        &self,
        classifier: &dyn Classifier,
        txn: &Transaction,
        catalogue: &[Category],
        memo: &RefCell<GroupMemo>,
    ) -> std::result::Result<AiSuggestion, String> {
        if let Some(cached) = &memo.borrow().ai {
            return cached.clone();
        }
        let known: Vec<String> = catalogue.iter().map(|c| c.name.clone()).collect();
        let history = self.history.categories_for(&txn.merchant);
        let ctx = ClassificationContext {
            transaction: txn,
            known_categories: &known,
            merchant_history: &history,
        };
        let result = classifier.classify(&ctx).map_err(|e| e.to_string());
        memo.borrow_mut().ai = Some(result.clone());
        result
    }
}

fn describe(catalogue: &[Category], category: &str) -> String {
    catalogue
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(category))
        .map(|c| c.description.clone())
        .unwrap_or_default()
}

/// Every candidate at its confidence, then the rest of the catalogue at
/// zero; one entry per category, highest score first.
fn build_rankings(
    candidates: &[Candidate],
    catalogue: &[Category],
    top: &str,
    top_description: &str,
) -> Vec<CategoryRanking> {
    let mut rankings: Vec<CategoryRanking> = Vec::new();
    let mut push = |category: &str, score: f64, description: String| {
        if category.is_empty() {
            return;
        }
        match rankings
            .iter_mut()
            .find(|r| r.category.eq_ignore_ascii_case(category))
        {
            Some(existing) => existing.score = existing.score.max(score),
            None => rankings.push(CategoryRanking {
                category: category.to_string(),
                score,
                description,
            }),
        }
    };

    for c in candidates {
        let description = if c.category == top {
            top_description.to_string()
        } else {
            describe(catalogue, &c.category)
        };
        push(&c.category, c.confidence.clamp(0.0, 1.0), description);
    }
    for cat in catalogue {
        push(&cat.name, 0.0, cat.description.clone());
    }

    rankings.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rankings
}

fn unknown_direction() -> DirectionSuggestion {
    DirectionSuggestion {
        direction: Direction::Unknown,
        confidence: 0.0,
        reasoning: String::new(),
    }
}
