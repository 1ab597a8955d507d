//! Collaborators that suggest a category or a direction for a transaction.
//!
//! The engine only depends on the two traits; `OllamaClient` is the HTTP
//! backend used by the CLI and `TypeCodeDirection` is an offline fallback
//! for direction inference.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::models::{AiSuggestion, Direction, DirectionSuggestion, Transaction};

/// What the classifier gets to see about one transaction.
#[derive(Debug, Clone)]
pub struct ClassificationContext<'a> {
    pub transaction: &'a Transaction,
    pub known_categories: &'a [String],
    pub merchant_history: &'a [String],
}

pub trait Classifier {
    fn classify(&self, ctx: &ClassificationContext) -> Result<AiSuggestion>;
}

pub trait DirectionInferrer {
    fn infer_direction(
        &self,
        merchant: &str,
        sample: &Transaction,
        count: usize,
    ) -> Result<DirectionSuggestion>;
}

/// Reads direction off the bank's raw type code. Never fails.
pub struct TypeCodeDirection;

impl DirectionInferrer for TypeCodeDirection {
    fn infer_direction(
        &self,
        _merchant: &str,
        sample: &Transaction,
        _count: usize,
    ) -> Result<DirectionSuggestion> {
        let code = sample.type_code.trim().to_uppercase();
        let (direction, confidence, reasoning) = match code.as_str() {
            "XFER" | "TRANSFER" => (Direction::Transfer, 0.95, "Type code marks a transfer"),
            "CHECK" | "DEBIT" | "POS" | "ATM" | "FEE" => {
                (Direction::Expense, 0.9, "Type code marks money leaving the account")
            }
            "CREDIT" | "DEP" | "DEPOSIT" | "INT" | "DIRECTDEP" => {
                (Direction::Income, 0.9, "Type code marks money arriving")
            }
            _ => (Direction::Unknown, 0.0, "Type code does not indicate a direction"),
        };
        Ok(DirectionSuggestion {
            direction,
            confidence,
            reasoning: reasoning.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama-compatible `/api/generate` client.
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .map_err(|e| TallyError::ExternalService(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TallyError::ExternalService(format!(
                "model server returned {}",
                response.status()
            )));
        }
        let body: GenerateResponse = response
            .json()
            .map_err(|e| TallyError::ExternalService(e.to_string()))?;
        debug!(response = %body.response, "model response");
        Ok(body.response)
    }
}

impl Classifier for OllamaClient {
    fn classify(&self, ctx: &ClassificationContext) -> Result<AiSuggestion> {
        let txn = ctx.transaction;
        let prompt = format!(
            "Classify this bank transaction into a spending category.\n\
             Merchant: {}\nDescription: {}\nAmount: {:.2}\nDirection: {}\nDate: {}\n\
             Known categories: {}\nPreviously used for this merchant: {}\n\
             Prefer a known category. Reply with JSON only: \
             {{\"category\": string, \"confidence\": number 0-1, \"is_new_category\": bool, \
             \"category_description\": string, \"reasoning\": string}}",
            txn.merchant,
            txn.description,
            txn.amount,
            txn.direction.as_str(),
            txn.date,
            ctx.known_categories.join(", "),
            if ctx.merchant_history.is_empty() {
                "none".to_string()
            } else {
                ctx.merchant_history.join(", ")
            },
        );
        let mut suggestion: AiSuggestion = parse_json_object(&self.generate(prompt)?)?;
        suggestion.confidence = suggestion.confidence.clamp(0.0, 1.0);
        suggestion.is_new_category = !ctx
            .known_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&suggestion.category));
        Ok(suggestion)
    }
}

impl DirectionInferrer for OllamaClient {
    fn infer_direction(
        &self,
        merchant: &str,
        sample: &Transaction,
        count: usize,
    ) -> Result<DirectionSuggestion> {
        let prompt = format!(
            "Decide whether transactions from this merchant are income, expense or a transfer \
             between the owner's own accounts.\nMerchant: {merchant}\nSample description: {}\n\
             Sample amount: {:.2}\nBank type code: {}\nNumber of transactions: {count}\n\
             Reply with JSON only: {{\"direction\": \"income\"|\"expense\"|\"transfer\", \
             \"confidence\": number 0-1, \"reasoning\": string}}",
            sample.description, sample.amount, sample.type_code,
        );
        let mut suggestion: DirectionSuggestion = parse_json_object(&self.generate(prompt)?)?;
        suggestion.confidence = suggestion.confidence.clamp(0.0, 1.0);
        Ok(suggestion)
    }
}

/// Models often wrap their JSON in prose; take the outermost object.
pub fn parse_json_object<T: for<'de> Deserialize<'de>>(response: &str) -> Result<T> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&response[start..=end])
            .map_err(|e| TallyError::ExternalService(format!("unreadable model reply: {e}"))),
        _ => Err(TallyError::ExternalService(
            "no JSON object in model reply".into(),
        )),
    }
}
