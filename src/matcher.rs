//! Symptom matcher — ranks catalog tests against free-text symptom input.
//!
//! Scoring is delegated to a pluggable [`SymptomScorer`] so the matching
//! algorithm is replaceable without touching orchestration logic. The
//! matcher itself only enforces the contract: bounded result count,
//! descending score order with catalog-order tie-break, dedup by code,
//! a minimum relevance threshold, and a bounded time budget that degrades
//! to an empty list instead of stalling the conversation turn.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::models::Test;

/// Scores a candidate test's relevance to free-text symptom input.
/// Implementations must return values in [0, 1].
pub trait SymptomScorer: Send + Sync {
    fn score(&self, text: &str, test: &Test) -> f32;
}

/// A ranked suggestion returned to the conversation engine.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub test: Test,
    pub score: f32,
}

pub struct SymptomMatcher {
    catalog: Arc<Catalog>,
    scorer: Arc<dyn SymptomScorer>,
    max_results: usize,
    min_score: f32,
    budget: Duration,
}

impl SymptomMatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        scorer: Arc<dyn SymptomScorer>,
        max_results: usize,
        min_score: f32,
        budget: Duration,
    ) -> Self {
        Self {
            catalog,
            scorer,
            max_results,
            min_score,
            budget,
        }
    }

    /// Suggest up to `max_results` tests for the given free text.
    ///
    /// Empty or unmatched input yields an empty list, never an error.
    /// Scoring runs on a blocking task under a time budget; on timeout the
    /// matcher logs a warning and returns an empty list.
    pub async fn suggest(&self, text: &str) -> Vec<Suggestion> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Vec::new();
        }

        let catalog = Arc::clone(&self.catalog);
        let scorer = Arc::clone(&self.scorer);
        let min_score = self.min_score;
        let max_results = self.max_results;

        let scoring = tokio::task::spawn_blocking(move || {
            rank(&catalog, scorer.as_ref(), &text, min_score, max_results)
        });

        match tokio::time::timeout(self.budget, scoring).await {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(join_err)) => {
                tracing::warn!("symptom scoring task failed: {join_err}");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    budget_ms = self.budget.as_millis() as u64,
                    "symptom scoring exceeded budget, returning no suggestions"
                );
                Vec::new()
            }
        }
    }
}

/// Score, threshold, dedup, and rank. Ties broken by catalog order.
fn rank(
    catalog: &Catalog,
    scorer: &dyn SymptomScorer,
    text: &str,
    min_score: f32,
    max_results: usize,
) -> Vec<Suggestion> {
    let mut seen = std::collections::HashSet::new();
    let mut candidates: Vec<Suggestion> = catalog
        .list()
        .iter()
        .filter(|t| seen.insert(t.code.to_uppercase()))
        .map(|t| Suggestion {
            score: scorer.score(text, t).clamp(0.0, 1.0),
            test: t.clone(),
        })
        .filter(|s| s.score >= min_score)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| catalog.position(&a.test.code).cmp(&catalog.position(&b.test.code)))
    });

    candidates.truncate(max_results);
    candidates
}

// ─── Default scorer ──────────────────────────────────────────────────────────

/// Keyword-overlap scorer over the catalog's per-test keyword lists.
///
/// Not a clinical engine: it exists so the orchestrator has a working
/// default, and is swapped out by injecting another `SymptomScorer`.
pub struct KeywordScorer;

impl SymptomScorer for KeywordScorer {
    fn score(&self, text: &str, test: &Test) -> f32 {
        if test.keywords.is_empty() {
            return 0.0;
        }
        let tokens: std::collections::HashSet<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let matched = test
            .keywords
            .iter()
            .filter(|kw| tokens.contains(**kw))
            .count();
        (matched as f32 / test.keywords.len() as f32).min(1.0)
    }
}
