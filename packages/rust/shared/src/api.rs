//! Front-end boundary envelopes.
//!
//! Field names here are a stable contract with HTTP/CLI front ends; they
//! mirror the shapes the UI consumes (`{ success, keywords }` for the
//! expansion step, `{ success, article }` per completed job).

use serde::{Deserialize, Serialize};

use crate::types::{Article, BatchOutcome, BatchStatus, JobFailure, Keyword};

/// Response envelope for a sub-keyword expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordsResponse {
    pub success: bool,
    pub keywords: Vec<Keyword>,
}

impl KeywordsResponse {
    pub fn ok(keywords: Vec<Keyword>) -> Self {
        Self {
            success: true,
            keywords,
        }
    }
}

/// Response envelope for a single generated article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub success: bool,
    pub article: Article,
}

impl ArticleResponse {
    pub fn ok(article: Article) -> Self {
        Self {
            success: true,
            article,
        }
    }
}

/// Batch-level summary reported alongside the assembled document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success: bool,
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<JobFailure>,
}

impl BatchSummary {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        Self {
            success: outcome.status == BatchStatus::Succeeded,
            total: outcome.articles.len() + outcome.failures.len(),
            completed: outcome.articles.len(),
            failures: outcome.failures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_envelope_shape() {
        let resp = KeywordsResponse::ok(vec![Keyword::new(1, "travel tips")]);
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["keywords"][0]["text"], "travel tips");
        assert_eq!(json["keywords"][0]["editable"], true);
    }

    #[test]
    fn batch_summary_from_partial_outcome() {
        use crate::error::ErrorKind;
        use crate::types::KeywordId;

        let outcome = BatchOutcome {
            status: BatchStatus::PartiallyFailed,
            articles: vec![
                (Keyword::new(1, "a"), Article::new("A", "body")),
                (Keyword::new(3, "c"), Article::new("C", "body")),
            ],
            failures: vec![JobFailure {
                id: KeywordId(2),
                kind: ErrorKind::RateLimited,
                attempts: 3,
            }],
        };

        let summary = BatchSummary::from_outcome(&outcome);
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["total"], 3);
        assert_eq!(json["completed"], 2);
        assert_eq!(json["failures"][0]["id"], 2);
        assert_eq!(json["failures"][0]["kind"], "rate_limited");
        assert_eq!(json["failures"][0]["attempts"], 3);
    }

    #[test]
    fn article_envelope_shape() {
        let resp = ArticleResponse::ok(Article::new("Travel Tips", "pack light"));
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["article"]["title"], "Travel Tips");
        assert!(json["article"]["wordCount"].is_number());
    }
}
