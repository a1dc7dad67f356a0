//! Sub-keyword expansion: one seed keyword → `count` editable keywords.
//!
//! Makes a single remote call (under retry), parses the response into
//! candidate lines, dedups case-insensitively, and pads deterministically
//! from the seed when the model returns fewer than requested.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, instrument};

use articleforge_client::{GenerationBackend, GenerationRequest, RetryPolicy};
use articleforge_shared::{ArticleForgeError, GenerationOptions, Keyword, Result};

/// Deterministic padding suffixes, applied in order when the model yields
/// fewer unique keywords than requested.
const PAD_SUFFIXES: &[&str] = &[
    "guide",
    "tips",
    "examples",
    "checklist",
    "trends",
    "faq",
    "mistakes to avoid",
    "for beginners",
];

/// Expands a seed keyword into an ordered set of sub-keywords.
pub struct SubKeywordExpander {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
}

impl SubKeywordExpander {
    pub fn new(backend: Arc<dyn GenerationBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Derive exactly `count` keywords from `seed`, ids `1..=count`.
    ///
    /// Fails with the final remote error kind if the call fails after
    /// retries, or `ParseFailed` if no keyword candidates are recoverable
    /// from the response.
    #[instrument(skip_all, fields(seed = %seed, count))]
    pub async fn expand(
        &self,
        seed: &str,
        count: u32,
        options: &GenerationOptions,
    ) -> Result<Vec<Keyword>> {
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(ArticleForgeError::validation("seed keyword must be non-empty"));
        }
        if count == 0 {
            return Err(ArticleForgeError::validation("count must be greater than zero"));
        }

        let prompt = keyword_prompt(seed, count, options);
        let backend = self.backend.clone();
        let payload = self
            .retry
            .run(|attempt| {
                let backend = backend.clone();
                let request = GenerationRequest::new(prompt.clone());
                async move {
                    debug!(attempt, "requesting sub-keywords");
                    backend.generate(&request).await
                }
            })
            .await
            .map_err(|exhausted| exhausted.error)?;

        let candidates = parse_candidates(&payload.text);
        if candidates.is_empty() {
            return Err(ArticleForgeError::ParseFailed(format!(
                "no keyword candidates in {} bytes of response",
                payload.text.len()
            )));
        }

        let texts = pad_keywords(seed, candidates, count as usize);
        let keywords: Vec<Keyword> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Keyword::new(i as u32 + 1, text))
            .collect();

        info!(derived = keywords.len(), "sub-keyword expansion complete");
        Ok(keywords)
    }
}

/// Build the expansion prompt.
fn keyword_prompt(seed: &str, count: u32, options: &GenerationOptions) -> String {
    format!(
        "List {count} specific blog article topics related to \"{seed}\" \
         for a {audience} audience. Respond with one topic per line as a \
         numbered list, no commentary.",
        audience = options.target_audience,
    )
}

/// Split the response into trimmed candidate keywords, dropping list
/// markers, surrounding quotes, and case-insensitive duplicates.
fn parse_candidates(text: &str) -> Vec<String> {
    let marker = Regex::new(r"^\s*(?:[-*\u{2022}]|\d+\s*[.)])\s*").expect("static regex");

    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let cleaned = marker.replace(line, "");
        let cleaned = cleaned
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '*' || c == '`')
            .trim();
        // Skip blanks and preamble lines ("Here are 10 topics:").
        if cleaned.is_empty() || cleaned.ends_with(':') {
            continue;
        }

        let folded = cleaned.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(cleaned.to_string());
    }

    out
}

/// Truncate or deterministically pad `candidates` to exactly `count`
/// entries. Padding derives variant phrasings from the seed instead of
/// failing outright (documented policy choice).
fn pad_keywords(seed: &str, mut candidates: Vec<String>, count: usize) -> Vec<String> {
    candidates.truncate(count);

    let mut folded: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();
    let mut push_unique = |candidates: &mut Vec<String>, folded: &mut Vec<String>, text: String| {
        let key = text.to_lowercase();
        if !folded.contains(&key) {
            folded.push(key);
            candidates.push(text);
        }
    };

    for suffix in PAD_SUFFIXES {
        if candidates.len() >= count {
            break;
        }
        push_unique(&mut candidates, &mut folded, format!("{seed} {suffix}"));
    }

    let mut n = 1;
    while candidates.len() < count {
        push_unique(&mut candidates, &mut folded, format!("{seed} ideas {n}"));
        n += 1;
    }

    candidates
}
