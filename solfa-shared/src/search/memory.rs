/// In-process search index
///
/// Approximates Elasticsearch matching closely enough for tests: text is
/// split into lowercase alphanumeric terms and compared with the AUTO edit
/// distance (0 edits for terms of 1-2 chars, 1 for 3-5, 2 beyond).
///
/// Failures can be injected with `fail_searches` and `fail_writes`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use super::{MatchOperator, SearchError, SearchHit, SearchIndex, SearchQuery};

#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    indices: RwLock<HashMap<String, Vec<(String, JsonValue)>>>,
    next_id: AtomicU64,
    fail_searches: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent search fail (or succeed again)
    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent index or update call fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of documents in `index`
    pub fn count(&self, index: &str) -> usize {
        self.indices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)
            .map_or(0, Vec::len)
    }

    /// Fetches a document by id
    pub fn document(&self, index: &str, id: &str) -> Option<JsonValue> {
        self.indices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)?
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc.clone())
    }

    /// All documents in `index`, in insertion order
    pub fn documents(&self, index: &str) -> Vec<JsonValue> {
        self.indices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    fn check_writes(&self) -> Result<(), SearchError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SearchError::Rejected {
                status: 503,
                body: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Lowercase alphanumeric terms of `text`
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Edit distance AUTO fuzziness allows for a query term
pub fn auto_fuzziness(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Levenshtein distance over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn term_matches(query_term: &str, field_term: &str, fuzzy: bool) -> bool {
    if query_term == field_term {
        return true;
    }
    fuzzy && edit_distance(query_term, field_term) <= auto_fuzziness(query_term)
}

fn field_text(document: &JsonValue, field: &str) -> Option<String> {
    match document.get(field)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Score of `document` for `query`, None if it doesn't match
fn score(document: &JsonValue, query: &SearchQuery) -> Option<f64> {
    match query {
        SearchQuery::Exact { field, value } => {
            (field_text(document, field).as_deref() == Some(value.as_str())).then_some(1.0)
        }
        SearchQuery::MultiMatch {
            query,
            fields,
            operator,
            fuzzy,
        } => {
            let query_terms = tokenize(query);
            if query_terms.is_empty() {
                return None;
            }

            // best_fields: the score is the best single field
            let best = fields
                .iter()
                .filter_map(|field| field_text(document, field))
                .map(|text| {
                    let field_terms = tokenize(&text);
                    query_terms
                        .iter()
                        .filter(|q| field_terms.iter().any(|f| term_matches(q, f, *fuzzy)))
                        .count()
                })
                .filter(|&matched| match operator {
                    MatchOperator::And => matched == query_terms.len(),
                    MatchOperator::Or => matched > 0,
                })
                .max()?;

            Some(best as f64 / query_terms.len() as f64)
        }
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &JsonValue,
    ) -> Result<String, SearchError> {
        self.check_writes()?;

        let id = match id {
            Some(id) => id.to_string(),
            None => format!("auto-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
        };

        let mut indices = self.indices.write().unwrap_or_else(|e| e.into_inner());
        let docs = indices.entry(index.to_string()).or_default();
        match docs.iter_mut().find(|(doc_id, _)| *doc_id == id) {
            Some((_, existing)) => *existing = document.clone(),
            None => docs.push((id.clone(), document.clone())),
        }

        Ok(id)
    }

    async fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(SearchError::Rejected {
                status: 503,
                body: "injected search failure".to_string(),
            });
        }

        let indices = self.indices.read().unwrap_or_else(|e| e.into_inner());
        let Some(docs) = indices.get(index) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter_map(|(id, doc)| {
                score(doc, query).map(|score| SearchHit {
                    id: id.clone(),
                    score: Some(score),
                    source: doc.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(hits)
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &JsonValue,
    ) -> Result<(), SearchError> {
        self.check_writes()?;

        let mut indices = self.indices.write().unwrap_or_else(|e| e.into_inner());
        let document = indices
            .get_mut(index)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc)
            .ok_or_else(|| SearchError::NotFound(id.to_string()))?;

        if let (Some(target), Some(patch)) = (document.as_object_mut(), partial.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }

        Ok(())
    }
}
