/// Full-text search index
///
/// Partitions are mirrored into a search engine so they can be found by
/// approximate title, composer, genre or category. The audit log is written
/// through the same seam.
///
/// Queries are modelled as `SearchQuery` values and rendered into the
/// Elasticsearch query DSL with `serde_json::json!`, never by formatting
/// user input into a string.
///
/// # Backends
///
/// - `elastic`: Elasticsearch REST API over reqwest
/// - `memory`: In-process index with AUTO fuzziness, for tests

pub mod elastic;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Fields searched by partition queries
pub const PARTITION_SEARCH_FIELDS: [&str; 4] = ["title", "composer", "genre", "category"];

/// Search engine errors
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Search engine rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unexpected search response: {0}")]
    InvalidResponse(String),

    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),
}

/// How the terms of a multi-field query combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    /// Any term may match
    #[default]
    Or,
    /// Every term must match within a single field
    And,
}

impl MatchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOperator::Or => "or",
            MatchOperator::And => "and",
        }
    }
}

/// A query against one index
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// best_fields multi_match, optionally with AUTO fuzziness
    MultiMatch {
        query: String,
        fields: Vec<String>,
        operator: MatchOperator,
        fuzzy: bool,
    },

    /// Match on a single field holding an exact token such as a hash
    Exact { field: String, value: String },
}

impl SearchQuery {
    /// Fuzzy multi_match over the partition fields
    pub fn partition_fields(query: impl Into<String>, operator: MatchOperator) -> Self {
        SearchQuery::MultiMatch {
            query: query.into(),
            fields: PARTITION_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
            operator,
            fuzzy: true,
        }
    }

    /// Renders the query as an Elasticsearch request body
    pub fn to_body(&self) -> JsonValue {
        match self {
            SearchQuery::MultiMatch {
                query,
                fields,
                operator,
                fuzzy,
            } => {
                let mut multi_match = json!({
                    "query": query,
                    "fields": fields,
                    "type": "best_fields",
                    "operator": operator.as_str(),
                });
                if *fuzzy {
                    multi_match["fuzziness"] = json!("AUTO");
                }
                json!({ "query": { "multi_match": multi_match } })
            }
            SearchQuery::Exact { field, value } => {
                json!({ "query": { "match": { field.as_str(): value } } })
            }
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: JsonValue,
}

/// Search engine seam
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Writes a document, returning its id
    ///
    /// With `id` the document is created or replaced; without, the engine
    /// assigns one.
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &JsonValue,
    ) -> Result<String, SearchError>;

    /// Runs `query` against `index`
    ///
    /// A missing index yields no hits.
    async fn search(&self, index: &str, query: &SearchQuery)
        -> Result<Vec<SearchHit>, SearchError>;

    /// Merges `partial` into an existing document
    ///
    /// # Errors
    ///
    /// `SearchError::NotFound` if no document has `id`
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &JsonValue,
    ) -> Result<(), SearchError>;
}
