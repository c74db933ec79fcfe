//! Mock QueryEngine for unit testing
//!
//! Serves canned graph query responses from memory and records every query
//! it receives, so code built on [`QueryEngine`] can be tested without a
//! controller.

use crate::blueprint::BlueprintType;
use crate::common::ObjectId;
use crate::error::ApstraError;
use crate::graph::Query;
use crate::query_engine::QueryEngine;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A query as received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub blueprint_id: ObjectId,
    pub blueprint_type: BlueprintType,
    pub query: String,
}

/// Mock QueryEngine for testing
///
/// Responses are keyed by the rendered query string. Unknown queries fail
/// with `NotFound`, which keeps typos in expected queries visible.
#[derive(Debug, Clone, Default)]
pub struct MockQueryEngine {
    responses: Arc<Mutex<HashMap<String, Value>>>,
    recorded: Arc<Mutex<Vec<RecordedQuery>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with the given items (wrapped as `{"count", "items"}`)
    pub fn add_response<Q: Query + ?Sized>(&self, query: &Q, items: Vec<Value>) {
        let response = json!({"count": items.len(), "items": items});
        lock(&self.responses).insert(query.render(), response);
    }

    /// Answer `query` with a raw response body
    pub fn add_raw_response<Q: Query + ?Sized>(&self, query: &Q, response: Value) {
        lock(&self.responses).insert(query.render(), response);
    }

    /// Every query received so far, oldest first
    pub fn queries(&self) -> Vec<RecordedQuery> {
        lock(&self.recorded).clone()
    }
}

#[async_trait::async_trait]
impl QueryEngine for MockQueryEngine {
    async fn run_query(
        &self,
        blueprint_id: &ObjectId,
        blueprint_type: BlueprintType,
        query: &str,
    ) -> Result<Value, ApstraError> {
        lock(&self.recorded).push(RecordedQuery {
            blueprint_id: blueprint_id.clone(),
            blueprint_type,
            query: query.to_string(),
        });

        lock(&self.responses)
            .get(query)
            .cloned()
            .ok_or_else(|| ApstraError::NotFound(format!("no canned response for query: {}", query)))
    }
}
