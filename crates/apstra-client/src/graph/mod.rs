//! Blueprint graph queries
//!
//! Build a query with [`PathQuery`] or [`MatchQuery`], then run it through
//! any [`QueryEngine`] with [`execute`].

pub mod attribute;
pub mod query;

pub use attribute::*;
pub use query::*;

use crate::blueprint::BlueprintType;
use crate::common::ObjectId;
use crate::error::ApstraError;
use crate::query_engine::QueryEngine;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Decoded query response; each item maps node names to node objects
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

/// Render `query`, run it, and decode the items into `T`
pub async fn execute<T, E, Q>(
    engine: &E,
    blueprint_id: &ObjectId,
    blueprint_type: BlueprintType,
    query: &Q,
) -> Result<QueryResponse<T>, ApstraError>
where
    T: DeserializeOwned,
    E: QueryEngine + ?Sized,
    Q: Query + ?Sized,
{
    let rendered = query.render();
    if rendered.is_empty() {
        return Err(ApstraError::InvalidRequest("graph query is empty".to_string()));
    }

    let raw = engine.run_query(blueprint_id, blueprint_type, &rendered).await?;
    serde_json::from_value(raw).map_err(|e| ApstraError::Polish(format!("graph query response: {}", e)))
}
