//! QueryEngine trait for mocking
//!
//! Graph queries go through this trait so code built on them can be tested
//! against [`MockQueryEngine`](crate::mock::MockQueryEngine) (feature
//! `test-util`) instead of a live controller.

use crate::blueprint::{BlueprintType, blueprint_path};
use crate::client::ApstraClient;
use crate::common::ObjectId;
use crate::error::ApstraError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Executes rendered graph queries against a blueprint
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run `query` and return the raw `{"count", "items"}` response
    async fn run_query(
        &self,
        blueprint_id: &ObjectId,
        blueprint_type: BlueprintType,
        query: &str,
    ) -> Result<Value, ApstraError>;
}

#[derive(Serialize)]
struct QeRequest<'a> {
    query: &'a str,
}

#[async_trait::async_trait]
impl QueryEngine for ApstraClient {
    async fn run_query(
        &self,
        blueprint_id: &ObjectId,
        blueprint_type: BlueprintType,
        query: &str,
    ) -> Result<Value, ApstraError> {
        debug!("Graph query on {} ({}): {}", blueprint_id, blueprint_type, query);
        self.http
            .talk(
                Method::POST,
                &blueprint_path(blueprint_id, "/qe"),
                &[("type", blueprint_type.as_str())],
                Some(&QeRequest { query }),
            )
            .await
    }
}
