//! Query utilities for the Apstra API
//!
//! The controller has no server-side label filter on most collections, so
//! lookups by label list the collection and filter locally.

use crate::common::{HttpClient, ListResponse};
use crate::error::ApstraError;
use crate::polish::Polish;
use serde::de::DeserializeOwned;

/// Anything that carries a human-facing label (or name)
pub trait Labeled {
    fn label(&self) -> &str;
}

/// List a collection endpoint returning `{"items": [...]}`
pub async fn list_items<T: DeserializeOwned>(
    http: &HttpClient,
    path: &str,
) -> Result<Vec<T>, ApstraError> {
    let response: ListResponse<T> = http.get(path).await?;
    Ok(response.items)
}

/// List a collection and polish every item
pub async fn list_polished<R>(http: &HttpClient, path: &str) -> Result<Vec<R::Polished>, ApstraError>
where
    R: Polish + DeserializeOwned,
{
    let raw: Vec<R> = list_items(http, path).await?;
    raw.into_iter().map(Polish::polish).collect()
}

/// Keep only the items whose label matches exactly
pub fn filter_by_label<T: Labeled>(items: Vec<T>, label: &str) -> Vec<T> {
    items.into_iter().filter(|item| item.label() == label).collect()
}

/// Find exactly one item by label.
///
/// `kind` names the object type in error messages.
pub fn one_by_label<T: Labeled>(items: Vec<T>, label: &str, kind: &str) -> Result<T, ApstraError> {
    let mut matches = filter_by_label(items, label);
    match matches.len() {
        0 => Err(ApstraError::NotFound(format!("{} with label '{}' not found", kind, label))),
        1 => Ok(matches.remove(0)),
        n => Err(ApstraError::MultipleMatch(format!(
            "found {} {} objects with label '{}'",
            n, kind, label
        ))),
    }
}
