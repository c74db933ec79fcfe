//! Design tags (`/api/design/tags`)

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, parse_optional_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const TAGS_PATH: &str = "/api/design/tags";

/// Tag as sent by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTag {
    pub id: ObjectId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

/// Create/update body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: ObjectId,
    pub data: TagData,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl Polish for RawTag {
    type Polished = Tag;

    fn polish(self) -> Result<Tag, ApstraError> {
        Ok(Tag {
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            data: TagData {
                label: self.label,
                description: self.description,
            },
        })
    }
}

impl Labeled for Tag {
    fn label(&self) -> &str {
        &self.data.label
    }
}

impl ApstraClient {
    pub async fn list_tags(&self) -> Result<Vec<Tag>, ApstraError> {
        list_polished::<RawTag>(&self.http, TAGS_PATH).await
    }

    pub async fn get_tag(&self, id: &ObjectId) -> Result<Tag, ApstraError> {
        let raw: RawTag = self.http.get(&format!("{}/{}", TAGS_PATH, id)).await?;
        raw.polish()
    }

    pub async fn get_tag_by_label(&self, label: &str) -> Result<Tag, ApstraError> {
        one_by_label(self.list_tags().await?, label, "tag")
    }

    /// Fetch several tags by label, failing on the first one missing
    pub async fn get_tags_by_labels(&self, labels: &[&str]) -> Result<Vec<Tag>, ApstraError> {
        let all = self.list_tags().await?;
        labels
            .iter()
            .map(|label| {
                all.iter()
                    .find(|t| t.data.label == *label)
                    .cloned()
                    .ok_or_else(|| ApstraError::NotFound(format!("tag with label '{}' not found", label)))
            })
            .collect()
    }

    pub async fn create_tag(&self, data: &TagData) -> Result<ObjectId, ApstraError> {
        if data.label.is_empty() {
            return Err(ApstraError::InvalidRequest("tag label must not be empty".to_string()));
        }
        debug!("Creating tag '{}'", data.label);
        let response: IdResponse = self.http.post(TAGS_PATH, data).await?;
        Ok(response.id)
    }

    pub async fn update_tag(&self, id: &ObjectId, data: &TagData) -> Result<(), ApstraError> {
        self.http.put(&format!("{}/{}", TAGS_PATH, id), data).await
    }

    pub async fn delete_tag(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", TAGS_PATH, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with_version;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn tag_json(id: &str, label: &str) -> serde_json::Value {
        json!({
            "id": id,
            "label": label,
            "description": format!("{} tag", label),
            "created_at": "2024-02-01T08:00:00.000000Z",
            "last_modified_at": "2024-02-02T08:00:00.000000Z"
        })
    }

    #[test]
    fn test_polish_tag() {
        let raw: RawTag = serde_json::from_value(tag_json("t1", "prod")).unwrap();
        let tag = raw.polish().unwrap();
        assert_eq!(tag.id, ObjectId::from("t1"));
        assert_eq!(tag.data.label, "prod");
        assert!(tag.created_at.unwrap() < tag.last_modified_at.unwrap());
    }

    #[test]
    fn test_polish_tag_bad_timestamp() {
        let mut value = tag_json("t1", "prod");
        value["created_at"] = json!("not-a-date");
        let raw: RawTag = serde_json::from_value(value).unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(_))));
    }

    #[tokio::test]
    async fn test_get_tag_by_label() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [tag_json("t1", "prod"), tag_json("t2", "lab")]
            })))
            .mount(&server)
            .await;

        let tag = client.get_tag_by_label("lab").await.unwrap();
        assert_eq!(tag.id, ObjectId::from("t2"));

        let both = client.get_tags_by_labels(&["prod", "lab"]).await.unwrap();
        assert_eq!(both.len(), 2);
        assert!(client.get_tags_by_labels(&["prod", "nope"]).await.is_err());
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("POST"))
            .and(path(TAGS_PATH))
            .and(body_json(json!({"label": "prod", "description": "production"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new-tag"})))
            .mount(&server)
            .await;

        let id = client
            .create_tag(&TagData {
                label: "prod".to_string(),
                description: "production".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(id.as_str(), "new-tag");
    }

    #[tokio::test]
    async fn test_create_tag_rejects_empty_label() {
        let (_server, client) = client_with_version("4.2.0").await;
        let err = client
            .create_tag(&TagData {
                label: String::new(),
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_update_tag() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("PUT"))
            .and(path("/api/design/tags/t1"))
            .and(body_json(json!({"label": "prod", "description": "production racks"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let data = TagData {
            label: "prod".to_string(),
            description: "production racks".to_string(),
        };
        client.update_tag(&ObjectId::from("t1"), &data).await.unwrap();
    }
}
