//! Freeform resource groups (`/api/blueprints/{id}/resource-groups`)

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::freeform::freeform_path;
use crate::polish::Polish;
use crate::version::FREEFORM;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const COLLECTION: &str = "resource-groups";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResourceGroup {
    pub id: ObjectId,
    pub label: String,
    #[serde(default)]
    pub parent_id: Option<ObjectId>,
    #[serde(default)]
    pub generator_id: Option<ObjectId>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Arbitrary user data; the controller stores a JSON object or nothing
    #[serde(default)]
    pub data: Value,
}

/// Create/update body
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ResourceGroupData {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ObjectId>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGroup {
    pub id: ObjectId,
    pub generator_id: Option<ObjectId>,
    pub data: ResourceGroupData,
}

impl Polish for RawResourceGroup {
    type Polished = ResourceGroup;

    fn polish(self) -> Result<ResourceGroup, ApstraError> {
        let data = match self.data {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            obj @ Value::Object(_) => Some(obj),
            other => {
                return Err(ApstraError::Polish(format!(
                    "resource group '{}' data is not an object: {}",
                    self.label, other
                )));
            }
        };
        Ok(ResourceGroup {
            id: self.id,
            generator_id: self.generator_id,
            data: ResourceGroupData {
                label: self.label,
                parent_id: self.parent_id,
                tags: self.tags,
                data,
            },
        })
    }
}

impl Labeled for ResourceGroup {
    fn label(&self) -> &str {
        &self.data.label
    }
}

impl ResourceGroupData {
    fn validate(&self) -> Result<(), ApstraError> {
        if self.label.is_empty() {
            return Err(ApstraError::InvalidRequest("resource group label must not be empty".to_string()));
        }
        if matches!(self.data, Some(ref d) if !d.is_object()) {
            return Err(ApstraError::InvalidRequest(format!(
                "resource group '{}' data must be a JSON object",
                self.label
            )));
        }
        Ok(())
    }
}

impl ApstraClient {
    pub async fn list_resource_groups(&self, blueprint_id: &ObjectId) -> Result<Vec<ResourceGroup>, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        list_polished::<RawResourceGroup>(&self.http, &freeform_path(blueprint_id, COLLECTION, None)).await
    }

    pub async fn get_resource_group(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<ResourceGroup, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        let raw: RawResourceGroup = self.http.get(&freeform_path(blueprint_id, COLLECTION, Some(id))).await?;
        raw.polish()
    }

    pub async fn get_resource_group_by_label(
        &self,
        blueprint_id: &ObjectId,
        label: &str,
    ) -> Result<ResourceGroup, ApstraError> {
        one_by_label(self.list_resource_groups(blueprint_id).await?, label, "resource group")
    }

    pub async fn create_resource_group(
        &self,
        blueprint_id: &ObjectId,
        data: &ResourceGroupData,
    ) -> Result<ObjectId, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        data.validate()?;
        let response: IdResponse = self.http.post(&freeform_path(blueprint_id, COLLECTION, None), data).await?;
        Ok(response.id)
    }

    pub async fn update_resource_group(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
        data: &ResourceGroupData,
    ) -> Result<(), ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        data.validate()?;
        self.http.put(&freeform_path(blueprint_id, COLLECTION, Some(id)), data).await
    }

    pub async fn delete_resource_group(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        self.http.delete(&freeform_path(blueprint_id, COLLECTION, Some(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with_version;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_polish_resource_group_data() {
        let raw: RawResourceGroup = serde_json::from_value(json!({
            "id": "rg1", "label": "loopbacks", "parent_id": null, "tags": ["a"], "data": {}
        }))
        .unwrap();
        assert_eq!(raw.polish().unwrap().data.data, None);

        let raw: RawResourceGroup = serde_json::from_value(json!({
            "id": "rg1", "label": "loopbacks", "data": [1, 2]
        }))
        .unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(_))));
    }

    #[tokio::test]
    async fn test_create_resource_group() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/ff1/resource-groups"))
            .and(body_json(json!({"label": "fabric", "parent_id": "rg0", "tags": [], "data": {"site": "east"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "rg-new"})))
            .mount(&server)
            .await;

        let data = ResourceGroupData {
            label: "fabric".to_string(),
            parent_id: Some(ObjectId::from("rg0")),
            tags: vec![],
            data: Some(json!({"site": "east"})),
        };
        let id = client.create_resource_group(&ObjectId::from("ff1"), &data).await.unwrap();
        assert_eq!(id.as_str(), "rg-new");
    }

    #[tokio::test]
    async fn test_get_resource_group_by_label() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/ff1/resource-groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "rg1", "label": "fabric", "tags": []},
                    {"id": "rg2", "label": "servers", "parent_id": "rg1", "tags": []}
                ]
            })))
            .mount(&server)
            .await;

        let group = client
            .get_resource_group_by_label(&ObjectId::from("ff1"), "servers")
            .await
            .unwrap();
        assert_eq!(group.data.parent_id, Some(ObjectId::from("rg1")));
    }

    #[tokio::test]
    async fn test_freeform_needs_4_2() {
        let (_server, client) = client_with_version("4.1.2").await;
        let err = client.list_resource_groups(&ObjectId::from("ff1")).await.unwrap_err();
        assert!(matches!(err, ApstraError::UnsupportedVersion(_)));
    }

    #[tokio::test]
    async fn test_update_resource_group() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("PUT"))
            .and(path("/api/blueprints/ff1/resource-groups/rg1"))
            .and(body_json(json!({"label": "fabric-east", "tags": ["east"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let data = ResourceGroupData {
            label: "fabric-east".to_string(),
            parent_id: None,
            tags: vec!["east".to_string()],
            data: None,
        };
        client
            .update_resource_group(&ObjectId::from("ff1"), &ObjectId::from("rg1"), &data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_needs_freeform_support() {
        let (_server, client) = client_with_version("4.1.2").await;
        let data = ResourceGroupData {
            label: "fabric".to_string(),
            ..Default::default()
        };
        let err = client
            .update_resource_group(&ObjectId::from("ff1"), &ObjectId::from("rg1"), &data)
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::UnsupportedVersion(_)));
    }
}
