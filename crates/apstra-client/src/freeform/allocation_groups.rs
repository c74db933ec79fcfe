//! Freeform allocation groups (`/api/blueprints/{id}/ra-groups`)
//!
//! An allocation group binds a resource type to global resource pools;
//! resources created with `allocated_from` draw their value from it.

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::freeform::freeform_path;
use crate::freeform::resources::ResourceType;
use crate::polish::{Polish, Rawify};
use crate::version::FREEFORM;
use serde::{Deserialize, Serialize};

const COLLECTION: &str = "ra-groups";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAllocationGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub pool_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationGroupData {
    pub name: String,
    pub resource_type: ResourceType,
    pub pool_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationGroup {
    pub id: ObjectId,
    pub data: AllocationGroupData,
}

impl Polish for RawAllocationGroup {
    type Polished = AllocationGroup;

    fn polish(self) -> Result<AllocationGroup, ApstraError> {
        let id = self
            .id
            .ok_or_else(|| ApstraError::Polish(format!("allocation group '{}' has no id", self.name)))?;
        Ok(AllocationGroup {
            id,
            data: AllocationGroupData {
                resource_type: ResourceType::parse(&self.resource_type)?,
                name: self.name,
                pool_ids: self.pool_ids,
            },
        })
    }
}

impl Rawify for AllocationGroupData {
    type Raw = RawAllocationGroup;

    fn raw(&self) -> Result<RawAllocationGroup, ApstraError> {
        if self.name.is_empty() {
            return Err(ApstraError::InvalidRequest("allocation group name must not be empty".to_string()));
        }
        if self.pool_ids.is_empty() {
            return Err(ApstraError::InvalidRequest(format!(
                "allocation group '{}' needs at least one pool",
                self.name
            )));
        }
        Ok(RawAllocationGroup {
            id: None,
            name: self.name.clone(),
            resource_type: self.resource_type.as_str().to_string(),
            pool_ids: self.pool_ids.clone(),
        })
    }
}

impl Labeled for AllocationGroup {
    fn label(&self) -> &str {
        &self.data.name
    }
}

impl ApstraClient {
    pub async fn list_allocation_groups(&self, blueprint_id: &ObjectId) -> Result<Vec<AllocationGroup>, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        list_polished::<RawAllocationGroup>(&self.http, &freeform_path(blueprint_id, COLLECTION, None)).await
    }

    pub async fn get_allocation_group(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<AllocationGroup, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        let raw: RawAllocationGroup = self.http.get(&freeform_path(blueprint_id, COLLECTION, Some(id))).await?;
        raw.polish()
    }

    pub async fn get_allocation_group_by_name(
        &self,
        blueprint_id: &ObjectId,
        name: &str,
    ) -> Result<AllocationGroup, ApstraError> {
        one_by_label(self.list_allocation_groups(blueprint_id).await?, name, "allocation group")
    }

    pub async fn create_allocation_group(
        &self,
        blueprint_id: &ObjectId,
        data: &AllocationGroupData,
    ) -> Result<ObjectId, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        let response: IdResponse = self
            .http
            .post(&freeform_path(blueprint_id, COLLECTION, None), &data.raw()?)
            .await?;
        Ok(response.id)
    }

    pub async fn delete_allocation_group(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
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

    #[tokio::test]
    async fn test_allocation_group_lifecycle() {
        let (server, client) = client_with_version("4.2.1").await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/ff1/ra-groups"))
            .and(body_json(json!({"name": "leaf-asns", "type": "asn", "pool_ids": ["Private-64512-65534"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "ag1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/ff1/ra-groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "ag1", "name": "leaf-asns", "type": "asn", "pool_ids": ["Private-64512-65534"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/blueprints/ff1/ra-groups/ag1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let bp = ObjectId::from("ff1");
        let data = AllocationGroupData {
            name: "leaf-asns".to_string(),
            resource_type: ResourceType::Asn,
            pool_ids: vec![ObjectId::from("Private-64512-65534")],
        };
        let id = client.create_allocation_group(&bp, &data).await.unwrap();

        let group = client.get_allocation_group_by_name(&bp, "leaf-asns").await.unwrap();
        assert_eq!(group.id, id);
        assert_eq!(group.data, data);

        client.delete_allocation_group(&bp, &id).await.unwrap();
    }

    #[test]
    fn test_rawify_needs_pools() {
        let data = AllocationGroupData {
            name: "vnis".to_string(),
            resource_type: ResourceType::Vni,
            pool_ids: vec![],
        };
        assert!(matches!(data.raw(), Err(ApstraError::InvalidRequest(_))));
    }

    #[test]
    fn test_polish_unknown_type() {
        let raw: RawAllocationGroup =
            serde_json::from_value(json!({"id": "ag1", "name": "x", "type": "mac", "pool_ids": []})).unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(_))));
    }
}
