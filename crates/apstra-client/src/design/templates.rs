//! Templates (`/api/design/templates`)
//!
//! The collection is polymorphic: each item's `type` field says whether it is
//! a rack-based, pod-based or collapsed-L3 template, and the remaining fields
//! differ per type. Raw items are decoded in two steps (type first, body
//! second) so an unknown type surfaces as a polish error rather than a
//! deserialization failure of the whole list.

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_items, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::design::logical_devices::{LogicalDevice, PortSpeed, RawLogicalDevice, RawPortSpeed};
use crate::design::rack_types::{RackType, RawRackType};
use crate::error::ApstraError;
use crate::polish::{Polish, parse_optional_timestamp, unknown_value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TEMPLATES_PATH: &str = "/api/design/templates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    RackBased,
    PodBased,
    L3Collapsed,
}

impl TemplateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RackBased => "rack_based",
            Self::PodBased => "pod_based",
            Self::L3Collapsed => "l3_collapsed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsnAllocationScheme {
    Distinct,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayControlProtocol {
    Evpn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAffinityMode {
    Disabled,
    EnabledLoose,
    EnabledStrict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiAffinityPolicy {
    pub algorithm: String,
    pub max_links_per_port: u32,
    pub max_links_per_slot: u32,
    pub max_per_system_links_per_port: u32,
    pub max_per_system_links_per_slot: u32,
    pub mode: AntiAffinityMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpServiceIntent {
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnAllocationPolicy {
    pub spine_asn_scheme: AsnAllocationScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkPolicy {
    #[serde(default)]
    pub overlay_control_protocol: Option<OverlayControlProtocol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackTypeCount {
    pub rack_type_id: ObjectId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackBasedTemplateCount {
    pub rack_based_template_id: ObjectId,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSpine {
    pub count: u32,
    #[serde(default)]
    pub link_per_superspine_count: u32,
    #[serde(default)]
    pub link_per_superspine_speed: Option<RawPortSpeed>,
    pub logical_device: RawLogicalDevice,
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSuperspine {
    pub plane_count: u32,
    pub superspine_per_plane: u32,
    pub logical_device: RawLogicalDevice,
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRackBasedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub spine: RawSpine,
    #[serde(default)]
    pub rack_types: Vec<RawRackType>,
    #[serde(default)]
    pub rack_type_counts: Vec<RackTypeCount>,
    #[serde(default)]
    pub dhcp_service_intent: Option<DhcpServiceIntent>,
    #[serde(default)]
    pub asn_allocation_policy: Option<AsnAllocationPolicy>,
    #[serde(default)]
    pub virtual_network_policy: Option<VirtualNetworkPolicy>,
    #[serde(default)]
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPodBasedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub superspine: RawSuperspine,
    #[serde(default)]
    pub rack_based_templates: Vec<RawRackBasedTemplate>,
    #[serde(default)]
    pub rack_based_template_counts: Vec<RackBasedTemplateCount>,
    #[serde(default)]
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawL3CollapsedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub mesh_link_count: u32,
    pub mesh_link_speed: RawPortSpeed,
    #[serde(default)]
    pub rack_types: Vec<RawRackType>,
    #[serde(default)]
    pub rack_type_counts: Vec<RackTypeCount>,
    #[serde(default)]
    pub dhcp_service_intent: Option<DhcpServiceIntent>,
    #[serde(default)]
    pub virtual_network_policy: Option<VirtualNetworkPolicy>,
    #[serde(default)]
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

/// Template as listed by the controller: the type tag plus an undecoded body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTemplate {
    #[serde(rename = "type")]
    pub template_type: String,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spine {
    pub count: u32,
    pub link_per_superspine_count: u32,
    pub link_per_superspine_speed: Option<PortSpeed>,
    pub logical_device: LogicalDevice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Superspine {
    pub plane_count: u32,
    pub superspine_per_plane: u32,
    pub logical_device: LogicalDevice,
}

/// A rack type used by a template, and how many racks of it
#[derive(Debug, Clone, PartialEq)]
pub struct RackInfo {
    pub count: u32,
    pub rack_type: RackType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RackBasedTemplateInfo {
    pub count: u32,
    pub template: RackBasedTemplate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RackBasedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub spine: Spine,
    pub rack_infos: BTreeMap<ObjectId, RackInfo>,
    pub dhcp_service_intent: bool,
    pub asn_allocation_scheme: Option<AsnAllocationScheme>,
    pub overlay_control_protocol: Option<OverlayControlProtocol>,
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodBasedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub superspine: Superspine,
    pub rack_based_template_infos: BTreeMap<ObjectId, RackBasedTemplateInfo>,
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct L3CollapsedTemplate {
    pub id: ObjectId,
    pub display_name: String,
    pub mesh_link_count: u32,
    pub mesh_link_speed: PortSpeed,
    pub rack_infos: BTreeMap<ObjectId, RackInfo>,
    pub dhcp_service_intent: bool,
    pub overlay_control_protocol: Option<OverlayControlProtocol>,
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    RackBased(RackBasedTemplate),
    PodBased(PodBasedTemplate),
    L3Collapsed(L3CollapsedTemplate),
}

impl Template {
    pub fn id(&self) -> &ObjectId {
        match self {
            Self::RackBased(t) => &t.id,
            Self::PodBased(t) => &t.id,
            Self::L3Collapsed(t) => &t.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::RackBased(t) => &t.display_name,
            Self::PodBased(t) => &t.display_name,
            Self::L3Collapsed(t) => &t.display_name,
        }
    }

    pub fn template_type(&self) -> TemplateType {
        match self {
            Self::RackBased(_) => TemplateType::RackBased,
            Self::PodBased(_) => TemplateType::PodBased,
            Self::L3Collapsed(_) => TemplateType::L3Collapsed,
        }
    }
}

impl Labeled for Template {
    fn label(&self) -> &str {
        self.display_name()
    }
}

/// Join `counts` with the embedded rack types they refer to
fn join_rack_infos(
    template: &str,
    rack_types: Vec<RawRackType>,
    counts: Vec<RackTypeCount>,
) -> Result<BTreeMap<ObjectId, RackInfo>, ApstraError> {
    let mut by_id: BTreeMap<ObjectId, RackType> = BTreeMap::new();
    for raw in rack_types {
        let rack_type = raw.polish()?;
        by_id.insert(rack_type.id.clone(), rack_type);
    }

    counts
        .into_iter()
        .map(|c| {
            let rack_type = by_id.remove(&c.rack_type_id).ok_or_else(|| {
                ApstraError::Polish(format!(
                    "template '{}' counts rack type '{}' which is not embedded",
                    template, c.rack_type_id
                ))
            })?;
            Ok((c.rack_type_id, RackInfo { count: c.count, rack_type }))
        })
        .collect()
}

impl Polish for RawRackBasedTemplate {
    type Polished = RackBasedTemplate;

    fn polish(self) -> Result<RackBasedTemplate, ApstraError> {
        let rack_infos = join_rack_infos(&self.display_name, self.rack_types, self.rack_type_counts)?;
        Ok(RackBasedTemplate {
            spine: Spine {
                count: self.spine.count,
                link_per_superspine_count: self.spine.link_per_superspine_count,
                link_per_superspine_speed: self.spine.link_per_superspine_speed.polish()?,
                logical_device: self.spine.logical_device.polish()?,
            },
            rack_infos,
            dhcp_service_intent: self.dhcp_service_intent.is_some_and(|d| d.active),
            asn_allocation_scheme: self.asn_allocation_policy.map(|p| p.spine_asn_scheme),
            overlay_control_protocol: self.virtual_network_policy.and_then(|p| p.overlay_control_protocol),
            anti_affinity_policy: self.anti_affinity_policy,
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            display_name: self.display_name,
        })
    }
}

impl Polish for RawPodBasedTemplate {
    type Polished = PodBasedTemplate;

    fn polish(self) -> Result<PodBasedTemplate, ApstraError> {
        let mut by_id: BTreeMap<ObjectId, RackBasedTemplate> = BTreeMap::new();
        for raw in self.rack_based_templates {
            let template = raw.polish()?;
            by_id.insert(template.id.clone(), template);
        }

        let rack_based_template_infos = self
            .rack_based_template_counts
            .into_iter()
            .map(|c| {
                let template = by_id.remove(&c.rack_based_template_id).ok_or_else(|| {
                    ApstraError::Polish(format!(
                        "pod-based template '{}' counts rack-based template '{}' which is not embedded",
                        self.display_name, c.rack_based_template_id
                    ))
                })?;
                Ok((c.rack_based_template_id, RackBasedTemplateInfo { count: c.count, template }))
            })
            .collect::<Result<BTreeMap<_, _>, ApstraError>>()?;

        Ok(PodBasedTemplate {
            superspine: Superspine {
                plane_count: self.superspine.plane_count,
                superspine_per_plane: self.superspine.superspine_per_plane,
                logical_device: self.superspine.logical_device.polish()?,
            },
            rack_based_template_infos,
            anti_affinity_policy: self.anti_affinity_policy,
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            display_name: self.display_name,
        })
    }
}

impl Polish for RawL3CollapsedTemplate {
    type Polished = L3CollapsedTemplate;

    fn polish(self) -> Result<L3CollapsedTemplate, ApstraError> {
        let rack_infos = join_rack_infos(&self.display_name, self.rack_types, self.rack_type_counts)?;
        Ok(L3CollapsedTemplate {
            mesh_link_count: self.mesh_link_count,
            mesh_link_speed: self.mesh_link_speed.polish()?,
            rack_infos,
            dhcp_service_intent: self.dhcp_service_intent.is_some_and(|d| d.active),
            overlay_control_protocol: self.virtual_network_policy.and_then(|p| p.overlay_control_protocol),
            anti_affinity_policy: self.anti_affinity_policy,
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            display_name: self.display_name,
        })
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(
    template_type: &str,
    body: serde_json::Map<String, serde_json::Value>,
) -> Result<T, ApstraError> {
    serde_json::from_value(serde_json::Value::Object(body))
        .map_err(|e| ApstraError::Polish(format!("malformed {} template: {}", template_type, e)))
}

impl Polish for RawTemplate {
    type Polished = Template;

    fn polish(self) -> Result<Template, ApstraError> {
        match self.template_type.as_str() {
            "rack_based" => Ok(Template::RackBased(
                decode_body::<RawRackBasedTemplate>(&self.template_type, self.body)?.polish()?,
            )),
            "pod_based" => Ok(Template::PodBased(
                decode_body::<RawPodBasedTemplate>(&self.template_type, self.body)?.polish()?,
            )),
            "l3_collapsed" => Ok(Template::L3Collapsed(
                decode_body::<RawL3CollapsedTemplate>(&self.template_type, self.body)?.polish()?,
            )),
            other => Err(unknown_value("template type", other)),
        }
    }
}

/// Spine section of a create request
#[derive(Debug, Clone)]
pub struct SpineRequest {
    pub count: u32,
    pub logical_device_id: ObjectId,
    pub link_per_superspine_count: u32,
    pub link_per_superspine_speed: Option<PortSpeed>,
}

#[derive(Debug, Clone)]
pub struct RackBasedTemplateRequest {
    pub display_name: String,
    pub spine: SpineRequest,
    /// Rack type id to number of racks
    pub rack_infos: BTreeMap<ObjectId, u32>,
    pub dhcp_service_intent: bool,
    pub asn_allocation_scheme: AsnAllocationScheme,
    pub overlay_control_protocol: Option<OverlayControlProtocol>,
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
}

#[derive(Debug, Clone)]
pub struct L3CollapsedTemplateRequest {
    pub display_name: String,
    pub mesh_link_count: u32,
    pub mesh_link_speed: PortSpeed,
    pub rack_infos: BTreeMap<ObjectId, u32>,
    pub dhcp_service_intent: bool,
    pub overlay_control_protocol: Option<OverlayControlProtocol>,
    pub anti_affinity_policy: Option<AntiAffinityPolicy>,
}

fn rack_type_counts(rack_infos: &BTreeMap<ObjectId, u32>) -> Vec<RackTypeCount> {
    rack_infos
        .iter()
        .map(|(id, count)| RackTypeCount {
            rack_type_id: id.clone(),
            count: *count,
        })
        .collect()
}

impl ApstraClient {
    pub async fn list_templates(&self) -> Result<Vec<Template>, ApstraError> {
        let raw: Vec<RawTemplate> = list_items(&self.http, TEMPLATES_PATH).await?;
        raw.polish()
    }

    pub async fn get_template(&self, id: &ObjectId) -> Result<Template, ApstraError> {
        let raw: RawTemplate = self.http.get(&format!("{}/{}", TEMPLATES_PATH, id)).await?;
        raw.polish()
    }

    pub async fn get_template_by_label(&self, label: &str) -> Result<Template, ApstraError> {
        one_by_label(self.list_templates().await?, label, "template")
    }

    /// Fetch a template that must be rack-based
    pub async fn get_rack_based_template(&self, id: &ObjectId) -> Result<RackBasedTemplate, ApstraError> {
        match self.get_template(id).await? {
            Template::RackBased(t) => Ok(t),
            other => Err(ApstraError::InvalidRequest(format!(
                "template '{}' is {}, not rack_based",
                id,
                other.template_type().as_str()
            ))),
        }
    }

    async fn embedded_rack_types(
        &self,
        rack_infos: &BTreeMap<ObjectId, u32>,
    ) -> Result<Vec<serde_json::Value>, ApstraError> {
        if rack_infos.is_empty() {
            return Err(ApstraError::InvalidRequest("template needs at least one rack type".to_string()));
        }
        let mut embedded = Vec::with_capacity(rack_infos.len());
        for id in rack_infos.keys() {
            let rack_type: serde_json::Value = self.http.get(&format!("/api/design/rack-types/{}", id)).await?;
            embedded.push(rack_type);
        }
        Ok(embedded)
    }

    pub async fn create_rack_based_template(
        &self,
        request: &RackBasedTemplateRequest,
    ) -> Result<ObjectId, ApstraError> {
        let rack_types = self.embedded_rack_types(&request.rack_infos).await?;
        let spine_ld: serde_json::Value = self
            .http
            .get(&format!("/api/design/logical-devices/{}", request.spine.logical_device_id))
            .await?;
        let dhcp = DhcpServiceIntent { active: request.dhcp_service_intent };
        let asn_policy = AsnAllocationPolicy { spine_asn_scheme: request.asn_allocation_scheme };
        let vn_policy = VirtualNetworkPolicy { overlay_control_protocol: request.overlay_control_protocol };
        let superspine_speed = request
            .spine
            .link_per_superspine_speed
            .map(RawPortSpeed::try_from)
            .transpose()?;

        let body = serde_json::json!({
            "type": TemplateType::RackBased.as_str(),
            "display_name": request.display_name,
            "spine": {
                "count": request.spine.count,
                "link_per_superspine_count": request.spine.link_per_superspine_count,
                "link_per_superspine_speed": superspine_speed,
                "logical_device": spine_ld,
                "tags": [],
            },
            "rack_types": rack_types,
            "rack_type_counts": rack_type_counts(&request.rack_infos),
            "dhcp_service_intent": dhcp,
            "asn_allocation_policy": asn_policy,
            "virtual_network_policy": vn_policy,
            "anti_affinity_policy": request.anti_affinity_policy,
        });

        let response: IdResponse = self.http.post(TEMPLATES_PATH, &body).await?;
        Ok(response.id)
    }

    pub async fn create_l3_collapsed_template(
        &self,
        request: &L3CollapsedTemplateRequest,
    ) -> Result<ObjectId, ApstraError> {
        let rack_types = self.embedded_rack_types(&request.rack_infos).await?;
        let dhcp = DhcpServiceIntent { active: request.dhcp_service_intent };
        let vn_policy = VirtualNetworkPolicy { overlay_control_protocol: request.overlay_control_protocol };
        let mesh_link_speed = RawPortSpeed::try_from(request.mesh_link_speed)?;

        let body = serde_json::json!({
            "type": TemplateType::L3Collapsed.as_str(),
            "display_name": request.display_name,
            "mesh_link_count": request.mesh_link_count,
            "mesh_link_speed": mesh_link_speed,
            "rack_types": rack_types,
            "rack_type_counts": rack_type_counts(&request.rack_infos),
            "dhcp_service_intent": dhcp,
            "virtual_network_policy": vn_policy,
            "anti_affinity_policy": request.anti_affinity_policy,
        });

        let response: IdResponse = self.http.post(TEMPLATES_PATH, &body).await?;
        Ok(response.id)
    }

    pub async fn delete_template(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", TEMPLATES_PATH, id)).await
    }
}
