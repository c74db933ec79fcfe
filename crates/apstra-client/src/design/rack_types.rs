//! Rack types (`/api/design/rack-types`)
//!
//! On the wire, leaf switches, access switches and generic systems refer to
//! their logical device by id, and the rack type carries a copy of every
//! referenced logical device in `logical_devices`. Polishing resolves those
//! references so each element holds its logical device directly.

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::design::logical_devices::{LogicalDevice, RawLogicalDevice, RawPortSpeed, PortSpeed};
use crate::design::tags::TagData;
use crate::error::ApstraError;
use crate::polish::{Polish, parse_optional_timestamp, unknown_value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const RACK_TYPES_PATH: &str = "/api/design/rack-types";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricConnectivityDesign {
    L3Clos,
    L3Collapsed,
}

impl FabricConnectivityDesign {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L3Clos => "l3clos",
            Self::L3Collapsed => "l3collapsed",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "l3clos" => Ok(Self::L3Clos),
            "l3collapsed" => Ok(Self::L3Collapsed),
            other => Err(unknown_value("fabric connectivity design", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRedundancyProtocol {
    Esi,
    Mlag,
}

impl LeafRedundancyProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esi => "esi",
            Self::Mlag => "mlag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRedundancyProtocol {
    Esi,
}

impl AccessRedundancyProtocol {
    pub fn as_str(self) -> &'static str {
        "esi"
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "esi" => Ok(Self::Esi),
            other => Err(unknown_value("access redundancy protocol", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    Single,
    Dual,
}

impl AttachmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "singleAttached",
            Self::Dual => "dualAttached",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "singleAttached" => Ok(Self::Single),
            "dualAttached" => Ok(Self::Dual),
            other => Err(unknown_value("attachment type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagMode {
    LacpActive,
    LacpPassive,
    StaticLag,
}

impl LagMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LacpActive => "lacp_active",
            Self::LacpPassive => "lacp_passive",
            Self::StaticLag => "static_lag",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "lacp_active" => Ok(Self::LacpActive),
            "lacp_passive" => Ok(Self::LacpPassive),
            "static_lag" => Ok(Self::StaticLag),
            other => Err(unknown_value("lag mode", other)),
        }
    }
}

/// Link from a rack element up to a switch in the same rack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRackLink {
    pub label: String,
    pub target_switch_label: String,
    pub link_per_switch_count: u32,
    pub link_speed: RawPortSpeed,
    pub attachment_type: String,
    #[serde(default)]
    pub lag_mode: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RackLink {
    pub label: String,
    pub target_switch_label: String,
    pub link_per_switch_count: u32,
    pub link_speed: PortSpeed,
    pub attachment_type: AttachmentType,
    pub lag_mode: Option<LagMode>,
    pub tags: Vec<String>,
}

impl Polish for RawRackLink {
    type Polished = RackLink;

    fn polish(self) -> Result<RackLink, ApstraError> {
        Ok(RackLink {
            link_speed: self.link_speed.polish()?,
            label: self.label,
            target_switch_label: self.target_switch_label,
            link_per_switch_count: self.link_per_switch_count,
            attachment_type: AttachmentType::parse(&self.attachment_type)?,
            lag_mode: self.lag_mode.as_deref().map(LagMode::parse).transpose()?,
            tags: self.tags,
        })
    }
}

impl TryFrom<&RackLink> for RawRackLink {
    type Error = ApstraError;

    fn try_from(link: &RackLink) -> Result<Self, Self::Error> {
        Ok(Self {
            label: link.label.clone(),
            target_switch_label: link.target_switch_label.clone(),
            link_per_switch_count: link.link_per_switch_count,
            link_speed: link.link_speed.try_into()?,
            attachment_type: link.attachment_type.as_str().to_string(),
            lag_mode: link.lag_mode.map(|m| m.as_str().to_string()),
            tags: link.tags.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLeafSwitch {
    pub label: String,
    pub logical_device: ObjectId,
    #[serde(default)]
    pub link_per_spine_count: Option<u32>,
    #[serde(default)]
    pub link_per_spine_speed: Option<RawPortSpeed>,
    #[serde(default)]
    pub redundancy_protocol: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAccessSwitch {
    pub label: String,
    pub logical_device: ObjectId,
    pub instance_count: u32,
    #[serde(default)]
    pub redundancy_protocol: Option<String>,
    #[serde(default)]
    pub links: Vec<RawRackLink>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGenericSystem {
    pub label: String,
    pub logical_device: ObjectId,
    pub count: u32,
    #[serde(default)]
    pub links: Vec<RawRackLink>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Rack type as sent by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRackType {
    pub id: ObjectId,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub fabric_connectivity_design: String,
    #[serde(default)]
    pub tags: Vec<TagData>,
    #[serde(default)]
    pub logical_devices: Vec<RawLogicalDevice>,
    #[serde(default)]
    pub leafs: Vec<RawLeafSwitch>,
    #[serde(default)]
    pub access_switches: Vec<RawAccessSwitch>,
    #[serde(default)]
    pub generic_systems: Vec<RawGenericSystem>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafSwitch {
    pub label: String,
    pub logical_device: LogicalDevice,
    pub link_per_spine_count: Option<u32>,
    pub link_per_spine_speed: Option<PortSpeed>,
    pub redundancy_protocol: Option<LeafRedundancyProtocol>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessSwitch {
    pub label: String,
    pub logical_device: LogicalDevice,
    pub instance_count: u32,
    pub redundancy_protocol: Option<AccessRedundancyProtocol>,
    pub links: Vec<RackLink>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericSystem {
    pub label: String,
    pub logical_device: LogicalDevice,
    pub count: u32,
    pub links: Vec<RackLink>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RackTypeData {
    pub display_name: String,
    pub description: String,
    pub fabric_connectivity_design: FabricConnectivityDesign,
    pub tags: Vec<TagData>,
    pub leaf_switches: Vec<LeafSwitch>,
    pub access_switches: Vec<AccessSwitch>,
    pub generic_systems: Vec<GenericSystem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RackType {
    pub id: ObjectId,
    pub data: RackTypeData,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl RackType {
    /// Number of leaf switches one rack of this type contributes
    pub fn leaf_switch_count(&self) -> usize {
        self.data
            .leaf_switches
            .iter()
            .map(|l| if l.redundancy_protocol.is_some() { 2 } else { 1 })
            .sum()
    }
}

impl Polish for RawRackType {
    type Polished = RackType;

    fn polish(self) -> Result<RackType, ApstraError> {
        let rack_label = self.display_name.clone();
        let mut devices: BTreeMap<ObjectId, LogicalDevice> = BTreeMap::new();
        for raw in self.logical_devices {
            let ld = raw.polish()?;
            devices.insert(ld.id.clone(), ld);
        }

        let resolve = |element: &str, id: &ObjectId| -> Result<LogicalDevice, ApstraError> {
            devices.get(id).cloned().ok_or_else(|| {
                ApstraError::Polish(format!(
                    "rack type '{}' element '{}' references logical device '{}' which is not embedded",
                    rack_label, element, id
                ))
            })
        };

        let leaf_switches = self
            .leafs
            .into_iter()
            .map(|l| {
                Ok(LeafSwitch {
                    logical_device: resolve(&l.label, &l.logical_device)?,
                    link_per_spine_speed: l.link_per_spine_speed.polish()?,
                    label: l.label,
                    link_per_spine_count: l.link_per_spine_count,
                    redundancy_protocol: parse_leaf_redundancy_protocol(
                        l.redundancy_protocol.as_deref().unwrap_or_default(),
                    )?,
                    tags: l.tags,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        let access_switches = self
            .access_switches
            .into_iter()
            .map(|a| {
                Ok(AccessSwitch {
                    logical_device: resolve(&a.label, &a.logical_device)?,
                    links: a.links.polish()?,
                    label: a.label,
                    instance_count: a.instance_count,
                    redundancy_protocol: a
                        .redundancy_protocol
                        .as_deref()
                        .map(AccessRedundancyProtocol::parse)
                        .transpose()?,
                    tags: a.tags,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        let generic_systems = self
            .generic_systems
            .into_iter()
            .map(|g| {
                Ok(GenericSystem {
                    logical_device: resolve(&g.label, &g.logical_device)?,
                    links: g.links.polish()?,
                    label: g.label,
                    count: g.count,
                    tags: g.tags,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        let fabric_connectivity_design = FabricConnectivityDesign::parse(&self.fabric_connectivity_design)?;
        Ok(RackType {
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            data: RackTypeData {
                display_name: self.display_name,
                description: self.description,
                fabric_connectivity_design,
                tags: self.tags,
                leaf_switches,
                access_switches,
                generic_systems,
            },
        })
    }
}

impl Labeled for RackType {
    fn label(&self) -> &str {
        &self.data.display_name
    }
}

/// Leaf switch in a create request; the logical device is referenced from the design catalog
#[derive(Debug, Clone)]
pub struct LeafSwitchRequest {
    pub label: String,
    pub logical_device_id: ObjectId,
    pub link_per_spine_count: Option<u32>,
    pub link_per_spine_speed: Option<PortSpeed>,
    pub redundancy_protocol: Option<LeafRedundancyProtocol>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AccessSwitchRequest {
    pub label: String,
    pub logical_device_id: ObjectId,
    pub instance_count: u32,
    pub redundancy_protocol: Option<AccessRedundancyProtocol>,
    pub links: Vec<RackLink>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GenericSystemRequest {
    pub label: String,
    pub logical_device_id: ObjectId,
    pub count: u32,
    pub links: Vec<RackLink>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RackTypeRequest {
    pub display_name: String,
    pub description: String,
    pub fabric_connectivity_design: FabricConnectivityDesign,
    pub tags: Vec<TagData>,
    pub leaf_switches: Vec<LeafSwitchRequest>,
    pub access_switches: Vec<AccessSwitchRequest>,
    pub generic_systems: Vec<GenericSystemRequest>,
}

#[derive(Debug, Serialize)]
struct RawRackTypeRequest {
    display_name: String,
    description: String,
    fabric_connectivity_design: &'static str,
    tags: Vec<TagData>,
    logical_devices: Vec<serde_json::Value>,
    leafs: Vec<RawLeafSwitch>,
    access_switches: Vec<RawAccessSwitch>,
    generic_systems: Vec<RawGenericSystem>,
}

impl RackTypeRequest {
    /// Every distinct logical device id the request refers to
    pub fn logical_device_ids(&self) -> BTreeSet<ObjectId> {
        self.leaf_switches
            .iter()
            .map(|l| l.logical_device_id.clone())
            .chain(self.access_switches.iter().map(|a| a.logical_device_id.clone()))
            .chain(self.generic_systems.iter().map(|g| g.logical_device_id.clone()))
            .collect()
    }

    fn validate(&self) -> Result<(), ApstraError> {
        if self.leaf_switches.is_empty() {
            return Err(ApstraError::InvalidRequest(format!(
                "rack type '{}' needs at least one leaf switch",
                self.display_name
            )));
        }

        let leaf_labels: BTreeSet<&str> = self.leaf_switches.iter().map(|l| l.label.as_str()).collect();
        let access_labels: BTreeSet<&str> = self.access_switches.iter().map(|a| a.label.as_str()).collect();
        let links = self
            .access_switches
            .iter()
            .flat_map(|a| a.links.iter())
            .chain(self.generic_systems.iter().flat_map(|g| g.links.iter()));
        for link in links {
            let target = link.target_switch_label.as_str();
            if !leaf_labels.contains(target) && !access_labels.contains(target) {
                return Err(ApstraError::InvalidRequest(format!(
                    "link '{}' targets unknown switch '{}'",
                    link.label, target
                )));
            }
        }
        Ok(())
    }

    fn raw(&self, logical_devices: Vec<serde_json::Value>) -> Result<RawRackTypeRequest, ApstraError> {
        let leafs = self
            .leaf_switches
            .iter()
            .map(|l| {
                Ok(RawLeafSwitch {
                    label: l.label.clone(),
                    logical_device: l.logical_device_id.clone(),
                    link_per_spine_count: l.link_per_spine_count,
                    link_per_spine_speed: l.link_per_spine_speed.map(RawPortSpeed::try_from).transpose()?,
                    redundancy_protocol: l.redundancy_protocol.map(|p| p.as_str().to_string()),
                    tags: l.tags.clone(),
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        let access_switches = self
            .access_switches
            .iter()
            .map(|a| {
                Ok(RawAccessSwitch {
                    label: a.label.clone(),
                    logical_device: a.logical_device_id.clone(),
                    instance_count: a.instance_count,
                    redundancy_protocol: a.redundancy_protocol.map(|p| p.as_str().to_string()),
                    links: raw_links(&a.links)?,
                    tags: a.tags.clone(),
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        let generic_systems = self
            .generic_systems
            .iter()
            .map(|g| {
                Ok(RawGenericSystem {
                    label: g.label.clone(),
                    logical_device: g.logical_device_id.clone(),
                    count: g.count,
                    links: raw_links(&g.links)?,
                    tags: g.tags.clone(),
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        Ok(RawRackTypeRequest {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            fabric_connectivity_design: self.fabric_connectivity_design.as_str(),
            tags: self.tags.clone(),
            logical_devices,
            leafs,
            access_switches,
            generic_systems,
        })
    }
}

fn raw_links(links: &[RackLink]) -> Result<Vec<RawRackLink>, ApstraError> {
    links.iter().map(RawRackLink::try_from).collect()
}

impl ApstraClient {
    pub async fn list_rack_types(&self) -> Result<Vec<RackType>, ApstraError> {
        list_polished::<RawRackType>(&self.http, RACK_TYPES_PATH).await
    }

    pub async fn get_rack_type(&self, id: &ObjectId) -> Result<RackType, ApstraError> {
        let raw: RawRackType = self.http.get(&format!("{}/{}", RACK_TYPES_PATH, id)).await?;
        raw.polish()
    }

    pub async fn get_rack_type_by_label(&self, label: &str) -> Result<RackType, ApstraError> {
        one_by_label(self.list_rack_types().await?, label, "rack type")
    }

    /// Create a rack type.
    ///
    /// Referenced logical devices are fetched from the design catalog and
    /// embedded into the request, as the controller expects.
    pub async fn create_rack_type(&self, request: &RackTypeRequest) -> Result<ObjectId, ApstraError> {
        request.validate()?;

        let mut embedded = Vec::new();
        for id in request.logical_device_ids() {
            debug!("Embedding logical device {} into rack type '{}'", id, request.display_name);
            let ld: serde_json::Value = self.http.get(&format!("/api/design/logical-devices/{}", id)).await?;
            embedded.push(ld);
        }

        let response: IdResponse = self.http.post(RACK_TYPES_PATH, &request.raw(embedded)?).await?;
        Ok(response.id)
    }

    pub async fn delete_rack_type(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", RACK_TYPES_PATH, id)).await
    }
}

/// Parse a redundancy protocol string as used in query results
pub fn parse_leaf_redundancy_protocol(s: &str) -> Result<Option<LeafRedundancyProtocol>, ApstraError> {
    match s {
        "" | "none" => Ok(None),
        "esi" => Ok(Some(LeafRedundancyProtocol::Esi)),
        "mlag" => Ok(Some(LeafRedundancyProtocol::Mlag)),
        other => Err(unknown_value("leaf redundancy protocol", other)),
    }
}
