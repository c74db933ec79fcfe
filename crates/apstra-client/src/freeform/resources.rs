//! Freeform resources (`/api/blueprints/{id}/resources`)
//!
//! On the wire a resource carries its kind in `type` and its value in one of
//! `integer_value`, `ipv4_value` or `ipv6_value`. The polished form folds
//! kind and value together into [`ResourceValue`].

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::freeform::freeform_path;
use crate::polish::{Polish, Rawify, unknown_value};
use crate::version::FREEFORM;
use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

const COLLECTION: &str = "resources";

pub const ASN_RANGE: RangeInclusive<u32> = 1..=4_294_967_295;
pub const VLAN_RANGE: RangeInclusive<u32> = 1..=4094;
pub const VNI_RANGE: RangeInclusive<u32> = 4096..=16_777_214;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Asn,
    Vni,
    Vlan,
    Integer,
    Ipv4,
    Ipv6,
    HostIpv4,
    HostIpv6,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asn => "asn",
            Self::Vni => "vni",
            Self::Vlan => "vlan",
            Self::Integer => "integer",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::HostIpv4 => "host_ipv4",
            Self::HostIpv6 => "host_ipv6",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApstraError> {
        Ok(match s {
            "asn" => Self::Asn,
            "vni" => Self::Vni,
            "vlan" => Self::Vlan,
            "integer" => Self::Integer,
            "ipv4" => Self::Ipv4,
            "ipv6" => Self::Ipv6,
            "host_ipv4" => Self::HostIpv4,
            "host_ipv6" => Self::HostIpv6,
            other => return Err(unknown_value("resource type", other)),
        })
    }

    fn wire_field(&self) -> &'static str {
        match self {
            Self::Asn | Self::Vni | Self::Vlan | Self::Integer => "integer_value",
            Self::Ipv4 | Self::HostIpv4 => "ipv4_value",
            Self::Ipv6 | Self::HostIpv6 => "ipv6_value",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed resource value.
///
/// `Ipv4`/`Ipv6` are subnets and must not have host bits set. The host
/// variants are interface addresses and keep their prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceValue {
    Asn(u32),
    Vni(u32),
    Vlan(u16),
    Integer(u32),
    Ipv4(Ipv4Net),
    Ipv6(Ipv6Net),
    HostIpv4(Ipv4Net),
    HostIpv6(Ipv6Net),
}

fn check_range(kind: ResourceType, value: u32, range: &RangeInclusive<u32>) -> Result<u32, String> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} {} outside {}-{}", kind, value, range.start(), range.end()))
    }
}

impl ResourceValue {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Asn(_) => ResourceType::Asn,
            Self::Vni(_) => ResourceType::Vni,
            Self::Vlan(_) => ResourceType::Vlan,
            Self::Integer(_) => ResourceType::Integer,
            Self::Ipv4(_) => ResourceType::Ipv4,
            Self::Ipv6(_) => ResourceType::Ipv6,
            Self::HostIpv4(_) => ResourceType::HostIpv4,
            Self::HostIpv6(_) => ResourceType::HostIpv6,
        }
    }

    /// Build an integer-kind value, enforcing the kind's range
    pub fn from_integer(kind: ResourceType, value: u32) -> Result<Self, String> {
        match kind {
            ResourceType::Asn => check_range(kind, value, &ASN_RANGE).map(Self::Asn),
            ResourceType::Vni => check_range(kind, value, &VNI_RANGE).map(Self::Vni),
            ResourceType::Vlan => check_range(kind, value, &VLAN_RANGE).map(|v| Self::Vlan(v as u16)),
            ResourceType::Integer => Ok(Self::Integer(value)),
            other => Err(format!("{} does not take an integer value", other)),
        }
    }

    /// Build an address-kind value from its CIDR text
    pub fn from_cidr(kind: ResourceType, value: &str) -> Result<Self, String> {
        let bad = |e: ipnet::AddrParseError| format!("{} value '{}': {}", kind, value, e);
        let subnet = |prefix: String| format!("{} value '{}' has host bits set (network is {})", kind, value, prefix);
        match kind {
            ResourceType::Ipv4 => {
                let net: Ipv4Net = value.parse().map_err(bad)?;
                if net.trunc() != net {
                    return Err(subnet(net.trunc().to_string()));
                }
                Ok(Self::Ipv4(net))
            }
            ResourceType::Ipv6 => {
                let net: Ipv6Net = value.parse().map_err(bad)?;
                if net.trunc() != net {
                    return Err(subnet(net.trunc().to_string()));
                }
                Ok(Self::Ipv6(net))
            }
            ResourceType::HostIpv4 => value.parse().map(Self::HostIpv4).map_err(bad),
            ResourceType::HostIpv6 => value.parse().map(Self::HostIpv6).map_err(bad),
            other => Err(format!("{} does not take an address value", other)),
        }
    }

    /// Range and subnet checks for values built directly
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Asn(v) | Self::Vni(v) | Self::Integer(v) => Self::from_integer(self.resource_type(), v).map(|_| ()),
            Self::Vlan(v) => Self::from_integer(ResourceType::Vlan, u32::from(v)).map(|_| ()),
            Self::Ipv4(net) => Self::from_cidr(ResourceType::Ipv4, &net.to_string()).map(|_| ()),
            Self::Ipv6(net) => Self::from_cidr(ResourceType::Ipv6, &net.to_string()).map(|_| ()),
            Self::HostIpv4(_) | Self::HostIpv6(_) => Ok(()),
        }
    }

    fn split(&self) -> (Option<u32>, Option<String>, Option<String>) {
        match *self {
            Self::Asn(v) | Self::Vni(v) | Self::Integer(v) => (Some(v), None, None),
            Self::Vlan(v) => (Some(u32::from(v)), None, None),
            Self::Ipv4(net) | Self::HostIpv4(net) => (None, Some(net.to_string()), None),
            Self::Ipv6(net) | Self::HostIpv6(net) => (None, None, Some(net.to_string())),
        }
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asn(v) | Self::Vni(v) | Self::Integer(v) => write!(f, "{}", v),
            Self::Vlan(v) => write!(f, "{}", v),
            Self::Ipv4(net) | Self::HostIpv4(net) => write!(f, "{}", net),
            Self::Ipv6(net) | Self::HostIpv6(net) => write!(f, "{}", net),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub label: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub group_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_from: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_prefix_len: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_id: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    pub label: String,
    pub group_id: ObjectId,
    pub resource_type: ResourceType,
    /// Absent when the controller is to allocate from `allocated_from`
    pub value: Option<ResourceValue>,
    pub allocated_from: Option<ObjectId>,
    pub subnet_prefix_len: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ObjectId,
    pub generator_id: Option<ObjectId>,
    pub data: ResourceData,
}

impl Resource {
    pub fn value(&self) -> Option<ResourceValue> {
        self.data.value
    }
}

impl Polish for RawResource {
    type Polished = Resource;

    fn polish(self) -> Result<Resource, ApstraError> {
        let id = self
            .id
            .ok_or_else(|| ApstraError::Polish(format!("resource '{}' has no id", self.label)))?;
        let kind = ResourceType::parse(&self.resource_type)?;
        let fail = |msg: String| ApstraError::Polish(format!("resource '{}': {}", self.label, msg));

        let present: Vec<&str> = [
            self.integer_value.map(|_| "integer_value"),
            self.ipv4_value.as_ref().map(|_| "ipv4_value"),
            self.ipv6_value.as_ref().map(|_| "ipv6_value"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if present.len() > 1 || present.first().is_some_and(|f| *f != kind.wire_field()) {
            return Err(fail(format!(
                "type {} expects only {}, got {}",
                kind,
                kind.wire_field(),
                present.join(", ")
            )));
        }

        let value = match (self.integer_value, &self.ipv4_value, &self.ipv6_value) {
            (Some(n), _, _) => Some(ResourceValue::from_integer(kind, n).map_err(fail)?),
            (_, Some(v4), _) => Some(ResourceValue::from_cidr(kind, v4).map_err(fail)?),
            (_, _, Some(v6)) => Some(ResourceValue::from_cidr(kind, v6).map_err(fail)?),
            (None, None, None) => None,
        };

        Ok(Resource {
            id,
            generator_id: self.generator_id,
            data: ResourceData {
                label: self.label,
                group_id: self.group_id,
                resource_type: kind,
                value,
                allocated_from: self.allocated_from,
                subnet_prefix_len: self.subnet_prefix_len,
            },
        })
    }
}

impl Rawify for ResourceData {
    type Raw = RawResource;

    fn raw(&self) -> Result<RawResource, ApstraError> {
        let invalid = |msg: String| ApstraError::InvalidRequest(format!("resource '{}': {}", self.label, msg));

        if self.label.is_empty() {
            return Err(ApstraError::InvalidRequest("resource label must not be empty".to_string()));
        }
        match (&self.value, &self.allocated_from) {
            (None, None) => return Err(invalid("needs either a value or allocated_from".to_string())),
            (Some(value), _) => {
                if value.resource_type() != self.resource_type {
                    return Err(invalid(format!(
                        "value {} is a {}, resource type is {}",
                        value,
                        value.resource_type(),
                        self.resource_type
                    )));
                }
                value.validate().map_err(invalid)?;
            }
            (None, Some(_)) => {}
        }
        if self.subnet_prefix_len.is_some()
            && !matches!(self.resource_type, ResourceType::Ipv4 | ResourceType::Ipv6)
        {
            return Err(invalid("subnet_prefix_len applies to ipv4/ipv6 resources only".to_string()));
        }

        let (integer_value, ipv4_value, ipv6_value) = self.value.map(|v| v.split()).unwrap_or_default();
        Ok(RawResource {
            id: None,
            label: self.label.clone(),
            resource_type: self.resource_type.as_str().to_string(),
            group_id: self.group_id.clone(),
            integer_value,
            ipv4_value,
            ipv6_value,
            allocated_from: self.allocated_from.clone(),
            subnet_prefix_len: self.subnet_prefix_len,
            generator_id: None,
        })
    }
}

impl Labeled for Resource {
    fn label(&self) -> &str {
        &self.data.label
    }
}

impl ApstraClient {
    pub async fn list_resources(&self, blueprint_id: &ObjectId) -> Result<Vec<Resource>, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        list_polished::<RawResource>(&self.http, &freeform_path(blueprint_id, COLLECTION, None)).await
    }

    pub async fn get_resource(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<Resource, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        let raw: RawResource = self.http.get(&freeform_path(blueprint_id, COLLECTION, Some(id))).await?;
        raw.polish()
    }

    pub async fn get_resource_by_label(&self, blueprint_id: &ObjectId, label: &str) -> Result<Resource, ApstraError> {
        one_by_label(self.list_resources(blueprint_id).await?, label, "resource")
    }

    pub async fn create_resource(&self, blueprint_id: &ObjectId, data: &ResourceData) -> Result<ObjectId, ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        let response: IdResponse = self
            .http
            .post(&freeform_path(blueprint_id, COLLECTION, None), &data.raw()?)
            .await?;
        Ok(response.id)
    }

    pub async fn update_resource(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
        data: &ResourceData,
    ) -> Result<(), ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        self.http
            .put(&freeform_path(blueprint_id, COLLECTION, Some(id)), &data.raw()?)
            .await
    }

    pub async fn delete_resource(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.ensure_feature(&FREEFORM).await?;
        self.http.delete(&freeform_path(blueprint_id, COLLECTION, Some(id))).await
    }
}
