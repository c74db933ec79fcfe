//! EVPN remote gateways (`/api/blueprints/{id}/remote_gateways`)

use crate::blueprint::blueprint_path;
use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, Rawify, unknown_value};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteGatewayRouteTypes {
    #[default]
    All,
    Type5Only,
}

impl RemoteGatewayRouteTypes {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Type5Only => "type5_only",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "all" => Ok(Self::All),
            "type5_only" => Ok(Self::Type5Only),
            other => Err(unknown_value("evpn route types", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLocalGatewayNode {
    pub node_id: ObjectId,
    #[serde(default)]
    pub label: Option<String>,
}

/// Remote gateway as returned by GET
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRemoteGateway {
    pub id: ObjectId,
    pub gw_name: String,
    pub gw_ip: String,
    pub gw_asn: u32,
    #[serde(default)]
    pub ttl: Option<u8>,
    #[serde(default)]
    pub keepalive_timer: Option<u16>,
    #[serde(default)]
    pub holdtime_timer: Option<u16>,
    #[serde(default)]
    pub evpn_route_types: Option<String>,
    #[serde(default)]
    pub local_gw_nodes: Vec<RawLocalGatewayNode>,
}

/// Remote gateway create/update body; local nodes go out as bare ids
#[derive(Clone, Serialize)]
pub struct RawRemoteGatewayRequest {
    pub gw_name: String,
    pub gw_ip: String,
    pub gw_asn: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_timer: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holdtime_timer: Option<u16>,
    pub evpn_route_types: &'static str,
    pub local_gw_nodes: Vec<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for RawRemoteGatewayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRemoteGatewayRequest")
            .field("gw_name", &self.gw_name)
            .field("gw_ip", &self.gw_ip)
            .field("gw_asn", &self.gw_asn)
            .field("ttl", &self.ttl)
            .field("keepalive_timer", &self.keepalive_timer)
            .field("holdtime_timer", &self.holdtime_timer)
            .field("evpn_route_types", &self.evpn_route_types)
            .field("local_gw_nodes", &self.local_gw_nodes)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteGatewayData {
    pub name: String,
    pub ip: IpAddr,
    pub asn: u32,
    pub ttl: Option<u8>,
    pub keepalive_timer: Option<u16>,
    pub holdtime_timer: Option<u16>,
    pub route_types: RemoteGatewayRouteTypes,
    pub local_gw_nodes: Vec<ObjectId>,
    /// BGP session password; write-only, never returned by the controller
    pub password: Option<String>,
}

impl std::fmt::Debug for RemoteGatewayData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGatewayData")
            .field("name", &self.name)
            .field("ip", &self.ip)
            .field("asn", &self.asn)
            .field("ttl", &self.ttl)
            .field("keepalive_timer", &self.keepalive_timer)
            .field("holdtime_timer", &self.holdtime_timer)
            .field("route_types", &self.route_types)
            .field("local_gw_nodes", &self.local_gw_nodes)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGateway {
    pub id: ObjectId,
    pub data: RemoteGatewayData,
}

impl Polish for RawRemoteGateway {
    type Polished = RemoteGateway;

    fn polish(self) -> Result<RemoteGateway, ApstraError> {
        let ip = self.gw_ip.parse::<IpAddr>().map_err(|e| {
            ApstraError::Polish(format!("remote gateway '{}' ip '{}': {}", self.gw_name, self.gw_ip, e))
        })?;
        let route_types = match self.evpn_route_types.as_deref() {
            Some(s) => RemoteGatewayRouteTypes::parse(s)?,
            None => RemoteGatewayRouteTypes::default(),
        };
        Ok(RemoteGateway {
            id: self.id,
            data: RemoteGatewayData {
                name: self.gw_name,
                ip,
                asn: self.gw_asn,
                ttl: self.ttl,
                keepalive_timer: self.keepalive_timer,
                holdtime_timer: self.holdtime_timer,
                route_types,
                local_gw_nodes: self.local_gw_nodes.into_iter().map(|n| n.node_id).collect(),
                password: None,
            },
        })
    }
}

impl Rawify for RemoteGatewayData {
    type Raw = RawRemoteGatewayRequest;

    fn raw(&self) -> Result<RawRemoteGatewayRequest, ApstraError> {
        if self.name.is_empty() {
            return Err(ApstraError::InvalidRequest("remote gateway name must not be empty".to_string()));
        }
        if self.local_gw_nodes.is_empty() {
            return Err(ApstraError::InvalidRequest(format!(
                "remote gateway '{}' needs at least one local gateway node",
                self.name
            )));
        }
        if let (Some(keepalive), Some(holdtime)) = (self.keepalive_timer, self.holdtime_timer) {
            if holdtime < keepalive.saturating_mul(3) {
                return Err(ApstraError::InvalidRequest(format!(
                    "remote gateway '{}': holdtime {} must be at least three times keepalive {}",
                    self.name, holdtime, keepalive
                )));
            }
        }

        Ok(RawRemoteGatewayRequest {
            gw_name: self.name.clone(),
            gw_ip: self.ip.to_string(),
            gw_asn: self.asn,
            ttl: self.ttl,
            keepalive_timer: self.keepalive_timer,
            holdtime_timer: self.holdtime_timer,
            evpn_route_types: self.route_types.as_str(),
            local_gw_nodes: self.local_gw_nodes.clone(),
            password: self.password.clone(),
        })
    }
}

impl Labeled for RemoteGateway {
    fn label(&self) -> &str {
        &self.data.name
    }
}

fn gateways_path(blueprint_id: &ObjectId) -> String {
    blueprint_path(blueprint_id, "/remote_gateways")
}

impl ApstraClient {
    pub async fn list_remote_gateways(&self, blueprint_id: &ObjectId) -> Result<Vec<RemoteGateway>, ApstraError> {
        list_polished::<RawRemoteGateway>(&self.http, &gateways_path(blueprint_id)).await
    }

    pub async fn get_remote_gateway(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<RemoteGateway, ApstraError> {
        let raw: RawRemoteGateway = self
            .http
            .get(&format!("{}/{}", gateways_path(blueprint_id), id))
            .await?;
        raw.polish()
    }

    pub async fn get_remote_gateway_by_name(
        &self,
        blueprint_id: &ObjectId,
        name: &str,
    ) -> Result<RemoteGateway, ApstraError> {
        one_by_label(self.list_remote_gateways(blueprint_id).await?, name, "remote gateway")
    }

    pub async fn create_remote_gateway(
        &self,
        blueprint_id: &ObjectId,
        data: &RemoteGatewayData,
    ) -> Result<ObjectId, ApstraError> {
        let response: IdResponse = self.http.post(&gateways_path(blueprint_id), &data.raw()?).await?;
        Ok(response.id)
    }

    pub async fn update_remote_gateway(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
        data: &RemoteGatewayData,
    ) -> Result<(), ApstraError> {
        self.http
            .put(&format!("{}/{}", gateways_path(blueprint_id), id), &data.raw()?)
            .await
    }

    pub async fn delete_remote_gateway(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.http
            .delete(&format!("{}/{}", gateways_path(blueprint_id), id))
            .await
    }
}
