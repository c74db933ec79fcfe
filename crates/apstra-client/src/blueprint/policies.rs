//! Security policies (`/api/blueprints/{id}/policies`)

use crate::blueprint::blueprint_path;
use crate::client::ApstraClient;
use crate::common::query::{Labeled, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, Rawify, unknown_value};
use crate::version::POLICY_RULE_TCP_STATE_QUALIFIER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ANY_PORT: &str = "any";

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { first: port, last: port }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

/// Set of port ranges; empty means any port
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortRanges(pub Vec<PortRange>);

impl PortRanges {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.is_any() || self.0.iter().any(|r| (r.first..=r.last).contains(&port))
    }
}

fn parse_port(s: &str) -> Result<u16, ApstraError> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ApstraError::Polish(format!("invalid port '{}'", s.trim()))),
        Ok(port) => Ok(port),
    }
}

impl FromStr for PortRanges {
    type Err = ApstraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(ANY_PORT) {
            return Ok(Self::any());
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let range = match part.split_once('-') {
                Some((first, last)) => PortRange {
                    first: parse_port(first)?,
                    last: parse_port(last)?,
                },
                None => PortRange::single(parse_port(part)?),
            };
            if range.first > range.last {
                return Err(ApstraError::Polish(format!("port range '{}' is reversed", part.trim())));
            }
            ranges.push(range);
        }
        Ok(Self(ranges))
    }
}

impl fmt::Display for PortRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str(ANY_PORT);
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRuleProtocol {
    Ip,
    Icmp,
    Tcp,
    Udp,
}

impl PolicyRuleProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Icmp => "ICMP",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }

    /// Only TCP and UDP rules carry ports
    pub fn has_ports(&self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

impl FromStr for PolicyRuleProtocol {
    type Err = ApstraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IP" => Ok(Self::Ip),
            "ICMP" => Ok(Self::Icmp),
            "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            _ => Err(unknown_value("policy rule protocol", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRuleAction {
    Deny,
    DenyLog,
    Permit,
    PermitLog,
}

impl PolicyRuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::DenyLog => "deny_log",
            Self::Permit => "permit",
            Self::PermitLog => "permit_log",
        }
    }
}

impl FromStr for PolicyRuleAction {
    type Err = ApstraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deny" => Ok(Self::Deny),
            "deny_log" => Ok(Self::DenyLog),
            "permit" => Ok(Self::Permit),
            "permit_log" => Ok(Self::PermitLog),
            other => Err(unknown_value("policy rule action", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpStateQualifier {
    Established,
}

impl TcpStateQualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Established => "established",
        }
    }
}

impl FromStr for TcpStateQualifier {
    type Err = ApstraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "established" => Ok(Self::Established),
            other => Err(unknown_value("tcp state qualifier", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub protocol: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_state_qualifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub id: Option<ObjectId>,
    pub label: String,
    pub description: String,
    pub protocol: PolicyRuleProtocol,
    pub action: PolicyRuleAction,
    pub src_port: PortRanges,
    pub dst_port: PortRanges,
    pub tcp_state_qualifier: Option<TcpStateQualifier>,
}

impl Polish for RawPolicyRule {
    type Polished = PolicyRule;

    fn polish(self) -> Result<PolicyRule, ApstraError> {
        let ports = |p: Option<String>| -> Result<PortRanges, ApstraError> {
            Ok(p.as_deref().map(str::parse::<PortRanges>).transpose()?.unwrap_or_default())
        };
        Ok(PolicyRule {
            protocol: self.protocol.parse()?,
            action: self.action.parse()?,
            src_port: ports(self.src_port)?,
            dst_port: ports(self.dst_port)?,
            tcp_state_qualifier: self
                .tcp_state_qualifier
                .as_deref()
                .map(str::parse::<TcpStateQualifier>)
                .transpose()?,
            id: self.id,
            label: self.label,
            description: self.description,
        })
    }
}

impl Rawify for PolicyRule {
    type Raw = RawPolicyRule;

    fn raw(&self) -> Result<RawPolicyRule, ApstraError> {
        if !self.protocol.has_ports() && !(self.src_port.is_any() && self.dst_port.is_any()) {
            return Err(ApstraError::InvalidRequest(format!(
                "rule '{}': ports are only valid with TCP or UDP",
                self.label
            )));
        }
        if self.tcp_state_qualifier.is_some() && self.protocol != PolicyRuleProtocol::Tcp {
            return Err(ApstraError::InvalidRequest(format!(
                "rule '{}': tcp_state_qualifier requires protocol TCP",
                self.label
            )));
        }

        let ports = |p: &PortRanges| self.protocol.has_ports().then(|| p.to_string());
        Ok(RawPolicyRule {
            id: self.id.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            protocol: self.protocol.as_str().to_string(),
            action: self.action.as_str().to_string(),
            src_port: ports(&self.src_port),
            dst_port: ports(&self.dst_port),
            tcp_state_qualifier: self.tcp_state_qualifier.map(|q| q.as_str().to_string()),
        })
    }
}

/// Reference to the virtual network, routing zone or endpoint group a policy applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPoint {
    pub id: ObjectId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_application_point: Option<ApplicationPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_application_point: Option<ApplicationPoint>,
    #[serde(default)]
    pub rules: Vec<RawPolicyRule>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyData {
    pub label: String,
    pub description: String,
    pub enabled: bool,
    pub src_application_point: Option<ObjectId>,
    pub dst_application_point: Option<ObjectId>,
    pub rules: Vec<PolicyRule>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub id: ObjectId,
    pub data: PolicyData,
}

impl Polish for RawPolicy {
    type Polished = Policy;

    fn polish(self) -> Result<Policy, ApstraError> {
        let id = self
            .id
            .ok_or_else(|| ApstraError::Polish(format!("policy '{}' has no id", self.label)))?;
        Ok(Policy {
            id,
            data: PolicyData {
                rules: self.rules.polish()?,
                label: self.label,
                description: self.description,
                enabled: self.enabled,
                src_application_point: self.src_application_point.map(|p| p.id),
                dst_application_point: self.dst_application_point.map(|p| p.id),
                tags: self.tags,
            },
        })
    }
}

impl Rawify for PolicyData {
    type Raw = RawPolicy;

    fn raw(&self) -> Result<RawPolicy, ApstraError> {
        Ok(RawPolicy {
            id: None,
            label: self.label.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            src_application_point: self.src_application_point.clone().map(|id| ApplicationPoint { id }),
            dst_application_point: self.dst_application_point.clone().map(|id| ApplicationPoint { id }),
            rules: self.rules.iter().map(Rawify::raw).collect::<Result<_, _>>()?,
            tags: self.tags.clone(),
        })
    }
}

impl Labeled for Policy {
    fn label(&self) -> &str {
        &self.data.label
    }
}

/// The policies collection answers under a `policies` key rather than `items`
#[derive(Debug, Deserialize)]
struct PolicyList {
    #[serde(default)]
    policies: Vec<RawPolicy>,
}

impl ApstraClient {
    pub async fn list_policies(&self, blueprint_id: &ObjectId) -> Result<Vec<Policy>, ApstraError> {
        let list: PolicyList = self.http.get(&blueprint_path(blueprint_id, "/policies")).await?;
        list.policies.polish()
    }

    pub async fn get_policy(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<Policy, ApstraError> {
        let raw: RawPolicy = self
            .http
            .get(&blueprint_path(blueprint_id, &format!("/policies/{}", id)))
            .await?;
        raw.polish()
    }

    pub async fn get_policy_by_label(&self, blueprint_id: &ObjectId, label: &str) -> Result<Policy, ApstraError> {
        one_by_label(self.list_policies(blueprint_id).await?, label, "policy")
    }

    pub async fn create_policy(&self, blueprint_id: &ObjectId, data: &PolicyData) -> Result<ObjectId, ApstraError> {
        let raw = self.raw_policy(data).await?;
        let response: IdResponse = self.http.post(&blueprint_path(blueprint_id, "/policies"), &raw).await?;
        Ok(response.id)
    }

    pub async fn update_policy(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
        data: &PolicyData,
    ) -> Result<(), ApstraError> {
        let raw = self.raw_policy(data).await?;
        self.http
            .put(&blueprint_path(blueprint_id, &format!("/policies/{}", id)), &raw)
            .await
    }

    pub async fn delete_policy(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.http
            .delete(&blueprint_path(blueprint_id, &format!("/policies/{}", id)))
            .await
    }

    async fn raw_policy(&self, data: &PolicyData) -> Result<RawPolicy, ApstraError> {
        let uses_qualifier = data.rules.iter().any(|r| r.tcp_state_qualifier.is_some());
        self.check_field(&POLICY_RULE_TCP_STATE_QUALIFIER, "tcp_state_qualifier", uses_qualifier)
            .await?;
        data.raw()
    }
}
