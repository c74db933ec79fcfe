//! Security zones / routing zones (`/api/blueprints/{id}/security-zones`)

use crate::blueprint::blueprint_path;
use crate::client::ApstraClient;
use crate::common::query::{Labeled, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, Rawify, unknown_value};
use crate::version::SECURITY_ZONE_JUNOS_EVPN_IRB_MODE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

const VLAN_RANGE: RangeInclusive<u16> = 2..=4094;
const VNI_RANGE: RangeInclusive<u32> = 4096..=16_777_214;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityZoneType {
    Evpn,
    L3Fabric,
    VirtualL3Fabric,
}

impl SecurityZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evpn => "evpn",
            Self::L3Fabric => "l3_fabric",
            Self::VirtualL3Fabric => "virtual_l3_fabric",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "evpn" => Ok(Self::Evpn),
            "l3_fabric" => Ok(Self::L3Fabric),
            "virtual_l3_fabric" => Ok(Self::VirtualL3Fabric),
            other => Err(unknown_value("security zone type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunosEvpnIrbMode {
    Asymmetric,
    Symmetric,
}

impl JunosEvpnIrbMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asymmetric => "asymmetric",
            Self::Symmetric => "symmetric",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "asymmetric" => Ok(Self::Asymmetric),
            "symmetric" => Ok(Self::Symmetric),
            other => Err(unknown_value("junos evpn irb mode", other)),
        }
    }
}

/// Route targets imported into / exported from the zone's VRF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RtPolicy {
    #[serde(rename = "import_RTs", default)]
    pub import_rts: Vec<String>,
    #[serde(rename = "export_RTs", default)]
    pub export_rts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSecurityZone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sz_type: String,
    pub label: String,
    pub vrf_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_policy_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_policy: Option<RtPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vni_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junos_evpn_irb_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityZoneData {
    pub sz_type: SecurityZoneType,
    pub label: String,
    pub vrf_name: String,
    pub routing_policy_id: Option<ObjectId>,
    pub route_target: Option<String>,
    pub rt_policy: Option<RtPolicy>,
    pub vlan_id: Option<u16>,
    pub vni_id: Option<u32>,
    pub junos_evpn_irb_mode: Option<JunosEvpnIrbMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityZone {
    pub id: ObjectId,
    pub data: SecurityZoneData,
}

impl Polish for RawSecurityZone {
    type Polished = SecurityZone;

    fn polish(self) -> Result<SecurityZone, ApstraError> {
        let id = self
            .id
            .ok_or_else(|| ApstraError::Polish(format!("security zone '{}' has no id", self.label)))?;
        Ok(SecurityZone {
            id,
            data: SecurityZoneData {
                sz_type: SecurityZoneType::parse(&self.sz_type)?,
                junos_evpn_irb_mode: self
                    .junos_evpn_irb_mode
                    .as_deref()
                    .map(JunosEvpnIrbMode::parse)
                    .transpose()?,
                label: self.label,
                vrf_name: self.vrf_name,
                routing_policy_id: self.routing_policy_id,
                route_target: self.route_target,
                rt_policy: self.rt_policy,
                vlan_id: self.vlan_id,
                vni_id: self.vni_id,
            },
        })
    }
}

impl Rawify for SecurityZoneData {
    type Raw = RawSecurityZone;

    fn raw(&self) -> Result<RawSecurityZone, ApstraError> {
        if self.vrf_name.is_empty() {
            return Err(ApstraError::InvalidRequest("security zone vrf_name must not be empty".to_string()));
        }
        if let Some(vlan) = self.vlan_id.filter(|v| !VLAN_RANGE.contains(v)) {
            return Err(ApstraError::InvalidRequest(format!(
                "security zone vlan_id {} outside {:?}",
                vlan, VLAN_RANGE
            )));
        }
        if let Some(vni) = self.vni_id.filter(|v| !VNI_RANGE.contains(v)) {
            return Err(ApstraError::InvalidRequest(format!(
                "security zone vni_id {} outside {:?}",
                vni, VNI_RANGE
            )));
        }

        Ok(RawSecurityZone {
            id: None,
            sz_type: self.sz_type.as_str().to_string(),
            label: self.label.clone(),
            vrf_name: self.vrf_name.clone(),
            routing_policy_id: self.routing_policy_id.clone(),
            route_target: self.route_target.clone(),
            rt_policy: self.rt_policy.clone(),
            vlan_id: self.vlan_id,
            vni_id: self.vni_id,
            junos_evpn_irb_mode: self.junos_evpn_irb_mode.map(|m| m.as_str().to_string()),
        })
    }
}

impl Labeled for SecurityZone {
    fn label(&self) -> &str {
        &self.data.label
    }
}

/// The collection is keyed by zone id rather than listed
#[derive(Debug, Deserialize)]
struct SecurityZoneMap {
    #[serde(default)]
    items: BTreeMap<String, RawSecurityZone>,
}

fn zones_path(blueprint_id: &ObjectId) -> String {
    blueprint_path(blueprint_id, "/security-zones")
}

impl ApstraClient {
    pub async fn list_security_zones(&self, blueprint_id: &ObjectId) -> Result<Vec<SecurityZone>, ApstraError> {
        let map: SecurityZoneMap = self.http.get(&zones_path(blueprint_id)).await?;
        map.items.into_values().collect::<Vec<_>>().polish()
    }

    pub async fn get_security_zone(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
    ) -> Result<SecurityZone, ApstraError> {
        let raw: RawSecurityZone = self.http.get(&format!("{}/{}", zones_path(blueprint_id), id)).await?;
        raw.polish()
    }

    pub async fn get_security_zone_by_label(
        &self,
        blueprint_id: &ObjectId,
        label: &str,
    ) -> Result<SecurityZone, ApstraError> {
        one_by_label(self.list_security_zones(blueprint_id).await?, label, "security zone")
    }

    pub async fn get_security_zone_by_vrf_name(
        &self,
        blueprint_id: &ObjectId,
        vrf_name: &str,
    ) -> Result<SecurityZone, ApstraError> {
        self.list_security_zones(blueprint_id)
            .await?
            .into_iter()
            .find(|sz| sz.data.vrf_name == vrf_name)
            .ok_or_else(|| ApstraError::NotFound(format!("security zone with vrf_name '{}' not found", vrf_name)))
    }

    pub async fn create_security_zone(
        &self,
        blueprint_id: &ObjectId,
        data: &SecurityZoneData,
    ) -> Result<ObjectId, ApstraError> {
        let raw = self.raw_security_zone(data).await?;
        let response: IdResponse = self.http.post(&zones_path(blueprint_id), &raw).await?;
        Ok(response.id)
    }

    pub async fn update_security_zone(
        &self,
        blueprint_id: &ObjectId,
        id: &ObjectId,
        data: &SecurityZoneData,
    ) -> Result<(), ApstraError> {
        let raw = self.raw_security_zone(data).await?;
        self.http.put(&format!("{}/{}", zones_path(blueprint_id), id), &raw).await
    }

    pub async fn delete_security_zone(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", zones_path(blueprint_id), id)).await
    }

    async fn raw_security_zone(&self, data: &SecurityZoneData) -> Result<RawSecurityZone, ApstraError> {
        self.check_field(
            &SECURITY_ZONE_JUNOS_EVPN_IRB_MODE,
            "junos_evpn_irb_mode",
            data.junos_evpn_irb_mode.is_some(),
        )
        .await?;
        data.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with_version;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn zone_data(irb: Option<JunosEvpnIrbMode>) -> SecurityZoneData {
        SecurityZoneData {
            sz_type: SecurityZoneType::Evpn,
            label: "blue".to_string(),
            vrf_name: "blue".to_string(),
            routing_policy_id: None,
            route_target: None,
            rt_policy: Some(RtPolicy {
                import_rts: vec!["65000:100".to_string()],
                export_rts: vec![],
            }),
            vlan_id: Some(100),
            vni_id: Some(10100),
            junos_evpn_irb_mode: irb,
        }
    }

    fn zones_json() -> serde_json::Value {
        json!({
            "items": {
                "sz1": {"id": "sz1", "sz_type": "l3_fabric", "label": "Default routing zone", "vrf_name": "default"},
                "sz2": {
                    "id": "sz2", "sz_type": "evpn", "label": "blue", "vrf_name": "blue_vrf",
                    "vlan_id": 100, "vni_id": 10100, "route_target": "10100:1",
                    "rt_policy": {"import_RTs": ["65000:100"], "export_RTs": []},
                    "junos_evpn_irb_mode": "symmetric"
                }
            }
        })
    }

    #[tokio::test]
    async fn test_list_and_find_security_zones() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/bp1/security-zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(zones_json()))
            .mount(&server)
            .await;

        let bp = ObjectId::from("bp1");
        let zones = client.list_security_zones(&bp).await.unwrap();
        assert_eq!(zones.len(), 2);

        let blue = client.get_security_zone_by_vrf_name(&bp, "blue_vrf").await.unwrap();
        assert_eq!(blue.id.as_str(), "sz2");
        assert_eq!(blue.data.junos_evpn_irb_mode, Some(JunosEvpnIrbMode::Symmetric));
        assert_eq!(blue.data.rt_policy.unwrap().import_rts, vec!["65000:100"]);

        let default = client.get_security_zone_by_label(&bp, "Default routing zone").await.unwrap();
        assert_eq!(default.data.sz_type, SecurityZoneType::L3Fabric);
        assert!(client.get_security_zone_by_vrf_name(&bp, "red").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_security_zone_with_irb_mode() {
        let (server, client) = client_with_version("4.2.1").await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/bp1/security-zones"))
            .and(body_partial_json(json!({
                "sz_type": "evpn",
                "vrf_name": "blue",
                "junos_evpn_irb_mode": "asymmetric",
                "rt_policy": {"import_RTs": ["65000:100"]}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "sz-new"})))
            .mount(&server)
            .await;

        let id = client
            .create_security_zone(&ObjectId::from("bp1"), &zone_data(Some(JunosEvpnIrbMode::Asymmetric)))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "sz-new");
    }

    #[tokio::test]
    async fn test_irb_mode_version_gate() {
        let (_server, new_client) = client_with_version("4.2.0").await;
        let err = new_client
            .create_security_zone(&ObjectId::from("bp1"), &zone_data(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::InvalidRequest(ref m) if m.contains("required")));

        let (_server, old_client) = client_with_version("4.1.2").await;
        let err = old_client
            .create_security_zone(&ObjectId::from("bp1"), &zone_data(Some(JunosEvpnIrbMode::Symmetric)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::InvalidRequest(ref m) if m.contains("not supported")));
    }

    #[test]
    fn test_rawify_checks_vni_range() {
        let mut data = zone_data(None);
        data.vni_id = Some(100);
        assert!(matches!(data.raw(), Err(ApstraError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_update_security_zone() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("PUT"))
            .and(path("/api/blueprints/bp1/security-zones/sz2"))
            .and(body_partial_json(json!({
                "sz_type": "evpn",
                "vrf_name": "blue",
                "vlan_id": 200,
                "junos_evpn_irb_mode": "asymmetric",
                "rt_policy": {"import_RTs": ["65000:100"]}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = zone_data(Some(JunosEvpnIrbMode::Asymmetric));
        data.vlan_id = Some(200);
        client
            .update_security_zone(&ObjectId::from("bp1"), &ObjectId::from("sz2"), &data)
            .await
            .unwrap();
    }
}
