//! Interface maps (`/api/design/interface-maps`)
//!
//! An interface map ties a logical device port to a physical interface of a
//! device profile. The wire format encodes that tie as a positional
//! five-element array.

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::design::logical_devices::PortRole;
use crate::error::ApstraError;
use crate::polish::{Polish, Rawify, parse_optional_timestamp, unknown_value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const INTERFACE_MAPS_PATH: &str = "/api/design/interface-maps";

/// Where one interface sits on both sides of the map.
///
/// Wire order: `[dp_port_id, dp_transform_id, dp_interface_id, ld_panel, ld_port]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceMapMapping {
    pub device_profile_port_id: Option<u32>,
    pub device_profile_transform_id: Option<u32>,
    pub device_profile_interface_id: Option<u32>,
    pub logical_device_panel: Option<u32>,
    pub logical_device_panel_port: Option<u32>,
}

impl InterfaceMapMapping {
    /// Whether the interface is assigned to a logical device port
    pub fn is_mapped(&self) -> bool {
        self.logical_device_panel.is_some() && self.logical_device_panel_port.is_some()
    }

    fn from_wire(name: &str, raw: &[Option<u32>]) -> Result<Self, ApstraError> {
        match raw {
            [port, transform, interface, panel, panel_port] => Ok(Self {
                device_profile_port_id: *port,
                device_profile_transform_id: *transform,
                device_profile_interface_id: *interface,
                logical_device_panel: *panel,
                logical_device_panel_port: *panel_port,
            }),
            other => Err(ApstraError::Polish(format!(
                "interface '{}' mapping has {} elements, expected 5",
                name,
                other.len()
            ))),
        }
    }

    fn to_wire(self) -> Vec<Option<u32>> {
        vec![
            self.device_profile_port_id,
            self.device_profile_transform_id,
            self.device_profile_interface_id,
            self.logical_device_panel,
            self.logical_device_panel_port,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Active,
    Inactive,
}

impl InterfaceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InterfaceSetting {
    #[serde(default)]
    pub param: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterfaceMapInterface {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub mapping: Vec<Option<u32>>,
    pub state: String,
    #[serde(default)]
    pub setting: InterfaceSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMapInterface {
    pub name: String,
    pub roles: Vec<PortRole>,
    pub mapping: InterfaceMapMapping,
    pub state: InterfaceState,
    pub setting: InterfaceSetting,
    pub position: Option<u32>,
}

impl Polish for RawInterfaceMapInterface {
    type Polished = InterfaceMapInterface;

    fn polish(self) -> Result<InterfaceMapInterface, ApstraError> {
        let roles = self
            .roles
            .iter()
            .map(|r| r.parse::<PortRole>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InterfaceMapInterface {
            mapping: InterfaceMapMapping::from_wire(&self.name, &self.mapping)?,
            roles,
            state: parse_interface_state(&self.state)?,
            name: self.name,
            setting: self.setting,
            position: self.position,
        })
    }
}

impl Rawify for InterfaceMapInterface {
    type Raw = RawInterfaceMapInterface;

    fn raw(&self) -> Result<RawInterfaceMapInterface, ApstraError> {
        Ok(RawInterfaceMapInterface {
            name: self.name.clone(),
            roles: self.roles.iter().map(|r| r.as_str().to_string()).collect(),
            mapping: self.mapping.to_wire(),
            state: self.state.as_str().to_string(),
            setting: self.setting.clone(),
            position: self.position,
        })
    }
}

/// Interface map as sent by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInterfaceMap {
    pub id: ObjectId,
    pub label: String,
    pub logical_device_id: ObjectId,
    pub device_profile_id: ObjectId,
    pub interfaces: Vec<RawInterfaceMapInterface>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawInterfaceMapData {
    pub label: String,
    pub logical_device_id: ObjectId,
    pub device_profile_id: ObjectId,
    pub interfaces: Vec<RawInterfaceMapInterface>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMapData {
    pub label: String,
    pub logical_device_id: ObjectId,
    pub device_profile_id: ObjectId,
    pub interfaces: Vec<InterfaceMapInterface>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMap {
    pub id: ObjectId,
    pub data: InterfaceMapData,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl InterfaceMap {
    /// Interface mapped to a given logical device panel/port, if any
    pub fn interface_for_port(&self, panel: u32, port: u32) -> Option<&InterfaceMapInterface> {
        self.data.interfaces.iter().find(|i| {
            i.mapping.logical_device_panel == Some(panel) && i.mapping.logical_device_panel_port == Some(port)
        })
    }
}

impl Polish for RawInterfaceMap {
    type Polished = InterfaceMap;

    fn polish(self) -> Result<InterfaceMap, ApstraError> {
        Ok(InterfaceMap {
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            data: InterfaceMapData {
                label: self.label,
                logical_device_id: self.logical_device_id,
                device_profile_id: self.device_profile_id,
                interfaces: self.interfaces.polish()?,
            },
        })
    }
}

impl Rawify for InterfaceMapData {
    type Raw = RawInterfaceMapData;

    fn raw(&self) -> Result<RawInterfaceMapData, ApstraError> {
        let mut seen = std::collections::BTreeSet::new();
        for interface in &self.interfaces {
            if interface.mapping.is_mapped()
                && !seen.insert((interface.mapping.logical_device_panel, interface.mapping.logical_device_panel_port))
            {
                return Err(ApstraError::InvalidRequest(format!(
                    "interface '{}' maps a logical device port that is already mapped",
                    interface.name
                )));
            }
        }

        Ok(RawInterfaceMapData {
            label: self.label.clone(),
            logical_device_id: self.logical_device_id.clone(),
            device_profile_id: self.device_profile_id.clone(),
            interfaces: self.interfaces.iter().map(Rawify::raw).collect::<Result<_, _>>()?,
        })
    }
}

impl Labeled for InterfaceMap {
    fn label(&self) -> &str {
        &self.data.label
    }
}

/// Parse an interface state as sent by the controller or found in graph query results
pub fn parse_interface_state(s: &str) -> Result<InterfaceState, ApstraError> {
    match s {
        "active" => Ok(InterfaceState::Active),
        "inactive" => Ok(InterfaceState::Inactive),
        other => Err(unknown_value("interface state", other)),
    }
}

impl ApstraClient {
    pub async fn list_interface_maps(&self) -> Result<Vec<InterfaceMap>, ApstraError> {
        list_polished::<RawInterfaceMap>(&self.http, INTERFACE_MAPS_PATH).await
    }

    pub async fn get_interface_map(&self, id: &ObjectId) -> Result<InterfaceMap, ApstraError> {
        let raw: RawInterfaceMap = self.http.get(&format!("{}/{}", INTERFACE_MAPS_PATH, id)).await?;
        raw.polish()
    }

    pub async fn get_interface_map_by_label(&self, label: &str) -> Result<InterfaceMap, ApstraError> {
        one_by_label(self.list_interface_maps().await?, label, "interface map")
    }

    /// Interface maps that pair a given logical device with a given device profile
    pub async fn find_interface_maps(
        &self,
        logical_device_id: &ObjectId,
        device_profile_id: &ObjectId,
    ) -> Result<Vec<InterfaceMap>, ApstraError> {
        Ok(self
            .list_interface_maps()
            .await?
            .into_iter()
            .filter(|m| &m.data.logical_device_id == logical_device_id && &m.data.device_profile_id == device_profile_id)
            .collect())
    }

    pub async fn create_interface_map(&self, data: &InterfaceMapData) -> Result<ObjectId, ApstraError> {
        let response: IdResponse = self.http.post(INTERFACE_MAPS_PATH, &data.raw()?).await?;
        Ok(response.id)
    }

    pub async fn delete_interface_map(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", INTERFACE_MAPS_PATH, id)).await
    }
}
