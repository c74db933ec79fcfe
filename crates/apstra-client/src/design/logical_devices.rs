//! Logical devices (`/api/design/logical-devices`)
//!
//! A logical device is an abstract switch or server: panels of ports, each
//! port group with a speed and the roles its ports may take.

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::polish::{Polish, Rawify, parse_optional_timestamp, unknown_value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOGICAL_DEVICES_PATH: &str = "/api/design/logical-devices";

/// Port speed in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortSpeed(pub u64);

const MEGA: u64 = 1_000_000;
const GIGA: u64 = 1_000_000_000;
const TERA: u64 = 1_000_000_000_000;

impl PortSpeed {
    pub fn gbps(value: u64) -> Result<Self, ApstraError> {
        value
            .checked_mul(GIGA)
            .map(Self)
            .ok_or_else(|| ApstraError::InvalidRequest(format!("port speed {}G overflows", value)))
    }

    pub fn bps(&self) -> u64 {
        self.0
    }

    fn from_unit(unit: &str, value: u64) -> Result<Self, ApstraError> {
        let multiplier = match unit {
            "M" | "m" => MEGA,
            "G" | "g" => GIGA,
            "T" | "t" => TERA,
            other => return Err(unknown_value("port speed unit", other)),
        };
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| ApstraError::Polish(format!("port speed {}{} overflows", value, unit)))
    }
}

impl FromStr for PortSpeed {
    type Err = ApstraError;

    /// Parses `10G`, `100M`, `1T` (case-insensitive unit)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| ApstraError::Polish(format!("invalid port speed '{}'", s)))?;
        Self::from_unit(unit, value)
    }
}

impl fmt::Display for PortSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match RawPortSpeed::try_from(*self) {
            Ok(raw) => write!(f, "{}{}", raw.value, raw.unit),
            Err(_) => write!(f, "{}bps", self.0),
        }
    }
}

/// Wire form `{"unit": "G", "value": 10}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortSpeed {
    pub unit: String,
    pub value: u64,
}

/// The wire only carries whole megabits; anything finer is rejected
impl TryFrom<PortSpeed> for RawPortSpeed {
    type Error = ApstraError;

    fn try_from(speed: PortSpeed) -> Result<Self, Self::Error> {
        if speed.0 < MEGA || speed.0 % MEGA != 0 {
            return Err(ApstraError::InvalidRequest(format!(
                "port speed {}bps is not a whole number of megabits",
                speed.0
            )));
        }
        let (unit, value) = if speed.0 % TERA == 0 {
            ("T", speed.0 / TERA)
        } else if speed.0 % GIGA == 0 {
            ("G", speed.0 / GIGA)
        } else {
            ("M", speed.0 / MEGA)
        };
        Ok(Self {
            unit: unit.to_string(),
            value,
        })
    }
}

impl Polish for RawPortSpeed {
    type Polished = PortSpeed;

    fn polish(self) -> Result<PortSpeed, ApstraError> {
        PortSpeed::from_unit(&self.unit, self.value)
    }
}

/// Role a logical device port may be connected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortRole {
    Superspine,
    Spine,
    Leaf,
    Peer,
    Access,
    Generic,
    Unused,
    L3Server,
}

impl PortRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Superspine => "superspine",
            Self::Spine => "spine",
            Self::Leaf => "leaf",
            Self::Peer => "peer",
            Self::Access => "access",
            Self::Generic => "generic",
            Self::Unused => "unused",
            Self::L3Server => "l3_server",
        }
    }
}

impl FromStr for PortRole {
    type Err = ApstraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "superspine" => Self::Superspine,
            "spine" => Self::Spine,
            "leaf" => Self::Leaf,
            "peer" => Self::Peer,
            "access" => Self::Access,
            "generic" => Self::Generic,
            "unused" => Self::Unused,
            "l3_server" => Self::L3Server,
            other => return Err(unknown_value("port role", other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortIndexingOrder {
    /// `T-B, L-R`
    TopBottomLeftRight,
    /// `L-R, T-B`
    LeftRightTopBottom,
}

impl PortIndexingOrder {
    fn as_wire(self) -> &'static str {
        match self {
            Self::TopBottomLeftRight => "T-B, L-R",
            Self::LeftRightTopBottom => "L-R, T-B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortIndexing {
    pub order: String,
    pub start_index: u32,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortGroup {
    pub count: u32,
    pub speed: RawPortSpeed,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPanel {
    pub panel_layout: PanelLayout,
    pub port_indexing: RawPortIndexing,
    pub port_groups: Vec<RawPortGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortGroup {
    pub count: u32,
    pub speed: PortSpeed,
    pub roles: Vec<PortRole>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub layout: PanelLayout,
    pub order: PortIndexingOrder,
    pub start_index: u32,
    pub schema: String,
    pub port_groups: Vec<PortGroup>,
}

impl Panel {
    pub fn port_count(&self) -> u64 {
        self.port_groups.iter().map(|g| u64::from(g.count)).sum()
    }
}

impl Polish for RawPanel {
    type Polished = Panel;

    fn polish(self) -> Result<Panel, ApstraError> {
        let order = match self.port_indexing.order.as_str() {
            "T-B, L-R" => PortIndexingOrder::TopBottomLeftRight,
            "L-R, T-B" => PortIndexingOrder::LeftRightTopBottom,
            other => return Err(unknown_value("port indexing order", other)),
        };

        let port_groups = self
            .port_groups
            .into_iter()
            .map(|g| {
                Ok(PortGroup {
                    count: g.count,
                    speed: g.speed.polish()?,
                    roles: g
                        .roles
                        .iter()
                        .map(|r| r.parse())
                        .collect::<Result<Vec<PortRole>, ApstraError>>()?,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        Ok(Panel {
            layout: self.panel_layout,
            order,
            start_index: self.port_indexing.start_index,
            schema: self.port_indexing.schema,
            port_groups,
        })
    }
}

impl Rawify for Panel {
    type Raw = RawPanel;

    fn raw(&self) -> Result<RawPanel, ApstraError> {
        let capacity = self
            .layout
            .row_count
            .checked_mul(self.layout.column_count)
            .ok_or_else(|| {
                ApstraError::InvalidRequest(format!(
                    "panel layout {}x{} is too large",
                    self.layout.row_count, self.layout.column_count
                ))
            })?;
        if self.port_count() > u64::from(capacity) {
            return Err(ApstraError::InvalidRequest(format!(
                "panel has {} ports but a {}x{} layout only holds {}",
                self.port_count(),
                self.layout.row_count,
                self.layout.column_count,
                capacity
            )));
        }

        Ok(RawPanel {
            panel_layout: self.layout.clone(),
            port_indexing: RawPortIndexing {
                order: self.order.as_wire().to_string(),
                start_index: self.start_index,
                schema: self.schema.clone(),
            },
            port_groups: self
                .port_groups
                .iter()
                .map(|g| {
                    Ok(RawPortGroup {
                        count: g.count,
                        speed: g.speed.try_into()?,
                        roles: g.roles.iter().map(|r| r.as_str().to_string()).collect(),
                    })
                })
                .collect::<Result<Vec<_>, ApstraError>>()?,
        })
    }
}

/// Logical device as sent by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogicalDevice {
    pub id: ObjectId,
    pub display_name: String,
    pub panels: Vec<RawPanel>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
}

/// Create body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogicalDeviceData {
    pub display_name: String,
    pub panels: Vec<RawPanel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDeviceData {
    pub display_name: String,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDevice {
    pub id: ObjectId,
    pub data: LogicalDeviceData,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl Polish for RawLogicalDevice {
    type Polished = LogicalDevice;

    fn polish(self) -> Result<LogicalDevice, ApstraError> {
        Ok(LogicalDevice {
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            last_modified_at: parse_optional_timestamp("last_modified_at", self.last_modified_at.as_deref())?,
            id: self.id,
            data: LogicalDeviceData {
                display_name: self.display_name,
                panels: self.panels.polish()?,
            },
        })
    }
}

impl Rawify for LogicalDeviceData {
    type Raw = RawLogicalDeviceData;

    fn raw(&self) -> Result<RawLogicalDeviceData, ApstraError> {
        Ok(RawLogicalDeviceData {
            display_name: self.display_name.clone(),
            panels: self.panels.iter().map(Rawify::raw).collect::<Result<_, _>>()?,
        })
    }
}

impl Labeled for LogicalDevice {
    fn label(&self) -> &str {
        &self.data.display_name
    }
}

impl ApstraClient {
    pub async fn list_logical_devices(&self) -> Result<Vec<LogicalDevice>, ApstraError> {
        list_polished::<RawLogicalDevice>(&self.http, LOGICAL_DEVICES_PATH).await
    }

    pub async fn get_logical_device(&self, id: &ObjectId) -> Result<LogicalDevice, ApstraError> {
        let raw: RawLogicalDevice = self.http.get(&format!("{}/{}", LOGICAL_DEVICES_PATH, id)).await?;
        raw.polish()
    }

    pub async fn get_logical_device_by_label(&self, label: &str) -> Result<LogicalDevice, ApstraError> {
        one_by_label(self.list_logical_devices().await?, label, "logical device")
    }

    pub async fn create_logical_device(&self, data: &LogicalDeviceData) -> Result<ObjectId, ApstraError> {
        let response: IdResponse = self.http.post(LOGICAL_DEVICES_PATH, &data.raw()?).await?;
        Ok(response.id)
    }

    pub async fn delete_logical_device(&self, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", LOGICAL_DEVICES_PATH, id)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn logical_device_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "display_name": "AOS-48x10+6x40-1",
            "panels": [{
                "panel_layout": {"row_count": 2, "column_count": 27},
                "port_indexing": {"order": "T-B, L-R", "start_index": 1, "schema": "absolute"},
                "port_groups": [
                    {"count": 48, "speed": {"unit": "G", "value": 10}, "roles": ["leaf", "access", "generic"]},
                    {"count": 6, "speed": {"unit": "G", "value": 40}, "roles": ["spine", "peer"]}
                ]
            }],
            "created_at": "2024-01-01T00:00:00Z",
            "last_modified_at": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_port_speed_parse_and_display() {
        assert_eq!("10G".parse::<PortSpeed>().unwrap(), PortSpeed::gbps(10).unwrap());
        assert_eq!("100M".parse::<PortSpeed>().unwrap().bps(), 100 * MEGA);
        assert_eq!("1t".parse::<PortSpeed>().unwrap().bps(), TERA);
        assert_eq!(PortSpeed::gbps(25).unwrap().to_string(), "25G");
        assert_eq!(PortSpeed::gbps(2000).unwrap().to_string(), "2T");
        assert_eq!(PortSpeed(100 * MEGA).to_string(), "100M");
        assert!("fast".parse::<PortSpeed>().is_err());
        assert!("10X".parse::<PortSpeed>().is_err());
    }

    #[test]
    fn test_polish_logical_device() {
        let raw: RawLogicalDevice = serde_json::from_value(logical_device_json("ld1")).unwrap();
        let ld = raw.polish().unwrap();
        let panel = &ld.data.panels[0];

        assert_eq!(panel.order, PortIndexingOrder::TopBottomLeftRight);
        assert_eq!(panel.port_count(), 54);
        assert_eq!(panel.port_groups[1].speed, PortSpeed::gbps(40).unwrap());
        assert_eq!(panel.port_groups[1].roles, vec![PortRole::Spine, PortRole::Peer]);
    }

    #[test]
    fn test_polish_rejects_unknown_role() {
        let mut value = logical_device_json("ld1");
        value["panels"][0]["port_groups"][0]["roles"] = json!(["wizard"]);
        let raw: RawLogicalDevice = serde_json::from_value(value).unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(ref m)) if m.contains("wizard")));
    }

    #[test]
    fn test_rawify_matches_wire_shape() {
        let raw: RawLogicalDevice = serde_json::from_value(logical_device_json("ld1")).unwrap();
        let original_panels = raw.panels.clone();
        let ld = raw.polish().unwrap();

        let back = ld.data.raw().unwrap();
        assert_eq!(back.panels, original_panels);
    }

    #[test]
    fn test_rawify_rejects_overfull_panel() {
        let data = LogicalDeviceData {
            display_name: "tiny".to_string(),
            panels: vec![Panel {
                layout: PanelLayout { row_count: 1, column_count: 2 },
                order: PortIndexingOrder::LeftRightTopBottom,
                start_index: 1,
                schema: "absolute".to_string(),
                port_groups: vec![PortGroup {
                    count: 4,
                    speed: PortSpeed::gbps(1).unwrap(),
                    roles: vec![PortRole::Generic],
                }],
            }],
        };
        assert!(matches!(data.raw(), Err(ApstraError::InvalidRequest(_))));
    }

    #[test]
    fn test_gbps_overflow_is_rejected() {
        assert!(matches!(PortSpeed::gbps(u64::MAX), Err(ApstraError::InvalidRequest(_))));
        assert_eq!(PortSpeed::gbps(400).unwrap().bps(), 400 * GIGA);
    }

    #[test]
    fn test_sub_megabit_speed_is_not_sent() {
        assert!(matches!(RawPortSpeed::try_from(PortSpeed(500_000)), Err(ApstraError::InvalidRequest(_))));
        assert!(RawPortSpeed::try_from(PortSpeed(1_500_000)).is_err());
        assert!(RawPortSpeed::try_from(PortSpeed(0)).is_err());
        assert_eq!(PortSpeed(500_000).to_string(), "500000bps");

        let raw = RawPortSpeed::try_from(PortSpeed(100 * MEGA)).unwrap();
        assert_eq!((raw.unit.as_str(), raw.value), ("M", 100));
    }

    #[test]
    fn test_rawify_rejects_oversized_layout() {
        let data = LogicalDeviceData {
            display_name: "huge".to_string(),
            panels: vec![Panel {
                layout: PanelLayout {
                    row_count: u32::MAX,
                    column_count: 2,
                },
                order: PortIndexingOrder::TopBottomLeftRight,
                start_index: 1,
                schema: "absolute".to_string(),
                port_groups: vec![PortGroup {
                    count: u32::MAX,
                    speed: PortSpeed::gbps(10).unwrap(),
                    roles: vec![PortRole::Leaf],
                }],
            }],
        };
        assert!(matches!(data.raw(), Err(ApstraError::InvalidRequest(ref m)) if m.contains("too large")));
    }
}
