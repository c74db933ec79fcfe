//! Controller version compatibility
//!
//! The controller reports versions such as `4.2.1-106`. Only the numeric
//! core takes part in compatibility checks; the build suffix is kept for
//! display. Requirements are `semver` requirement strings.

use crate::error::ApstraError;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Controller releases this client has been validated against
pub const SUPPORTED_VERSIONS: &[&str] = &[">=4.1.0, <4.3.0", ">=5.0.0, <5.2.0"];

/// Response of `GET /api/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVersionResponse {
    pub version: String,
    #[serde(default)]
    pub build_version: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub minor: Option<String>,
}

/// A parsed controller version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerVersion {
    /// Numeric core (`major.minor.patch`)
    pub version: Version,
    /// Anything after the core, e.g. the build number
    pub build: Option<String>,
}

impl ControllerVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
            build: None,
        }
    }

    /// Whether this version satisfies a requirement string such as `>=4.2.0`
    pub fn satisfies(&self, requirement: &str) -> Result<bool, ApstraError> {
        let req = VersionReq::parse(requirement).map_err(|e| {
            ApstraError::InvalidRequest(format!("bad version requirement '{}': {}", requirement, e))
        })?;
        Ok(req.matches(&self.version))
    }
}

impl FromStr for ControllerVersion {
    type Err = ApstraError;

    /// Lenient parse: `4.2.1-106`, `4.2.1.2`, `4.1` and `5` are all accepted.
    /// The first three dot-separated numbers form the core; missing ones are 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ApstraError::UnsupportedVersion(format!("cannot parse controller version '{}'", s));

        let (core, suffix) = match s.find(|c: char| !(c.is_ascii_digit() || c == '.')) {
            Some(idx) => (&s[..idx], Some(s[idx..].trim_start_matches(['-', '+', '_']))),
            None => (s, None),
        };

        let parts: Vec<&str> = core.trim_end_matches('.').split('.').collect();
        if parts.is_empty() || parts[0].is_empty() {
            return Err(invalid());
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
            *slot = part.parse().map_err(|_| invalid())?;
        }

        // A fourth numeric component (4.2.1.2) is folded into the build text
        let extra: Vec<&str> = parts.iter().skip(3).copied().collect();
        let mut build = Vec::new();
        if !extra.is_empty() {
            build.push(extra.join("."));
        }
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            build.push(suffix.to_string());
        }

        Ok(Self {
            version: Version::new(numbers[0], numbers[1], numbers[2]),
            build: if build.is_empty() { None } else { Some(build.join("-")) },
        })
    }
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.build {
            Some(build) => write!(f, "{}-{}", self.version, build),
            None => write!(f, "{}", self.version),
        }
    }
}

/// Fail unless the version matches one of [`SUPPORTED_VERSIONS`]
pub fn check_supported(version: &ControllerVersion) -> Result<(), ApstraError> {
    for requirement in SUPPORTED_VERSIONS {
        if version.satisfies(requirement)? {
            return Ok(());
        }
    }
    Err(ApstraError::UnsupportedVersion(format!(
        "controller version {} is not supported (supported: {})",
        version,
        SUPPORTED_VERSIONS.join(" or ")
    )))
}

/// How a versioned field behaves when the version is outside the requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Field must be present inside the range and absent outside it
    RequiredInRange,
    /// Field may only be present inside the range
    OnlyInRange,
}

/// A feature or field that only exists in some controller releases
#[derive(Debug, Clone, Copy)]
pub struct VersionGate {
    pub name: &'static str,
    pub requirement: &'static str,
    pub rule: FieldRule,
}

/// Security zones carry `junos_evpn_irb_mode` from 4.2.0 on, and must not before
pub const SECURITY_ZONE_JUNOS_EVPN_IRB_MODE: VersionGate = VersionGate {
    name: "security zone junos_evpn_irb_mode",
    requirement: ">=4.2.0",
    rule: FieldRule::RequiredInRange,
};

/// Policy rules accept `tcp_state_qualifier` from 4.2.0 on
pub const POLICY_RULE_TCP_STATE_QUALIFIER: VersionGate = VersionGate {
    name: "policy rule tcp_state_qualifier",
    requirement: ">=4.2.0",
    rule: FieldRule::OnlyInRange,
};

/// Freeform blueprints
pub const FREEFORM: VersionGate = VersionGate {
    name: "freeform blueprints",
    requirement: ">=4.2.0",
    rule: FieldRule::OnlyInRange,
};

/// IBA widgets API
pub const IBA_WIDGETS: VersionGate = VersionGate {
    name: "IBA widgets",
    requirement: ">=4.1.0",
    rule: FieldRule::OnlyInRange,
};

impl VersionGate {
    pub fn matches(&self, version: &ControllerVersion) -> Result<bool, ApstraError> {
        version.satisfies(self.requirement)
    }

    /// Fail with `UnsupportedVersion` when the whole feature is unavailable
    pub fn ensure_supported(&self, version: &ControllerVersion) -> Result<(), ApstraError> {
        if self.matches(version)? {
            Ok(())
        } else {
            Err(ApstraError::UnsupportedVersion(format!(
                "{} requires controller version {}, controller is {}",
                self.name, self.requirement, version
            )))
        }
    }

    /// Enforce presence/absence of `field` according to this gate's rule
    pub fn require_field(
        &self,
        version: &ControllerVersion,
        field: &str,
        present: bool,
    ) -> Result<(), ApstraError> {
        let in_range = self.matches(version)?;
        match (self.rule, in_range, present) {
            (FieldRule::RequiredInRange, true, false) => Err(ApstraError::InvalidRequest(format!(
                "{} is required with controller version {} ({})",
                field, version, self.requirement
            ))),
            (_, false, true) => Err(ApstraError::InvalidRequest(format!(
                "{} is not supported by controller version {} (needs {})",
                field, version, self.requirement
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ControllerVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_with_build_number() {
        let version = v("4.2.1-106");
        assert_eq!(version.version, Version::new(4, 2, 1));
        assert_eq!(version.build.as_deref(), Some("106"));
        assert_eq!(version.to_string(), "4.2.1-106");
    }

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!(v("4.1").version, Version::new(4, 1, 0));
        assert_eq!(v("5").version, Version::new(5, 0, 0));

        let four = v("4.2.1.2");
        assert_eq!(four.version, Version::new(4, 2, 1));
        assert_eq!(four.build.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<ControllerVersion>().is_err());
        assert!("latest".parse::<ControllerVersion>().is_err());
    }

    #[test]
    fn test_build_suffix_does_not_affect_matching() {
        // a semver pre-release would fail >=4.2.0, the build suffix must not
        assert!(v("4.2.0-1").satisfies(">=4.2.0").unwrap());
    }

    #[test]
    fn test_check_supported() {
        assert!(check_supported(&v("4.1.2")).is_ok());
        assert!(check_supported(&v("4.2.1-106")).is_ok());
        assert!(check_supported(&v("5.0.0")).is_ok());
        assert!(matches!(
            check_supported(&v("3.3.0")),
            Err(ApstraError::UnsupportedVersion(_))
        ));
        assert!(check_supported(&v("6.0.0")).is_err());
    }

    #[test]
    fn test_required_field_gate() {
        let gate = SECURITY_ZONE_JUNOS_EVPN_IRB_MODE;
        assert!(gate.require_field(&v("4.2.0"), "junos_evpn_irb_mode", true).is_ok());
        assert!(gate.require_field(&v("4.2.0"), "junos_evpn_irb_mode", false).is_err());
        assert!(gate.require_field(&v("4.1.2"), "junos_evpn_irb_mode", false).is_ok());
        assert!(gate.require_field(&v("4.1.2"), "junos_evpn_irb_mode", true).is_err());
    }

    #[test]
    fn test_optional_field_gate() {
        let gate = POLICY_RULE_TCP_STATE_QUALIFIER;
        assert!(gate.require_field(&v("4.2.1"), "tcp_state_qualifier", false).is_ok());
        assert!(gate.require_field(&v("4.2.1"), "tcp_state_qualifier", true).is_ok());
        assert!(gate.require_field(&v("4.1.0"), "tcp_state_qualifier", true).is_err());
    }

    #[test]
    fn test_ensure_supported() {
        assert!(FREEFORM.ensure_supported(&v("4.2.0")).is_ok());
        assert!(matches!(
            FREEFORM.ensure_supported(&v("4.1.2")),
            Err(ApstraError::UnsupportedVersion(_))
        ));
    }
}
