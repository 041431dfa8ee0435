//! Process configuration for admission, read once from the environment.

use std::str::FromStr;

use mcs_core::IpFamily;
use mcs_schema::DefaultingConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_FEATURE_GATES: &str = "MCS_FEATURE_GATES";
pub const ENV_DEFAULT_IP_FAMILY: &str = "MCS_DEFAULT_IP_FAMILY";
pub const ENV_MAX_MANIFEST_BYTES: &str = "MCS_MAX_MANIFEST_BYTES";

pub const DEFAULT_MAX_MANIFEST_BYTES: usize = 1024 * 1024;

pub const GATE_IPV6_DUAL_STACK: &str = "IPv6DualStack";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: malformed feature gate {entry:?}, expected Name=true|false")]
    FeatureGate { var: &'static str, entry: String },
    #[error("{var}: {value:?} is not an IP family (IPv4 or IPv6)")]
    IpFamily { var: &'static str, value: String },
    #[error("{var}: {value:?} is not a byte count")]
    Bytes { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGates {
    pub ipv6_dual_stack: bool,
}

impl FeatureGates {
    /// Parse `Name=bool,Name=bool`. Unknown gates are ignored with a warning.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut gates = FeatureGates::default();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let malformed = || ConfigError::FeatureGate { var: ENV_FEATURE_GATES, entry: entry.to_string() };
            let (name, value) = entry.split_once('=').ok_or_else(malformed)?;
            let enabled = bool::from_str(value.trim()).map_err(|_| malformed())?;
            match name.trim() {
                GATE_IPV6_DUAL_STACK => gates.ipv6_dual_stack = enabled,
                other => warn!(gate = %other, "ignoring unknown feature gate"),
            }
        }
        Ok(gates)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    pub feature_gates: FeatureGates,
    pub default_ip_family: IpFamily,
    pub max_manifest_bytes: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            feature_gates: FeatureGates::default(),
            default_ip_family: IpFamily::IPv4,
            max_manifest_bytes: DEFAULT_MAX_MANIFEST_BYTES,
        }
    }
}

impl AdmissionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_FEATURE_GATES) {
            cfg.feature_gates = FeatureGates::parse(&v)?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_IP_FAMILY).filter(|v| !v.trim().is_empty()) {
            cfg.default_ip_family = IpFamily::from_str(v.trim())
                .map_err(|_| ConfigError::IpFamily { var: ENV_DEFAULT_IP_FAMILY, value: v.clone() })?;
        }
        if let Some(v) = lookup(ENV_MAX_MANIFEST_BYTES).filter(|v| !v.trim().is_empty()) {
            cfg.max_manifest_bytes = v
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Bytes { var: ENV_MAX_MANIFEST_BYTES, value: v.clone() })?;
        }
        Ok(cfg)
    }

    pub fn defaulting(&self) -> DefaultingConfig {
        DefaultingConfig { dual_stack: self.feature_gates.ipv6_dual_stack, default_ip_family: self.default_ip_family }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = AdmissionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AdmissionConfig::default());
        assert!(!cfg.defaulting().dual_stack);
    }

    #[test]
    fn dual_stack_gate_and_family() {
        let cfg = AdmissionConfig::from_lookup(lookup(&[
            (ENV_FEATURE_GATES, "IPv6DualStack=true, SomethingElse=false"),
            (ENV_DEFAULT_IP_FAMILY, "IPv6"),
            (ENV_MAX_MANIFEST_BYTES, "4096"),
        ]))
        .unwrap();
        let d = cfg.defaulting();
        assert!(d.dual_stack);
        assert_eq!(d.default_ip_family, IpFamily::IPv6);
        assert_eq!(cfg.max_manifest_bytes, 4096);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(FeatureGates::parse("IPv6DualStack"), Err(ConfigError::FeatureGate { .. })));
        assert!(matches!(FeatureGates::parse("IPv6DualStack=yes"), Err(ConfigError::FeatureGate { .. })));
        let err = AdmissionConfig::from_lookup(lookup(&[(ENV_DEFAULT_IP_FAMILY, "IPv5")])).unwrap_err();
        assert!(matches!(err, ConfigError::IpFamily { .. }));
    }
}
