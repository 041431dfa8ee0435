use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use mcs_core::keyed::DEFAULT_PROTOCOL;
use mcs_core::{IpFamily, ServiceExport, ServiceImport, ServiceImportSpec};
use serde::{Deserialize, Serialize};

/// Inputs to defaulting that come from process configuration rather than the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultingConfig {
    /// `IPv6DualStack` feature gate.
    pub dual_stack: bool,
    pub default_ip_family: IpFamily,
}

impl Default for DefaultingConfig {
    fn default() -> Self {
        Self { dual_stack: false, default_ip_family: IpFamily::IPv4 }
    }
}

/// Fill unset fields deterministically. Must be idempotent and infallible.
pub trait SetDefaults {
    fn set_defaults(&mut self, cfg: &DefaultingConfig);
}

impl SetDefaults for ServiceExport {
    fn set_defaults(&mut self, _cfg: &DefaultingConfig) {}
}

impl SetDefaults for ServiceImport {
    fn set_defaults(&mut self, cfg: &DefaultingConfig) {
        set_import_spec_defaults(&mut self.spec, cfg);
    }
}

pub fn set_import_spec_defaults(spec: &mut ServiceImportSpec, cfg: &DefaultingConfig) {
    for sp in spec.ports.iter_mut() {
        if sp.protocol.as_deref().map_or(true, str::is_empty) {
            sp.protocol = Some(DEFAULT_PROTOCOL.to_string());
        }
        let unset = match &sp.target_port {
            None => true,
            Some(IntOrString::Int(0)) => true,
            Some(IntOrString::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if unset {
            sp.target_port = Some(IntOrString::Int(sp.port));
        }
    }
    if cfg.dual_stack && spec.ip_family.is_none() {
        spec.ip_family = Some(cfg.default_ip_family);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServicePort;

    fn import_with(ports: Vec<ServicePort>) -> ServiceImport {
        let mut imp = ServiceImport::new("prod", "web");
        imp.spec.ports = ports;
        imp
    }

    #[test]
    fn bare_port_gets_protocol_and_target() {
        let mut imp = import_with(vec![ServicePort { port: 80, ..Default::default() }]);
        imp.set_defaults(&DefaultingConfig::default());
        let p = &imp.spec.ports[0];
        assert_eq!(p.port, 80);
        assert_eq!(p.protocol.as_deref(), Some("TCP"));
        assert_eq!(p.target_port, Some(IntOrString::Int(80)));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut imp = import_with(vec![
            ServicePort { port: 53, protocol: Some(String::new()), target_port: Some(IntOrString::String(String::new())), ..Default::default() },
            ServicePort { port: 443, protocol: Some("UDP".into()), target_port: Some(IntOrString::Int(0)), ..Default::default() },
        ]);
        imp.set_defaults(&DefaultingConfig::default());
        assert_eq!(imp.spec.ports[0].protocol.as_deref(), Some("TCP"));
        assert_eq!(imp.spec.ports[0].target_port, Some(IntOrString::Int(53)));
        assert_eq!(imp.spec.ports[1].protocol.as_deref(), Some("UDP"));
        assert_eq!(imp.spec.ports[1].target_port, Some(IntOrString::Int(443)));
    }

    #[test]
    fn explicit_values_are_kept() {
        let mut imp = import_with(vec![ServicePort {
            port: 80,
            protocol: Some("SCTP".into()),
            target_port: Some(IntOrString::String("http".into())),
            ..Default::default()
        }]);
        imp.set_defaults(&DefaultingConfig::default());
        assert_eq!(imp.spec.ports[0].protocol.as_deref(), Some("SCTP"));
        assert_eq!(imp.spec.ports[0].target_port, Some(IntOrString::String("http".into())));
    }

    #[test]
    fn ip_family_only_with_dual_stack() {
        let mut imp = import_with(vec![]);
        imp.set_defaults(&DefaultingConfig::default());
        assert_eq!(imp.spec.ip_family, None);

        let cfg = DefaultingConfig { dual_stack: true, default_ip_family: IpFamily::IPv6 };
        imp.set_defaults(&cfg);
        assert_eq!(imp.spec.ip_family, Some(IpFamily::IPv6));

        imp.spec.ip_family = Some(IpFamily::IPv4);
        imp.set_defaults(&cfg);
        assert_eq!(imp.spec.ip_family, Some(IpFamily::IPv4));
    }

    #[test]
    fn defaulting_is_idempotent() {
        let cfg = DefaultingConfig { dual_stack: true, default_ip_family: IpFamily::IPv4 };
        let mut once = import_with(vec![
            ServicePort { port: 80, ..Default::default() },
            ServicePort { port: 8443, name: Some("https".into()), protocol: Some("TCP".into()), ..Default::default() },
        ]);
        once.set_defaults(&cfg);
        let mut twice = once.clone();
        twice.set_defaults(&cfg);
        assert_eq!(once, twice);

        let mut exp = ServiceExport::new("prod", "web");
        let before = exp.clone();
        exp.set_defaults(&cfg);
        assert_eq!(exp, before);
    }
}
