use crate::k8s::Service;
use std::collections::BTreeSet;

/// Decides which named Service ports may be exposed through an endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortFilter {
    excluded: BTreeSet<String>,
}

impl PortFilter {
    pub const DEFAULT_EXCLUDED: [&'static str; 2] = ["ws", "p2p"];

    pub fn new(excluded: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            excluded: excluded.into_iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn is_available(&self, port_name: &str) -> bool {
        !port_name.is_empty() && !self.excluded.contains(port_name)
    }

    /// Returns the names of the service's eligible ports, in declaration order.
    ///
    /// Unnamed ports are never eligible since routes reference ports by name.
    pub fn eligible(&self, service: &Service) -> Vec<String> {
        service
            .spec
            .iter()
            .flat_map(|spec| spec.ports.iter().flatten())
            .filter_map(|port| port.name.as_deref())
            .filter(|name| self.is_available(name))
            .map(ToString::to_string)
            .collect()
    }
}

impl Default for PortFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXCLUDED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{ServicePort, ServiceSpec};

    fn mk_service(ports: &[Option<&str>]) -> Service {
        Service {
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .iter()
                        .enumerate()
                        .map(|(i, name)| ServicePort {
                            name: name.map(ToString::to_string),
                            port: 8000 + i as i32,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn excludes_defaults_and_unnamed() {
        let svc = mk_service(&[Some("rpc"), Some("ws"), None, Some("p2p"), Some("api")]);
        assert_eq!(PortFilter::default().eligible(&svc), vec!["rpc", "api"]);
    }

    #[test]
    fn custom_exclusions() {
        let svc = mk_service(&[Some("rpc"), Some("metrics")]);
        assert_eq!(PortFilter::new(["metrics"]).eligible(&svc), vec!["rpc"]);
        assert!(PortFilter::default().eligible(&Service::default()).is_empty());
    }
}
