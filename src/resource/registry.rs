//! Resource Registry - static table of northbound resource kinds
//!
//! Every kind the pipeline knows about has one descriptor here. The table is
//! fixed at compile time and is the only place list commands are defined.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Northbound control utility every query goes through
pub const NBCTL: &str = "ovn-nbctl";

/// Flag asking `ovn-nbctl` for JSON output
pub const JSON_FORMAT_FLAG: &str = "--format=json";

/// Closed set of resource kinds, in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "logical_switch")]
    Switch,
    #[serde(rename = "logical_router")]
    Router,
    #[serde(rename = "logical_router_port")]
    RouterPort,
    #[serde(rename = "logical_switch_port")]
    SwitchPort,
    #[serde(rename = "load_balancer")]
    LoadBalancer,
    #[serde(rename = "acl")]
    Acl,
    #[serde(rename = "address_set")]
    AddressSet,
    #[serde(rename = "dhcp_options")]
    DhcpOptions,
    #[serde(rename = "qos")]
    Qos,
    #[serde(rename = "nat")]
    Nat,
}

impl ResourceKind {
    /// All kinds, in the order refreshes visit them
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Switch,
        ResourceKind::Router,
        ResourceKind::RouterPort,
        ResourceKind::SwitchPort,
        ResourceKind::LoadBalancer,
        ResourceKind::Acl,
        ResourceKind::AddressSet,
        ResourceKind::DhcpOptions,
        ResourceKind::Qos,
        ResourceKind::Nat,
    ];

    /// Stable key used for cache files and serialization
    pub fn key(self) -> &'static str {
        describe(self).key
    }

    /// Short label used when synthesizing names
    pub fn label(self) -> &'static str {
        describe(self).label
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ResourceKind {
    type Err = IngestError;

    /// Accepts the cache key (`logical_switch`), the label (`Switch`) or the
    /// northbound table name (`Logical_Switch`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        REGISTRY
            .iter()
            .find(|d| {
                d.key.eq_ignore_ascii_case(wanted)
                    || d.label.eq_ignore_ascii_case(wanted)
                    || d.table.eq_ignore_ascii_case(wanted)
            })
            .map(|d| d.kind)
            .ok_or_else(|| IngestError::UnknownKind(s.to_string()))
    }
}

/// Descriptor for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub key: &'static str,
    pub label: &'static str,
    /// Northbound table listed by `ovn-nbctl list`
    pub table: &'static str,
    pub json_supported: bool,
}

/// Descriptor for the per-router port listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortListing {
    pub verb: &'static str,
    pub json_supported: bool,
}

/// `lrp-list` only prints `uuid (name)` lines
pub const ROUTER_PORT_LISTING: PortListing = PortListing {
    verb: "lrp-list",
    json_supported: false,
};

const fn descriptor(
    kind: ResourceKind,
    key: &'static str,
    label: &'static str,
    table: &'static str,
) -> ResourceDescriptor {
    ResourceDescriptor {
        kind,
        key,
        label,
        table,
        json_supported: true,
    }
}

/// Indexed by `ResourceKind as usize`
static REGISTRY: [ResourceDescriptor; 10] = [
    descriptor(ResourceKind::Switch, "logical_switch", "Switch", "Logical_Switch"),
    descriptor(ResourceKind::Router, "logical_router", "Router", "Logical_Router"),
    descriptor(ResourceKind::RouterPort, "logical_router_port", "Port", "Logical_Router_Port"),
    descriptor(
        ResourceKind::SwitchPort,
        "logical_switch_port",
        "SwitchPort",
        "Logical_Switch_Port",
    ),
    descriptor(ResourceKind::LoadBalancer, "load_balancer", "LoadBalancer", "Load_Balancer"),
    descriptor(ResourceKind::Acl, "acl", "ACL", "ACL"),
    descriptor(ResourceKind::AddressSet, "address_set", "AddressSet", "Address_Set"),
    descriptor(ResourceKind::DhcpOptions, "dhcp_options", "DHCPOptions", "DHCP_Options"),
    descriptor(ResourceKind::Qos, "qos", "QoS", "QoS"),
    descriptor(ResourceKind::Nat, "nat", "NAT", "NAT"),
];

/// Get the descriptor for a kind
pub fn describe(kind: ResourceKind) -> &'static ResourceDescriptor {
    &REGISTRY[kind as usize]
}

/// Get all descriptors, in registry order
pub fn all_descriptors() -> &'static [ResourceDescriptor] {
    &REGISTRY
}

/// Build the command listing every resource of `kind`.
///
/// The JSON flag goes right after the `ovn-nbctl` verb, and only when the
/// kind supports it.
pub fn list_command(kind: ResourceKind, json: bool) -> Vec<String> {
    let desc = describe(kind);
    let mut command = vec![NBCTL.to_string()];

    if json && desc.json_supported {
        command.push(JSON_FORMAT_FLAG.to_string());
    }

    command.push("list".to_string());
    command.push(desc.table.to_string());
    command
}

/// Build the command listing the ports of one router
pub fn router_ports_command(router_id: &str) -> Vec<String> {
    vec![
        NBCTL.to_string(),
        ROUTER_PORT_LISTING.verb.to_string(),
        router_id.to_string(),
    ]
}
