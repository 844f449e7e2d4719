use serde::{Deserialize, Serialize};

use super::{InterfaceAddress, NetworkInterface};

const LOOPBACK: &str = "lo";

/// Name prefixes of interfaces that never carry the host's own traffic:
/// loopback, bridges, tunnels, VPNs and container veths.
pub const DEFAULT_VIRTUAL_PREFIXES: &[&str] = &[
    "lo",
    "docker",
    "veth",
    "br-",
    "virbr",
    "tun",
    "tap",
    "wg",
    "tailscale",
    "dummy",
    "bond_slave",
    "sit",
    "ip6tnl",
];

/// Prefix table deciding which interface names are virtual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualNicPrefixes(Vec<String>);

impl VirtualNicPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.0.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl Default for VirtualNicPrefixes {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_PREFIXES.iter().copied())
    }
}

/// Display row for the interface listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub is_up: bool,
    pub speed_mbps: u32,
    pub is_default: bool,
    pub is_virtual: bool,
    pub addrs: Vec<InterfaceAddress>,
}

/// Picks the default interface and labels interfaces as virtual or physical
#[derive(Debug, Clone, Default)]
pub struct NicClassifier {
    prefixes: VirtualNicPrefixes,
}

impl NicClassifier {
    pub fn new(prefixes: VirtualNicPrefixes) -> Self {
        Self { prefixes }
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.prefixes.is_virtual(name)
    }

    /// Choose the interface that represents "the network".
    ///
    /// Up, non-virtual interfaces are ranked with IPv4-addressed ones
    /// first, then by name. Without a candidate the first non-loopback
    /// name wins, and `lo` is the last resort. The result depends only
    /// on the set of interfaces, not on their order.
    pub fn select_default(&self, interfaces: &[NetworkInterface]) -> String {
        let candidate = interfaces
            .iter()
            .filter(|iface| !self.is_virtual(&iface.name) && iface.is_up)
            .min_by(|a, b| {
                b.has_ipv4()
                    .cmp(&a.has_ipv4())
                    .then_with(|| a.name.cmp(&b.name))
            });

        if let Some(iface) = candidate {
            return iface.name.clone();
        }

        interfaces
            .iter()
            .map(|iface| iface.name.as_str())
            .filter(|name| *name != LOOPBACK)
            .min()
            .unwrap_or(LOOPBACK)
            .to_string()
    }

    /// Classified listing for display, sorted by name, loopback excluded
    pub fn list_interfaces(
        &self,
        interfaces: &[NetworkInterface],
        default_nic: &str,
    ) -> Vec<InterfaceInfo> {
        let mut listing: Vec<InterfaceInfo> = interfaces
            .iter()
            .filter(|iface| iface.name != LOOPBACK)
            .map(|iface| InterfaceInfo {
                name: iface.name.clone(),
                is_up: iface.is_up,
                speed_mbps: iface.speed_mbps,
                is_default: iface.name == default_nic,
                is_virtual: self.is_virtual(&iface.name),
                addrs: iface.addresses.clone(),
            })
            .collect();

        listing.sort_by(|a, b| a.name.cmp(&b.name));
        listing
    }
}
