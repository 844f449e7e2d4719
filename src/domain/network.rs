use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::NetworkMetrics;

/// Key under which connections to unowned local addresses are counted
pub const OTHER_KEY: &str = "other";
/// Key holding the sum over all interfaces
pub const TOTAL_KEY: &str = "Total";

/// Address family, serialized the way socket APIs name it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    #[serde(rename = "AF_INET")]
    Inet,
    #[serde(rename = "AF_INET6")]
    Inet6,
}

/// An address assigned to an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub family: AddressFamily,
    pub address: IpAddr,
}

impl From<IpAddr> for InterfaceAddress {
    fn from(address: IpAddr) -> Self {
        let family = match address {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        };
        Self { family, address }
    }
}

/// Network interface entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub is_up: bool,
    /// Link speed, 0 when the driver does not report one
    pub speed_mbps: u32,
    pub addresses: Vec<InterfaceAddress>,
    pub metrics: NetworkMetrics,
}

impl NetworkInterface {
    pub fn new(name: String, is_up: bool, metrics: NetworkMetrics) -> Self {
        Self {
            name,
            is_up,
            speed_mbps: 0,
            addresses: Vec::new(),
            metrics,
        }
    }

    pub fn with_speed(mut self, speed_mbps: u32) -> Self {
        self.speed_mbps = speed_mbps;
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<InterfaceAddress>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn has_ipv4(&self) -> bool {
        self.addresses
            .iter()
            .any(|a| a.family == AddressFamily::Inet)
    }
}

/// Transport of an inet socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

/// An open inet socket, reduced to what the connection counter needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InetConnection {
    pub local: IpAddr,
    pub transport: Transport,
}

impl InetConnection {
    pub fn new(local: IpAddr, transport: Transport) -> Self {
        Self { local, transport }
    }
}

/// Socket counts for one interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCount {
    pub tcp: u64,
    pub udp: u64,
}

impl ConnectionCount {
    fn add(&mut self, transport: Transport) {
        match transport {
            Transport::Tcp => self.tcp += 1,
            Transport::Udp => self.udp += 1,
        }
    }
}

/// Interface name (or `other` / `Total`) to socket counts
pub type ConnectionCounts = BTreeMap<String, ConnectionCount>;

/// Result used when sockets cannot be enumerated
pub fn unavailable_connection_counts() -> ConnectionCounts {
    ConnectionCounts::from([(TOTAL_KEY.to_string(), ConnectionCount::default())])
}

/// Attribute every socket to the interface owning its local address.
///
/// Wildcard listeners and addresses no interface claims land under
/// `other`. A `Total` entry is always present.
pub fn count_connections(
    interfaces: &[NetworkInterface],
    connections: &[InetConnection],
) -> ConnectionCounts {
    let mut owner: HashMap<IpAddr, &str> = HashMap::new();
    for iface in interfaces {
        for addr in &iface.addresses {
            owner.insert(addr.address, iface.name.as_str());
        }
    }

    let mut counts = ConnectionCounts::new();
    let mut total = ConnectionCount::default();

    for conn in connections {
        let key = owner
            .get(&conn.local.to_canonical())
            .copied()
            .unwrap_or(OTHER_KEY);
        counts.entry(key.to_string()).or_default().add(conn.transport);
        total.add(conn.transport);
    }

    counts.insert(TOTAL_KEY.to_string(), total);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn iface(name: &str, addrs: &[IpAddr]) -> NetworkInterface {
        NetworkInterface::new(name.to_string(), true, NetworkMetrics::zero())
            .with_addresses(addrs.iter().copied().map(InterfaceAddress::from).collect())
    }

    #[test]
    fn counts_per_interface_with_total() {
        let eth0: IpAddr = Ipv4Addr::new(10, 0, 0, 5).into();
        let lo: IpAddr = Ipv4Addr::LOCALHOST.into();
        let interfaces = vec![iface("eth0", &[eth0]), iface("lo", &[lo])];
        let conns = vec![
            InetConnection::new(eth0, Transport::Tcp),
            InetConnection::new(eth0, Transport::Tcp),
            InetConnection::new(eth0, Transport::Udp),
            InetConnection::new(lo, Transport::Tcp),
            InetConnection::new(Ipv4Addr::UNSPECIFIED.into(), Transport::Udp),
        ];

        let counts = count_connections(&interfaces, &conns);

        assert_eq!(counts["eth0"], ConnectionCount { tcp: 2, udp: 1 });
        assert_eq!(counts["lo"], ConnectionCount { tcp: 1, udp: 0 });
        assert_eq!(counts[OTHER_KEY], ConnectionCount { tcp: 0, udp: 1 });
        assert_eq!(counts[TOTAL_KEY], ConnectionCount { tcp: 3, udp: 2 });
    }

    #[test]
    fn ipv4_mapped_sockets_resolve_to_ipv4_owner() {
        let eth0 = Ipv4Addr::new(192, 168, 1, 2);
        let interfaces = vec![iface("eth0", &[eth0.into()])];
        let mapped = IpAddr::V6(eth0.to_ipv6_mapped());
        assert_ne!(mapped, IpAddr::from(eth0));

        let counts = count_connections(&interfaces, &[InetConnection::new(mapped, Transport::Tcp)]);

        assert_eq!(counts["eth0"].tcp, 1);
    }

    #[test]
    fn no_sockets_still_reports_total() {
        let counts = count_connections(&[], &[]);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[TOTAL_KEY], ConnectionCount::default());
        assert_eq!(counts, unavailable_connection_counts());
    }

    #[test]
    fn address_family_serializes_like_socket_api() {
        let addr = InterfaceAddress::from(IpAddr::from(Ipv4Addr::LOCALHOST));
        let json = serde_json::to_value(&addr).unwrap();
        assert_eq!(json["family"], "AF_INET");
        assert_eq!(json["address"], "127.0.0.1");
    }
}
