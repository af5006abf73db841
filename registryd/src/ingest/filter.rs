use std::net::IpAddr;
use anyhow::{Context, Result};

/// An address range in CIDR notation, e.g. `100.64.0.0/10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    pub fn parse(cidr: &str) -> Result<Self> {
        let cidr = cidr.trim();
        let (addr, prefix) = match cidr.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr, None),
        };
        let addr: IpAddr = addr
            .parse()
            .with_context(|| format!("Invalid network address: {}", cidr))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .with_context(|| format!("Invalid prefix length: {}", cidr))?,
            None => max,
        };
        Ok(Self { addr, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                prefix_matches(u32::from(net) as u128, u32::from(ip) as u128, self.prefix, 32)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                prefix_matches(u128::from(net), u128::from(ip), self.prefix, 128)
            }
            _ => false,
        }
    }
}

fn prefix_matches(net: u128, ip: u128, prefix: u8, bits: u32) -> bool {
    if prefix == 0 {
        return true;
    }
    let shift = bits - prefix as u32;
    (net >> shift) == (ip >> shift)
}

/// Decides which source addresses may register servers.
///
/// Loopback, private, link-local and unspecified addresses are always
/// refused, plus any configured networks.
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    ignored: Vec<Network>,
}

impl AddressFilter {
    pub fn new(ignored_networks: &[String]) -> Result<Self> {
        let ignored = ignored_networks
            .iter()
            .map(|n| Network::parse(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ignored })
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        !is_reserved(ip) && !self.ignored.iter().any(|n| n.contains(ip))
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link-local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_reserved_ranges_refused() {
        let filter = AddressFilter::default();
        for addr in ["127.0.0.1", "10.1.2.3", "192.168.0.5", "172.16.4.4", "169.254.1.1", "::1", "fe80::1", "fd00::1", "::ffff:192.168.0.1"] {
            assert!(!filter.allows(ip(addr)), "{} should be refused", addr);
        }
        assert!(filter.allows(ip("1.2.3.4")));
        assert!(filter.allows(ip("2001:db8::1")));
    }

    #[test]
    fn test_configured_networks_refused() {
        let filter = AddressFilter::new(&["100.64.0.0/10".to_string(), "1.2.3.4".to_string()]).unwrap();
        assert!(!filter.allows(ip("100.100.1.1")));
        assert!(!filter.allows(ip("1.2.3.4")));
        assert!(filter.allows(ip("1.2.3.5")));
        assert!(filter.allows(ip("100.128.0.1")));
    }

    #[test]
    fn test_invalid_networks_rejected() {
        assert!(AddressFilter::new(&["1.2.3.0/33".to_string()]).is_err());
        assert!(AddressFilter::new(&["not-a-network".to_string()]).is_err());
    }

    #[test]
    fn test_zero_prefix_matches_family() {
        let any_v4 = Network::parse("0.0.0.0/0").unwrap();
        assert!(any_v4.contains(ip("8.8.8.8")));
        assert!(!any_v4.contains(ip("2001:db8::1")));
    }
}
