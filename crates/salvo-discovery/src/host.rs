//! Local address and name lookup for the advertised record.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// The IPv4 address other LAN hosts can reach this machine on.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outgoing interface, whose address is then read back. Falls back to
/// loopback when there is no route.
pub fn local_ipv4() -> Ipv4Addr {
    let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| socket.connect(("8.8.8.8", 80)).map(|()| socket))
        .and_then(|socket| socket.local_addr());

    match probe {
        Ok(addr) => match addr.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() => ip,
            other => {
                tracing::debug!(%other, "no usable IPv4 route, using loopback");
                Ipv4Addr::LOCALHOST
            }
        },
        Err(e) => {
            tracing::debug!(error = %e, "local address probe failed, using loopback");
            Ipv4Addr::LOCALHOST
        }
    }
}

/// This machine's host name.
///
/// Tries `HOSTNAME` / `COMPUTERNAME`, then `/etc/hostname`.
pub fn local_hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .chain(std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}
