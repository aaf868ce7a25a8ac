//! SSDP-based Sonos speaker discovery.
//!
//! Sends M-SEARCH queries for the ZonePlayer device type and collects the
//! unicast replies. Two transports are supported, because home networks are
//! inconsistent about multicast:
//!
//! - **Multicast**: standard SSDP M-SEARCH to 239.255.255.250:1900
//! - **Broadcast**: directed broadcast per interface, plus the limited
//!   broadcast address as a fallback
//!
//! Replies arrive unicast on the sending socket, so each interface task owns
//! one socket and handles both directions.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use super::types::{is_virtual_interface, DiscoveredSpeaker, DiscoveryError, DiscoveryMethod};

/// Standard SSDP multicast address and port.
const MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Limited broadcast address for the fallback send.
const LIMITED_BROADCAST_ADDR: &str = "255.255.255.255:1900";

/// SSDP search target for Sonos ZonePlayer devices.
const SONOS_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// Configuration for one SSDP discovery pass.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Number of M-SEARCH packets to send per interface.
    pub send_count: u64,
    /// Delay between M-SEARCH retransmissions.
    pub retry_delay: Duration,
    /// Total time to wait for replies.
    pub discovery_timeout: Duration,
    /// MX value (maximum response delay devices may pick, seconds).
    pub mx_value: u64,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            send_count: 3,
            retry_delay: Duration::from_millis(800),
            discovery_timeout: Duration::from_secs(5),
            mx_value: 1,
        }
    }
}

/// Builds the M-SEARCH request.
///
/// The HOST header always names the multicast address per the SSDP spec,
/// even when the packet goes out via broadcast.
fn build_msearch(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        mx, SONOS_SEARCH_TARGET
    )
}

/// A network interface usable for discovery.
#[derive(Debug, Clone)]
struct Interface {
    name: String,
    ip: Ipv4Addr,
    /// Directed broadcast address, assuming /24 when the netmask is unknown.
    broadcast: Ipv4Addr,
}

/// Enumerates non-loopback, non-virtual IPv4 interfaces.
fn usable_interfaces() -> Vec<Interface> {
    let netifas = match list_afinet_netifas() {
        Ok(list) => list,
        Err(e) => {
            log::warn!("[SSDP] failed to list network interfaces: {}", e);
            return Vec::new();
        }
    };

    netifas
        .into_iter()
        .filter_map(|(name, addr)| {
            if is_virtual_interface(&name) {
                return None;
            }
            let IpAddr::V4(ip) = addr else { return None };
            if ip.is_loopback() {
                return None;
            }
            let o = ip.octets();
            Some(Interface {
                name,
                ip,
                broadcast: Ipv4Addr::new(o[0], o[1], o[2], 255),
            })
        })
        .collect()
}

/// Binds a UDP socket on the given interface address.
///
/// SO_REUSEADDR (and SO_REUSEPORT on Unix) allow rapid restarts; the
/// multicast TTL of 4 follows the UPnP 1.0 recommendation.
fn bind_discovery_socket(iface_ip: Ipv4Addr, broadcast: bool) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] failed to set SO_REUSEADDR on {}: {}", iface_ip, e);
    }
    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] failed to set SO_REUSEPORT on {}: {}", iface_ip, e);
    }
    if let Err(e) = socket.set_multicast_ttl_v4(4) {
        log::warn!("[SSDP] failed to set multicast TTL on {}: {}", iface_ip, e);
    }
    if broadcast {
        if let Err(e) = socket.set_broadcast(true) {
            log::warn!("[SSDP] failed to set SO_BROADCAST on {}: {}", iface_ip, e);
        }
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    let bind_addr = SocketAddr::new(IpAddr::V4(iface_ip), 0);
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    UdpSocket::from_std(socket.into()).map_err(DiscoveryError::SocketBind)
}

/// Returns the value of an HTTP-style header line, case-insensitively.
fn header_value<'a>(response: &'a str, header: &str) -> Option<&'a str> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(header) {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Parses an M-SEARCH reply into a discovery record.
///
/// Returns `None` unless the reply carries Sonos markers and a `RINCON_`
/// UUID. The RINCON check is case-sensitive on purpose: Sonos UUIDs are
/// always uppercase.
fn parse_msearch_reply(
    response: &str,
    src_ip: &str,
    method: DiscoveryMethod,
) -> Option<DiscoveredSpeaker> {
    let lowered = response.to_lowercase();
    if !lowered.contains("sonos") && !lowered.contains("rincon") {
        return None;
    }

    let usn = header_value(response, "USN")?;
    let uuid_start = usn
        .as_bytes()
        .windows(5)
        .position(|w| w.eq_ignore_ascii_case(b"uuid:"))?
        + 5;
    let uuid = usn[uuid_start..]
        .split("::")
        .next()
        .unwrap_or_default()
        .to_string();

    if !uuid.starts_with("RINCON_") {
        return None;
    }

    match header_value(response, "LOCATION") {
        Some(location) => Some(DiscoveredSpeaker::with_location(
            src_ip.to_string(),
            uuid,
            location.to_string(),
            method,
        )),
        None => Some(DiscoveredSpeaker::new(src_ip.to_string(), uuid, method)),
    }
}

/// Runs one discovery pass over all usable interfaces.
///
/// Each interface gets its own socket and task; a task interleaves periodic
/// M-SEARCH sends with reply collection until the timeout elapses. Failures
/// on individual interfaces are logged and skipped.
pub async fn discover(
    config: &SsdpConfig,
    method: DiscoveryMethod,
) -> Result<Vec<DiscoveredSpeaker>, DiscoveryError> {
    let interfaces = usable_interfaces();
    if interfaces.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let use_broadcast = method == DiscoveryMethod::Broadcast;
    let message = build_msearch(config.mx_value);

    let mut tasks = Vec::new();
    for iface in interfaces {
        let socket = match bind_discovery_socket(iface.ip, use_broadcast) {
            Ok(s) => s,
            Err(e) => {
                log::warn!(
                    "[{}] skipping {} ({}): {}",
                    method,
                    iface.name,
                    iface.ip,
                    e
                );
                continue;
            }
        };

        let targets: Vec<String> = if use_broadcast {
            vec![
                format!("{}:1900", iface.broadcast),
                LIMITED_BROADCAST_ADDR.to_string(),
            ]
        } else {
            vec![MULTICAST_ADDR.to_string()]
        };

        tasks.push(run_interface(
            socket,
            iface,
            targets,
            message.clone(),
            config.clone(),
            method,
        ));
    }

    if tasks.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    log::debug!(
        "[{}] discovery pass over {} interface(s), {} send(s) at {}ms spacing",
        method,
        tasks.len(),
        config.send_count,
        config.retry_delay.as_millis()
    );

    let results = futures::future::join_all(tasks).await;
    let mut discovered: Vec<DiscoveredSpeaker> = results.into_iter().flatten().collect();

    // Deduplicate by UUID and sort for stable output.
    let mut seen = std::collections::HashSet::new();
    discovered.retain(|s| seen.insert(s.uuid.clone()));
    discovered.sort_by(|a, b| a.uuid.cmp(&b.uuid));

    log::debug!("[{}] found {} unique speaker(s)", method, discovered.len());
    Ok(discovered)
}

/// Send/receive loop for a single interface.
async fn run_interface(
    socket: UdpSocket,
    iface: Interface,
    targets: Vec<String>,
    message: String,
    config: SsdpConfig,
    method: DiscoveryMethod,
) -> Vec<DiscoveredSpeaker> {
    let deadline = Instant::now() + config.discovery_timeout;
    let mut next_send = Instant::now();
    let mut sends_left = config.send_count;
    let mut found = Vec::new();
    let mut buf = [0u8; 2048];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        if sends_left > 0 && now >= next_send {
            for target in &targets {
                if let Err(e) = socket.send_to(message.as_bytes(), target.as_str()).await {
                    log::warn!(
                        "[{}] M-SEARCH send failed on {} to {}: {}",
                        method,
                        iface.name,
                        target,
                        e
                    );
                }
            }
            sends_left -= 1;
            next_send = now + config.retry_delay;
        }

        // Wake up for the earlier of: next retransmission or the deadline.
        let wait_until = if sends_left > 0 && next_send < deadline {
            next_send
        } else {
            deadline
        };

        match timeout(wait_until - now, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, src))) => {
                let response = String::from_utf8_lossy(&buf[..len]);
                if let Some(speaker) =
                    parse_msearch_reply(&response, &src.ip().to_string(), method)
                {
                    log::debug!(
                        "[{}] reply from {} (uuid {}) via {}",
                        method,
                        speaker.ip,
                        speaker.uuid,
                        iface.name
                    );
                    found.push(speaker);
                }
            }
            Ok(Err(e)) => {
                log::warn!("[{}] recv error on {}: {}", method, iface.name, e);
            }
            Err(_) => {
                // Window elapsed; loop to either retransmit or hit the deadline.
            }
        }
    }

    found
}
