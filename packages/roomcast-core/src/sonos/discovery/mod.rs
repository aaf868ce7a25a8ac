//! Sonos speaker discovery.
//!
//! Runs the enabled SSDP methods concurrently, merges their results by
//! normalized UUID, then resolves each device's metadata: the device
//! description XML provides the canonical UUID, friendly name, and model;
//! the Device Properties service provides the zone (room) name, which is
//! also how commands address the speaker.

pub mod ssdp;
pub mod types;

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::sonos::device;
use crate::sonos::utils::{device_description_url, extract_ip_from_location};

pub use ssdp::SsdpConfig;
pub use types::{
    normalize_uuid, DeviceInfo, DiscoveredSpeaker, DiscoveryError, DiscoveryMethod,
    DiscoveryResult, Speaker,
};

/// Configuration for a full discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Enable SSDP multicast discovery.
    pub multicast: bool,
    /// Enable SSDP broadcast discovery.
    pub broadcast: bool,
    /// SSDP tuning shared by both methods.
    pub ssdp: SsdpConfig,
    /// How many device descriptions to fetch concurrently.
    pub max_concurrent_fetches: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast: true,
            broadcast: true,
            ssdp: SsdpConfig::default(),
            max_concurrent_fetches: 8,
        }
    }
}

/// Discovers Sonos speakers on the local network.
///
/// Infrastructure devices (Boost/Bridge) are filtered out. The result is
/// sorted by UUID for stable output.
///
/// # Errors
/// Fails when every method is disabled, or when no usable network interface
/// exists. A method finding nothing is not an error.
pub async fn discover_speakers(
    client: &Client,
    config: &DiscoveryConfig,
) -> DiscoveryResult<Vec<Speaker>> {
    if !config.multicast && !config.broadcast {
        return Err(DiscoveryError::AllMethodsDisabled);
    }

    let multicast = async {
        if config.multicast {
            Some(ssdp::discover(&config.ssdp, DiscoveryMethod::Multicast).await)
        } else {
            None
        }
    };
    let broadcast = async {
        if config.broadcast {
            Some(ssdp::discover(&config.ssdp, DiscoveryMethod::Broadcast).await)
        } else {
            None
        }
    };

    let (multicast, broadcast) = tokio::join!(multicast, broadcast);

    let mut merged: HashMap<String, DiscoveredSpeaker> = HashMap::new();
    let mut last_error = None;
    let mut any_succeeded = false;

    for result in [multicast, broadcast].into_iter().flatten() {
        match result {
            Ok(found) => {
                any_succeeded = true;
                for speaker in found {
                    let key = normalize_uuid(&speaker.uuid);
                    match merged.entry(key) {
                        std::collections::hash_map::Entry::Occupied(mut e) => {
                            e.get_mut().merge(speaker);
                        }
                        std::collections::hash_map::Entry::Vacant(e) => {
                            e.insert(speaker);
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("[Discovery] method failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    if !any_succeeded {
        return Err(last_error.unwrap_or(DiscoveryError::NoInterfaces));
    }

    let discovered: Vec<DiscoveredSpeaker> = merged.into_values().collect();
    log::debug!(
        "[Discovery] {} unique device(s), resolving metadata",
        discovered.len()
    );

    let mut speakers: Vec<Speaker> = stream::iter(discovered)
        .map(|found| async move { resolve_speaker(client, found).await })
        .buffer_unordered(config.max_concurrent_fetches.max(1))
        .collect()
        .await;

    speakers.retain(|s| {
        if s.is_infrastructure_device() {
            log::debug!(
                "[Discovery] skipping infrastructure device {} ({:?})",
                s.address,
                s.model_name
            );
            false
        } else {
            true
        }
    });

    speakers.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    Ok(speakers)
}

/// Resolves a raw discovery record into a full `Speaker`.
///
/// Best-effort: a speaker that stops answering mid-resolution still ends up
/// in the result, with fallback values for whatever could not be fetched.
async fn resolve_speaker(client: &Client, found: DiscoveredSpeaker) -> Speaker {
    // The LOCATION host is authoritative for the address; the reply source
    // can be a secondary interface on multi-homed devices.
    let address = found
        .location
        .as_deref()
        .and_then(extract_ip_from_location)
        .unwrap_or_else(|| found.ip.clone());

    let description_url = found
        .location
        .clone()
        .unwrap_or_else(|| device_description_url(&address));

    let info = fetch_device_description(client, &description_url).await;

    let room = match device::get_zone_name(client, &address).await {
        Ok(zone) => zone,
        Err(e) => {
            log::debug!("[Discovery] GetZoneAttributes failed for {}: {}", address, e);
            None
        }
    };

    // The zone name is what people call the speaker; fall back to the
    // device description's friendly name, then to a synthetic label.
    let name = room
        .clone()
        .or_else(|| info.as_ref().map(|i| i.friendly_name.clone()))
        .unwrap_or_else(|| format!("Sonos ({})", address));

    Speaker {
        name,
        room: room.unwrap_or_else(|| "Unknown Room".to_string()),
        uuid: info
            .as_ref()
            .map(|i| normalize_uuid(&i.uuid))
            .unwrap_or_else(|| normalize_uuid(&found.uuid)),
        model_name: info.and_then(|i| i.model_name),
        address,
    }
}

/// Fetches and parses a device description XML document.
async fn fetch_device_description(client: &Client, url: &str) -> Option<DeviceInfo> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            log::debug!("[Discovery] description fetch failed for {}: {}", url, e);
            return None;
        }
    };
    let body = response.text().await.ok()?;
    parse_device_description(&body)
}

/// Parses the fields we need out of a device description document.
///
/// UDN and friendlyName are required; modelName is optional.
fn parse_device_description(xml: &str) -> Option<DeviceInfo> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut uuid = None;
    let mut friendly_name = None;
    let mut model_name = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"UDN" => {
                    uuid = reader.read_text(e.name()).ok().map(|t| t.into_owned());
                }
                b"friendlyName" => {
                    friendly_name = reader.read_text(e.name()).ok().map(|t| t.into_owned());
                }
                b"modelName" => {
                    model_name = reader.read_text(e.name()).ok().map(|t| t.into_owned());
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::trace!("[Discovery] device description parse error: {:?}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    match (uuid, friendly_name) {
        (Some(uuid), Some(friendly_name)) => Some(DeviceInfo {
            uuid,
            friendly_name,
            model_name,
        }),
        _ => None,
    }
}
