//! Shared helpers for talking to Sonos devices.

/// TCP port of the Sonos UPnP control server.
pub(crate) const SONOS_CONTROL_PORT: u16 = 1400;

/// Builds the URL for a control endpoint on a speaker.
#[must_use]
pub fn build_speaker_url(ip: &str, endpoint: &str) -> String {
    format!("http://{}:{}{}", ip, SONOS_CONTROL_PORT, endpoint)
}

/// Builds the device description URL for a speaker.
#[must_use]
pub fn device_description_url(ip: &str) -> String {
    build_speaker_url(ip, "/xml/device_description.xml")
}

/// Escapes the five XML special characters (& < > " ').
///
/// Used for SOAP argument values and DIDL-Lite text content.
#[must_use]
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Extracts the text content of the first `<tag>...</tag>` element.
///
/// Sonos SOAP responses are flat and predictable, so a plain substring scan
/// is sufficient here; structured payloads (device descriptions, DIDL-Lite)
/// go through `quick-xml` instead. Matches both `<tag>` and `<tag attr=..>`
/// forms and returns the raw inner text, still XML-escaped.
#[must_use]
pub fn extract_xml_text(xml: &str, tag: &str) -> Option<String> {
    let close = format!("</{}>", tag);
    let open_exact = format!("<{}>", tag);
    let open_attrs = format!("<{} ", tag);

    let content_start = if let Some(idx) = xml.find(&open_exact) {
        idx + open_exact.len()
    } else {
        let idx = xml.find(&open_attrs)?;
        xml[idx..].find('>').map(|gt| idx + gt + 1)?
    };

    let content_end = xml[content_start..].find(&close)? + content_start;
    Some(xml[content_start..content_end].to_string())
}

/// Extracts the host part of an SSDP LOCATION URL.
///
/// Locations look like `http://192.168.4.20:1400/xml/device_description.xml`.
#[must_use]
pub fn extract_ip_from_location(location: &str) -> Option<String> {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))?;
    let host_port = rest.split('/').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
