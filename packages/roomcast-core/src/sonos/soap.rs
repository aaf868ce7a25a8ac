//! Low-level SOAP transport for UPnP/Sonos communication.
//!
//! Handles envelope building, the HTTP POST to the speaker's control
//! endpoint, and fault extraction. The command modules (`transport`, `queue`,
//! `volume`, `device`) sit on top of this.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use super::services::SonosService;
use super::utils::{build_speaker_url, escape_xml, extract_xml_text};

/// Timeout for SOAP HTTP requests. LAN round-trips are fast; anything slower
/// than this means the speaker is gone or wedged.
const SOAP_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with Sonos speakers.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the speaker failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker returned a SOAP fault response.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Failed to parse a value out of the SOAP response.
    #[error("failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Returns true if this error is transient and the operation should be
    /// retried.
    ///
    /// Transient Sonos UPnP error codes:
    /// - 701: Transition not available (device changing states)
    /// - 714: Illegal seek target (previous source still loading)
    /// - 716: Resource not found (device busy initializing)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SoapError::Fault(msg) => {
                msg.contains("701")
                    || msg.contains("714")
                    || msg.contains("716")
                    || msg.to_lowercase().contains("transition")
            }
            SoapError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Sends a SOAP action to a speaker and returns the raw response body.
///
/// The envelope must be a single line with no whitespace before the root
/// element; the Sonos SOAP parser rejects anything else. SOAP faults are
/// checked before the HTTP status because Sonos reports faults with a 500.
pub async fn send_soap_request(
    client: &Client,
    ip: &str,
    service: SonosService,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let url = build_speaker_url(ip, service.control_path());

    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{urn}">"#,
        action = action,
        urn = service.urn()
    );
    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }
    body.push_str(&format!("</u:{action}></s:Body></s:Envelope>"));

    log::debug!("[SOAP] {}#{} -> {}", service.name(), action, url);

    let response = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{}#{}\"", service.urn(), action))
        .body(body)
        .timeout(SOAP_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if text.contains("<s:Fault>") || text.contains("<soap:Fault>") {
        let fault = extract_fault(&text).unwrap_or_else(|| "unknown SOAP fault".to_string());
        log::warn!("[SOAP] {}#{} fault from {}: {}", service.name(), action, ip, fault);
        return Err(SoapError::Fault(fault));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), text));
    }

    Ok(text)
}

/// Extracts the most useful description of a SOAP fault.
///
/// Prefers the UPnP `errorCode` (the faultstring is usually just
/// "UPnPError"), falling back to the faultstring itself.
fn extract_fault(xml: &str) -> Option<String> {
    if let Some(code) = extract_xml_text(xml, "errorCode") {
        let description = extract_xml_text(xml, "errorDescription").unwrap_or_default();
        if description.is_empty() {
            return Some(format!("UPnP error {}", code));
        }
        return Some(format!("UPnP error {} ({})", code, description));
    }
    extract_xml_text(xml, "faultstring")
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent builder for SOAP requests to Sonos speakers.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, "192.168.1.100")
///     .service(SonosService::RenderingControl)
///     .action("SetVolume")
///     .instance_id()
///     .arg("Channel", "Master")
///     .arg("DesiredVolume", "25")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    ip: &'a str,
    service: Option<SonosService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a builder targeting the speaker at `ip`.
    #[must_use]
    pub fn new(client: &'a Client, ip: &'a str) -> Self {
        Self {
            client,
            ip,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the Sonos service for this request.
    #[must_use]
    pub fn service(mut self, service: SonosService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument. Arguments appear in the SOAP body in insertion order.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard `InstanceID=0` argument used by AVTransport and
    /// RenderingControl actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sends the request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError::Fault` if service or action was never set, or the
    /// underlying transport error.
    pub async fn send(self) -> SoapResult<String> {
        let service = self
            .service
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: service not set".into()))?;
        let action = self
            .action
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: action not set".into()))?;

        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        send_soap_request(self.client, self.ip, service, action, &args).await
    }

    /// Returns the request parts without sending (for testing).
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(SonosService, &'a str, Vec<(&'a str, String)>)> {
        let service = self.service?;
        let action = self.action?;
        Some((service, action, self.args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        Client::new()
    }

    #[test]
    fn builder_captures_service_and_action() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::AVTransport)
            .action("Pause")
            .instance_id()
            .into_parts();

        let (service, action, args) = parts.expect("should have parts");
        assert_eq!(service, SonosService::AVTransport);
        assert_eq!(action, "Pause");
        assert_eq!(args, vec![("InstanceID", "0".to_string())]);
    }

    #[test]
    fn builder_preserves_argument_order() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::AVTransport)
            .action("Seek")
            .instance_id()
            .arg("Unit", "TRACK_NR")
            .arg("Target", "1")
            .into_parts();

        let (_, _, args) = parts.expect("should have parts");
        assert_eq!(
            args,
            vec![
                ("InstanceID", "0".to_string()),
                ("Unit", "TRACK_NR".to_string()),
                ("Target", "1".to_string()),
            ]
        );
    }

    #[test]
    fn into_parts_requires_service_and_action() {
        let client = test_client();
        assert!(SoapRequestBuilder::new(&client, "10.0.0.2")
            .action("Play")
            .into_parts()
            .is_none());
        assert!(SoapRequestBuilder::new(&client, "10.0.0.2")
            .service(SonosService::ContentDirectory)
            .into_parts()
            .is_none());
    }

    #[test]
    fn extract_fault_prefers_upnp_error_code() {
        let xml = r#"<s:Fault><faultstring>UPnPError</faultstring><detail><UPnPError><errorCode>701</errorCode></UPnPError></detail></s:Fault>"#;
        assert_eq!(extract_fault(xml).as_deref(), Some("UPnP error 701"));
    }

    #[test]
    fn extract_fault_falls_back_to_faultstring() {
        let xml = "<s:Fault><faultstring>boom</faultstring></s:Fault>";
        assert_eq!(extract_fault(xml).as_deref(), Some("boom"));
    }

    #[test]
    fn transient_faults_are_detected() {
        assert!(SoapError::Fault("UPnP error 701".into()).is_transient());
        assert!(SoapError::Fault("UPnP error 714".into()).is_transient());
        assert!(!SoapError::Fault("UPnP error 402".into()).is_transient());
        assert!(!SoapError::Parse.is_transient());
    }
}
