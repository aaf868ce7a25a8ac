//! Device Properties queries.

use reqwest::Client;

use super::services::SonosService;
use super::soap::{SoapRequestBuilder, SoapResult};
use super::utils::extract_xml_text;

/// Gets the zone (room) name a speaker is configured with.
///
/// Returns `None` when the speaker answers but reports an empty zone name,
/// which happens on factory-fresh devices.
pub async fn get_zone_name(client: &Client, ip: &str) -> SoapResult<Option<String>> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::DeviceProperties)
        .action("GetZoneAttributes")
        .send()
        .await?;

    let zone = extract_xml_text(&response, "CurrentZoneName")
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty());

    Ok(zone)
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::super::services::SonosService;
    use super::super::soap::SoapRequestBuilder;
    use super::super::utils::extract_xml_text;

    #[test]
    fn zone_attributes_request_has_no_instance_id() {
        // DeviceProperties actions take no InstanceID argument.
        let client = Client::new();
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::DeviceProperties)
            .action("GetZoneAttributes")
            .into_parts();

        let (service, action, args) = parts.expect("should build request");
        assert_eq!(service, SonosService::DeviceProperties);
        assert_eq!(action, "GetZoneAttributes");
        assert!(args.is_empty());
    }

    #[test]
    fn zone_name_extraction() {
        let response = concat!(
            r#"<u:GetZoneAttributesResponse xmlns:u="urn:schemas-upnp-org:service:DeviceProperties:1">"#,
            "<CurrentZoneName>Living Room</CurrentZoneName>",
            "<CurrentIcon>x-rincon-roomicon:living</CurrentIcon>",
            "</u:GetZoneAttributesResponse>"
        );
        assert_eq!(
            extract_xml_text(response, "CurrentZoneName").as_deref(),
            Some("Living Room")
        );
    }
}
