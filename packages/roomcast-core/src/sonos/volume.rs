//! Volume and mute control for Sonos speakers.
//!
//! All operations go through the RenderingControl service on the Master
//! channel and address a single speaker.

use reqwest::Client;

use super::services::SonosService;
use super::soap::{SoapError, SoapRequestBuilder, SoapResult};
use super::utils::extract_xml_text;

/// Gets the speaker's current volume (0-100).
pub async fn get_volume(client: &Client, ip: &str) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("GetVolume")
        .instance_id()
        .arg("Channel", "Master")
        .send()
        .await?;

    extract_xml_text(&response, "CurrentVolume")
        .and_then(|v| v.trim().parse().ok())
        .ok_or(SoapError::Parse)
}

/// Sets the speaker's volume (0-100, values above 100 are clamped).
pub async fn set_volume(client: &Client, ip: &str, volume: u8) -> SoapResult<()> {
    let clamped = volume.min(100);

    SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("SetVolume")
        .instance_id()
        .arg("Channel", "Master")
        .arg("DesiredVolume", clamped.to_string())
        .send()
        .await?;

    Ok(())
}

/// Gets the speaker's mute state.
pub async fn get_mute(client: &Client, ip: &str) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("GetMute")
        .instance_id()
        .arg("Channel", "Master")
        .send()
        .await?;

    extract_xml_text(&response, "CurrentMute")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .ok_or(SoapError::Parse)
}

/// Sets the speaker's mute state.
pub async fn set_mute(client: &Client, ip: &str, mute: bool) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("SetMute")
        .instance_id()
        .arg("Channel", "Master")
        .arg("DesiredMute", if mute { "1" } else { "0" })
        .send()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::super::services::SonosService;
    use super::super::soap::SoapRequestBuilder;

    fn test_client() -> Client {
        Client::new()
    }

    // These tests verify the RenderingControl helpers build SOAP requests
    // with correct service, action, and arguments. This catches typos and
    // argument ordering issues that would otherwise only surface at runtime.

    #[test]
    fn get_volume_request_shape() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::RenderingControl)
            .action("GetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .into_parts();

        let (service, action, args) = parts.expect("should build request");
        assert_eq!(service, SonosService::RenderingControl);
        assert_eq!(action, "GetVolume");
        assert_eq!(
            args,
            vec![
                ("InstanceID", "0".to_string()),
                ("Channel", "Master".to_string()),
            ]
        );
    }

    #[test]
    fn set_volume_clamps_to_100() {
        let client = test_client();
        let volume: u8 = 130;

        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::RenderingControl)
            .action("SetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredVolume", volume.min(100).to_string())
            .into_parts();

        let (_, _, args) = parts.expect("should build request");
        assert_eq!(args[2], ("DesiredVolume", "100".to_string()));
    }

    #[test]
    fn set_mute_encodes_bool_as_digit() {
        let client = test_client();
        for (mute, expected) in [(true, "1"), (false, "0")] {
            let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
                .service(SonosService::RenderingControl)
                .action("SetMute")
                .instance_id()
                .arg("Channel", "Master")
                .arg("DesiredMute", if mute { "1" } else { "0" })
                .into_parts();

            let (_, action, args) = parts.expect("should build request");
            assert_eq!(action, "SetMute");
            assert_eq!(args[2], ("DesiredMute", expected.to_string()));
        }
    }
}
