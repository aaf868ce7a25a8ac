//! Queue management for Sonos speakers.
//!
//! Clearing and rebuilding the speaker's play queue via AVTransport, and
//! reading it back via Content Directory.

use reqwest::Client;

use super::didl::{format_track_didl, parse_didl_items, QueueItem};
use super::services::SonosService;
use super::soap::{SoapError, SoapRequestBuilder, SoapResult};
use super::utils::extract_xml_text;

/// Content Directory object ID of the play queue.
const QUEUE_OBJECT_ID: &str = "Q:0";

/// Upper bound on queue entries fetched in one Browse call.
const BROWSE_PAGE_SIZE: u32 = 1000;

/// Removes every track from the speaker's queue.
pub async fn clear_queue(client: &Client, ip: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("RemoveAllTracksFromQueue")
        .instance_id()
        .send()
        .await?;
    Ok(())
}

/// Appends a track URI to the speaker's queue.
///
/// The title is embedded as DIDL-Lite metadata so controller apps display
/// something better than the raw URL. Returns the 1-based position the
/// speaker enqueued the track at.
pub async fn add_uri_to_queue(
    client: &Client,
    ip: &str,
    uri: &str,
    title: &str,
) -> SoapResult<u32> {
    let metadata = format_track_didl(title);

    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("AddURIToQueue")
        .instance_id()
        .arg("EnqueuedURI", uri)
        .arg("EnqueuedURIMetaData", metadata)
        .arg("DesiredFirstTrackNumberEnqueued", "0")
        .arg("EnqueueAsNext", "0")
        .send()
        .await?;

    extract_xml_text(&response, "FirstTrackNumberEnqueued")
        .and_then(|v| v.trim().parse().ok())
        .ok_or(SoapError::Parse)
}

/// Browses the speaker's play queue.
///
/// The Browse response wraps the DIDL-Lite payload XML-escaped inside the
/// `<Result>` element, so it is unescaped before parsing.
pub async fn browse_queue(client: &Client, ip: &str) -> SoapResult<Vec<QueueItem>> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::ContentDirectory)
        .action("Browse")
        .arg("ObjectID", QUEUE_OBJECT_ID)
        .arg("BrowseFlag", "BrowseDirectChildren")
        .arg("Filter", "*")
        .arg("StartingIndex", "0")
        .arg("RequestedCount", BROWSE_PAGE_SIZE.to_string())
        .arg("SortCriteria", "")
        .send()
        .await?;

    let escaped = extract_xml_text(&response, "Result").ok_or(SoapError::Parse)?;
    let didl = html_escape::decode_html_entities(&escaped);

    Ok(parse_didl_items(&didl))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        Client::new()
    }

    #[test]
    fn add_uri_request_shape() {
        let client = test_client();
        let metadata = format_track_didl("Some Song");

        // Replicate the builder calls from add_uri_to_queue()
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::AVTransport)
            .action("AddURIToQueue")
            .instance_id()
            .arg("EnqueuedURI", "http://192.168.1.5:8080/music/a.mp3")
            .arg("EnqueuedURIMetaData", metadata.clone())
            .arg("DesiredFirstTrackNumberEnqueued", "0")
            .arg("EnqueueAsNext", "0")
            .into_parts();

        let (service, action, args) = parts.expect("should build request");
        assert_eq!(service, SonosService::AVTransport);
        assert_eq!(action, "AddURIToQueue");
        assert_eq!(args.len(), 5);
        assert_eq!(args[0], ("InstanceID", "0".to_string()));
        assert_eq!(
            args[1],
            ("EnqueuedURI", "http://192.168.1.5:8080/music/a.mp3".to_string())
        );
        assert_eq!(args[2], ("EnqueuedURIMetaData", metadata));
        assert_eq!(args[4], ("EnqueueAsNext", "0".to_string()));
    }

    #[test]
    fn browse_request_shape() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "192.168.1.100")
            .service(SonosService::ContentDirectory)
            .action("Browse")
            .arg("ObjectID", QUEUE_OBJECT_ID)
            .arg("BrowseFlag", "BrowseDirectChildren")
            .arg("Filter", "*")
            .arg("StartingIndex", "0")
            .arg("RequestedCount", BROWSE_PAGE_SIZE.to_string())
            .arg("SortCriteria", "")
            .into_parts();

        let (service, action, args) = parts.expect("should build request");
        assert_eq!(service, SonosService::ContentDirectory);
        assert_eq!(action, "Browse");
        assert_eq!(args[0], ("ObjectID", "Q:0".to_string()));
        assert_eq!(args[1], ("BrowseFlag", "BrowseDirectChildren".to_string()));
    }

    #[test]
    fn browse_result_unescapes_before_didl_parse() {
        // Simulates the double-encoding of a Browse response: the DIDL
        // document arrives XML-escaped inside <Result>.
        let escaped = concat!(
            "&lt;DIDL-Lite xmlns:dc=\"http://purl.org/dc/elements/1.1/\" ",
            "xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\"&gt;",
            "&lt;item id=\"Q:0/1\" parentID=\"Q:0\" restricted=\"true\"&gt;",
            "&lt;dc:title&gt;Hello&lt;/dc:title&gt;",
            "&lt;/item&gt;&lt;/DIDL-Lite&gt;"
        );
        let soap = format!("<Result>{}</Result>", escaped);

        let inner = extract_xml_text(&soap, "Result").unwrap();
        let didl = html_escape::decode_html_entities(&inner);
        let items = parse_didl_items(&didl);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Hello");
    }
}
