//! Upstream Feed Protocol
//!
//! Wire types for the AIS relay: one subscribe message naming bounding
//! boxes and message kinds, then a stream of typed JSON messages. Only
//! `PositionReport` and `ShipStaticData` are consumed; everything else is
//! skipped by the ingest loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default relay endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.aisstream.io/v0/stream";

/// Bounding box as `(min_lon, min_lat, max_lon, max_lat)`.
pub type BoundingBox = (f64, f64, f64, f64);

/// The subscribe message sent once per connection.
///
/// The relay expects corner pairs in `[lat, lon]` order, south-west corner
/// first.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    #[serde(rename = "FiltersShipMMSI", skip_serializing_if = "Vec::is_empty")]
    pub filters_ship_mmsi: Vec<String>,
    #[serde(rename = "FilterMessageTypes")]
    pub filter_message_types: Vec<String>,
}

impl SubscriptionRequest {
    pub fn new(api_key: &str, boxes: &[BoundingBox], mmsi_filter: &[String]) -> Self {
        SubscriptionRequest {
            api_key: api_key.to_string(),
            bounding_boxes: boxes.iter().map(|b| to_corner_pairs(*b)).collect(),
            filters_ship_mmsi: mmsi_filter.to_vec(),
            filter_message_types: vec![
                "PositionReport".to_string(),
                "ShipStaticData".to_string(),
            ],
        }
    }
}

/// Convert a `(min_lon, min_lat, max_lon, max_lat)` box to the relay's
/// `[[min_lat, min_lon], [max_lat, max_lon]]` corner pairs.
pub fn to_corner_pairs(bbox: BoundingBox) -> [[f64; 2]; 2] {
    let (min_lon, min_lat, max_lon, max_lat) = bbox;
    [[min_lat, min_lon], [max_lat, max_lon]]
}

/// Envelope of every downstream frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedMessage {
    #[serde(rename = "MessageType")]
    pub message_type: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<MessageBody>,
    /// Server-reported error text; presence ends the stream.
    #[serde(rename = "error")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "PositionReport")]
    pub position_report: Option<PositionReport>,
    #[serde(rename = "ShipStaticData")]
    pub ship_static_data: Option<ShipStaticData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionReport {
    #[serde(rename = "UserID")]
    pub user_id: Option<Value>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Sog")]
    pub sog: Option<f64>,
    #[serde(rename = "Cog")]
    pub cog: Option<f64>,
    #[serde(rename = "NavigationalStatus")]
    pub nav_status: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipStaticData {
    #[serde(rename = "UserID")]
    pub user_id: Option<Value>,
    #[serde(rename = "Name", alias = "ShipName")]
    pub name: Option<String>,
    #[serde(rename = "ImoNumber", alias = "IMO")]
    pub imo: Option<Value>,
    #[serde(rename = "CallSign")]
    pub callsign: Option<String>,
    #[serde(rename = "Type", alias = "ShipType")]
    pub shiptype: Option<Value>,
    #[serde(rename = "Destination", alias = "Dest")]
    pub destination: Option<String>,
    #[serde(rename = "Eta", alias = "ETA")]
    pub eta: Option<Value>,
    #[serde(rename = "MaximumStaticDraught", alias = "Draught")]
    pub draught: Option<Value>,
}

/// Render a loosely typed JSON value (string or number) as trimmed text.
/// Objects are compacted; null and empty strings become `None`.
pub fn value_text(value: &Option<Value>) -> Option<String> {
    let value = value.as_ref()?;
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || text == "null" {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_wire_format() {
        let sub = SubscriptionRequest::new(
            "key",
            &[(-6.0, 50.0, 10.5, 62.0)],
            &["273123456".to_string()],
        );
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["APIKey"], "key");
        // lat first, south-west corner first
        assert_eq!(json["BoundingBoxes"][0][0][0], 50.0);
        assert_eq!(json["BoundingBoxes"][0][0][1], -6.0);
        assert_eq!(json["BoundingBoxes"][0][1][0], 62.0);
        assert_eq!(json["FiltersShipMMSI"][0], "273123456");
        assert_eq!(json["FilterMessageTypes"][0], "PositionReport");
    }

    #[test]
    fn test_empty_mmsi_filter_is_omitted() {
        let sub = SubscriptionRequest::new("key", &[(0.0, 0.0, 1.0, 1.0)], &[]);
        let json = serde_json::to_string(&sub).unwrap();
        assert!(!json.contains("FiltersShipMMSI"));
    }

    #[test]
    fn test_parse_position_report() {
        let raw = r#"{"MessageType":"PositionReport","Message":{"PositionReport":
            {"UserID":273123456,"Latitude":54.63,"Longitude":19.89,"Sog":11.2,"Cog":231.0,
             "NavigationalStatus":0}}}"#;
        let msg: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.message_type.as_deref(), Some("PositionReport"));
        let pr = msg.message.unwrap().position_report.unwrap();
        assert_eq!(value_text(&pr.user_id).as_deref(), Some("273123456"));
        assert_eq!(pr.latitude, Some(54.63));
        assert_eq!(pr.nav_status, Some(0));
    }

    #[test]
    fn test_parse_static_data() {
        let raw = r#"{"MessageType":"ShipStaticData","Message":{"ShipStaticData":
            {"UserID":273123456,"Name":"AKADEMIK ","ImoNumber":9695523,"CallSign":"UBXU2",
             "Type":80,"Destination":"PRIMORSK","MaximumStaticDraught":12.4}}}"#;
        let msg: FeedMessage = serde_json::from_str(raw).unwrap();
        let sd = msg.message.unwrap().ship_static_data.unwrap();
        assert_eq!(sd.name.as_deref(), Some("AKADEMIK "));
        assert_eq!(value_text(&sd.imo).as_deref(), Some("9695523"));
        assert_eq!(value_text(&sd.shiptype).as_deref(), Some("80"));
        assert_eq!(value_text(&sd.draught).as_deref(), Some("12.4"));
    }

    #[test]
    fn test_parse_server_error() {
        let raw = r#"{"error":"Api Key Is Not Valid"}"#;
        let msg: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.error.as_deref(), Some("Api Key Is Not Valid"));
        assert!(msg.message_type.is_none());
    }

    #[test]
    fn test_value_text_edge_cases() {
        assert_eq!(value_text(&Some(Value::Null)), None);
        assert_eq!(value_text(&Some(Value::String("  ".to_string()))), None);
        assert_eq!(
            value_text(&Some(Value::String("null".to_string()))),
            None
        );
        assert_eq!(value_text(&None), None);
    }
}
