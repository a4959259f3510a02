//! Signaling wire protocol: message types and reply shapes.
//!
//! The envelope is JSON with a `type` discriminator. Replies carry only
//! the fields clients key on; identifiers are camelCase on the wire.

use serde::Serialize;

use crate::model::PeerMetrics;

/// The closed set of inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    WhoHas,
    ReportSegment,
    RemoveSegment,
    RtcOffer,
    RtcAnswer,
    IceCandidate,
}

impl MessageType {
    /// Parse a wire discriminator; `None` for unknown types.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "WHO_HAS" => Some(MessageType::WhoHas),
            "REPORT_SEGMENT" => Some(MessageType::ReportSegment),
            "REMOVE_SEGMENT" => Some(MessageType::RemoveSegment),
            "RTC_OFFER" => Some(MessageType::RtcOffer),
            "RTC_ANSWER" => Some(MessageType::RtcAnswer),
            "ICE_CANDIDATE" => Some(MessageType::IceCandidate),
            _ => None,
        }
    }

    /// Whether this is one of the opaque RTC negotiation types relayed
    /// verbatim between peers.
    pub fn is_rtc_relay(self) -> bool {
        matches!(
            self,
            MessageType::RtcOffer | MessageType::RtcAnswer | MessageType::IceCandidate
        )
    }
}

/// Bootstrap message pushed right after registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerListMessage {
    pub movie_id: String,
    pub peers: Vec<String>,
}

/// One candidate peer in a `WHO_HAS` reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: String,
    pub metrics: PeerMetrics,
}

/// Reply to `WHO_HAS`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoHasReply {
    pub segment_id: String,
    pub peers: Vec<PeerInfo>,
}

/// Acknowledgement of a `REPORT_SEGMENT`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAck {
    pub segment_id: String,
}

/// Explicit error reply; the connection stays open.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types() {
        assert_eq!(MessageType::parse("WHO_HAS"), Some(MessageType::WhoHas));
        assert_eq!(
            MessageType::parse(" REPORT_SEGMENT "),
            Some(MessageType::ReportSegment)
        );
        assert_eq!(
            MessageType::parse("REMOVE_SEGMENT"),
            Some(MessageType::RemoveSegment)
        );
        assert_eq!(MessageType::parse("RTC_OFFER"), Some(MessageType::RtcOffer));
        assert_eq!(MessageType::parse("nonsense"), None);
        assert_eq!(MessageType::parse(""), None);
    }

    #[test]
    fn rtc_relay_classification() {
        assert!(MessageType::RtcOffer.is_rtc_relay());
        assert!(MessageType::RtcAnswer.is_rtc_relay());
        assert!(MessageType::IceCandidate.is_rtc_relay());
        assert!(!MessageType::WhoHas.is_rtc_relay());
    }

    #[test]
    fn replies_serialize_camel_case() {
        let reply = WhoHasReply {
            segment_id: "seg_0001.m4s".into(),
            peers: vec![],
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""segmentId":"seg_0001.m4s""#));
        assert!(json.contains(r#""peers":[]"#));
    }
}
