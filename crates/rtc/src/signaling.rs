//! Signaling wire contract
//!
//! The only payload format shared with the external signaling transport: a
//! JSON object tagged by `"type"`. Offers and answers are session
//! descriptions, candidates wrap a browser-form ICE candidate object. Any
//! other `type` value is rejected by the peer as invalid signaling data.

use serde::{Deserialize, Serialize};

/// Incoming signaling message, tagged by the `type` field
///
/// Offer and answer messages *are* session descriptions on the wire
/// (`{"type": "offer", "sdp": "..."}`), so their SDP is inlined here and
/// unknown extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Remote ICE candidate to apply to the connection
    Candidate {
        /// The candidate object as produced by the remote peer
        candidate: IceCandidate,
    },
    /// Remote offer; the polite peer always accepts and answers
    Offer {
        /// Offer SDP
        sdp: String,
    },
    /// Remote answer completing a negotiation this side initiated
    Answer {
        /// Answer SDP
        sdp: String,
    },
}

/// SDP message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Session offer
    Offer,
    /// Provisional answer
    Pranswer,
    /// Final answer
    Answer,
    /// Rollback of a provisional description
    Rollback,
}

/// A session description, in browser JSON form (`{"type", "sdp"}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Whether this describes an offer or an answer
    #[serde(rename = "type")]
    pub kind: SdpType,

    /// The SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// An offer description with the given SDP
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// An answer description with the given SDP
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate in browser JSON form
///
/// Field names follow `RTCIceCandidateInit` (camelCase) so candidates relayed
/// from browser peers deserialize as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate attribute line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description the candidate belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,

    /// ICE username fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}
