//! Peer-connection negotiation layer for real-time calls
//!
//! One [`RtcPeer`] manages a single peer-to-peer media connection: it owns
//! the underlying connection resource, mediates the offer/answer/ICE
//! exchange, tracks connection lifecycle and exposes track management to the
//! application. Signaling transport is out of scope — the peer only produces
//! and consumes JSON payloads, which the application relays however it likes.
//!
//! Glare (both sides detecting negotiation-needed at once) is resolved with
//! the perfect-negotiation pattern: this peer is always polite and accepts an
//! incoming offer unconditionally, so conflicting offers can never wedge the
//! exchange.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Application (call orchestration, UI)                │
//! │  ↓ events            ↑ signal()/add_track()          │
//! │  RtcPeer<C>  — negotiation state machine             │
//! │  ↓                                                   │
//! │  C: Connection — underlying resource behind a trait  │
//! │  └─ WebRtcConnection (webrtc-rs) in production       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use peercall_rtc::{PeerEvent, PeerEventKind, RtcConfig, RtcPeer, WebRtcConnection};
//!
//! # async fn example() -> peercall_rtc::Result<()> {
//! let conn = WebRtcConnection::connect(&RtcConfig::default()).await?;
//! let peer = RtcPeer::new(conn).await?;
//!
//! // Relay local offers through your signaling transport
//! peer.on(PeerEventKind::Offer, |event| {
//!     if let PeerEvent::Offer(desc) = event {
//!         println!("offer ready: {} bytes of SDP", desc.sdp.len());
//!     }
//! });
//!
//! // Feed remote signaling payloads back in
//! peer.signal(r#"{"type":"answer","sdp":"..."}"#).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod conn;
pub mod error;
pub mod media;
pub mod peer;
pub mod signaling;

pub use config::{IceServer, RtcConfig};
pub use conn::webrtc::{LocalTrack, RtpSenderHandle, WebRtcConnection};
pub use conn::{
    Connection, ConnectionState, IceConnectionState, SignalingState, TrackEvent, TrackSender,
};
pub use error::{Error, Result};
pub use media::{MediaStream, Track};
pub use peercall_events::ListenerId;
pub use peer::{PeerEvent, PeerEventKind, RtcPeer, DATA_CHANNEL_LABEL};
pub use signaling::{IceCandidate, SdpType, SessionDescription, SignalMessage};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
