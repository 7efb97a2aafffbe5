//! Underlying peer-connection abstraction
//!
//! The peer layer depends only on this narrow capability set: description
//! exchange, ICE operations, track attachment, a data channel, stats, close,
//! and five callback slots. Expressing it as a trait keeps the manager free
//! of any concrete runtime and testable against an in-memory fake; the
//! production implementation over webrtc-rs lives in [`webrtc`].

pub mod webrtc;

use crate::media::{MediaStream, Track};
use crate::signaling::{IceCandidate, SessionDescription};
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Aggregate connection state of the underlying resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, connection not yet started
    New,
    /// Transports are being established
    Connecting,
    /// Connection established successfully
    Connected,
    /// Connectivity lost, may still recover
    Disconnected,
    /// Connection failed; terminal
    Failed,
    /// Connection closed
    Closed,
}

/// ICE transport state of the underlying resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    /// Gathering not yet started
    New,
    /// Candidate pairs being checked
    Checking,
    /// A usable candidate pair was found
    Connected,
    /// All checks finished with a usable pair
    Completed,
    /// Connectivity lost, may still recover
    Disconnected,
    /// No usable candidate pair; terminal
    Failed,
    /// ICE transport shut down
    Closed,
}

/// Signaling state of the description exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No exchange in flight
    Stable,
    /// A local offer has been applied
    HaveLocalOffer,
    /// A remote offer has been applied
    HaveRemoteOffer,
    /// A local provisional answer has been applied
    HaveLocalPranswer,
    /// A remote provisional answer has been applied
    HaveRemotePranswer,
    /// Connection closed
    Closed,
}

/// Payload of the remote-track callback
///
/// `streams` carries the sender's stream groupings for the track; it is empty
/// when the sender attached the track without any grouping.
pub struct TrackEvent<R> {
    /// The remote track that became available
    pub track: Arc<R>,
    /// Stream groupings the track arrived under
    pub streams: Vec<MediaStream<R>>,
}

/// Handler for the negotiation-needed callback
pub type OnNegotiationNeededFn =
    Box<dyn (FnMut() -> BoxFuture<'static, ()>) + Send + Sync>;

/// Handler for locally discovered ICE candidates
pub type OnIceCandidateFn =
    Box<dyn (FnMut(IceCandidate) -> BoxFuture<'static, ()>) + Send + Sync>;

/// Handler for ICE connection state changes
pub type OnIceStateFn =
    Box<dyn (FnMut(IceConnectionState) -> BoxFuture<'static, ()>) + Send + Sync>;

/// Handler for aggregate connection state changes
pub type OnConnectionStateFn =
    Box<dyn (FnMut(ConnectionState) -> BoxFuture<'static, ()>) + Send + Sync>;

/// Handler for remote tracks
pub type OnTrackFn<R> =
    Box<dyn (FnMut(TrackEvent<R>) -> BoxFuture<'static, ()>) + Send + Sync>;

/// Outbound transmission slot for one local track
///
/// The handle stays valid across track swaps, which is what makes
/// renegotiation-free replacement (mute/unmute, screen-share switching)
/// possible.
#[async_trait]
pub trait TrackSender: Send + Sync {
    /// Local track type this sender transmits
    type Track: Track;

    /// Swap the transmitted track; `None` stops sending on this slot
    /// without removing it
    async fn replace_track(&self, track: Option<Arc<Self::Track>>) -> Result<()>;
}

/// The underlying peer-connection resource
///
/// One instance per [`RtcPeer`](crate::RtcPeer); exclusively owned by it.
/// Callback slots accept `None` to clear a previously installed handler,
/// which teardown relies on.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Local track type accepted by [`add_track`](Connection::add_track)
    type Track: Track;
    /// Remote track type delivered by the track callback
    type RemoteTrack: Track;
    /// Sending handle returned by [`add_track`](Connection::add_track)
    type Sender: TrackSender<Track = Self::Track>;

    /// Generate a local offer description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Generate a local answer description for the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    /// Apply a remote description
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// The currently applied local description, if any
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply a remote ICE candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Attach a local track under the given stream grouping
    ///
    /// Returns the sending handle when the resource provides one.
    async fn add_track(
        &self,
        track: Arc<Self::Track>,
        stream_id: &str,
    ) -> Result<Option<Arc<Self::Sender>>>;

    /// Open a data channel with the given label
    async fn create_data_channel(&self, label: &str) -> Result<()>;

    /// Statistics snapshot of the connection
    async fn stats(&self) -> Result<serde_json::Value>;

    /// Close the connection and release its transports
    async fn close(&self) -> Result<()>;

    /// Current signaling state
    fn signaling_state(&self) -> SignalingState;

    /// Install or clear the negotiation-needed handler
    fn on_negotiation_needed(&self, handler: Option<OnNegotiationNeededFn>);

    /// Install or clear the local-ICE-candidate handler
    fn on_ice_candidate(&self, handler: Option<OnIceCandidateFn>);

    /// Install or clear the ICE-state handler
    fn on_ice_connection_state_change(&self, handler: Option<OnIceStateFn>);

    /// Install or clear the aggregate-state handler
    fn on_connection_state_change(&self, handler: Option<OnConnectionStateFn>);

    /// Install or clear the remote-track handler
    fn on_track(&self, handler: Option<OnTrackFn<Self::RemoteTrack>>);
}
