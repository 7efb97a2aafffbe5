//! webrtc-rs implementation of the [`Connection`] trait

use super::{
    Connection, ConnectionState, IceConnectionState, OnConnectionStateFn, OnIceCandidateFn,
    OnIceStateFn, OnNegotiationNeededFn, OnTrackFn, SignalingState, TrackEvent, TrackSender,
};
use crate::config::RtcConfig;
use crate::media::{MediaStream, Track};
use crate::signaling::{IceCandidate, SdpType, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

impl From<webrtc::Error> for Error {
    fn from(err: webrtc::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Local media track backed by a webrtc-rs `TrackLocal`
///
/// The stream grouping of a webrtc-rs track (its msid) is fixed at track
/// construction, so group tracks by creating them with the intended stream id.
pub struct LocalTrack {
    inner: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    /// Wrap an existing webrtc-rs local track
    pub fn new(inner: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self { inner }
    }

    /// The wrapped webrtc-rs track
    pub fn inner(&self) -> &Arc<dyn TrackLocal + Send + Sync> {
        &self.inner
    }
}

impl Track for LocalTrack {
    fn id(&self) -> String {
        self.inner.id().to_string()
    }
}

impl Track for TrackRemote {
    fn id(&self) -> String {
        TrackRemote::id(self).to_string()
    }
}

/// Sending handle wrapping a webrtc-rs RTP sender
pub struct RtpSenderHandle {
    sender: Arc<RTCRtpSender>,
}

#[async_trait]
impl TrackSender for RtpSenderHandle {
    type Track = LocalTrack;

    async fn replace_track(&self, track: Option<Arc<LocalTrack>>) -> Result<()> {
        let inner = track.map(|t| Arc::clone(&t.inner));
        self.sender.replace_track(inner).await?;
        Ok(())
    }
}

/// Production [`Connection`] over a webrtc-rs `RTCPeerConnection`
pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcConnection {
    /// Allocate a peer connection with the given configuration
    pub async fn connect(config: &RtcConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone(),
                credential: server.credential.clone(),
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

        debug!("created webrtc peer connection");

        Ok(Arc::new(Self { pc }))
    }

    /// The underlying webrtc-rs peer connection, for advanced operations
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

fn description_to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let converted = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(Error::Transport(
                "rollback descriptions are not supported".to_string(),
            ))
        }
    };
    Ok(converted?)
}

fn description_from_rtc(desc: RTCSessionDescription) -> Option<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => return None,
    };
    Some(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

fn candidate_from_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn connection_state_from_rtc(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => ConnectionState::New,
    }
}

fn ice_state_from_rtc(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        RTCIceConnectionState::New | RTCIceConnectionState::Unspecified => IceConnectionState::New,
    }
}

#[async_trait]
impl Connection for WebRtcConnection {
    type Track = LocalTrack;
    type RemoteTrack = TrackRemote;
    type Sender = RtpSenderHandle;

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        description_from_rtc(offer)
            .ok_or_else(|| Error::Transport("offer has unspecified type".to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.pc.create_answer(None).await?;
        description_from_rtc(answer)
            .ok_or_else(|| Error::Transport("answer has unspecified type".to_string()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_local_description(description_to_rtc(desc)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_remote_description(description_to_rtc(desc)?).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc.local_description().await.and_then(description_from_rtc)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_track(
        &self,
        track: Arc<LocalTrack>,
        stream_id: &str,
    ) -> Result<Option<Arc<RtpSenderHandle>>> {
        if track.inner.stream_id() != stream_id {
            // msid is fixed at track construction; the requested grouping
            // cannot be applied retroactively
            warn!(
                requested = %stream_id,
                actual = %track.inner.stream_id(),
                "track already carries a different stream id"
            );
        }
        let sender = self.pc.add_track(Arc::clone(&track.inner)).await?;
        Ok(Some(Arc::new(RtpSenderHandle { sender })))
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        self.pc.create_data_channel(label, None).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        let report = self.pc.get_stats().await;
        Ok(serde_json::to_value(&report.reports)?)
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        match self.pc.signaling_state() {
            RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
            RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
            RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
            RTCSignalingState::Closed => SignalingState::Closed,
            RTCSignalingState::Stable | RTCSignalingState::Unspecified => SignalingState::Stable,
        }
    }

    fn on_negotiation_needed(&self, handler: Option<OnNegotiationNeededFn>) {
        match handler {
            Some(mut f) => self.pc.on_negotiation_needed(Box::new(move || f())),
            None => self
                .pc
                .on_negotiation_needed(Box::new(|| Box::pin(async {}))),
        }
    }

    fn on_ice_candidate(&self, handler: Option<OnIceCandidateFn>) {
        match handler {
            Some(mut f) => {
                self.pc
                    .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                        // None marks end-of-gathering; only discovered
                        // candidates are surfaced
                        let fut = candidate.and_then(|c| match c.to_json() {
                            Ok(init) => Some(f(candidate_from_init(init))),
                            Err(err) => {
                                warn!("failed to serialize local ICE candidate: {}", err);
                                None
                            }
                        });
                        match fut {
                            Some(fut) => fut,
                            None => Box::pin(async {}),
                        }
                    }))
            }
            None => self.pc.on_ice_candidate(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn on_ice_connection_state_change(&self, handler: Option<OnIceStateFn>) {
        match handler {
            Some(mut f) => self.pc.on_ice_connection_state_change(Box::new(
                move |state: RTCIceConnectionState| f(ice_state_from_rtc(state)),
            )),
            None => self
                .pc
                .on_ice_connection_state_change(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn on_connection_state_change(&self, handler: Option<OnConnectionStateFn>) {
        match handler {
            Some(mut f) => self.pc.on_peer_connection_state_change(Box::new(
                move |state: RTCPeerConnectionState| f(connection_state_from_rtc(state)),
            )),
            None => self
                .pc
                .on_peer_connection_state_change(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn on_track(&self, handler: Option<OnTrackFn<TrackRemote>>) {
        match handler {
            Some(mut f) => self
                .pc
                .on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                    let stream_id = track.stream_id();
                    let streams = if stream_id.is_empty() {
                        Vec::new()
                    } else {
                        vec![MediaStream::with_tracks(
                            stream_id.to_string(),
                            vec![Arc::clone(&track)],
                        )]
                    };
                    f(TrackEvent { track, streams })
                })),
            None => self.pc.on_track(Box::new(|_, _, _| Box::pin(async {}))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest body the SDP parser accepts
    const MINIMAL_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

    #[test]
    fn test_description_conversion_round_trip() {
        let desc = SessionDescription::answer(MINIMAL_SDP);
        let rtc = description_to_rtc(desc.clone()).unwrap();
        let back = description_from_rtc(rtc).unwrap();
        assert_eq!(back.kind, desc.kind);
        assert_eq!(back.sdp, desc.sdp);
    }

    #[test]
    fn test_rollback_description_is_rejected() {
        let desc = SessionDescription {
            kind: SdpType::Rollback,
            sdp: String::new(),
        };
        assert!(description_to_rtc(desc).is_err());
    }

    #[test]
    fn test_state_mappings() {
        assert_eq!(
            connection_state_from_rtc(RTCPeerConnectionState::Failed),
            ConnectionState::Failed
        );
        assert_eq!(
            ice_state_from_rtc(RTCIceConnectionState::Completed),
            IceConnectionState::Completed
        );
        assert_eq!(
            ice_state_from_rtc(RTCIceConnectionState::Unspecified),
            IceConnectionState::New
        );
    }

    #[tokio::test]
    async fn test_connect_with_default_config() {
        let conn = WebRtcConnection::connect(&RtcConfig::default()).await.unwrap();
        assert_eq!(conn.signaling_state(), SignalingState::Stable);
    }

    #[tokio::test]
    async fn test_offer_contains_data_channel_section() {
        let conn = WebRtcConnection::connect(&RtcConfig::empty()).await.unwrap();
        conn.create_data_channel("probe").await.unwrap();
        let offer = conn.create_offer().await.unwrap();
        assert_eq!(offer.kind, SdpType::Offer);
        assert!(offer.sdp.contains("application"));
    }
}
