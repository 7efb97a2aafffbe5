//! Peer-connection manager
//!
//! One [`RtcPeer`] per remote participant. It exclusively owns the underlying
//! connection, drives the offer/answer/candidate exchange, and emits
//! lifecycle events. Negotiation conflicts (glare) are resolved by always
//! playing the polite role: an incoming offer is accepted unconditionally,
//! even while a local offer is mid-flight, so the two sides can never
//! deadlock on simultaneous renegotiation.

use crate::conn::{Connection, ConnectionState, IceConnectionState, SignalingState, TrackSender};
use crate::media::{MediaStream, Track};
use crate::signaling::{IceCandidate, SessionDescription, SignalMessage};
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use peercall_events::{Emitter, Event, ListenerId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Label of the channel opened at construction to trigger early connectivity
/// establishment before any media track is added
pub const DATA_CHANNEL_LABEL: &str = "peercall-dc";

/// Kinds of events an [`RtcPeer`] emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerEventKind {
    /// Local offer ready to relay to the remote peer
    Offer,
    /// Local answer ready to relay to the remote peer
    Answer,
    /// Local ICE candidate discovered, to be relayed
    Candidate,
    /// ICE-level handshake reached connected state
    Connect,
    /// Connection ended; carries an error when it failed
    Close,
    /// Local offer generation failed
    Error,
    /// A remote media stream became available
    Stream,
}

impl PeerEventKind {
    /// Every kind an [`RtcPeer`] can emit
    pub const ALL: [PeerEventKind; 7] = [
        PeerEventKind::Offer,
        PeerEventKind::Answer,
        PeerEventKind::Candidate,
        PeerEventKind::Connect,
        PeerEventKind::Close,
        PeerEventKind::Error,
        PeerEventKind::Stream,
    ];
}

/// Event emitted by an [`RtcPeer`], parameterized by the remote track type
#[derive(Debug)]
pub enum PeerEvent<R> {
    /// Local offer ready to send
    Offer(SessionDescription),
    /// Local answer ready to send
    Answer(SessionDescription),
    /// Local ICE candidate to relay
    Candidate(IceCandidate),
    /// Transport-level handshake established
    Connect,
    /// Connection ended, with the failure cause if any
    Close(Option<Error>),
    /// Local offer generation failed
    Error(Error),
    /// Remote media stream available
    Stream(MediaStream<R>),
}

impl<R: Send + Sync> Event for PeerEvent<R> {
    type Kind = PeerEventKind;

    fn kind(&self) -> PeerEventKind {
        match self {
            PeerEvent::Offer(_) => PeerEventKind::Offer,
            PeerEvent::Answer(_) => PeerEventKind::Answer,
            PeerEvent::Candidate(_) => PeerEventKind::Candidate,
            PeerEvent::Connect => PeerEventKind::Connect,
            PeerEvent::Close(_) => PeerEventKind::Close,
            PeerEvent::Error(_) => PeerEventKind::Error,
            PeerEvent::Stream(_) => PeerEventKind::Stream,
        }
    }
}

/// Sets the negotiating flag for its lifetime; clearing happens in `Drop` so
/// every exit path of the offer window resets it
struct NegotiatingGuard(Arc<AtomicBool>);

impl NegotiatingGuard {
    fn hold(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for NegotiatingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Manager for one peer-to-peer media connection
///
/// Created per remote participant when a call session is established and
/// destroyed when that participant's media session ends; never recreated
/// mid-lifetime. All state transitions happen on delivery of a connection
/// callback or an explicit call ([`signal`](RtcPeer::signal),
/// [`add_track`](RtcPeer::add_track), ...).
pub struct RtcPeer<C: Connection> {
    /// Owned connection resource; `None` once destroyed
    conn: RwLock<Option<Arc<C>>>,

    /// Track id -> sending handle, for renegotiation-free replacement
    senders: Mutex<HashMap<String, Arc<C::Sender>>>,

    /// True only while a local offer is mid-flight; disambiguates glare
    negotiating: Arc<AtomicBool>,

    /// True once the aggregate connection state reported established
    connected: Arc<AtomicBool>,

    events: Arc<Emitter<PeerEvent<C::RemoteTrack>>>,
}

impl<C: Connection> RtcPeer<C> {
    /// Take ownership of a connection and wire it up
    ///
    /// Registers the five connection callbacks and opens a data channel so
    /// ICE/DTLS setup starts before any media track is added.
    pub async fn new(conn: Arc<C>) -> Result<Arc<Self>> {
        let peer = Arc::new(Self {
            conn: RwLock::new(Some(Arc::clone(&conn))),
            senders: Mutex::new(HashMap::new()),
            negotiating: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            events: Arc::new(Emitter::new()),
        });

        peer.install_handlers(&conn);
        conn.create_data_channel(DATA_CHANNEL_LABEL).await?;

        Ok(peer)
    }

    fn install_handlers(&self, conn: &Arc<C>) {
        let events = Arc::clone(&self.events);
        let negotiating = Arc::clone(&self.negotiating);
        let offer_conn = Arc::clone(conn);
        conn.on_negotiation_needed(Some(Box::new(move || {
            let events = Arc::clone(&events);
            let negotiating = Arc::clone(&negotiating);
            let conn = Arc::clone(&offer_conn);
            Box::pin(async move {
                let _guard = NegotiatingGuard::hold(&negotiating);
                match make_local_offer(conn.as_ref()).await {
                    Ok(offer) => {
                        events.emit(&PeerEvent::Offer(offer));
                    }
                    Err(err) => {
                        events.emit(&PeerEvent::Error(Error::NegotiationFailed(
                            err.to_string(),
                        )));
                    }
                }
            })
        })));

        let events = Arc::clone(&self.events);
        conn.on_ice_candidate(Some(Box::new(move |candidate| {
            let events = Arc::clone(&events);
            Box::pin(async move {
                events.emit(&PeerEvent::Candidate(candidate));
            })
        })));

        let events = Arc::clone(&self.events);
        conn.on_ice_connection_state_change(Some(Box::new(move |state| {
            let events = Arc::clone(&events);
            Box::pin(async move {
                match state {
                    IceConnectionState::Connected => {
                        events.emit(&PeerEvent::Connect);
                    }
                    IceConnectionState::Failed => {
                        events.emit(&PeerEvent::Close(Some(Error::ConnectionFailed)));
                    }
                    IceConnectionState::Closed => {
                        events.emit(&PeerEvent::Close(None));
                    }
                    _ => {}
                }
            })
        })));

        let events = Arc::clone(&self.events);
        let connected = Arc::clone(&self.connected);
        conn.on_connection_state_change(Some(Box::new(move |state| {
            let events = Arc::clone(&events);
            let connected = Arc::clone(&connected);
            Box::pin(async move {
                match state {
                    ConnectionState::Connected => {
                        connected.store(true, Ordering::SeqCst);
                    }
                    ConnectionState::Failed => {
                        events.emit(&PeerEvent::Close(Some(Error::ConnectionFailed)));
                    }
                    _ => {}
                }
            })
        })));

        let events = Arc::clone(&self.events);
        conn.on_track(Some(Box::new(move |ev| {
            let events = Arc::clone(&events);
            Box::pin(async move {
                // Normalize ungrouped tracks into a single-track stream so
                // consumers always receive a usable stream handle
                let stream = match ev.streams.into_iter().next() {
                    Some(stream) => stream,
                    None => MediaStream::from_track(ev.track),
                };
                events.emit(&PeerEvent::Stream(stream));
            })
        })));
    }

    /// Register a listener for one event kind
    pub fn on(
        &self,
        kind: PeerEventKind,
        callback: impl Fn(&PeerEvent<C::RemoteTrack>) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.on(kind, callback)
    }

    /// Remove a previously registered listener
    pub fn off(&self, kind: PeerEventKind, id: ListenerId) -> bool {
        self.events.off(kind, id)
    }

    /// Whether the aggregate connection state reported established
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether a local offer is currently mid-flight
    pub fn negotiating(&self) -> bool {
        self.negotiating.load(Ordering::SeqCst)
    }

    fn conn(&self) -> Result<Arc<C>> {
        self.conn.read().as_ref().map(Arc::clone).ok_or(Error::Destroyed)
    }

    /// Apply a remote signaling message
    ///
    /// `data` is the JSON payload delivered by the external transport, tagged
    /// by `type` (`candidate`, `offer` or `answer`). Messages must be applied
    /// in delivery order; the transport guarantees ordering per remote peer.
    ///
    /// An incoming offer is always accepted, even mid-negotiation: this side
    /// is the polite peer, so glare resolves deterministically without role
    /// negotiation. Accepting produces exactly one `Answer` event.
    ///
    /// # Errors
    ///
    /// [`Error::Destroyed`] after teardown, [`Error::InvalidSignal`] for
    /// malformed payloads or unrecognized `type` values, and any underlying
    /// failure from applying the message.
    pub async fn signal(&self, data: &str) -> Result<()> {
        let conn = self.conn()?;

        let msg: SignalMessage =
            serde_json::from_str(data).map_err(|err| Error::InvalidSignal(err.to_string()))?;

        if matches!(msg, SignalMessage::Offer { .. })
            && (self.negotiating() || conn.signaling_state() != SignalingState::Stable)
        {
            debug!("signaling conflict, we are polite, proceeding");
        }

        match msg {
            SignalMessage::Candidate { candidate } => {
                conn.add_ice_candidate(candidate).await?;
            }
            SignalMessage::Offer { sdp } => {
                conn.set_remote_description(SessionDescription::offer(sdp)).await?;
                let answer = conn.create_answer().await?;
                conn.set_local_description(answer).await?;
                let local = conn.local_description().await.ok_or_else(|| {
                    Error::Transport("no local description after answer".to_string())
                })?;
                self.events.emit(&PeerEvent::Answer(local));
            }
            SignalMessage::Answer { sdp } => {
                conn.set_remote_description(SessionDescription::answer(sdp)).await?;
            }
        }

        Ok(())
    }

    /// Attach a local track under the given stream grouping
    ///
    /// When the connection returns a sending handle it is recorded under the
    /// track's id so the track can later be swapped without renegotiating.
    pub async fn add_track(
        &self,
        track: Arc<C::Track>,
        stream: &MediaStream<C::Track>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let sender = conn.add_track(Arc::clone(&track), stream.id()).await?;
        if let Some(sender) = sender {
            self.senders.lock().insert(track.id(), sender);
        }
        Ok(())
    }

    /// Attach every track contained in the stream
    pub async fn add_stream(&self, stream: &MediaStream<C::Track>) -> Result<()> {
        for track in stream.tracks() {
            self.add_track(Arc::clone(track), stream).await?;
        }
        Ok(())
    }

    /// Swap the media payload under an existing sending handle
    ///
    /// Looks up the handle recorded for `old_track_id`; when `new_track`
    /// carries a different id the map entry is re-keyed to it. Passing `None`
    /// stops sending on that slot without removing it.
    ///
    /// # Errors
    ///
    /// [`Error::SenderNotFound`] when no handle is recorded for
    /// `old_track_id`.
    pub async fn replace_track(
        &self,
        old_track_id: &str,
        new_track: Option<Arc<C::Track>>,
    ) -> Result<()> {
        let sender = {
            let mut senders = self.senders.lock();
            let sender = senders
                .get(old_track_id)
                .map(Arc::clone)
                .ok_or_else(|| Error::SenderNotFound(old_track_id.to_string()))?;
            if let Some(track) = &new_track {
                let new_id = track.id();
                if new_id != old_track_id {
                    senders.remove(old_track_id);
                    senders.insert(new_id, Arc::clone(&sender));
                }
            }
            sender
        };

        sender.replace_track(new_track).await
    }

    /// Statistics snapshot of the underlying connection
    pub async fn stats(&self) -> Result<serde_json::Value> {
        self.conn()?.stats().await
    }

    /// Tear the peer down, releasing the connection and every listener
    ///
    /// Removes all listeners of every event kind, clears the five connection
    /// callbacks, closes the connection and drops it; the peer is unusable
    /// afterwards and emits nothing further.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyDestroyed`] when called a second time.
    pub async fn destroy(&self) -> Result<()> {
        let conn = self.conn.write().take().ok_or(Error::AlreadyDestroyed)?;

        debug!("destroying peer");

        for kind in PeerEventKind::ALL {
            self.events.remove_all(kind);
        }

        conn.on_negotiation_needed(None);
        conn.on_ice_candidate(None);
        conn.on_ice_connection_state_change(None);
        conn.on_connection_state_change(None);
        conn.on_track(None);

        let closed = conn.close().await;
        self.connected.store(false, Ordering::SeqCst);
        closed
    }
}

/// Generate and apply a local offer, returning the applied description
async fn make_local_offer<C: Connection>(conn: &C) -> Result<SessionDescription> {
    let offer = conn.create_offer().await?;
    conn.set_local_description(offer).await?;
    conn.local_description()
        .await
        .ok_or_else(|| Error::Transport("no local description after offer".to_string()))
}
