//! Shared test fixtures: an in-memory connection the peer can drive
//!
//! `MockConnection` records every operation, lets tests fire the callback
//! slots by hand, and can be scripted to fail or stall specific operations.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use peercall_rtc::conn::{
    OnConnectionStateFn, OnIceCandidateFn, OnIceStateFn, OnNegotiationNeededFn, OnTrackFn,
};
use peercall_rtc::{
    Connection, ConnectionState, Error, IceCandidate, IceConnectionState, Result,
    SessionDescription, SignalingState, Track, TrackEvent, TrackSender,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const MOCK_OFFER_SDP: &str = "v=0\r\nmock-offer\r\n";
pub const MOCK_ANSWER_SDP: &str = "v=0\r\nmock-answer\r\n";

/// Local/remote track used with the mock connection
pub struct FakeTrack {
    id: String,
}

impl FakeTrack {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_string() })
    }
}

impl Track for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }
}

/// Sending handle that records every replacement
pub struct FakeSender {
    /// Track ids passed to `replace_track`; `None` marks a stop
    pub replaced: Mutex<Vec<Option<String>>>,
    pub fail_replace: AtomicBool,
}

impl FakeSender {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replaced: Mutex::new(Vec::new()),
            fail_replace: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TrackSender for FakeSender {
    type Track = FakeTrack;

    async fn replace_track(&self, track: Option<Arc<FakeTrack>>) -> Result<()> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(Error::Transport("replace failed".to_string()));
        }
        self.replaced.lock().push(track.map(|t| t.id()));
        Ok(())
    }
}

/// Operations the peer performed on the connection, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    AddTrack { track_id: String, stream_id: String },
    CreateDataChannel(String),
    Stats,
    Close,
}

/// Two-phase gate stalling `create_offer` so tests can observe the
/// negotiation window deterministically
pub struct OfferGate {
    pub entered: Notify,
    pub release: Notify,
}

impl OfferGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[derive(Default)]
struct Handlers {
    negotiation: Mutex<Option<OnNegotiationNeededFn>>,
    candidate: Mutex<Option<OnIceCandidateFn>>,
    ice_state: Mutex<Option<OnIceStateFn>>,
    conn_state: Mutex<Option<OnConnectionStateFn>>,
    track: Mutex<Option<OnTrackFn<FakeTrack>>>,
}

/// Scriptable in-memory [`Connection`]
pub struct MockConnection {
    ops: Mutex<Vec<Op>>,
    handlers: Handlers,
    local_desc: Mutex<Option<SessionDescription>>,
    signaling: Mutex<SignalingState>,
    offer_gate: Mutex<Option<Arc<OfferGate>>>,
    pub fail_create_offer: AtomicBool,
    pub fail_create_answer: AtomicBool,
    /// When set, `add_track` returns no sending handle
    pub withhold_sender: AtomicBool,
    senders: Mutex<Vec<Arc<FakeSender>>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            handlers: Handlers::default(),
            local_desc: Mutex::new(None),
            signaling: Mutex::new(SignalingState::Stable),
            offer_gate: Mutex::new(None),
            fail_create_offer: AtomicBool::new(false),
            fail_create_answer: AtomicBool::new(false),
            withhold_sender: AtomicBool::new(false),
            senders: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, op: Op) {
        self.ops.lock().push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    /// Sending handles created so far, in creation order
    pub fn senders(&self) -> Vec<Arc<FakeSender>> {
        self.senders.lock().clone()
    }

    pub fn set_signaling_state(&self, state: SignalingState) {
        *self.signaling.lock() = state;
    }

    pub fn set_offer_gate(&self, gate: Arc<OfferGate>) {
        *self.offer_gate.lock() = Some(gate);
    }

    pub async fn fire_negotiation_needed(&self) {
        let fut = {
            let mut handler = self.handlers.negotiation.lock();
            handler.as_mut().map(|f| f())
        };
        if let Some(fut) = fut {
            fut.await;
        }
    }

    pub async fn fire_ice_candidate(&self, candidate: IceCandidate) {
        let fut = {
            let mut handler = self.handlers.candidate.lock();
            handler.as_mut().map(|f| f(candidate))
        };
        if let Some(fut) = fut {
            fut.await;
        }
    }

    pub async fn fire_ice_state(&self, state: IceConnectionState) {
        let fut = {
            let mut handler = self.handlers.ice_state.lock();
            handler.as_mut().map(|f| f(state))
        };
        if let Some(fut) = fut {
            fut.await;
        }
    }

    pub async fn fire_connection_state(&self, state: ConnectionState) {
        let fut = {
            let mut handler = self.handlers.conn_state.lock();
            handler.as_mut().map(|f| f(state))
        };
        if let Some(fut) = fut {
            fut.await;
        }
    }

    pub async fn fire_track(&self, event: TrackEvent<FakeTrack>) {
        let fut = {
            let mut handler = self.handlers.track.lock();
            handler.as_mut().map(|f| f(event))
        };
        if let Some(fut) = fut {
            fut.await;
        }
    }

    pub fn has_handlers(&self) -> bool {
        self.handlers.negotiation.lock().is_some()
            || self.handlers.candidate.lock().is_some()
            || self.handlers.ice_state.lock().is_some()
            || self.handlers.conn_state.lock().is_some()
            || self.handlers.track.lock().is_some()
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Track = FakeTrack;
    type RemoteTrack = FakeTrack;
    type Sender = FakeSender;

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(Op::CreateOffer);
        let gate = self.offer_gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_create_offer.load(Ordering::SeqCst) {
            return Err(Error::Transport("offer construction failed".to_string()));
        }
        Ok(SessionDescription::offer(MOCK_OFFER_SDP))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(Op::CreateAnswer);
        if self.fail_create_answer.load(Ordering::SeqCst) {
            return Err(Error::Transport("answer construction failed".to_string()));
        }
        Ok(SessionDescription::answer(MOCK_ANSWER_SDP))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(Op::SetLocal(desc.clone()));
        *self.local_desc.lock() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(Op::SetRemote(desc));
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local_desc.lock().clone()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(Op::AddCandidate(candidate));
        Ok(())
    }

    async fn add_track(
        &self,
        track: Arc<FakeTrack>,
        stream_id: &str,
    ) -> Result<Option<Arc<FakeSender>>> {
        self.record(Op::AddTrack {
            track_id: track.id(),
            stream_id: stream_id.to_string(),
        });
        if self.withhold_sender.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let sender = FakeSender::new();
        self.senders.lock().push(Arc::clone(&sender));
        Ok(Some(sender))
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        self.record(Op::CreateDataChannel(label.to_string()));
        Ok(())
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        self.record(Op::Stats);
        Ok(serde_json::json!({ "transport": "mock" }))
    }

    async fn close(&self) -> Result<()> {
        self.record(Op::Close);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        *self.signaling.lock()
    }

    fn on_negotiation_needed(&self, handler: Option<OnNegotiationNeededFn>) {
        *self.handlers.negotiation.lock() = handler;
    }

    fn on_ice_candidate(&self, handler: Option<OnIceCandidateFn>) {
        *self.handlers.candidate.lock() = handler;
    }

    fn on_ice_connection_state_change(&self, handler: Option<OnIceStateFn>) {
        *self.handlers.ice_state.lock() = handler;
    }

    fn on_connection_state_change(&self, handler: Option<OnConnectionStateFn>) {
        *self.handlers.conn_state.lock() = handler;
    }

    fn on_track(&self, handler: Option<OnTrackFn<FakeTrack>>) {
        *self.handlers.track.lock() = handler;
    }
}
