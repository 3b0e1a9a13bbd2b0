//! Message Dispatcher (§4.3): selects a message processing model by
//! version, selects a transport by address class, and owns the
//! pending-request engine's resend sink.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use codec::mp;
use codec::mp::v3::{OutgoingV3, UsmContext, UsmUser};
use codec::oid::Oid;
use codec::pdu::{AnyPdu, Pdu, PduType, VarBind, Value};
use codec::report::ReportReason;
use parking_lot::Mutex;

use crate::address::Direction;
use crate::handle::HandleAllocator;
use crate::pending::{PendingRequestEngine, ResendSink, ResponseEvent};
use crate::registry::TransportRegistry;
use crate::target::{SecurityParams, Target};
use crate::transport::Transport;
use crate::{Error, Result};

pub struct Listener {
    pub f: Box<dyn Fn(AnyPdu, Vec<u8>) + Send + Sync>,
}

struct Inner {
    registry: TransportRegistry,
    handles: HandleAllocator,
    usm: Mutex<UsmContext>,
    msg_id: AtomicI32,
    unsolicited: Mutex<Option<Listener>>,
    /// RFC 5343 discovery cache: peer address -> last discovered
    /// contextEngineID, consulted before sending a ScopedPDU whose target
    /// has no contextEngineID configured.
    context_cache: Mutex<AHashMap<SocketAddr, Vec<u8>>>,
}

struct Sink(Weak<Inner>);

impl ResendSink for Sink {
    fn resend(&self, _handle: i32, target: &Target, pdu: &AnyPdu) -> std::result::Result<(), crate::Error> {
        let inner = self.0.upgrade().ok_or(Error::NoTransport)?;
        encode_and_send(&inner, target, pdu.clone())
    }
}

/// Ties together the transport registry, the wire codec's message
/// processing models, and the pending-request engine. One `Dispatcher`
/// per local engine / security context, shared via `Arc` across
/// transports and the session facade.
pub struct Dispatcher {
    inner: Arc<Inner>,
    pending: PendingRequestEngine<Sink>,
    /// Lets `send_with_context_discovery` hand itself an `Arc<Dispatcher>`
    /// for the discovery continuation spawned on `tokio::spawn`.
    self_weak: Weak<Dispatcher>,
}

impl Dispatcher {
    pub fn new(local_engine_id: Vec<u8>) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let inner = Arc::new(Inner {
                registry: TransportRegistry::new(),
                handles: HandleAllocator::new(),
                usm: Mutex::new(UsmContext::new(local_engine_id)),
                msg_id: AtomicI32::new(1),
                unsolicited: Mutex::new(None),
                context_cache: Mutex::new(AHashMap::default()),
            });
            let sink = Arc::new(Sink(Arc::downgrade(&inner)));
            let pending = PendingRequestEngine::new(sink);
            Self {
                inner,
                pending,
                self_weak: weak.clone(),
            }
        })
    }

    pub fn registry(&self) -> &TransportRegistry {
        &self.inner.registry
    }

    pub fn register_transport(&self, direction: Direction, transport: Arc<dyn Transport>) {
        self.inner.registry.register(direction, transport);
    }

    pub fn add_usm_user(&self, user: UsmUser) {
        self.inner.usm.lock().add_user(user);
    }

    pub fn on_unsolicited(&self, f: impl Fn(AnyPdu, Vec<u8>) + Send + Sync + 'static) {
        *self.inner.unsolicited.lock() = Some(Listener { f: Box::new(f) });
    }

    /// Encodes and sends `pdu` to `target`, tracking it in the
    /// pending-request engine if it is a confirmed PDU type.
    ///
    /// Two corrections happen before a confirmed request is registered:
    /// a GETBULK aimed at a v1 target is coerced to GETNEXT (§4.3 outbound
    /// step 4, v1 has no GETBULK), and a v3/USM target with an empty
    /// contextEngineID is routed through RFC 5343 discovery first.
    pub fn send_pdu(&self, mut target: Target, mut pdu: AnyPdu) -> Result<PendingResponse> {
        if target.version == codec::message::VERSION_V1 {
            if let AnyPdu::Standard(inner) = &mut pdu {
                if inner.ty == PduType::GetBulkRequest {
                    inner.ty = PduType::GetNextRequest;
                    inner.error_status = codec::pdu::ErrorStatus::NoError;
                    inner.error_index = 0;
                }
            }
        }

        let confirmed = match &pdu {
            AnyPdu::Standard(inner) => inner.ty.is_confirmed(),
            AnyPdu::V1Trap(_) => false,
        };

        if confirmed {
            if let SecurityParams::Usm { context_engine_id, .. } = &target.security {
                if context_engine_id.is_empty() {
                    match self.inner.context_cache.lock().get(&target.peer).cloned() {
                        Some(cached) => set_context_engine_id(&mut target, cached),
                        None => return self.send_with_context_discovery(target, pdu),
                    }
                }
            }
        }

        self.send_pdu_assigned(target, pdu)
    }

    /// Allocates a handle, stamps it into the PDU, and either encodes a
    /// fire-and-forget send or registers a confirmed request with the
    /// pending-request engine. Shared by `send_pdu` and the post-discovery
    /// re-send, which must allocate a *new* handle for the real request.
    fn send_pdu_assigned(&self, target: Target, mut pdu: AnyPdu) -> Result<PendingResponse> {
        let handle = self.inner.handles.next();
        if let AnyPdu::Standard(inner) = &mut pdu {
            inner.request_id = handle;
        }

        let confirmed = match &pdu {
            AnyPdu::Standard(inner) => inner.ty.is_confirmed(),
            AnyPdu::V1Trap(_) => false,
        };

        if !confirmed {
            encode_and_send(&self.inner, &target, pdu)?;
            return Ok(PendingResponse::fire_and_forget());
        }

        let rx = self.pending.send(handle, target, pdu);
        Ok(PendingResponse { handle, rx: Some(rx) })
    }

    /// RFC 5343 contextEngineID discovery: sends a `GET` on `snmpEngineID`
    /// with contextEngineID set to our own engine ID, then re-sends the
    /// real request — under a new handle — once the peer's contextEngineID
    /// is known, caching it for subsequent sends to the same peer.
    fn send_with_context_discovery(&self, target: Target, pdu: AnyPdu) -> Result<PendingResponse> {
        let dispatcher = self.self_weak.upgrade().ok_or(Error::NoTransport)?;
        let local_engine_id = self.inner.usm.lock().local_engine_id.clone();

        let mut discovery_target = target.clone();
        set_context_engine_id(&mut discovery_target, local_engine_id);
        let discovery_pdu = AnyPdu::Standard(Pdu::new(
            PduType::GetRequest,
            0,
            vec![VarBind::new(snmp_engine_id_oid(), Value::Null)],
        ));

        let discovery = self.send_pdu_assigned(discovery_target, discovery_pdu)?;
        let handle = discovery.handle;
        let peer = target.peer;

        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let discovered = match discovery.wait().await {
                Some(ResponseEvent::Response(AnyPdu::Standard(response))) => {
                    response.var_binds.first().and_then(|vb| match &vb.value {
                        Value::OctetString(bytes) => Some(bytes.clone()),
                        _ => None,
                    })
                }
                _ => None,
            };

            let Some(context_engine_id) = discovered else {
                let _ = tx.send(ResponseEvent::Timeout);
                return;
            };

            dispatcher
                .inner
                .context_cache
                .lock()
                .insert(peer, context_engine_id.clone());

            let mut target = target;
            set_context_engine_id(&mut target, context_engine_id);
            match dispatcher.send_pdu_assigned(target, pdu) {
                Ok(real) => {
                    if let Some(event) = real.wait().await {
                        let _ = tx.send(event);
                    }
                }
                Err(_) => {
                    let _ = tx.send(ResponseEvent::Timeout);
                }
            }
        });

        Ok(PendingResponse { handle, rx: Some(rx) })
    }

    pub fn cancel(&self, handle: i32) -> bool {
        self.pending.cancel(handle)
    }

    pub fn next_msg_id(&self) -> i32 {
        self.inner.msg_id.fetch_add(1, Ordering::Relaxed) & 0x7fff_ffff
    }

    /// Decodes an inbound datagram/stream frame and either correlates it
    /// to a pending request or surfaces it as unsolicited traffic.
    pub fn process_message(&self, bytes: &[u8], from: SocketAddr) -> Result<()> {
        let usm = self.inner.usm.lock();
        let decoded = mp::decode_message(bytes, &usm)?;
        drop(usm);

        match decoded.pdu {
            AnyPdu::Standard(inner) if inner.ty == codec::pdu::PduType::Report => {
                let report_oid = inner.var_binds.first().map(|vb| vb.oid.clone());
                let reason = report_oid
                    .as_ref()
                    .map(ReportReason::from_oid)
                    .unwrap_or(ReportReason::Other);
                log::debug!("report from {from}: {reason:?}");
                self.pending.deliver(
                    inner.request_id,
                    AnyPdu::Standard(inner),
                    report_oid.as_ref(),
                );
            }
            AnyPdu::Standard(inner) if inner.ty == codec::pdu::PduType::Response => {
                let handle = inner.request_id;
                if !self.pending.deliver(handle, AnyPdu::Standard(inner), None) {
                    log::debug!("response from {from} for unknown handle {handle}");
                }
            }
            other => {
                if let Some(listener) = self.inner.unsolicited.lock().as_ref() {
                    (listener.f)(other, Vec::new());
                }
            }
        }
        Ok(())
    }
}

/// `snmpEngineID` scalar (SNMP-FRAMEWORK-MIB), the object an RFC 5343
/// discovery GET targets.
fn snmp_engine_id_oid() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 10, 2, 1, 1, 0])
}

fn set_context_engine_id(target: &mut Target, context_engine_id: Vec<u8>) {
    if let SecurityParams::Usm { context_engine_id: slot, .. } = &mut target.security {
        *slot = context_engine_id;
    }
}

fn encode_and_send(inner: &Inner, target: &Target, pdu: AnyPdu) -> Result<()> {
    let bytes = match &target.security {
        SecurityParams::Community(community) if target.version == codec::message::VERSION_V1 => {
            codec::mp::v1::encode(community, pdu)
        }
        SecurityParams::Community(community) => codec::mp::v2c::encode(community, pdu),
        SecurityParams::Usm {
            user_name,
            authoritative_engine_id,
            authoritative_engine_boots,
            authoritative_engine_time,
            context_engine_id,
            context_name,
        } => {
            let usm = inner.usm.lock();
            let user = usm.user(user_name).ok_or(Error::NoSuchUser)?.clone();
            let outgoing = OutgoingV3 {
                msg_id: inner.msg_id.fetch_add(1, Ordering::Relaxed) & 0x7fff_ffff,
                user_name: user_name.clone(),
                authoritative_engine_id: authoritative_engine_id.clone(),
                authoritative_engine_boots: *authoritative_engine_boots,
                authoritative_engine_time: *authoritative_engine_time,
                context_engine_id: context_engine_id.clone(),
                context_name: context_name.clone(),
                reportable: true,
                msg_max_size: 65507,
            };
            codec::mp::v3::encode(&outgoing, &user, pdu)?
        }
    };

    let transport = inner
        .registry
        .lookup(Direction::Outbound, target.class)
        .ok_or(Error::NoTransport)?;
    transport
        .send(target.peer, bytes)
        .map_err(|_| Error::NoTransport)
}

/// The outcome of `Dispatcher::send_pdu`: confirmed PDUs resolve through
/// the pending-request engine, fire-and-forget PDUs (traps, responses we
/// originate) resolve immediately.
pub struct PendingResponse {
    pub handle: i32,
    rx: Option<tokio::sync::oneshot::Receiver<ResponseEvent>>,
}

impl PendingResponse {
    fn fire_and_forget() -> Self {
        Self { handle: 0, rx: None }
    }

    pub async fn wait(self) -> Option<ResponseEvent> {
        match self.rx {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }
}
