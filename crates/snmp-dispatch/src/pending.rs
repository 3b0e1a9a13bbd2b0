//! Pending-Request Engine (§4.3): the retry/timeout state machine, async
//! response correlation, and Report-PDU driven bounded re-send.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use codec::pdu::AnyPdu;
use codec::report::ReportReason;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::target::Target;
use crate::Error;

/// What a caller waiting on a handle eventually receives.
#[derive(Debug)]
pub enum ResponseEvent {
    Response(AnyPdu),
    /// A Report-PDU that did not warrant an automatic re-send, or did but
    /// exhausted `max_request_status` without a real response arriving.
    Report(AnyPdu),
    Timeout,
    Cancelled,
}

/// Re-sends an encoded request through the dispatcher's transport/MP
/// stack. Implemented by `Dispatcher`; kept as a trait so the retry state
/// machine can be exercised without a real transport.
pub trait ResendSink: Send + Sync + 'static {
    fn resend(&self, handle: i32, target: &Target, pdu: &AnyPdu) -> Result<(), Error>;
}

struct Slot {
    target: Target,
    pdu: AnyPdu,
    retries_left: u32,
    request_status: u32,
    max_request_status: u32,
    responder: Option<oneshot::Sender<ResponseEvent>>,
}

pub struct PendingRequestEngine<S: ResendSink> {
    slots: Arc<Mutex<AHashMap<i32, Slot>>>,
    sink: Arc<S>,
}

impl<S: ResendSink> Clone for PendingRequestEngine<S> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            sink: self.sink.clone(),
        }
    }
}

const DEFAULT_MAX_REQUEST_STATUS: u32 = 2;

impl<S: ResendSink> PendingRequestEngine<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(AHashMap::default())),
            sink,
        }
    }

    /// Registers a confirmed request under a handle the caller already
    /// allocated (and stamped into the PDU's `request_id`), spawns its
    /// retry timer, and returns a receiver for the eventual outcome.
    pub fn send(&self, handle: i32, target: Target, pdu: AnyPdu) -> oneshot::Receiver<ResponseEvent> {
        let (tx, rx) = oneshot::channel();
        let retries = target.retries;
        let timeout = target.timeout;

        {
            let mut slots = self.slots.lock();
            slots.insert(
                handle,
                Slot {
                    target: target.clone(),
                    pdu: pdu.clone(),
                    retries_left: retries,
                    request_status: 0,
                    max_request_status: DEFAULT_MAX_REQUEST_STATUS,
                    responder: Some(tx),
                },
            );
        }

        if let Err(err) = self.sink.resend(handle, &target, &pdu) {
            log::warn!("initial send for handle {handle} failed: {err}");
        }

        let slots = self.slots.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(timeout).await;

                let action = {
                    let mut guard = slots.lock();
                    let Some(slot) = guard.get_mut(&handle) else {
                        return;
                    };
                    if slot.retries_left == 0 {
                        let slot = guard.remove(&handle).unwrap();
                        Action::GiveUp(slot)
                    } else {
                        slot.retries_left -= 1;
                        Action::Retry(slot.target.clone(), slot.pdu.clone())
                    }
                };

                match action {
                    Action::GiveUp(mut slot) => {
                        if let Some(tx) = slot.responder.take() {
                            let _ = tx.send(ResponseEvent::Timeout);
                        }
                        return;
                    }
                    Action::Retry(target, pdu) => {
                        if let Err(err) = sink.resend(handle, &target, &pdu) {
                            log::warn!("retry for handle {handle} failed: {err}");
                        }
                    }
                }
            }
        });

        rx
    }

    /// Delivers a decoded response or Report-PDU for `handle`. Returns
    /// `true` if the handle was known (whether or not it resulted in the
    /// engine finishing the request).
    pub fn deliver(&self, handle: i32, pdu: AnyPdu, report_oid: Option<&codec::oid::Oid>) -> bool {
        let outcome = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&handle) else {
                return false;
            };

            if let Some(oid) = report_oid {
                let reason = ReportReason::from_oid(oid);
                if reason.warrants_resend() && slot.request_status < slot.max_request_status {
                    slot.request_status += 1;
                    None
                } else {
                    let slot = slots.remove(&handle).unwrap();
                    Some((slot, ResponseEvent::Report(pdu)))
                }
            } else {
                let slot = slots.remove(&handle).unwrap();
                Some((slot, ResponseEvent::Response(pdu)))
            }
        };

        if let Some((mut slot, event)) = outcome {
            if let Some(tx) = slot.responder.take() {
                let _ = tx.send(event);
            }
        } else {
            // The Report warranted a bounded re-send (RFC 3412 §7.2.11(b)):
            // dispatch the original request again, reusing the current
            // handle. Never resend the Report-PDU itself — by the time a
            // request reaches this engine any RFC 5343 contextEngineID
            // correction has already been baked into `slot.pdu`.
            let (target, pdu) = {
                let slots = self.slots.lock();
                match slots.get(&handle) {
                    Some(slot) => (slot.target.clone(), slot.pdu.clone()),
                    None => return true,
                }
            };
            if let Err(err) = self.sink.resend(handle, &target, &pdu) {
                log::warn!("report-driven resend for handle {handle} failed: {err}");
            }
        }
        true
    }

    pub fn cancel(&self, handle: i32) -> bool {
        let mut slot = self.slots.lock().remove(&handle);
        if let Some(slot) = &mut slot {
            if let Some(tx) = slot.responder.take() {
                let _ = tx.send(ResponseEvent::Cancelled);
            }
        }
        slot.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.lock().len()
    }
}

enum Action {
    GiveUp(Slot),
    Retry(Target, AnyPdu),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use crate::address::AddressClass;
    use codec::pdu::{Pdu, PduType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
    }

    impl ResendSink for CountingSink {
        fn resend(&self, _handle: i32, _target: &Target, _pdu: &AnyPdu) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Like `CountingSink`, but keeps every `(handle, target, pdu)` it was
    /// asked to send — needed to assert *what* got resent, not just how
    /// many times.
    struct RecordingSink {
        calls: Mutex<Vec<(i32, Target, AnyPdu)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }

    impl ResendSink for RecordingSink {
        fn resend(&self, handle: i32, target: &Target, pdu: &AnyPdu) -> Result<(), Error> {
            self.calls.lock().push((handle, target.clone(), pdu.clone()));
            Ok(())
        }
    }

    fn target() -> Target {
        Target::community_v2c(AddressClass::Udp, "127.0.0.1:161".parse().unwrap(), "public")
            .with_timeout(Duration::from_millis(20))
            .with_retries(2)
    }

    #[tokio::test(start_paused = true)]
    async fn response_cancels_retries() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let engine = PendingRequestEngine::new(sink.clone());
        let handle = 1;
        let pdu = AnyPdu::Standard(Pdu::new(PduType::GetRequest, handle, vec![]));
        let rx = engine.send(handle, target(), pdu.clone());

        assert!(engine.deliver(handle, pdu, None));
        let event = rx.await.unwrap();
        assert!(matches!(event, ResponseEvent::Response(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retries_into_timeout() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let engine = PendingRequestEngine::new(sink);
        let handle = 1;
        let pdu = AnyPdu::Standard(Pdu::new(PduType::GetRequest, handle, vec![]));
        let rx = engine.send(handle, target(), pdu);

        let event = rx.await.unwrap();
        assert!(matches!(event, ResponseEvent::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_delivers_cancelled_event() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let engine = PendingRequestEngine::new(sink);
        let handle = 1;
        let pdu = AnyPdu::Standard(Pdu::new(PduType::GetRequest, handle, vec![]));
        let rx = engine.send(handle, target(), pdu);

        assert!(engine.cancel(handle));
        let event = rx.await.unwrap();
        assert!(matches!(event, ResponseEvent::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_engine_id_report_triggers_bounded_resend() {
        let sink = Arc::new(RecordingSink::new());
        let engine = PendingRequestEngine::new(sink.clone());
        let handle = 1;
        let pdu = AnyPdu::Standard(Pdu::new(PduType::GetRequest, handle, vec![]));
        let rx = engine.send(handle, target(), pdu.clone());

        let report = AnyPdu::Standard(Pdu::new(PduType::Report, handle, vec![]));
        let oid = codec::report::usm_stats_unknown_engine_ids();
        assert!(engine.deliver(handle, report, Some(&oid)));
        assert_eq!(engine.pending_count(), 1);

        // Second and third report: the bounded re-send budget (2 bumps)
        // is exhausted on the third, surfacing a terminal Report event.
        let report2 = AnyPdu::Standard(Pdu::new(PduType::Report, handle, vec![]));
        engine.deliver(handle, report2, Some(&oid));
        let report3 = AnyPdu::Standard(Pdu::new(PduType::Report, handle, vec![]));
        engine.deliver(handle, report3, Some(&oid));
        let event = rx.await.unwrap();
        assert!(matches!(event, ResponseEvent::Report(_)));

        let resends = sink.calls.lock();
        assert_eq!(resends.len(), 3, "initial send plus two bounded resends");
        for (_, _, resent) in resends.iter().skip(1) {
            assert_eq!(
                *resent, pdu,
                "report-driven resend must carry the original request, never the Report PDU"
            );
        }
    }
}
