//! Session Facade (§4.5): a synchronous-feeling async request API built
//! on the dispatcher and pending-request engine.

use std::sync::Arc;
use std::time::Duration;

use codec::oid::Oid;
use codec::pdu::{AnyPdu, Pdu, PduType, VarBind};

use crate::dispatcher::Dispatcher;
use crate::pending::ResponseEvent;
use crate::target::Target;
use crate::{Error, Result};

/// The outcome of a confirmed request, collapsing the pending engine's
/// `ResponseEvent` into the three shapes a caller cares about.
#[derive(Debug)]
pub enum RequestOutcome {
    Response(Pdu),
    /// An unresolved Report-PDU: either the security model refused the
    /// request outright, or the bounded re-send in RFC 3412 §7.2.11(b)
    /// was exhausted without success.
    Report(Pdu),
    TimedOut,
}

/// A thin async wrapper over `Dispatcher` that builds request PDUs and
/// turns pending-engine outcomes into a caller-friendly enum.
pub struct Session {
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    async fn request(&self, target: Target, ty: PduType, var_binds: Vec<VarBind>) -> Result<RequestOutcome> {
        let pdu = AnyPdu::Standard(Pdu::new(ty, 0, var_binds));
        let pending = self.dispatcher.send_pdu(target, pdu)?;
        match pending.wait().await {
            Some(ResponseEvent::Response(AnyPdu::Standard(pdu))) => Ok(RequestOutcome::Response(pdu)),
            Some(ResponseEvent::Response(AnyPdu::V1Trap(_))) => Err(Error::UnknownHandle),
            Some(ResponseEvent::Report(AnyPdu::Standard(pdu))) => Ok(RequestOutcome::Report(pdu)),
            Some(ResponseEvent::Report(AnyPdu::V1Trap(_))) => Err(Error::UnknownHandle),
            Some(ResponseEvent::Timeout) | None => Ok(RequestOutcome::TimedOut),
            Some(ResponseEvent::Cancelled) => Err(Error::UnknownHandle),
        }
    }

    pub async fn get(&self, target: Target, oids: Vec<Oid>) -> Result<RequestOutcome> {
        let binds = oids
            .into_iter()
            .map(|oid| VarBind::new(oid, codec::pdu::Value::Null))
            .collect();
        self.request(target, PduType::GetRequest, binds).await
    }

    pub async fn get_next(&self, target: Target, oids: Vec<Oid>) -> Result<RequestOutcome> {
        let binds = oids
            .into_iter()
            .map(|oid| VarBind::new(oid, codec::pdu::Value::Null))
            .collect();
        self.request(target, PduType::GetNextRequest, binds).await
    }

    pub async fn set(&self, target: Target, binds: Vec<VarBind>) -> Result<RequestOutcome> {
        self.request(target, PduType::SetRequest, binds).await
    }

    pub async fn get_bulk(&self, target: Target, non_repeaters: i32, max_repetitions: i32, oids: Vec<Oid>) -> Result<RequestOutcome> {
        let binds = oids
            .into_iter()
            .map(|oid| VarBind::new(oid, codec::pdu::Value::Null))
            .collect::<Vec<_>>();
        let pdu = AnyPdu::Standard(Pdu::get_bulk(0, non_repeaters, max_repetitions, binds));
        let pending = self.dispatcher.send_pdu(target, pdu)?;
        match pending.wait().await {
            Some(ResponseEvent::Response(AnyPdu::Standard(pdu))) => Ok(RequestOutcome::Response(pdu)),
            Some(ResponseEvent::Report(AnyPdu::Standard(pdu))) => Ok(RequestOutcome::Report(pdu)),
            Some(ResponseEvent::Timeout) | None => Ok(RequestOutcome::TimedOut),
            _ => Err(Error::UnknownHandle),
        }
    }

    /// `get` with an overall deadline shorter than the target's own
    /// retry budget, for callers that want to bound total latency rather
    /// than rely on per-retry timeouts alone.
    pub async fn get_with_deadline(&self, target: Target, oids: Vec<Oid>, deadline: Duration) -> Result<RequestOutcome> {
        match tokio::time::timeout(deadline, self.get(target, oids)).await {
            Ok(result) => result,
            Err(_) => Ok(RequestOutcome::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressClass, Direction};
    use crate::transport::test_support::RecordingTransport;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:10162".parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_no_agent_present() {
        let dispatcher = Dispatcher::new(b"engine-1".to_vec());
        let transport = Arc::new(RecordingTransport::new(AddressClass::Udp, addr()));
        dispatcher.register_transport(Direction::Outbound, transport);
        let session = Session::new(dispatcher);

        let target = Target::community_v2c(AddressClass::Udp, addr(), "public")
            .with_timeout(Duration::from_millis(10))
            .with_retries(0);
        let outcome = session
            .get(target, vec![Oid::from([1, 3, 6, 1, 2, 1, 1, 1, 0])])
            .await
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::TimedOut));
    }
}
