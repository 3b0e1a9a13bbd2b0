//! Observer (§4.7): an optional-callback trait mirroring the teacher's
//! `ServiceHandler` shape, so a caller can wire metrics or alerting into
//! the dispatcher without touching its internals.

use std::net::SocketAddr;

use codec::report::ReportReason;

/// All methods default to a no-op; implement only the ones a particular
/// deployment cares about.
pub trait Observer: Send + Sync {
    fn on_counter_incremented(&self, _name: &str, _delta: u64) {}

    fn on_report_received(&self, _from: SocketAddr, _reason: ReportReason) {}

    fn on_authentication_failure(&self, _from: SocketAddr, _user_name: &[u8]) {}
}

/// Logs every event at the same granularity the teacher's concrete
/// `Observer` logs allocate/refresh/closed events: one `log::info!` line
/// per callback.
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_counter_incremented(&self, name: &str, delta: u64) {
        log::debug!("counter incremented: name={name}, delta={delta}");
    }

    fn on_report_received(&self, from: SocketAddr, reason: ReportReason) {
        log::info!("report received: from={from}, reason={reason:?}");
    }

    fn on_authentication_failure(&self, from: SocketAddr, user_name: &[u8]) {
        log::warn!(
            "authentication failure: from={from}, user={:?}",
            String::from_utf8_lossy(user_name)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopObserver;
    impl Observer for NoopObserver {}

    #[test]
    fn default_methods_are_callable() {
        let observer = NoopObserver;
        observer.on_counter_incremented("snmpInPkts", 1);
        observer.on_report_received("127.0.0.1:161".parse().unwrap(), ReportReason::Other);
        observer.on_authentication_failure("127.0.0.1:161".parse().unwrap(), b"admin");
    }
}
