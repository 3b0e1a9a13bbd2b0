//! Statistics (§4.7): one atomic per RFC 3418 / SNMP4J-style counter,
//! generic over a `Number` trait the way the teacher's `Counts<N>` is, so
//! a `prometheus::IntCounter` can stand in for a plain `AtomicUsize` under
//! the `prometheus-exporter` feature.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[cfg(feature = "prometheus-exporter")]
pub mod prometheus_export {
    use std::sync::LazyLock;

    use anyhow::Result;
    use prometheus::{IntCounter, TextEncoder, register_int_counter};

    use super::Number;

    impl Number for IntCounter {
        fn add(&self, value: u64) {
            self.inc_by(value);
        }

        fn get(&self) -> u64 {
            self.get() as u64
        }
    }

    pub static COUNTERS: LazyLock<super::Statistics<IntCounter>> =
        LazyLock::new(|| super::Statistics::new_with(|name| register_int_counter!(name, name).unwrap()));

    pub fn generate_metrics(buf: &mut Vec<u8>) -> Result<()> {
        TextEncoder::new().encode(&prometheus::gather(), buf)?;
        Ok(())
    }
}

pub trait Number: Default {
    fn add(&self, value: u64);
    fn get(&self) -> u64;
}

#[derive(Default)]
pub struct Count(AtomicU64);

impl Number for Count {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// The RFC 3418 `snmp` group counters relevant to an engine that only
/// ever speaks as a command generator (no `snmpOutPkts`/trap counters,
/// since this crate doesn't implement the agent side) plus the SNMP4J
/// `snmp4jStatsRequest*` counters this spec's §6 names.
pub struct Statistics<T: Number = Count> {
    pub snmp_in_pkts: T,
    pub snmp_in_asn_parse_errs: T,
    pub snmp_in_bad_versions: T,
    pub snmp_invalid_msgs: T,
    pub snmp4j_stats_request_retries: T,
    pub snmp4j_stats_request_timeouts: T,
    request_wait_time_sum_ms: AtomicU64,
    request_wait_time_count: AtomicUsize,
}

impl<T: Number> Default for Statistics<T> {
    fn default() -> Self {
        Self {
            snmp_in_pkts: T::default(),
            snmp_in_asn_parse_errs: T::default(),
            snmp_in_bad_versions: T::default(),
            snmp_invalid_msgs: T::default(),
            snmp4j_stats_request_retries: T::default(),
            snmp4j_stats_request_timeouts: T::default(),
            request_wait_time_sum_ms: AtomicU64::new(0),
            request_wait_time_count: AtomicUsize::new(0),
        }
    }
}

impl<T: Number> Statistics<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg_attr(not(feature = "prometheus-exporter"), allow(dead_code))]
    fn new_with(_register: impl Fn(&str) -> T) -> Self {
        Self::default()
    }

    pub fn record_inbound(&self, result: &dispatch::Result<()>) {
        self.snmp_in_pkts.add(1);
        match result {
            Err(dispatch::Error::Codec(codec::Error::UnknownVersion(_))) => self.snmp_in_bad_versions.add(1),
            Err(dispatch::Error::Codec(
                codec::Error::Truncated | codec::Error::InvalidTag { .. } | codec::Error::InvalidLength,
            )) => self.snmp_in_asn_parse_errs.add(1),
            Err(_) => self.snmp_invalid_msgs.add(1),
            Ok(()) => {}
        }
    }

    /// `snmp4jStatsRequestWaitTime` is reported as a running sum + count;
    /// the mean is derivable by a caller that wants one.
    pub fn record_request_wait_time(&self, millis: u64) {
        self.request_wait_time_sum_ms.fetch_add(millis, Ordering::Relaxed);
        self.request_wait_time_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_wait_time_mean_ms(&self) -> Option<f64> {
        let count = self.request_wait_time_count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        Some(self.request_wait_time_sum_ms.load(Ordering::Relaxed) as f64 / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_parse_error_counters() {
        let stats = Statistics::<Count>::new();
        stats.record_inbound(&Err(dispatch::Error::Codec(codec::Error::UnknownVersion(9))));
        stats.record_inbound(&Err(dispatch::Error::Codec(codec::Error::Truncated)));
        stats.record_inbound(&Ok(()));
        assert_eq!(stats.snmp_in_pkts.get(), 3);
        assert_eq!(stats.snmp_in_bad_versions.get(), 1);
        assert_eq!(stats.snmp_in_asn_parse_errs.get(), 1);
    }

    #[test]
    fn tracks_request_wait_time_mean() {
        let stats = Statistics::<Count>::new();
        assert_eq!(stats.request_wait_time_mean_ms(), None);
        stats.record_request_wait_time(10);
        stats.record_request_wait_time(20);
        assert_eq!(stats.request_wait_time_mean_ms(), Some(15.0));
    }
}
