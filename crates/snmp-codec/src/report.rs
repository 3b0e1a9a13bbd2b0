//! Well-known USM report OIDs (RFC 3414 §5) and the bounded re-send policy
//! driven by RFC 3412 §7.2.11(b).

use crate::oid::Oid;

pub fn usm_stats_unsupported_sec_levels() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0])
}

pub fn usm_stats_not_in_time_windows() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0])
}

pub fn usm_stats_unknown_user_names() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0])
}

pub fn usm_stats_unknown_engine_ids() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0])
}

pub fn usm_stats_wrong_digests() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0])
}

pub fn usm_stats_decryption_errors() -> Oid {
    Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0])
}

/// Classifies a Report-PDU's sole varbind into the action RFC 3412
/// §7.2.11(b) prescribes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportReason {
    UnsupportedSecLevels,
    NotInTimeWindows,
    UnknownUserNames,
    UnknownEngineIds,
    WrongDigests,
    DecryptionErrors,
    Other,
}

impl ReportReason {
    pub fn from_oid(oid: &Oid) -> Self {
        if *oid == usm_stats_unsupported_sec_levels() {
            ReportReason::UnsupportedSecLevels
        } else if *oid == usm_stats_not_in_time_windows() {
            ReportReason::NotInTimeWindows
        } else if *oid == usm_stats_unknown_user_names() {
            ReportReason::UnknownUserNames
        } else if *oid == usm_stats_unknown_engine_ids() {
            ReportReason::UnknownEngineIds
        } else if *oid == usm_stats_wrong_digests() {
            ReportReason::WrongDigests
        } else if *oid == usm_stats_decryption_errors() {
            ReportReason::DecryptionErrors
        } else {
            ReportReason::Other
        }
    }

    /// Whether the pending-request engine should automatically re-send the
    /// original request once with corrected engine-ID/time-window state,
    /// rather than surfacing the Report-PDU to the caller as a response.
    pub fn warrants_resend(self) -> bool {
        matches!(
            self,
            ReportReason::UnknownEngineIds | ReportReason::NotInTimeWindows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_reasons() {
        assert_eq!(
            ReportReason::from_oid(&usm_stats_unknown_engine_ids()),
            ReportReason::UnknownEngineIds
        );
        assert!(ReportReason::UnknownEngineIds.warrants_resend());
        assert!(!ReportReason::WrongDigests.warrants_resend());
    }

    #[test]
    fn classifies_unknown_oid_as_other() {
        assert_eq!(
            ReportReason::from_oid(&Oid::from([1, 2, 3])),
            ReportReason::Other
        );
    }
}
