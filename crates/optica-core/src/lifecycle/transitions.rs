//! Allowed status transitions.

use super::{LifecycleError, LifecycleResult};
use crate::models::{TransitionPolicy, VisitStatus};

/// Forward moves allowed from each status, excluding cancellation.
///
/// ```text
/// Created ─► Registered ─┬─► InTransitToBranch ─► ReceivedAtBranch ─┐
///                        └───────────────────────────────────────────┴─► SentToLab
/// SentToLab ─► ReadyAtLab ─┬─► ReceivedAtCentralBranch ─┐
///                          └────────────────────────────┴─► ReceivedAtOriginBranch
/// ReceivedAtOriginBranch ─┬─► ReadyForDelivery ─┐
///                         └─────────────────────┴─► DeliveredToCustomer
/// ```
pub fn forward_targets(from: VisitStatus) -> &'static [VisitStatus] {
    use VisitStatus::*;
    match from {
        Created => &[Registered],
        Registered => &[InTransitToBranch, SentToLab],
        InTransitToBranch => &[ReceivedAtBranch],
        ReceivedAtBranch => &[SentToLab],
        SentToLab => &[ReadyAtLab],
        ReadyAtLab => &[ReceivedAtCentralBranch, ReceivedAtOriginBranch],
        ReceivedAtCentralBranch => &[ReceivedAtOriginBranch],
        ReceivedAtOriginBranch => &[ReadyForDelivery, DeliveredToCustomer],
        ReadyForDelivery => &[DeliveredToCustomer],
        DeliveredToCustomer | Cancelled => &[],
    }
}

/// Check whether `from -> to` is allowed under the transition table.
///
/// Cancellation is allowed from every non-terminal status.
pub fn is_allowed(from: VisitStatus, to: VisitStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    to == VisitStatus::Cancelled || forward_targets(from).contains(&to)
}

/// Validate a requested transition under `policy`.
///
/// Moving to the current status is rejected under every policy.
pub fn check_transition(policy: TransitionPolicy, from: VisitStatus, to: VisitStatus) -> LifecycleResult<()> {
    let allowed = match policy {
        TransitionPolicy::Strict => is_allowed(from, to),
        TransitionPolicy::Permissive => from != to,
    };
    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VisitStatus::*;

    #[test]
    fn test_happy_path_allowed() {
        let path = [
            Created,
            Registered,
            InTransitToBranch,
            ReceivedAtBranch,
            SentToLab,
            ReadyAtLab,
            ReceivedAtCentralBranch,
            ReceivedAtOriginBranch,
            ReadyForDelivery,
            DeliveredToCustomer,
        ];
        for pair in path.windows(2) {
            assert!(is_allowed(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_jumps_rejected() {
        assert!(!is_allowed(Created, DeliveredToCustomer));
        assert!(!is_allowed(Created, SentToLab));
        assert!(!is_allowed(ReadyAtLab, SentToLab));
        assert!(!is_allowed(SentToLab, Registered));
    }

    #[test]
    fn test_cancel_from_any_open_status() {
        for status in VisitStatus::ALL {
            if status.is_terminal() {
                assert!(!is_allowed(status, Cancelled));
            } else {
                assert!(is_allowed(status, Cancelled), "{} -> cancelled", status);
            }
        }
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for to in VisitStatus::ALL {
            assert!(!is_allowed(DeliveredToCustomer, to));
            assert!(!is_allowed(Cancelled, to));
        }
    }

    #[test]
    fn test_permissive_allows_any_change() {
        assert!(check_transition(TransitionPolicy::Permissive, Created, DeliveredToCustomer).is_ok());
        assert!(check_transition(TransitionPolicy::Permissive, Cancelled, Registered).is_ok());
        assert!(check_transition(TransitionPolicy::Permissive, SentToLab, SentToLab).is_err());
    }

    #[test]
    fn test_strict_error_carries_statuses() {
        let err = check_transition(TransitionPolicy::Strict, Created, ReadyAtLab).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition { from: Created, to: ReadyAtLab }
        ));
    }
}
