//! Status tracker: applies a status change and appends its audit record.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{check_transition, compute_record_hash, verify_chain, LifecycleError, LifecycleResult};
use crate::db::{Database, DbError};
use crate::ledger::PaymentLedger;
use crate::models::{
    new_id, Actor, ChainVerification, ChangeStatusRequest, StatusTransition, TransitionPolicy,
    VisitStatus,
};

/// Status tracker bound to a database and a transition policy.
pub struct StatusTracker<'a> {
    db: &'a Database,
    policy: TransitionPolicy,
}

impl<'a> StatusTracker<'a> {
    pub fn new(db: &'a Database, policy: TransitionPolicy) -> Self {
        Self { db, policy }
    }

    /// Move a visit to a new status.
    ///
    /// Appends exactly one audit record whose `from` is the status before the
    /// call. Entering `SentToLab` also sets the total, posts the batched
    /// payments and stamps the shipping dates. Everything commits together.
    /// A total or payments sent with any other target is rejected.
    pub fn change_status(
        &self,
        actor: &Actor,
        visit_id: &str,
        request: &ChangeStatusRequest,
    ) -> LifecycleResult<StatusTransition> {
        let to: VisitStatus = request
            .to
            .parse()
            .map_err(|_| LifecycleError::InvalidStatus(request.to.clone()))?;

        let lab = match to {
            VisitStatus::SentToLab => Some(request.lab.clone().ok_or(LifecycleError::MissingLabRouting)?),
            _ if request.total.is_some() || !request.payments.is_empty() => {
                return Err(LifecycleError::LabOnlyFields(to));
            }
            _ => None,
        };

        let tx = self.db.write_transaction()?;

        let mut visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| LifecycleError::VisitNotFound(visit_id.to_string()))?;
        let from = visit.status;

        if let Err(e) = check_transition(self.policy, from, to) {
            warn!(visit_id, %from, %to, user_id = %actor.user_id, "Rejected status change");
            return Err(e);
        }

        let now = Utc::now();
        match to {
            VisitStatus::SentToLab => {
                if let Some(total) = request.total {
                    if total < Decimal::ZERO {
                        return Err(LifecycleError::NegativeTotal(total));
                    }
                    visit.total = Some(total);
                }
                PaymentLedger::new(self.db).post(&mut visit, &request.payments)?;
                visit.lab_shipped_at = Some(now);
                visit.estimated_delivery_at = Some(request.estimated_delivery.unwrap_or(now));
            }
            VisitStatus::ReceivedAtOriginBranch => visit.received_at = Some(now),
            VisitStatus::DeliveredToCustomer => visit.delivered_at = Some(now),
            _ => {}
        }
        visit.status = to;

        let previous = self.db.last_status_transition(visit_id)?;
        let mut record = StatusTransition {
            id: new_id(),
            visit_id: visit_id.to_string(),
            seq: previous.as_ref().map(|p| p.seq + 1).unwrap_or(1),
            from,
            to,
            user_id: actor.user_id.clone(),
            user_name: actor.name.clone(),
            branch_id: actor.branch_id.clone(),
            at: now,
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            lab,
            prev_hash: previous.map(|p| p.hash).unwrap_or_default(),
            hash: String::new(),
        };
        record.hash = compute_record_hash(&record)?;

        self.db.insert_status_transition(&record)?;
        self.db.save_visit_state(&visit)?;

        tx.commit().map_err(DbError::from)?;

        info!(
            visit_id,
            %from,
            %to,
            seq = record.seq,
            user_id = %actor.user_id,
            "Visit status changed"
        );
        Ok(record)
    }

    /// Audit trail of a visit, oldest first.
    pub fn history(&self, visit_id: &str) -> LifecycleResult<Vec<StatusTransition>> {
        self.ensure_visit(visit_id)?;
        Ok(self.db.list_status_history(visit_id)?)
    }

    /// Recompute the hash chain of a visit's audit trail.
    pub fn verify(&self, visit_id: &str) -> LifecycleResult<ChainVerification> {
        self.ensure_visit(visit_id)?;
        let records = self.db.list_status_history(visit_id)?;
        let verification = verify_chain(visit_id, &records)?;
        if let Some(seq) = verification.first_broken_seq {
            warn!(visit_id, seq, "Status history hash chain is broken");
        }
        Ok(verification)
    }

    fn ensure_visit(&self, visit_id: &str) -> LifecycleResult<()> {
        match self.db.get_visit(visit_id)? {
            Some(_) => Ok(()),
            None => Err(LifecycleError::VisitNotFound(visit_id.to_string())),
        }
    }
}
