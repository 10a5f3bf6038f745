//! Per-visit payment ledger.
//!
//! Payments are appended, never edited. After every posting the visit's
//! `paid` and `balance` are recomputed from the full payment list and
//! written back under the visit's version guard, inside one immediate
//! transaction.

use std::slice;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{new_id, Actor, LedgerTotals, NewPayment, Payment, PaymentMethod, Visit};

/// Money is kept to cents.
pub const AMOUNT_SCALE: u32 = 2;

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Payment amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Payment amount has more than 2 decimal places: {0}")]
    TooPrecise(Decimal),

    #[error("Invalid payment method: {0}")]
    InvalidMethod(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Payment ledger over the visits table.
pub struct PaymentLedger<'a> {
    db: &'a Database,
}

impl<'a> PaymentLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Post one payment and return the recomputed totals.
    pub fn add_payment(&self, actor: &Actor, visit_id: &str, payment: &NewPayment) -> LedgerResult<LedgerTotals> {
        self.add_payments(actor, visit_id, slice::from_ref(payment))
    }

    /// Post a batch of payments atomically. Either all are recorded or none.
    pub fn add_payments(&self, actor: &Actor, visit_id: &str, payments: &[NewPayment]) -> LedgerResult<LedgerTotals> {
        let tx = self.db.write_transaction()?;

        let mut visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| LedgerError::VisitNotFound(visit_id.to_string()))?;
        let totals = self.post(&mut visit, payments)?;
        self.db.save_visit_state(&visit)?;

        tx.commit().map_err(DbError::from)?;

        info!(
            visit_id,
            user_id = %actor.user_id,
            count = payments.len(),
            paid = %totals.paid,
            balance = %totals.balance,
            "Payments posted"
        );
        Ok(totals)
    }

    /// Payments of a visit, oldest first.
    pub fn list_payments(&self, visit_id: &str) -> LedgerResult<Vec<Payment>> {
        if self.db.get_visit(visit_id)?.is_none() {
            return Err(LedgerError::VisitNotFound(visit_id.to_string()));
        }
        Ok(self.db.list_payments(visit_id)?)
    }

    /// Validate and append `payments`, then recompute totals onto `visit`.
    ///
    /// Runs inside the caller's transaction; the caller persists `visit`.
    /// All payments are validated before any row is written.
    pub(crate) fn post(&self, visit: &mut Visit, payments: &[NewPayment]) -> LedgerResult<LedgerTotals> {
        let validated = payments
            .iter()
            .map(|p| validate_payment(&visit.id, p))
            .collect::<LedgerResult<Vec<_>>>()?;

        for payment in &validated {
            self.db.insert_payment(payment)?;
        }

        let totals = LedgerTotals::compute(visit.total, self.db.payment_amounts(&visit.id)?);
        visit.apply_totals(&totals);
        Ok(totals)
    }
}

/// Turn a submitted payment into a ledger row stamped with the server time.
pub fn validate_payment(visit_id: &str, payment: &NewPayment) -> LedgerResult<Payment> {
    if payment.amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(payment.amount));
    }
    if payment.amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::TooPrecise(payment.amount));
    }
    let method: PaymentMethod = payment
        .method
        .parse()
        .map_err(|_| LedgerError::InvalidMethod(payment.method.clone()))?;

    Ok(Payment {
        id: new_id(),
        visit_id: visit_id.to_string(),
        paid_at: Utc::now(),
        method,
        amount: payment.amount,
        auth_code: payment.auth_code.clone().filter(|c| !c.trim().is_empty()),
        note: payment.note.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, NewPatient};
    use proptest::prelude::*;

    fn setup_db() -> (Database, Actor, String) {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Centro");
        db.insert_branch(&branch).unwrap();
        let actor = Actor::new("u1", "Ana", branch.id.clone());
        let patient = NewPatient {
            name: "Jane Doe".into(),
            phone: "555-1111".into(),
            ..Default::default()
        }
        .into_patient(&actor);
        db.insert_patient(&patient).unwrap();
        let mut visit = Visit::new(&patient.id, &branch.id, &actor);
        visit.total = Some(Decimal::new(25000, 2));
        db.insert_visit(&visit).unwrap();
        (db, actor, visit.id)
    }

    fn cash(units: i64) -> NewPayment {
        NewPayment::new(Decimal::new(units, 2), PaymentMethod::Cash)
    }

    #[test]
    fn test_payments_accumulate() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let totals = ledger.add_payment(&actor, &visit_id, &cash(10000)).unwrap();
        assert_eq!(totals.paid, Decimal::new(10000, 2));
        assert_eq!(totals.balance, Decimal::new(15000, 2));

        let totals = ledger.add_payment(&actor, &visit_id, &cash(15000)).unwrap();
        assert_eq!(totals.paid, Decimal::new(25000, 2));
        assert_eq!(totals.balance, Decimal::ZERO);

        let visit = db.get_visit(&visit_id).unwrap().unwrap();
        assert_eq!(visit.paid, Some(Decimal::new(25000, 2)));
        assert_eq!(visit.balance, Some(Decimal::ZERO));
        assert_eq!(visit.version, 2);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let result = ledger.add_payment(&actor, &visit_id, &cash(0));
        assert!(matches!(result, Err(LedgerError::NonPositiveAmount(_))));

        let result = ledger.add_payment(&actor, &visit_id, &cash(-500));
        assert!(matches!(result, Err(LedgerError::NonPositiveAmount(_))));
        assert!(db.list_payments(&visit_id).unwrap().is_empty());
    }

    #[test]
    fn test_sub_cent_amount_rejected() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let payment = NewPayment::new(Decimal::new(1001, 3), PaymentMethod::Cash);
        let result = ledger.add_payment(&actor, &visit_id, &payment);
        assert!(matches!(result, Err(LedgerError::TooPrecise(_))));

        // Trailing zeros are fine
        let payment = NewPayment::new(Decimal::new(1000, 3), PaymentMethod::Cash);
        assert!(ledger.add_payment(&actor, &visit_id, &payment).is_ok());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let mut payment = cash(1000);
        payment.method = "bitcoin".into();
        let result = ledger.add_payment(&actor, &visit_id, &payment);
        assert!(matches!(result, Err(LedgerError::InvalidMethod(m)) if m == "bitcoin"));
    }

    #[test]
    fn test_method_case_insensitive() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let mut payment = cash(1000);
        payment.method = "TRANSFER".into();
        ledger.add_payment(&actor, &visit_id, &payment).unwrap();

        let payments = ledger.list_payments(&visit_id).unwrap();
        assert_eq!(payments[0].method, PaymentMethod::Transfer);
    }

    #[test]
    fn test_batch_is_atomic() {
        let (db, actor, visit_id) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let batch = vec![cash(1000), cash(-1)];
        assert!(ledger.add_payments(&actor, &visit_id, &batch).is_err());
        assert!(db.list_payments(&visit_id).unwrap().is_empty());
        assert_eq!(db.get_visit(&visit_id).unwrap().unwrap().version, 0);
    }

    #[test]
    fn test_unknown_visit() {
        let (db, actor, _) = setup_db();
        let ledger = PaymentLedger::new(&db);

        let result = ledger.add_payment(&actor, "missing", &cash(1000));
        assert!(matches!(result, Err(LedgerError::VisitNotFound(_))));
        assert!(matches!(ledger.list_payments("missing"), Err(LedgerError::VisitNotFound(_))));
    }

    #[test]
    fn test_balance_without_total_is_negative_paid() {
        let (db, actor, _) = setup_db();
        let patient_id = db.search_patients("jane", None, 1).unwrap()[0].id.clone();
        let visit = Visit::new(&patient_id, &actor.branch_id, &actor);
        db.insert_visit(&visit).unwrap();

        let totals = PaymentLedger::new(&db)
            .add_payment(&actor, &visit.id, &cash(4000))
            .unwrap();
        assert_eq!(totals.total, None);
        assert_eq!(totals.balance, Decimal::new(-4000, 2));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_paid_is_sum_of_postings(amounts in prop::collection::vec(1i64..100_000, 1..8)) {
            let (db, actor, visit_id) = setup_db();
            let ledger = PaymentLedger::new(&db);

            let mut last = None;
            for units in &amounts {
                last = Some(ledger.add_payment(&actor, &visit_id, &cash(*units)).unwrap());
            }

            let expected: Decimal = amounts.iter().map(|u| Decimal::new(*u, 2)).sum();
            let totals = last.unwrap();
            prop_assert_eq!(totals.paid, expected);
            prop_assert_eq!(totals.balance, Decimal::new(25000, 2) - expected);
        }
    }
}
