//! Payment ledger models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fold_token;

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Cash, Self::Card, Self::Transfer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "cash" => Ok(Self::Cash),
            "card" | "creditcard" | "debitcard" => Ok(Self::Card),
            "transfer" | "banktransfer" | "wire" => Ok(Self::Transfer),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

/// A recorded payment. Payments are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub visit_id: String,
    pub paid_at: DateTime<Utc>,
    pub method: PaymentMethod,
    /// Always strictly positive
    pub amount: Decimal,
    /// Card authorization code, when the method is card
    pub auth_code: Option<String>,
    pub note: Option<String>,
}

/// A payment as submitted by a caller; the method is parsed on posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: String,
    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewPayment {
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            amount,
            method: method.as_str().to_string(),
            auth_code: None,
            note: None,
        }
    }
}

/// Derived money fields of a visit.
///
/// `paid` is the sum of all payments and `balance = total - paid`.
/// Balance may go negative (overpayment is reported, not clamped).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LedgerTotals {
    pub total: Option<Decimal>,
    pub paid: Decimal,
    pub balance: Decimal,
}

impl LedgerTotals {
    /// Compute totals from the visit total and every payment amount.
    pub fn compute<I>(total: Option<Decimal>, amounts: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let paid: Decimal = amounts.into_iter().sum();
        Self {
            total,
            paid,
            balance: total.unwrap_or(Decimal::ZERO) - paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    #[test]
    fn test_method_parse_permissive() {
        assert_eq!("Cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("CARD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_totals_compute() {
        let totals = LedgerTotals::compute(Some(dec(250000, 2)), vec![dec(100000, 2), dec(50000, 2)]);
        assert_eq!(totals.paid, dec(150000, 2));
        assert_eq!(totals.balance, dec(100000, 2));
    }

    #[test]
    fn test_totals_overpayment_goes_negative() {
        let totals = LedgerTotals::compute(Some(Decimal::from(100)), vec![Decimal::from(120)]);
        assert_eq!(totals.balance, Decimal::from(-20));
    }

    #[test]
    fn test_totals_without_total() {
        let totals = LedgerTotals::compute(None, vec![Decimal::from(30)]);
        assert_eq!(totals.total, None);
        assert_eq!(totals.balance, Decimal::from(-30));
    }

    proptest! {
        #[test]
        fn prop_balance_identity(total in 0i64..10_000_000, amounts in prop::collection::vec(1i64..1_000_000, 0..20)) {
            let total = Decimal::new(total, 2);
            let amounts: Vec<Decimal> = amounts.into_iter().map(|a| Decimal::new(a, 2)).collect();
            let expected_paid: Decimal = amounts.iter().copied().sum();
            let totals = LedgerTotals::compute(Some(total), amounts);
            prop_assert_eq!(totals.paid, expected_paid);
            prop_assert_eq!(totals.balance + totals.paid, total);
        }
    }
}
