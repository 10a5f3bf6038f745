//! Payment database operations.
//!
//! Payments are append-only: there is no update or delete here, and the
//! schema rejects both with triggers.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::{decimal_to_sql, parse_decimal, parse_stored, Database, DbError, DbResult};
use crate::models::Payment;

impl Database {
    /// Append a payment.
    pub fn insert_payment(&self, payment: &Payment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO payments (id, visit_id, paid_at, method, amount, auth_code, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                payment.id,
                payment.visit_id,
                payment.paid_at,
                payment.method.as_str(),
                decimal_to_sql(payment.amount),
                payment.auth_code,
                payment.note,
            ],
        )?;
        Ok(())
    }

    /// All payments of a visit, oldest first.
    pub fn list_payments(&self, visit_id: &str) -> DbResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, visit_id, paid_at, method, amount, auth_code, note
            FROM payments
            WHERE visit_id = ?
            ORDER BY paid_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([visit_id], payment_row)?;
        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?.try_into()?);
        }
        Ok(payments)
    }

    /// Most recent payment of a visit.
    pub fn last_payment(&self, visit_id: &str) -> DbResult<Option<Payment>> {
        self.conn
            .query_row(
                r#"
                SELECT id, visit_id, paid_at, method, amount, auth_code, note
                FROM payments
                WHERE visit_id = ?
                ORDER BY paid_at DESC, rowid DESC
                LIMIT 1
                "#,
                [visit_id],
                payment_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Every payment amount of a visit, summed by the caller.
    pub fn payment_amounts(&self, visit_id: &str) -> DbResult<Vec<Decimal>> {
        let mut stmt = self
            .conn
            .prepare("SELECT amount FROM payments WHERE visit_id = ?")?;
        let rows = stmt.query_map([visit_id], |row| row.get::<_, String>(0))?;

        let mut amounts = Vec::new();
        for row in rows {
            amounts.push(parse_decimal(&row?)?);
        }
        Ok(amounts)
    }
}

/// Intermediate row struct for database mapping.
struct PaymentRow {
    id: String,
    visit_id: String,
    paid_at: DateTime<Utc>,
    method: String,
    amount: String,
    auth_code: Option<String>,
    note: Option<String>,
}

fn payment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        paid_at: row.get(2)?,
        method: row.get(3)?,
        amount: row.get(4)?,
        auth_code: row.get(5)?,
        note: row.get(6)?,
    })
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            visit_id: row.visit_id,
            paid_at: row.paid_at,
            method: parse_stored(&row.method)?,
            amount: parse_decimal(&row.amount)?,
            auth_code: row.auth_code,
            note: row.note,
        })
    }
}
