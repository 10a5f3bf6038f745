//! Read-only aggregation queries backing the dashboard.
//!
//! Windows are half-open `[start, end)`. Money is returned as individual
//! decimal facts and summed by the caller.

use chrono::{DateTime, Utc};
use rusqlite::params;
use rust_decimal::Decimal;

use super::{parse_decimal, parse_stored, Database, DbResult};
use crate::models::{PaymentMethod, VisitStatus};

/// A single payment inside a reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFact {
    pub paid_at: DateTime<Utc>,
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// A single visit inside a reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitFact {
    pub patient_id: String,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Visits opened in the window.
    pub fn count_visits(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM visits
            WHERE created_at >= ?1 AND created_at < ?2
            AND (?3 IS NULL OR branch_id = ?3)
            "#,
            params![start, end, branch_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Patients registered in the window.
    pub fn count_new_patients(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM patients
            WHERE registered_at >= ?1 AND registered_at < ?2
            AND (?3 IS NULL OR branch_id = ?3)
            "#,
            params![start, end, branch_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Visits opened in the window that have at least one payment.
    pub fn count_paid_orders(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM visits v
            WHERE v.created_at >= ?1 AND v.created_at < ?2
            AND (?3 IS NULL OR v.branch_id = ?3)
            AND EXISTS (SELECT 1 FROM payments p WHERE p.visit_id = v.id)
            "#,
            params![start, end, branch_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Distinct visits that entered `status` during the window, per the audit trail.
    pub fn count_status_entries(
        &self,
        status: VisitStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        branch_id: Option<&str>,
    ) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(DISTINCT h.visit_id)
            FROM status_history h
            JOIN visits v ON v.id = h.visit_id
            WHERE h.to_status = ?1
            AND h.at >= ?2 AND h.at < ?3
            AND (?4 IS NULL OR v.branch_id = ?4)
            "#,
            params![status.as_str(), start, end, branch_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Payments made in the window.
    pub fn payment_facts(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<Vec<PaymentFact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.paid_at, p.method, p.amount
            FROM payments p
            JOIN visits v ON v.id = p.visit_id
            WHERE p.paid_at >= ?1 AND p.paid_at < ?2
            AND (?3 IS NULL OR v.branch_id = ?3)
            ORDER BY p.paid_at
            "#,
        )?;
        let rows = stmt.query_map(params![start, end, branch_id], |row| {
            Ok((
                row.get::<_, DateTime<Utc>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut facts = Vec::new();
        for row in rows {
            let (paid_at, method, amount) = row?;
            facts.push(PaymentFact {
                paid_at,
                method: parse_stored(&method)?,
                amount: parse_decimal(&amount)?,
            });
        }
        Ok(facts)
    }

    /// Visits opened in the window.
    pub fn visit_facts(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<Vec<VisitFact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, created_at FROM visits
            WHERE created_at >= ?1 AND created_at < ?2
            AND (?3 IS NULL OR branch_id = ?3)
            ORDER BY created_at
            "#,
        )?;
        let facts = stmt
            .query_map(params![start, end, branch_id], |row| {
                Ok(VisitFact {
                    patient_id: row.get(0)?,
                    created_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    /// First-ever visit of each patient whose first visit falls in the window.
    pub fn first_visit_facts(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<Vec<VisitFact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, MIN(created_at) AS first_at
            FROM visits
            WHERE (?3 IS NULL OR branch_id = ?3)
            GROUP BY patient_id
            HAVING first_at >= ?1 AND first_at < ?2
            "#,
        )?;
        let facts = stmt
            .query_map(params![start, end, branch_id], |row| {
                Ok(VisitFact {
                    patient_id: row.get(0)?,
                    created_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    /// Number of visits currently in each status.
    pub fn status_counts(&self, branch_id: Option<&str>) -> DbResult<Vec<(VisitStatus, u64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT status, COUNT(*) FROM visits
            WHERE ?1 IS NULL OR branch_id = ?1
            GROUP BY status
            "#,
        )?;
        let rows = stmt.query_map(params![branch_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            counts.push((parse_stored(&status)?, count.max(0) as u64));
        }
        Ok(counts)
    }

    /// Concept line items posted in the window as (label, amount).
    pub fn concept_facts(&self, start: DateTime<Utc>, end: DateTime<Utc>, branch_id: Option<&str>) -> DbResult<Vec<(String, Decimal)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT concept, amount FROM visit_concepts
            WHERE created_at >= ?1 AND created_at < ?2
            AND (?3 IS NULL OR branch_id = ?3)
            "#,
        )?;
        let rows = stmt.query_map(params![start, end, branch_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut facts = Vec::new();
        for row in rows {
            let (concept, amount) = row?;
            facts.push((concept, parse_decimal(&amount)?));
        }
        Ok(facts)
    }
}
