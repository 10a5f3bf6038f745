//! Visit database operations: header row and owned prescription collections.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    decimal_to_sql, parse_decimal, parse_opt_decimal, parse_stored, Database, DbError, DbResult,
};
use crate::models::{
    new_id, Acuity, ContactLensSelection, ContactLensType, FrameSelection, LabQueueItem,
    MaterialSelection, Refraction, Visit, VisitConcept, VisitStatus,
};

const VISIT_COLUMNS: &str = r#"
    v.id, v.patient_id, v.branch_id, v.created_at, v.status,
    v.total, v.paid, v.balance,
    v.lab_shipped_at, v.estimated_delivery_at, v.received_at, v.delivered_at,
    v.notes, v.created_by_id, v.created_by_name, v.version, v.updated_at
"#;

impl Database {
    /// Insert a new visit header.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visits (
                id, patient_id, branch_id, created_at, status,
                total, paid, balance,
                lab_shipped_at, estimated_delivery_at, received_at, delivered_at,
                notes, created_by_id, created_by_name, version, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                visit.id,
                visit.patient_id,
                visit.branch_id,
                visit.created_at,
                visit.status.as_str(),
                visit.total.map(decimal_to_sql),
                visit.paid.map(decimal_to_sql),
                visit.balance.map(decimal_to_sql),
                visit.lab_shipped_at,
                visit.estimated_delivery_at,
                visit.received_at,
                visit.delivered_at,
                visit.notes,
                visit.created_by_id,
                visit.created_by_name,
                visit.version,
                visit.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a visit header by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visits v WHERE v.id = ?", VISIT_COLUMNS),
                [id],
                visit_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Persist the mutable state of a visit, guarded by its version.
    ///
    /// `visit.version` must be the version that was read. On success the
    /// stored version is incremented and returned.
    pub fn save_visit_state(&self, visit: &Visit) -> DbResult<i64> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                status = ?3,
                total = ?4,
                paid = ?5,
                balance = ?6,
                lab_shipped_at = ?7,
                estimated_delivery_at = ?8,
                received_at = ?9,
                delivered_at = ?10,
                notes = ?11,
                version = version + 1,
                updated_at = ?12
            WHERE id = ?1 AND version = ?2
            "#,
            params![
                visit.id,
                visit.version,
                visit.status.as_str(),
                visit.total.map(decimal_to_sql),
                visit.paid.map(decimal_to_sql),
                visit.balance.map(decimal_to_sql),
                visit.lab_shipped_at,
                visit.estimated_delivery_at,
                visit.received_at,
                visit.delivered_at,
                visit.notes,
                Utc::now(),
            ],
        )?;

        if rows_affected == 0 {
            return if self.get_visit(&visit.id)?.is_some() {
                Err(DbError::Conflict(format!(
                    "Visit {} was modified concurrently (expected version {})",
                    visit.id, visit.version
                )))
            } else {
                Err(DbError::NotFound(format!("Visit {}", visit.id)))
            };
        }
        Ok(visit.version + 1)
    }

    /// Most recent visits of a patient, newest first.
    pub fn list_patient_visits(&self, patient_id: &str, limit: usize) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM visits v
            WHERE v.patient_id = ?1
            ORDER BY v.created_at DESC
            LIMIT ?2
            "#,
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![patient_id, limit as i64], visit_row)?;
        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// Latest visit of a patient, if any.
    pub fn latest_visit_for_patient(&self, patient_id: &str) -> DbResult<Option<Visit>> {
        Ok(self.list_patient_visits(patient_id, 1)?.into_iter().next())
    }

    /// Visits in the given status joined with patient contact data, latest shipment first.
    pub fn list_lab_queue(&self, status: VisitStatus, limit: usize) -> DbResult<Vec<LabQueueItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT v.id, v.branch_id, p.name, p.phone,
                   v.lab_shipped_at, v.estimated_delivery_at,
                   v.total, v.paid, v.balance, v.notes
            FROM visits v
            JOIN patients p ON p.id = v.patient_id
            WHERE v.status = ?1
            ORDER BY v.lab_shipped_at DESC, v.created_at DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![status.as_str(), limit as i64], |row| {
            Ok(LabQueueRow {
                visit_id: row.get(0)?,
                branch_id: row.get(1)?,
                patient_name: row.get(2)?,
                patient_phone: row.get(3)?,
                lab_shipped_at: row.get(4)?,
                estimated_delivery_at: row.get(5)?,
                total: row.get(6)?,
                paid: row.get(7)?,
                balance: row.get(8)?,
                notes: row.get(9)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Prescription collections
    // -----------------------------------------------------------------------

    pub fn insert_acuity(&self, visit_id: &str, acuity: &Acuity) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visit_acuity (id, visit_id, condition, eye, denominator)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                new_id(),
                visit_id,
                acuity.condition.as_str(),
                acuity.eye.as_str(),
                acuity.denominator,
            ],
        )?;
        Ok(())
    }

    /// Insert a refraction row. A second row for the same (eye, distance) is a conflict.
    pub fn insert_refraction(&self, visit_id: &str, refraction: &Refraction) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visit_refraction (
                id, visit_id, eye, distance, sphere, cylinder, axis,
                addition, pupillary_distance, oblique_height
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                new_id(),
                visit_id,
                refraction.eye.as_str(),
                refraction.distance.as_str(),
                refraction.sphere.map(decimal_to_sql),
                refraction.cylinder.map(decimal_to_sql),
                refraction.axis,
                refraction.addition.map(decimal_to_sql),
                refraction.pupillary_distance,
                refraction.oblique_height.map(decimal_to_sql),
            ],
        )?;
        Ok(())
    }

    pub fn insert_material_selection(&self, visit_id: &str, material_id: &str, notes: Option<&str>) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO visit_materials (id, visit_id, material_id, notes) VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), visit_id, material_id, notes],
        )?;
        Ok(())
    }

    pub fn insert_frame_selection(&self, visit_id: &str, product_id: &str, notes: Option<&str>) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO visit_frames (id, visit_id, product_id, notes) VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), visit_id, product_id, notes],
        )?;
        Ok(())
    }

    pub fn insert_contact_lens(&self, visit_id: &str, lens: &ContactLensSelection) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visit_contact_lenses (id, visit_id, lens_type, brand, model, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                new_id(),
                visit_id,
                lens.lens_type.as_str(),
                lens.brand,
                lens.model,
                lens.notes,
            ],
        )?;
        Ok(())
    }

    /// Acuity rows ordered by condition, then OD before OI.
    pub fn list_acuity(&self, visit_id: &str) -> DbResult<Vec<Acuity>> {
        let mut stmt = self.conn.prepare(
            "SELECT condition, eye, denominator FROM visit_acuity WHERE visit_id = ?",
        )?;
        let rows = stmt.query_map([visit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u16>(2)?,
            ))
        })?;

        let mut acuity = Vec::new();
        for row in rows {
            let (condition, eye, denominator) = row?;
            acuity.push(Acuity {
                condition: parse_stored(&condition)?,
                eye: parse_stored(&eye)?,
                denominator,
            });
        }
        acuity.sort_by_key(|a| (a.condition, a.eye));
        Ok(acuity)
    }

    /// Refraction rows ordered Far before Near, then OD before OI.
    pub fn list_refraction(&self, visit_id: &str) -> DbResult<Vec<Refraction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT eye, distance, sphere, cylinder, axis, addition,
                   pupillary_distance, oblique_height
            FROM visit_refraction
            WHERE visit_id = ?
            "#,
        )?;
        let rows = stmt.query_map([visit_id], |row| {
            Ok(RefractionRow {
                eye: row.get(0)?,
                distance: row.get(1)?,
                sphere: row.get(2)?,
                cylinder: row.get(3)?,
                axis: row.get(4)?,
                addition: row.get(5)?,
                pupillary_distance: row.get(6)?,
                oblique_height: row.get(7)?,
            })
        })?;

        let mut refraction: Vec<Refraction> = Vec::new();
        for row in rows {
            refraction.push(row?.try_into()?);
        }
        refraction.sort_by_key(|r| (r.distance, r.eye));
        Ok(refraction)
    }

    pub fn list_material_selections(&self, visit_id: &str) -> DbResult<Vec<MaterialSelection>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT vm.material_id, m.description, m.brand, vm.notes
            FROM visit_materials vm
            LEFT JOIN materials m ON m.id = vm.material_id
            WHERE vm.visit_id = ?
            ORDER BY vm.rowid
            "#,
        )?;
        let selections = stmt
            .query_map([visit_id], |row| {
                Ok(MaterialSelection {
                    material_id: row.get(0)?,
                    description: row.get(1)?,
                    brand: row.get(2)?,
                    notes: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(selections)
    }

    pub fn list_frame_selections(&self, visit_id: &str) -> DbResult<Vec<FrameSelection>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT vf.product_id, p.sku, p.name, vf.notes
            FROM visit_frames vf
            LEFT JOIN products p ON p.id = vf.product_id
            WHERE vf.visit_id = ?
            ORDER BY vf.rowid
            "#,
        )?;
        let selections = stmt
            .query_map([visit_id], |row| {
                Ok(FrameSelection {
                    product_id: row.get(0)?,
                    sku: row.get(1)?,
                    name: row.get(2)?,
                    notes: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(selections)
    }

    pub fn list_contact_lenses(&self, visit_id: &str) -> DbResult<Vec<ContactLensSelection>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT lens_type, brand, model, notes
            FROM visit_contact_lenses
            WHERE visit_id = ?
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map([visit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut lenses = Vec::new();
        for row in rows {
            let (lens_type, brand, model, notes) = row?;
            lenses.push(ContactLensSelection {
                lens_type: ContactLensType::parse_lenient(&lens_type),
                brand,
                model,
                notes,
            });
        }
        Ok(lenses)
    }

    // -----------------------------------------------------------------------
    // Concepts
    // -----------------------------------------------------------------------

    pub fn insert_concept(&self, concept: &VisitConcept) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visit_concepts (
                id, visit_id, concept, amount, user_id, user_name,
                branch_id, created_at, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                concept.id,
                concept.visit_id,
                concept.concept,
                decimal_to_sql(concept.amount),
                concept.user_id,
                concept.user_name,
                concept.branch_id,
                concept.created_at,
                concept.notes,
            ],
        )?;
        Ok(())
    }

    /// Concepts of a visit, oldest first.
    pub fn list_concepts(&self, visit_id: &str) -> DbResult<Vec<VisitConcept>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, visit_id, concept, amount, user_id, user_name,
                   branch_id, created_at, notes
            FROM visit_concepts
            WHERE visit_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map([visit_id], |row| {
            Ok((
                VisitConcept {
                    id: row.get(0)?,
                    visit_id: row.get(1)?,
                    concept: row.get(2)?,
                    amount: Default::default(),
                    user_id: row.get(4)?,
                    user_name: row.get(5)?,
                    branch_id: row.get(6)?,
                    created_at: row.get(7)?,
                    notes: row.get(8)?,
                },
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut concepts = Vec::new();
        for row in rows {
            let (mut concept, amount) = row?;
            concept.amount = parse_decimal(&amount)?;
            concepts.push(concept);
        }
        Ok(concepts)
    }
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    patient_id: String,
    branch_id: String,
    created_at: DateTime<Utc>,
    status: String,
    total: Option<String>,
    paid: Option<String>,
    balance: Option<String>,
    lab_shipped_at: Option<DateTime<Utc>>,
    estimated_delivery_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_by_id: String,
    created_by_name: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

fn visit_row(row: &Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        branch_id: row.get(2)?,
        created_at: row.get(3)?,
        status: row.get(4)?,
        total: row.get(5)?,
        paid: row.get(6)?,
        balance: row.get(7)?,
        lab_shipped_at: row.get(8)?,
        estimated_delivery_at: row.get(9)?,
        received_at: row.get(10)?,
        delivered_at: row.get(11)?,
        notes: row.get(12)?,
        created_by_id: row.get(13)?,
        created_by_name: row.get(14)?,
        version: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        Ok(Visit {
            id: row.id,
            patient_id: row.patient_id,
            branch_id: row.branch_id,
            created_at: row.created_at,
            status: parse_stored(&row.status)?,
            total: parse_opt_decimal(row.total)?,
            paid: parse_opt_decimal(row.paid)?,
            balance: parse_opt_decimal(row.balance)?,
            lab_shipped_at: row.lab_shipped_at,
            estimated_delivery_at: row.estimated_delivery_at,
            received_at: row.received_at,
            delivered_at: row.delivered_at,
            notes: row.notes,
            created_by_id: row.created_by_id,
            created_by_name: row.created_by_name,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

struct RefractionRow {
    eye: String,
    distance: String,
    sphere: Option<String>,
    cylinder: Option<String>,
    axis: Option<i32>,
    addition: Option<String>,
    pupillary_distance: Option<String>,
    oblique_height: Option<String>,
}

impl TryFrom<RefractionRow> for Refraction {
    type Error = DbError;

    fn try_from(row: RefractionRow) -> Result<Self, Self::Error> {
        Ok(Refraction {
            eye: parse_stored(&row.eye)?,
            distance: parse_stored(&row.distance)?,
            sphere: parse_opt_decimal(row.sphere)?,
            cylinder: parse_opt_decimal(row.cylinder)?,
            axis: row.axis,
            addition: parse_opt_decimal(row.addition)?,
            pupillary_distance: row.pupillary_distance,
            oblique_height: parse_opt_decimal(row.oblique_height)?,
        })
    }
}

struct LabQueueRow {
    visit_id: String,
    branch_id: String,
    patient_name: String,
    patient_phone: String,
    lab_shipped_at: Option<DateTime<Utc>>,
    estimated_delivery_at: Option<DateTime<Utc>>,
    total: Option<String>,
    paid: Option<String>,
    balance: Option<String>,
    notes: Option<String>,
}

impl TryFrom<LabQueueRow> for LabQueueItem {
    type Error = DbError;

    fn try_from(row: LabQueueRow) -> Result<Self, Self::Error> {
        Ok(LabQueueItem {
            visit_id: row.visit_id,
            branch_id: row.branch_id,
            patient_name: row.patient_name,
            patient_phone: row.patient_phone,
            lab_shipped_at: row.lab_shipped_at,
            estimated_delivery_at: row.estimated_delivery_at,
            total: parse_opt_decimal(row.total)?,
            paid: parse_opt_decimal(row.paid)?,
            balance: parse_opt_decimal(row.balance)?,
            notes: row.notes,
        })
    }
}
