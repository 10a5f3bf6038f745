//! Visit (clinical encounter / order) models.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{fold_token, new_id, Actor, LedgerTotals, Payment, VisitStatus};

/// Lowest acuity denominator that is stored (20/10).
pub const MIN_ACUITY_DENOMINATOR: i32 = 10;
/// Highest acuity denominator that is stored (20/200).
pub const MAX_ACUITY_DENOMINATOR: i32 = 200;

/// Clamp an acuity denominator into the storable range. Never rejects.
pub fn clamp_denominator(value: i32) -> u16 {
    // Bounds fit in u16.
    value.clamp(MIN_ACUITY_DENOMINATOR, MAX_ACUITY_DENOMINATOR) as u16
}

/// Eye a measurement applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    /// Right eye (oculus dexter)
    Od,
    /// Left eye
    Oi,
}

impl Eye {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Od => "od",
            Self::Oi => "oi",
        }
    }
}

impl FromStr for Eye {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "od" | "right" | "r" => Ok(Self::Od),
            "oi" | "os" | "left" | "l" => Ok(Self::Oi),
            _ => Err(format!("Unknown eye: {}", s)),
        }
    }
}

/// Whether acuity was measured with or without correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcuityCondition {
    WithoutLenses,
    WithLenses,
}

impl AcuityCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithoutLenses => "without_lenses",
            Self::WithLenses => "with_lenses",
        }
    }
}

impl FromStr for AcuityCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "withoutlenses" | "uncorrected" | "sc" => Ok(Self::WithoutLenses),
            "withlenses" | "corrected" | "cc" => Ok(Self::WithLenses),
            _ => Err(format!("Unknown acuity condition: {}", s)),
        }
    }
}

/// Viewing distance of a refraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Far,
    Near,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Far => "far",
            Self::Near => "near",
        }
    }
}

impl FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "far" | "distance" => Ok(Self::Far),
            "near" | "reading" => Ok(Self::Near),
            _ => Err(format!("Unknown distance: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactLensType {
    Spherical,
    Toric,
    Other,
}

impl ContactLensType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spherical => "spherical",
            Self::Toric => "toric",
            Self::Other => "other",
        }
    }

    /// Parse a lens type; anything unrecognized becomes `Other`.
    pub fn parse_lenient(raw: &str) -> Self {
        match fold_token(raw).as_str() {
            "spherical" | "sphere" => Self::Spherical,
            "toric" => Self::Toric,
            _ => Self::Other,
        }
    }
}

/// What to do with prescription rows whose enumerated fields do not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowParsePolicy {
    /// Drop the row and keep going
    #[default]
    Skip,
    /// Fail the whole request
    Reject,
}

impl FromStr for RowParsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("Unknown row parse policy: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcuityInput {
    pub condition: String,
    pub eye: String,
    pub denominator: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefractionInput {
    pub eye: String,
    pub distance: String,
    #[serde(default)]
    pub sphere: Option<Decimal>,
    #[serde(default)]
    pub cylinder: Option<Decimal>,
    #[serde(default)]
    pub axis: Option<i32>,
    #[serde(default)]
    pub addition: Option<Decimal>,
    #[serde(default)]
    pub pupillary_distance: Option<String>,
    #[serde(default)]
    pub oblique_height: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialInput {
    pub material_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameInput {
    pub product_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactLensInput {
    pub lens_type: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Everything captured when a visit is opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewVisit {
    pub patient_id: String,
    /// Defaults to the actor's branch
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub acuity: Vec<AcuityInput>,
    #[serde(default)]
    pub refraction: Vec<RefractionInput>,
    #[serde(default)]
    pub materials: Vec<MaterialInput>,
    #[serde(default)]
    pub frames: Vec<FrameInput>,
    #[serde(default)]
    pub contact_lenses: Vec<ContactLensInput>,
}

/// A sales line item posted against a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewConcept {
    pub concept: String,
    pub amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Acuity {
    pub condition: AcuityCondition,
    pub eye: Eye,
    /// Always within `[10, 200]`
    pub denominator: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refraction {
    pub eye: Eye,
    pub distance: Distance,
    pub sphere: Option<Decimal>,
    pub cylinder: Option<Decimal>,
    pub axis: Option<i32>,
    pub addition: Option<Decimal>,
    /// Free text; may hold a range such as "55-70"
    pub pupillary_distance: Option<String>,
    pub oblique_height: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialSelection {
    pub material_id: String,
    /// Catalog description, filled on read
    pub description: Option<String>,
    pub brand: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSelection {
    pub product_id: String,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactLensSelection {
    pub lens_type: ContactLensType,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitConcept {
    pub id: String,
    pub visit_id: String,
    pub concept: String,
    pub amount: Decimal,
    pub user_id: String,
    pub user_name: String,
    pub branch_id: String,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// The visit header row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    /// Unique identifier
    pub id: String,
    pub patient_id: String,
    pub branch_id: String,
    pub created_at: DateTime<Utc>,
    pub status: VisitStatus,
    /// Order total; unset until priced
    pub total: Option<Decimal>,
    /// Sum of payments; unset until the first payment
    pub paid: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub lab_shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    /// When the finished order arrived back at the origin branch
    pub received_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by_id: String,
    pub created_by_name: String,
    /// Bumped on every mutation; writers must present the value they read
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Open a new visit in `Created` status.
    pub fn new(patient_id: impl Into<String>, branch_id: impl Into<String>, actor: &Actor) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            patient_id: patient_id.into(),
            branch_id: branch_id.into(),
            created_at: now,
            status: VisitStatus::Created,
            total: None,
            paid: None,
            balance: None,
            lab_shipped_at: None,
            estimated_delivery_at: None,
            received_at: None,
            delivered_at: None,
            notes: None,
            created_by_id: actor.user_id.clone(),
            created_by_name: actor.name.clone(),
            version: 0,
            updated_at: now,
        }
    }

    /// Copy freshly computed ledger totals onto the header.
    pub fn apply_totals(&mut self, totals: &LedgerTotals) {
        self.total = totals.total;
        self.paid = Some(totals.paid);
        self.balance = Some(totals.balance);
    }

    /// Outstanding balance; zero when nothing is owed or nothing was priced.
    pub fn outstanding(&self) -> Decimal {
        self.balance.unwrap_or(Decimal::ZERO)
    }
}

/// Full visit detail with every owned collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitDetail {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient_name: String,
    pub patient_phone: String,
    pub acuity: Vec<Acuity>,
    pub refraction: Vec<Refraction>,
    pub materials: Vec<MaterialSelection>,
    pub frames: Vec<FrameSelection>,
    pub contact_lenses: Vec<ContactLensSelection>,
    pub payments: Vec<Payment>,
    pub concepts: Vec<VisitConcept>,
}

/// Compact visit view for a patient's history list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: VisitStatus,
    pub total: Option<Decimal>,
    pub paid: Decimal,
    pub balance: Option<Decimal>,
    pub last_payment: Option<Payment>,
    pub refraction: Vec<Refraction>,
}

/// A visit currently at the lab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabQueueItem {
    pub visit_id: String,
    pub branch_id: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub lab_shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub total: Option<Decimal>,
    pub paid: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub notes: Option<String>,
}
