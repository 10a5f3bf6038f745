//! Visit status lifecycle models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{fold_token, NewPayment};

/// Lifecycle status of a visit (order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    /// Initial status of every new visit
    Created,
    Registered,
    InTransitToBranch,
    ReceivedAtBranch,
    SentToLab,
    ReadyAtLab,
    ReceivedAtCentralBranch,
    ReadyForDelivery,
    ReceivedAtOriginBranch,
    DeliveredToCustomer,
    Cancelled,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 11] = [
        Self::Created,
        Self::Registered,
        Self::InTransitToBranch,
        Self::ReceivedAtBranch,
        Self::SentToLab,
        Self::ReadyAtLab,
        Self::ReceivedAtCentralBranch,
        Self::ReadyForDelivery,
        Self::ReceivedAtOriginBranch,
        Self::DeliveredToCustomer,
        Self::Cancelled,
    ];

    /// Wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Registered => "registered",
            Self::InTransitToBranch => "in_transit_to_branch",
            Self::ReceivedAtBranch => "received_at_branch",
            Self::SentToLab => "sent_to_lab",
            Self::ReadyAtLab => "ready_at_lab",
            Self::ReceivedAtCentralBranch => "received_at_central_branch",
            Self::ReadyForDelivery => "ready_for_delivery",
            Self::ReceivedAtOriginBranch => "received_at_origin_branch",
            Self::DeliveredToCustomer => "delivered_to_customer",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label used by reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Registered => "Registered",
            Self::InTransitToBranch => "In transit to branch",
            Self::ReceivedAtBranch => "Received at branch",
            Self::SentToLab => "Sent to lab",
            Self::ReadyAtLab => "Ready at lab",
            Self::ReceivedAtCentralBranch => "Received at central branch",
            Self::ReadyForDelivery => "Ready for delivery",
            Self::ReceivedAtOriginBranch => "Received at origin branch",
            Self::DeliveredToCustomer => "Delivered to customer",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DeliveredToCustomer | Self::Cancelled)
    }

    /// Statuses in which the order is physically at the lab.
    pub fn is_in_lab(&self) -> bool {
        matches!(self, Self::SentToLab | Self::ReadyAtLab)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = String;

    /// Accepts the wire name or the variant name in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = fold_token(s);
        Self::ALL
            .iter()
            .copied()
            .find(|status| fold_token(status.as_str()) == folded)
            .ok_or_else(|| format!("Unknown visit status: {}", s))
    }
}

/// How status changes are validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Only moves listed in the transition table are accepted
    #[default]
    Strict,
    /// Any status may follow any non-identical status
    Permissive,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(format!("Unknown transition policy: {}", s)),
        }
    }
}

/// Where an order sent to the lab is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabKind {
    Internal,
    External,
}

impl LabKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl FromStr for LabKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_token(s).as_str() {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            _ => Err(format!("Unknown lab kind: {}", s)),
        }
    }
}

/// Lab routing metadata attached to a transition into `SentToLab`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabRouting {
    pub kind: LabKind,
    #[serde(default)]
    pub lab_id: Option<String>,
    #[serde(default)]
    pub lab_name: Option<String>,
}

/// One entry of a visit's append-only status audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusTransition {
    pub id: String,
    pub visit_id: String,
    /// Position in the visit's trail, starting at 1
    pub seq: u32,
    /// Status immediately before the change
    pub from: VisitStatus,
    pub to: VisitStatus,
    pub user_id: String,
    pub user_name: String,
    pub branch_id: String,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
    pub lab: Option<LabRouting>,
    /// Hash of the previous entry, empty for the first
    pub prev_hash: String,
    /// Hex SHA-256 over `prev_hash` and the canonical payload
    pub hash: String,
}

/// A status change request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeStatusRequest {
    /// Target status name
    pub to: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Required when moving to `SentToLab`
    #[serde(default)]
    pub lab: Option<LabRouting>,
    /// Order total to set when moving to `SentToLab`
    #[serde(default)]
    pub total: Option<Decimal>,
    /// Payments posted together with a move to `SentToLab`
    #[serde(default)]
    pub payments: Vec<NewPayment>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl ChangeStatusRequest {
    pub fn to(status: VisitStatus) -> Self {
        Self {
            to: status.as_str().to_string(),
            ..Default::default()
        }
    }
}

/// Result of re-walking a visit's audit hash chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainVerification {
    pub visit_id: String,
    /// Number of entries checked
    pub entries: usize,
    /// Sequence number of the first entry whose hash does not match
    pub first_broken_seq: Option<u32>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken_seq.is_none()
    }
}
