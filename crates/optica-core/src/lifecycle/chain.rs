//! Hash chain over a visit's status history.
//!
//! Each record commits to its predecessor: `hash = SHA-256(prev_hash || payload)`
//! where `payload` is the canonical JSON of the record without its hashes.

use chrono::SecondsFormat;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{ChainVerification, LabRouting, StatusTransition, VisitStatus};

/// Canonical form of a status transition for hashing.
///
/// Field order is fixed by declaration order; timestamps use RFC 3339 with
/// nanoseconds so that storage round-trips hash identically.
#[derive(Serialize)]
struct CanonicalTransition<'a> {
    id: &'a str,
    visit_id: &'a str,
    seq: u32,
    from: VisitStatus,
    to: VisitStatus,
    user_id: &'a str,
    user_name: &'a str,
    branch_id: &'a str,
    at: String,
    notes: Option<&'a str>,
    lab: Option<&'a LabRouting>,
}

impl<'a> From<&'a StatusTransition> for CanonicalTransition<'a> {
    fn from(record: &'a StatusTransition) -> Self {
        Self {
            id: &record.id,
            visit_id: &record.visit_id,
            seq: record.seq,
            from: record.from,
            to: record.to,
            user_id: &record.user_id,
            user_name: &record.user_name,
            branch_id: &record.branch_id,
            at: record.at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            notes: record.notes.as_deref(),
            lab: record.lab.as_ref(),
        }
    }
}

/// Hash data with SHA-256, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the chained hash of a record from its `prev_hash` and content.
pub fn compute_record_hash(record: &StatusTransition) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(&CanonicalTransition::from(record))?;
    let mut data = Vec::with_capacity(record.prev_hash.len() + payload.len());
    data.extend_from_slice(record.prev_hash.as_bytes());
    data.extend_from_slice(payload.as_bytes());
    Ok(hash_data(&data))
}

/// Re-walk a visit's history (ordered by `seq`) and report the first broken link.
pub fn verify_chain(visit_id: &str, records: &[StatusTransition]) -> Result<ChainVerification, serde_json::Error> {
    let mut expected_prev = String::new();
    let mut first_broken_seq = None;

    for (index, record) in records.iter().enumerate() {
        let expected_seq = index as u32 + 1;
        let intact = record.seq == expected_seq
            && record.prev_hash == expected_prev
            && compute_record_hash(record)? == record.hash;
        if !intact {
            first_broken_seq = Some(record.seq);
            break;
        }
        expected_prev = record.hash.clone();
    }

    Ok(ChainVerification {
        visit_id: visit_id.to_string(),
        entries: records.len(),
        first_broken_seq,
    })
}
