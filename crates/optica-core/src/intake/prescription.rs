//! Turns submitted prescription rows into stored records.
//!
//! Acuity and refraction rows whose enumerated fields do not parse are either
//! dropped or rejected, depending on [`RowParsePolicy`].

use tracing::warn;

use super::{IntakeError, IntakeResult};
use crate::models::{
    clamp_denominator, Acuity, AcuityCondition, AcuityInput, ContactLensInput,
    ContactLensSelection, ContactLensType, Distance, Eye, Refraction, RefractionInput,
    RowParsePolicy,
};

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Apply `policy` to a row that failed to parse.
fn handle_bad_row<T>(policy: RowParsePolicy, kind: &str, index: usize, reason: String) -> IntakeResult<Option<T>> {
    match policy {
        RowParsePolicy::Skip => {
            warn!(kind, index, %reason, "Dropping unparseable prescription row");
            Ok(None)
        }
        RowParsePolicy::Reject => Err(IntakeError::InvalidRow(format!("{} row {}: {}", kind, index, reason))),
    }
}

pub fn parse_acuity(rows: &[AcuityInput], policy: RowParsePolicy) -> IntakeResult<Vec<Acuity>> {
    let mut parsed = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let fields = row
            .condition
            .parse::<AcuityCondition>()
            .and_then(|condition| row.eye.parse::<Eye>().map(|eye| (condition, eye)));

        let acuity = match fields {
            Ok((condition, eye)) => Some(Acuity {
                condition,
                eye,
                denominator: clamp_denominator(row.denominator),
            }),
            Err(reason) => handle_bad_row(policy, "acuity", index, reason)?,
        };
        parsed.extend(acuity);
    }
    Ok(parsed)
}

pub fn parse_refraction(rows: &[RefractionInput], policy: RowParsePolicy) -> IntakeResult<Vec<Refraction>> {
    let mut parsed = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let fields = row
            .eye
            .parse::<Eye>()
            .and_then(|eye| row.distance.parse::<Distance>().map(|distance| (eye, distance)));

        let refraction = match fields {
            Ok((eye, distance)) => Some(Refraction {
                eye,
                distance,
                sphere: row.sphere,
                cylinder: row.cylinder,
                axis: row.axis,
                addition: row.addition,
                pupillary_distance: trimmed(&row.pupillary_distance),
                oblique_height: row.oblique_height,
            }),
            Err(reason) => handle_bad_row(policy, "refraction", index, reason)?,
        };
        parsed.extend(refraction);
    }
    Ok(parsed)
}

/// Contact-lens rows never fail; unknown types become `Other`.
pub fn parse_contact_lenses(rows: &[ContactLensInput]) -> Vec<ContactLensSelection> {
    rows.iter()
        .map(|row| ContactLensSelection {
            lens_type: ContactLensType::parse_lenient(&row.lens_type),
            brand: trimmed(&row.brand),
            model: trimmed(&row.model),
            notes: trimmed(&row.notes),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn acuity(condition: &str, eye: &str, denominator: i32) -> AcuityInput {
        AcuityInput {
            condition: condition.into(),
            eye: eye.into(),
            denominator,
        }
    }

    fn refraction(eye: &str, distance: &str) -> RefractionInput {
        RefractionInput {
            eye: eye.into(),
            distance: distance.into(),
            sphere: Some(Decimal::new(-125, 2)),
            cylinder: None,
            axis: Some(90),
            addition: None,
            pupillary_distance: Some(" 55-70 ".into()),
            oblique_height: None,
        }
    }

    #[test]
    fn test_acuity_clamped_and_parsed() {
        let rows = vec![acuity("WithoutLenses", "OD", 250), acuity("with_lenses", "oi", 4)];
        let parsed = parse_acuity(&rows, RowParsePolicy::Skip).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].denominator, 200);
        assert_eq!(parsed[0].eye, Eye::Od);
        assert_eq!(parsed[1].denominator, 10);
        assert_eq!(parsed[1].condition, AcuityCondition::WithLenses);
    }

    #[test]
    fn test_skip_drops_bad_rows() {
        let rows = vec![acuity("squinting", "OD", 20), acuity("WithLenses", "OI", 20)];
        let parsed = parse_acuity(&rows, RowParsePolicy::Skip).unwrap();
        assert_eq!(parsed.len(), 1);

        let rows = vec![refraction("OD", "middle"), refraction("OI", "Far")];
        let parsed = parse_refraction(&rows, RowParsePolicy::Skip).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].eye, Eye::Oi);
    }

    #[test]
    fn test_reject_fails_on_bad_row() {
        let rows = vec![acuity("WithLenses", "OD", 20), acuity("WithLenses", "third", 20)];
        let result = parse_acuity(&rows, RowParsePolicy::Reject);
        assert!(matches!(result, Err(IntakeError::InvalidRow(msg)) if msg.starts_with("acuity row 1")));

        let result = parse_refraction(&[refraction("X", "Far")], RowParsePolicy::Reject);
        assert!(matches!(result, Err(IntakeError::InvalidRow(_))));
    }

    #[test]
    fn test_refraction_keeps_pd_range() {
        let parsed = parse_refraction(&[refraction("right", "near")], RowParsePolicy::Reject).unwrap();
        assert_eq!(parsed[0].pupillary_distance.as_deref(), Some("55-70"));
        assert_eq!(parsed[0].distance, Distance::Near);
    }

    #[test]
    fn test_contact_lens_fallback() {
        let rows = vec![ContactLensInput {
            lens_type: "hybrid".into(),
            brand: Some("Acme".into()),
            model: Some("  ".into()),
            notes: None,
        }];
        let parsed = parse_contact_lenses(&rows);
        assert_eq!(parsed[0].lens_type, ContactLensType::Other);
        assert_eq!(parsed[0].brand.as_deref(), Some("Acme"));
        assert_eq!(parsed[0].model, None);
    }
}
