//! Visit lifecycle integration tests.

use optica_core::db::Database;
use optica_core::ledger::PaymentLedger;
use optica_core::lifecycle::StatusTracker;
use optica_core::models::{
    AcuityInput, Branch, ChangeStatusRequest, LabKind, LabRouting, NewPatient, NewPayment, NewVisit,
    PaymentMethod, RefractionInput, TransitionPolicy, VisitStatus,
};
use optica_core::{CorePolicy, OpticaCore, OpticaError};
use rust_decimal::Decimal;

fn bootstrap() -> (OpticaCore, optica_core::Actor) {
    let core = OpticaCore::open_in_memory(CorePolicy::default()).unwrap();
    let admin = optica_core::Actor::new("root", "Root", "hq").with_role("admin");
    let branch = core.create_branch(&admin, "Centro").unwrap();
    (core, optica_core::Actor::new("u1", "Ana", branch.id))
}

fn jane() -> NewPatient {
    NewPatient {
        name: "Jane Doe".into(),
        age: 41,
        phone: "555-1111".into(),
        occupation: "Engineer".into(),
        address: None,
    }
}

fn money(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}

fn lab() -> LabRouting {
    LabRouting {
        kind: LabKind::Internal,
        lab_id: Some("lab-1".into()),
        lab_name: Some("Central Lab".into()),
    }
}

#[test]
fn test_end_to_end_jane_doe() {
    let (core, ana) = bootstrap();

    let patient = core.create_patient(&ana, jane()).unwrap();
    let visit_id = core
        .create_visit(
            &ana,
            &NewVisit {
                patient_id: patient.id.clone(),
                acuity: vec![AcuityInput {
                    condition: "WithoutLenses".into(),
                    eye: "OD".into(),
                    denominator: 250,
                }],
                refraction: vec![RefractionInput {
                    eye: "OD".into(),
                    distance: "Far".into(),
                    sphere: Some(Decimal::new(-200, 2)),
                    cylinder: None,
                    axis: None,
                    addition: None,
                    pupillary_distance: Some("55-70".into()),
                    oblique_height: None,
                }],
                ..Default::default()
            },
        )
        .unwrap();

    let detail = core.get_visit(&ana, &visit_id).unwrap();
    assert_eq!(detail.visit.status, VisitStatus::Created);
    assert_eq!(detail.acuity[0].denominator, 200);
    assert_eq!(detail.patient_phone, "555-1111");

    core.change_status(&ana, &visit_id, &ChangeStatusRequest::to(VisitStatus::Registered))
        .unwrap();

    let mut to_lab = ChangeStatusRequest::to(VisitStatus::SentToLab);
    to_lab.lab = Some(lab());
    to_lab.total = Some(money(250));
    to_lab.payments = vec![NewPayment::new(money(100), PaymentMethod::Cash)];
    core.change_status(&ana, &visit_id, &to_lab).unwrap();

    let after_lab = core.get_visit(&ana, &visit_id).unwrap().visit;
    assert_eq!(after_lab.paid, Some(money(100)));
    assert_eq!(after_lab.balance, Some(money(150)));
    assert!(after_lab.lab_shipped_at.is_some());

    let totals = core
        .add_payment(&ana, &visit_id, &NewPayment::new(money(150), PaymentMethod::Card))
        .unwrap();
    assert_eq!(totals.paid, money(250));
    assert_eq!(totals.balance, Decimal::ZERO);

    let history = core.status_history(&ana, &visit_id).unwrap();
    let path: Vec<(VisitStatus, VisitStatus)> = history.iter().map(|h| (h.from, h.to)).collect();
    assert_eq!(
        path,
        vec![
            (VisitStatus::Created, VisitStatus::Registered),
            (VisitStatus::Registered, VisitStatus::SentToLab),
        ]
    );
    assert_eq!(history[1].lab.as_ref().unwrap().kind, LabKind::Internal);

    let grid = core.query_patients(&ana, Some("jane"), 1, 10).unwrap();
    assert_eq!(grid.total, 1);
    assert!(grid.items[0].has_pending_order, "visit is still at the lab");

    let in_lab = core.visits_in_lab(&ana, 10).unwrap();
    assert_eq!(in_lab.len(), 1);
    assert_eq!(in_lab[0].patient_name, "Jane Doe");
}

#[test]
fn test_duplicate_patient_and_refraction() {
    let (core, ana) = bootstrap();
    let patient = core.create_patient(&ana, jane()).unwrap();
    assert!(matches!(core.create_patient(&ana, jane()), Err(OpticaError::Conflict(_))));

    let row = RefractionInput {
        eye: "OI".into(),
        distance: "Near".into(),
        sphere: None,
        cylinder: None,
        axis: None,
        addition: Some(Decimal::new(200, 2)),
        pupillary_distance: None,
        oblique_height: None,
    };
    let request = NewVisit {
        patient_id: patient.id,
        refraction: vec![row.clone(), row],
        ..Default::default()
    };
    assert!(matches!(core.create_visit(&ana, &request), Err(OpticaError::Conflict(_))));
}

#[test]
fn test_each_change_appends_one_record() {
    let db = Database::open_in_memory().unwrap();
    let branch = Branch::new("Centro");
    db.insert_branch(&branch).unwrap();
    let actor = optica_core::Actor::new("u1", "Ana", branch.id.clone());
    let patient = jane().into_patient(&actor);
    db.insert_patient(&patient).unwrap();
    let visit = optica_core::Visit::new(&patient.id, &branch.id, &actor);
    db.insert_visit(&visit).unwrap();

    let tracker = StatusTracker::new(&db, TransitionPolicy::Strict);
    let route = [
        VisitStatus::Registered,
        VisitStatus::InTransitToBranch,
        VisitStatus::ReceivedAtBranch,
        VisitStatus::SentToLab,
        VisitStatus::ReadyAtLab,
        VisitStatus::ReceivedAtCentralBranch,
        VisitStatus::ReceivedAtOriginBranch,
        VisitStatus::ReadyForDelivery,
        VisitStatus::DeliveredToCustomer,
    ];

    let mut prior = VisitStatus::Created;
    for (i, status) in route.iter().enumerate() {
        let mut request = ChangeStatusRequest::to(*status);
        if *status == VisitStatus::SentToLab {
            request.lab = Some(lab());
        }
        let record = tracker.change_status(&actor, &visit.id, &request).unwrap();
        assert_eq!(record.from, prior);
        assert_eq!(tracker.history(&visit.id).unwrap().len(), i + 1);
        prior = *status;
    }

    let finished = db.get_visit(&visit.id).unwrap().unwrap();
    assert_eq!(finished.status, VisitStatus::DeliveredToCustomer);
    assert!(finished.received_at.is_some());
    assert!(finished.delivered_at.is_some());
}

#[test]
fn test_tampered_history_detected() {
    let db = Database::open_in_memory().unwrap();
    let branch = Branch::new("Centro");
    db.insert_branch(&branch).unwrap();
    let actor = optica_core::Actor::new("u1", "Ana", branch.id.clone());
    let patient = jane().into_patient(&actor);
    db.insert_patient(&patient).unwrap();
    let visit = optica_core::Visit::new(&patient.id, &branch.id, &actor);
    db.insert_visit(&visit).unwrap();

    let tracker = StatusTracker::new(&db, TransitionPolicy::Strict);
    tracker
        .change_status(&actor, &visit.id, &ChangeStatusRequest::to(VisitStatus::Registered))
        .unwrap();
    tracker
        .change_status(&actor, &visit.id, &ChangeStatusRequest::to(VisitStatus::Cancelled))
        .unwrap();
    assert!(tracker.verify(&visit.id).unwrap().is_intact());

    db.conn()
        .execute_batch(
            "DROP TRIGGER status_history_no_update;
             UPDATE status_history SET user_name = 'Mallory' WHERE seq = 2;",
        )
        .unwrap();

    let verification = tracker.verify(&visit.id).unwrap();
    assert_eq!(verification.first_broken_seq, Some(2));
}

#[test]
fn test_payments_are_append_only() {
    let db = Database::open_in_memory().unwrap();
    let branch = Branch::new("Centro");
    db.insert_branch(&branch).unwrap();
    let actor = optica_core::Actor::new("u1", "Ana", branch.id.clone());
    let patient = jane().into_patient(&actor);
    db.insert_patient(&patient).unwrap();
    let visit = optica_core::Visit::new(&patient.id, &branch.id, &actor);
    db.insert_visit(&visit).unwrap();

    PaymentLedger::new(&db)
        .add_payment(&actor, &visit.id, &NewPayment::new(money(10), PaymentMethod::Transfer))
        .unwrap();

    let result = db.conn().execute("UPDATE payments SET amount = '1.00'", []);
    assert!(result.is_err());
    let result = db.conn().execute("DELETE FROM payments", []);
    assert!(result.is_err());
    assert_eq!(db.list_payments(&visit.id).unwrap()[0].amount, money(10));
}

#[test]
fn test_stale_version_is_conflict() {
    let db = Database::open_in_memory().unwrap();
    let branch = Branch::new("Centro");
    db.insert_branch(&branch).unwrap();
    let actor = optica_core::Actor::new("u1", "Ana", branch.id.clone());
    let patient = jane().into_patient(&actor);
    db.insert_patient(&patient).unwrap();
    let visit = optica_core::Visit::new(&patient.id, &branch.id, &actor);
    db.insert_visit(&visit).unwrap();

    let stale = db.get_visit(&visit.id).unwrap().unwrap();
    PaymentLedger::new(&db)
        .add_payment(&actor, &visit.id, &NewPayment::new(money(10), PaymentMethod::Cash))
        .unwrap();

    let result = db.save_visit_state(&stale);
    assert!(matches!(result, Err(optica_core::db::DbError::Conflict(_))));
}
