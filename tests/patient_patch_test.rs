//! Integration tests for sparse patient patches and revision stamping.

use careledger::db::patients;
use careledger::models::{
    AgeRangeOption, BarthelIndex, NitLevel, StatusCriteria, YesNoUnknownOption,
};
use careledger::{RecordDb, ServiceError};

fn status_a() -> StatusCriteria {
    StatusCriteria {
        age_range: Some(AgeRangeOption::AgeBetween80And89),
        independence_at_admission: Some(BarthelIndex::Moderate),
        ..Default::default()
    }
}

fn status_b() -> StatusCriteria {
    StatusCriteria {
        nit_level: Some(NitLevel::TwoA),
        is_competent: Some(YesNoUnknownOption::Yes),
        ..status_a()
    }
}

#[test]
fn patch_changes_only_supplied_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = RecordDb::open(dir.path()).unwrap();

    let created = db
        .with_conn_mut(|conn| patients::create_patient(conn, "Jane Doe", Some(&status_a()), 100))
        .unwrap();

    // Name only: status untouched
    let renamed = db
        .with_conn_mut(|conn| {
            patients::patch_patient(conn, created.id, Some("Joan Doe"), None, 200)
        })
        .unwrap();
    assert_eq!(renamed.name, "Joan Doe");
    assert_eq!(renamed.status, Some(status_a()));
    assert_eq!(renamed.updated_time, 200);

    // Status only: name untouched
    let restatused = db
        .with_conn_mut(|conn| {
            patients::patch_patient(conn, created.id, None, Some(&status_b()), 300)
        })
        .unwrap();
    assert_eq!(restatused.name, "Joan Doe");
    assert_eq!(restatused.status, Some(status_b()));
    assert_eq!(restatused.updated_time, 300);
}

#[test]
fn empty_patch_still_advances_revision_time() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = RecordDb::open(dir.path()).unwrap();

    let created = db
        .with_conn_mut(|conn| patients::create_patient(conn, "Jane Doe", Some(&status_a()), 100))
        .unwrap();

    let patched = db
        .with_conn_mut(|conn| patients::patch_patient(conn, created.id, None, None, 250))
        .unwrap();
    assert_eq!(patched.name, "Jane Doe");
    assert_eq!(patched.status, Some(status_a()));
    assert_eq!(patched.updated_time, 250);
}

#[test]
fn equal_statuses_share_one_stored_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = RecordDb::open(dir.path()).unwrap();

    db.with_conn_mut(|conn| patients::create_patient(conn, "Jane Doe", Some(&status_a()), 100))
        .unwrap();
    db.with_conn_mut(|conn| patients::create_patient(conn, "John Doe", Some(&status_a()), 100))
        .unwrap();

    let count: i64 = db
        .with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM status_criteria", [], |r| r.get(0))
                .map_err(|e| ServiceError::Internal(e.to_string()))
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn patch_of_missing_patient_is_not_found() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = RecordDb::open(dir.path()).unwrap();

    let result =
        db.with_conn_mut(|conn| patients::patch_patient(conn, 999, Some("Nobody"), None, 100));
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}
