#![forbid(unsafe_code)]

use cx_kernel_contracts::audit::{
    AuditEventId, AuditEventInput, AuditEventKind, AuditSeverity,
};
use cx_kernel_contracts::session::{CxSessionRecord, OrgId, SessionId, UserId};
use cx_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};
use cx_storage::repo::{AuditLedgerRepo, CxSessionRepo};
use cx_storage::{CxStore, StorageError};

fn seed_session(repo: &mut impl CxSessionRepo, t: u64) -> SessionId {
    let id = repo.mint_session_id();
    repo.insert_session(
        CxSessionRecord::dormant_v1(
            id.clone(),
            OrgId::new("org_a").unwrap(),
            UserId::new("dbw_user_1").unwrap(),
            MonotonicTimeNs(t),
        )
        .unwrap(),
    )
    .unwrap();
    id
}

fn append(
    ledger: &mut impl AuditLedgerRepo,
    input: AuditEventInput,
) -> Result<AuditEventId, StorageError> {
    ledger.append_audit_row(input)
}

fn store_with_session() -> (CxStore, SessionId) {
    let mut s = CxStore::new_in_memory();
    let id = seed_session(&mut s, 100);
    (s, id)
}

fn row(session_id: &SessionId, t: u64, kind: AuditEventKind) -> AuditEventInput {
    AuditEventInput::v1(
        MonotonicTimeNs(t),
        OrgId::new("org_a").unwrap(),
        session_id.clone(),
        Some(UserId::new("dbw_user_1").unwrap()),
        kind,
        AuditSeverity::Info,
        ReasonCodeId(0x4358_0001),
        "{\"op\":\"probe\"}".to_string(),
    )
    .unwrap()
}

#[test]
fn at_audit_db_01_ids_are_dense_and_ordered() {
    let (mut s, id) = store_with_session();

    let a = append(&mut s, row(&id, 110, AuditEventKind::SessionCreated)).unwrap();
    let b = append(&mut s, row(&id, 120, AuditEventKind::StateTransition)).unwrap();
    let c = append(&mut s, row(&id, 130, AuditEventKind::StateTransition)).unwrap();

    assert_eq!((a.0, b.0, c.0), (1, 2, 3));
    let rows = s.audit_rows();
    assert_eq!(rows.len(), 3);
    assert!(rows
        .windows(2)
        .all(|w| w[0].input.created_at.0 < w[1].input.created_at.0));
}

#[test]
fn at_audit_db_02_ledger_is_append_only() {
    let (mut s, id) = store_with_session();
    let written = append(&mut s, row(&id, 110, AuditEventKind::SessionCreated)).unwrap();

    assert_eq!(
        s.attempt_overwrite_audit_event(written),
        Err(StorageError::AppendOnlyViolation { table: "audit_events" })
    );
    assert!(matches!(
        s.attempt_overwrite_audit_event(AuditEventId(999)),
        Err(StorageError::MissingRow { table: "audit_events", .. })
    ));
}

#[test]
fn at_audit_db_03_session_filter_scopes_rows() {
    let (mut s, first) = store_with_session();
    let second = seed_session(&mut s, 200);

    append(&mut s, row(&first, 110, AuditEventKind::SessionCreated)).unwrap();
    append(&mut s, row(&second, 210, AuditEventKind::SessionCreated)).unwrap();
    append(&mut s, row(&first, 120, AuditEventKind::ProvisioningRun)).unwrap();

    let scoped = s.audit_rows_for_session(&first);
    assert_eq!(scoped.len(), 2);
    assert!(scoped.iter().all(|r| r.input.session_id == first));
}
