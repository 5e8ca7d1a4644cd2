#![forbid(unsafe_code)]

use cx_kernel_contracts::session::{CxSessionRecord, OrgId, SessionId, SessionStatus, UserId};
use cx_kernel_contracts::MonotonicTimeNs;
use cx_storage::repo::CxSessionRepo;
use cx_storage::{CxStore, StorageError};

fn org(id: &str) -> OrgId {
    OrgId::new(id).unwrap()
}

fn owner() -> UserId {
    UserId::new("dbw_user_1").unwrap()
}

fn insert_dormant(repo: &mut impl CxSessionRepo, org_id: &str, t: u64) -> SessionId {
    let id = repo.mint_session_id();
    repo.insert_session(
        CxSessionRecord::dormant_v1(id.clone(), org(org_id), owner(), MonotonicTimeNs(t)).unwrap(),
    )
    .unwrap();
    id
}

#[test]
fn at_sessions_db_01_insert_and_fetch_roundtrip() {
    let mut s = CxStore::new_in_memory();
    let id = insert_dormant(&mut s, "org_a", 100);

    assert_eq!(id.as_str(), "cxs_000001");
    let row = s.session_row(&id).unwrap();
    assert_eq!(row.status, SessionStatus::Dormant);
    assert_eq!(row.revision, 0);

    // same primary key again is refused
    let dup =
        CxSessionRecord::dormant_v1(id.clone(), org("org_a"), owner(), MonotonicTimeNs(101))
            .unwrap();
    assert!(matches!(
        s.insert_session(dup),
        Err(StorageError::DuplicateKey { table: "cx_sessions", .. })
    ));

    // minted ids keep counting past the collision
    let next = s.mint_session_id();
    assert_eq!(next.as_str(), "cxs_000002");
}

#[test]
fn at_sessions_db_02_revision_gate_blocks_stale_write() {
    let mut s = CxStore::new_in_memory();
    let id = insert_dormant(&mut s, "org_a", 100);
    let base = s.session_row(&id).unwrap().clone();

    // first writer commits and bumps the revision
    let mut first = base.clone();
    first.updated_at = MonotonicTimeNs(110);
    assert_eq!(s.update_session(first, base.revision).unwrap(), 1);

    // second writer still holds revision 0 and loses
    let mut second = base.clone();
    second.updated_at = MonotonicTimeNs(111);
    let err = s.update_session(second, base.revision).unwrap_err();
    assert_eq!(
        err,
        StorageError::RevisionConflict {
            table: "cx_sessions",
            key: id.as_str().to_string(),
            expected: 0,
            found: 1,
        }
    );
    assert_eq!(s.session_row(&id).unwrap().updated_at, MonotonicTimeNs(110));
}

#[test]
fn at_sessions_db_03_transition_table_enforced_at_write() {
    let mut s = CxStore::new_in_memory();
    let id = insert_dormant(&mut s, "org_a", 100);
    let base = s.session_row(&id).unwrap().clone();

    // skipping the open phase is not an edge of the table
    let mut skipped = base.clone();
    skipped.status = SessionStatus::FloatOpenComplete;
    skipped.updated_at = MonotonicTimeNs(110);
    assert!(matches!(
        s.update_session(skipped, base.revision),
        Err(StorageError::ContractViolation(_))
    ));
    assert_eq!(s.session_row(&id).unwrap().status, SessionStatus::Dormant);

    // administrative cancel is reachable from any non-terminal status
    let mut cancelled = base.clone();
    cancelled.status = SessionStatus::Cancelled;
    cancelled.updated_at = MonotonicTimeNs(120);
    s.update_session(cancelled, base.revision).unwrap();
    assert_eq!(s.session_row(&id).unwrap().status, SessionStatus::Cancelled);
}

#[test]
fn at_sessions_db_04_org_scan_is_isolated() {
    let mut s = CxStore::new_in_memory();
    let a1 = insert_dormant(&mut s, "org_a", 100);
    let a2 = insert_dormant(&mut s, "org_a", 110);
    let b1 = insert_dormant(&mut s, "org_b", 120);

    let ids: Vec<&str> = s
        .sessions_for_org(&org("org_a"))
        .iter()
        .map(|r| r.session_id.as_str())
        .collect();
    assert_eq!(ids, vec![a1.as_str(), a2.as_str()]);
    assert_eq!(s.sessions_for_org(&org("org_b")).len(), 1);
    assert_eq!(
        s.sessions_for_org(&org("org_b"))[0].session_id.as_str(),
        b1.as_str()
    );
}
