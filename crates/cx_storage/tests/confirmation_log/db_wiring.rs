#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use cx_kernel_contracts::float::RepositoryId;
use cx_kernel_contracts::replog::RepoConfirmationRecord;
use cx_kernel_contracts::session::{CxSessionRecord, OrgId, SessionId, UserId};
use cx_kernel_contracts::MonotonicTimeNs;
use cx_storage::repo::{ConfirmationLogRepo, CxSessionRepo};
use cx_storage::{CxStore, StorageError};

fn users() -> BTreeSet<UserId> {
    let mut set = BTreeSet::new();
    set.insert(UserId::new("dbw_user_1").unwrap());
    set
}

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

fn upsert(
    log: &mut impl ConfirmationLogRepo,
    record: RepoConfirmationRecord,
) -> Result<(), StorageError> {
    log.upsert_confirmation(record)
}

fn store_with_session() -> (CxStore, SessionId) {
    let mut s = CxStore::new_in_memory();
    let id = seed_session(&mut s, 100);
    (s, id)
}

fn opened(session_id: &SessionId, repo: &str, t: u64) -> RepoConfirmationRecord {
    RepoConfirmationRecord::opened_v1(
        session_id.clone(),
        RepositoryId::new(repo).unwrap(),
        MonotonicTimeNs(t),
        users(),
    )
    .unwrap()
}

#[test]
fn at_replog_db_01_upsert_requires_existing_session() {
    let (mut s, _) = store_with_session();
    let orphan = SessionId::new("cxs_999999").unwrap();

    let err = upsert(&mut s, opened(&orphan, "repo_drawer", 110)).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "repo_confirmations.session_id", .. }
    ));
}

#[test]
fn at_replog_db_02_upsert_patches_single_row_per_repository() {
    let (mut s, id) = store_with_session();
    let drawer = RepositoryId::new("repo_drawer").unwrap();

    upsert(&mut s, opened(&id, "repo_drawer", 110)).unwrap();
    let mut confirmed = s.confirmation_row(&id, &drawer).unwrap().clone();
    confirmed.open_confirm_dt = Some(MonotonicTimeNs(120));
    upsert(&mut s, confirmed).unwrap();

    // the patch replaced the row, it did not add a second one
    assert_eq!(s.confirmations_for_session(&id).len(), 1);
    let row = s.confirmation_row(&id, &drawer).unwrap();
    assert_eq!(row.open_start_dt, Some(MonotonicTimeNs(110)));
    assert_eq!(row.open_confirm_dt, Some(MonotonicTimeNs(120)));
    assert!(!row.close_confirmed());
}

#[test]
fn at_replog_db_03_confirm_without_start_is_rejected() {
    let (mut s, id) = store_with_session();

    let mut skipped = opened(&id, "repo_drawer", 110);
    skipped.close_confirm_dt = Some(MonotonicTimeNs(120));
    let err = upsert(&mut s, skipped).unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert!(s
        .confirmation_row(&id, &RepositoryId::new("repo_drawer").unwrap())
        .is_none());
}

#[test]
fn at_replog_db_04_close_stamps_roundtrip() {
    let (mut s, id) = store_with_session();
    let vault = RepositoryId::new("repo_vault").unwrap();

    upsert(&mut s, opened(&id, "repo_vault", 110)).unwrap();
    let mut row = s.confirmation_row(&id, &vault).unwrap().clone();
    row.open_confirm_dt = Some(MonotonicTimeNs(120));
    row.close_start_dt = Some(MonotonicTimeNs(200));
    row.close_confirm_dt = Some(MonotonicTimeNs(210));
    upsert(&mut s, row).unwrap();

    assert!(s.confirmation_row(&id, &vault).unwrap().close_confirmed());
}
