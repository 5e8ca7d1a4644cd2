#![forbid(unsafe_code)]

use cx_kernel_contracts::float::{
    DenominationId, FloatStackRecord, FloatStackSeed, RepositoryId, Ticker,
};
use cx_kernel_contracts::session::{CxSessionRecord, OrgId, SessionId, UserId};
use cx_kernel_contracts::MonotonicTimeNs;
use cx_storage::repo::{CxSessionRepo, FloatLedgerRepo};
use cx_storage::{CxStore, StorageError};
use rust_decimal::Decimal;

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

fn insert_stack(
    ledger: &mut impl FloatLedgerRepo,
    record: FloatStackRecord,
) -> Result<(), StorageError> {
    ledger.insert_float_stack(record)
}

fn store_with_session() -> (CxStore, SessionId) {
    let mut s = CxStore::new_in_memory();
    let id = seed_session(&mut s, 100);
    (s, id)
}

fn seed(repo: &str, denom: &str, value: u64) -> FloatStackSeed {
    FloatStackSeed {
        repository_id: RepositoryId::new(repo).unwrap(),
        ticker: Ticker::new("USD").unwrap(),
        denomination_id: DenominationId::new(denom).unwrap(),
        denominated_value: Decimal::from(value),
    }
}

fn stack(session_id: &SessionId, repo: &str, denom: &str) -> FloatStackRecord {
    FloatStackRecord::seeded_v1(session_id.clone(), &seed(repo, denom, 20), 0, None).unwrap()
}

#[test]
fn at_float_db_01_insert_requires_existing_session() {
    let (mut s, _) = store_with_session();
    let orphan = SessionId::new("cxs_999999").unwrap();

    let err = insert_stack(&mut s, stack(&orphan, "repo_drawer", "usd_20")).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "float_stacks.session_id", .. }
    ));
}

#[test]
fn at_float_db_02_duplicate_stack_rejected() {
    let (mut s, id) = store_with_session();
    insert_stack(&mut s, stack(&id, "repo_drawer", "usd_20")).unwrap();

    let err = insert_stack(&mut s, stack(&id, "repo_drawer", "usd_20")).unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey { table: "float_stacks", .. }
    ));
    assert_eq!(s.float_stacks_for_session(&id).len(), 1);
}

#[test]
fn at_float_db_03_close_count_is_write_once() {
    let (mut s, id) = store_with_session();
    let drawer = RepositoryId::new("repo_drawer").unwrap();
    let usd_20 = DenominationId::new("usd_20").unwrap();
    insert_stack(&mut s, stack(&id, "repo_drawer", "usd_20")).unwrap();

    let mut counted = s.float_stack_row(&id, &drawer, &usd_20).unwrap().clone();
    counted.close_count = Some(7);
    s.update_float_stack(counted).unwrap();

    // other columns stay writable once the closing count is locked
    let mut respent = s.float_stack_row(&id, &drawer, &usd_20).unwrap().clone();
    respent.spent_during_session = Decimal::new(25, 1);
    s.update_float_stack(respent).unwrap();

    let mut recounted = s.float_stack_row(&id, &drawer, &usd_20).unwrap().clone();
    recounted.close_count = Some(8);
    let err = s.update_float_stack(recounted).unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert_eq!(
        s.float_stack_row(&id, &drawer, &usd_20).unwrap().close_count,
        Some(7)
    );
}

#[test]
fn at_float_db_04_provisioning_fence_sees_any_row() {
    let (mut s, id) = store_with_session();
    assert!(!s.session_has_float_stacks(&id));

    insert_stack(&mut s, stack(&id, "repo_vault", "usd_1")).unwrap();
    assert!(s.session_has_float_stacks(&id));
}

#[test]
fn at_float_db_05_session_scan_is_isolated() {
    let (mut s, first) = store_with_session();
    let second = seed_session(&mut s, 200);

    insert_stack(&mut s, stack(&first, "repo_drawer", "usd_1")).unwrap();
    insert_stack(&mut s, stack(&first, "repo_drawer", "usd_5")).unwrap();
    insert_stack(&mut s, stack(&second, "repo_drawer", "usd_1")).unwrap();

    assert_eq!(s.float_stacks_for_session(&first).len(), 2);
    assert_eq!(s.float_stacks_for_session(&second).len(), 1);
    assert!(s
        .float_stacks_for_session(&second)
        .iter()
        .all(|f| f.session_id == second));
}
