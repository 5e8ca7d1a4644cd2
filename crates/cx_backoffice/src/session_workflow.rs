#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cx_engines::{close_gate, provision};
use cx_kernel_contracts::audit::{AuditEventInput, AuditEventKind, AuditSeverity};
use cx_kernel_contracts::catalog::RepositoryInfo;
use cx_kernel_contracts::float::{DenominationId, FloatStackRecord, RepositoryId};
use cx_kernel_contracts::gate::CloseValidationReport;
use cx_kernel_contracts::order::OrderRecord;
use cx_kernel_contracts::replog::RepoConfirmationRecord;
use cx_kernel_contracts::session::{
    CxSessionRecord, OrgId, SessionId, SessionOp, SessionStatus, UserId,
};
use cx_kernel_contracts::{ContractViolation, MonotonicTimeNs, ReasonCodeId};
use cx_storage::repo::{
    AuditLedgerRepo, CatalogReadRepo, ConfirmationLogRepo, CxSessionRepo, FloatLedgerRepo,
    OrderReadRepo,
};
use cx_storage::StorageError;
use rust_decimal::Decimal;

pub mod reason_codes {
    use cx_kernel_contracts::ReasonCodeId;

    // CX workflow reason-code namespace.
    pub const CX_OK_SESSION_CREATE: ReasonCodeId = ReasonCodeId(0x4358_0001);
    pub const CX_OK_FLOAT_OPEN_START: ReasonCodeId = ReasonCodeId(0x4358_0002);
    pub const CX_OK_FLOAT_OPEN_CONFIRM: ReasonCodeId = ReasonCodeId(0x4358_0003);
    pub const CX_OK_FLOAT_CLOSE_START: ReasonCodeId = ReasonCodeId(0x4358_0004);
    pub const CX_OK_FLOAT_CLOSE_CONFIRM: ReasonCodeId = ReasonCodeId(0x4358_0005);
    pub const CX_OK_FLOAT_CLOSE_CANCEL: ReasonCodeId = ReasonCodeId(0x4358_0006);
    pub const CX_OK_SESSION_CLOSE: ReasonCodeId = ReasonCodeId(0x4358_0007);
    pub const CX_OK_SESSION_JOIN: ReasonCodeId = ReasonCodeId(0x4358_0008);
    pub const CX_OK_SESSION_LEAVE: ReasonCodeId = ReasonCodeId(0x4358_0009);
    pub const CX_OK_LEDGER_COUNT: ReasonCodeId = ReasonCodeId(0x4358_000A);

    pub const CX_PROVISION_RUN: ReasonCodeId = ReasonCodeId(0x4358_0010);
    pub const CX_PROVISION_SKIPPED: ReasonCodeId = ReasonCodeId(0x4358_0011);
    pub const CX_AUTO_JOIN_FAILED: ReasonCodeId = ReasonCodeId(0x4358_0012);
    pub const CX_CLOSE_BLOCKED: ReasonCodeId = ReasonCodeId(0x4358_0020);
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    Unauthorized {
        session_id: SessionId,
        user_id: UserId,
    },
    NotFound {
        entity: &'static str,
        key: String,
    },
    InvalidTransition {
        op: SessionOp,
        status: SessionStatus,
    },
    AlreadyClosed {
        session_id: SessionId,
        status: SessionStatus,
    },
    CloseBlocked {
        report: CloseValidationReport,
    },
    Storage(StorageError),
    Contract(ContractViolation),
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        WorkflowError::Storage(e)
    }
}

impl From<ContractViolation> for WorkflowError {
    fn from(e: ContractViolation) -> Self {
        WorkflowError::Contract(e)
    }
}

/// The full storage surface the workflow needs. `CxStore` satisfies it; any
/// other backend can by implementing the individual repo traits.
pub trait CxBackofficeStore:
    CxSessionRepo
    + FloatLedgerRepo
    + ConfirmationLogRepo
    + OrderReadRepo
    + CatalogReadRepo
    + AuditLedgerRepo
{
}

impl<S> CxBackofficeStore for S where
    S: CxSessionRepo
        + FloatLedgerRepo
        + ConfirmationLogRepo
        + OrderReadRepo
        + CatalogReadRepo
        + AuditLedgerRepo
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWorkflowConfig {
    /// Cap on blocking items echoed into an audit payload; the report
    /// returned to the caller is never truncated.
    pub max_audit_payload_items: u8,
}

impl SessionWorkflowConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_audit_payload_items: 8,
        }
    }
}

/// Owns every mutation of a CX session and its dependent rows. Each public
/// operation is one read-modify-write against the session record, guarded
/// by the revision the read observed, so a concurrent writer that commits
/// first makes this one fail fast instead of being silently overwritten.
#[derive(Debug, Clone)]
pub struct SessionWorkflowRuntime {
    config: SessionWorkflowConfig,
}

impl SessionWorkflowRuntime {
    pub fn new(config: SessionWorkflowConfig) -> Self {
        Self { config }
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    pub fn create_session<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        org_id: &OrgId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session_id = store.mint_session_id();
        let record =
            CxSessionRecord::dormant_v1(session_id.clone(), org_id.clone(), actor.clone(), now)?;
        store.insert_session(record.clone())?;

        // Best-effort auto-join of the creator: a failure here is logged
        // and creation still succeeds.
        let mut joined = record.clone();
        joined.active_user_id = Some(actor.clone());
        if store.update_session(joined, record.revision).is_err() {
            self.audit(
                store,
                org_id,
                &session_id,
                Some(actor),
                AuditEventKind::SessionJoined,
                AuditSeverity::Warn,
                reason_codes::CX_AUTO_JOIN_FAILED,
                serde_json::json!({ "op": "auto_join", "outcome": "failed" }).to_string(),
            )?;
        }

        self.audit(
            store,
            org_id,
            &session_id,
            Some(actor),
            AuditEventKind::SessionCreated,
            AuditSeverity::Info,
            reason_codes::CX_OK_SESSION_CREATE,
            serde_json::json!({ "op": "create_session" }).to_string(),
        )?;
        self.session_snapshot(store, &session_id)
    }

    pub fn start_float_open<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(&session, SessionOp::StartFloatOpen, SessionStatus::Dormant)?;

        let repositories: Vec<RepositoryInfo> = store
            .active_repositories_for_org(&session.org_id)
            .into_iter()
            .cloned()
            .collect();

        self.provision_float_stacks(store, &session, &repositories)?;

        for repo in &repositories {
            let mut log = match store.confirmation_row(session_id, &repo.repository_id) {
                Some(existing) => existing.clone(),
                None => RepoConfirmationRecord::opened_v1(
                    session_id.clone(),
                    repo.repository_id.clone(),
                    now,
                    session.authorized_user_ids.clone(),
                )?,
            };
            if log.open_start_dt.is_none() {
                log.open_start_dt = Some(now);
            }
            log.authorized_users = session.authorized_user_ids.clone();
            store.upsert_confirmation(log)?;
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::FloatOpenStart;
        updated.open_start_dt = Some(now);
        updated.open_start_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::StartFloatOpen,
            SessionStatus::FloatOpenStart,
            reason_codes::CX_OK_FLOAT_OPEN_START,
        )?;
        self.session_snapshot(store, session_id)
    }

    pub fn confirm_float_open<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::ConfirmFloatOpen,
            SessionStatus::FloatOpenStart,
        )?;

        for mut log in cloned_confirmations(store, session_id) {
            if log.open_confirm_dt.is_none() {
                if log.open_start_dt.is_none() {
                    log.open_start_dt = Some(now);
                }
                log.open_confirm_dt = Some(now);
                store.upsert_confirmation(log)?;
            }
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::FloatOpenComplete;
        updated.open_confirm_dt = Some(now);
        updated.open_confirm_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::ConfirmFloatOpen,
            SessionStatus::FloatOpenComplete,
            reason_codes::CX_OK_FLOAT_OPEN_CONFIRM,
        )?;
        self.session_snapshot(store, session_id)
    }

    pub fn start_float_close<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::StartFloatClose,
            SessionStatus::FloatOpenComplete,
        )?;

        for mut log in cloned_confirmations(store, session_id) {
            if log.close_start_dt.is_none() {
                log.close_start_dt = Some(now);
                store.upsert_confirmation(log)?;
            }
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::FloatCloseStart;
        updated.close_start_dt = Some(now);
        updated.close_start_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::StartFloatClose,
            SessionStatus::FloatCloseStart,
            reason_codes::CX_OK_FLOAT_CLOSE_START,
        )?;
        self.session_snapshot(store, session_id)
    }

    pub fn confirm_float_close<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::ConfirmFloatClose,
            SessionStatus::FloatCloseStart,
        )?;

        for mut log in cloned_confirmations(store, session_id) {
            if log.close_confirm_dt.is_none() {
                if log.close_start_dt.is_none() {
                    log.close_start_dt = Some(now);
                }
                log.close_confirm_dt = Some(now);
                store.upsert_confirmation(log)?;
            }
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::FloatCloseComplete;
        updated.close_confirm_dt = Some(now);
        updated.close_confirm_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::ConfirmFloatClose,
            SessionStatus::FloatCloseComplete,
            reason_codes::CX_OK_FLOAT_CLOSE_CONFIRM,
        )?;
        self.session_snapshot(store, session_id)
    }

    /// The sole reverse edge: abandon an in-flight close and return to the
    /// open-complete phase, clearing close stamps on the session and on
    /// every repository confirmation row.
    pub fn cancel_float_close<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::CancelFloatClose,
            SessionStatus::FloatCloseStart,
        )?;

        for mut log in cloned_confirmations(store, session_id) {
            if log.close_start_dt.is_some() || log.close_confirm_dt.is_some() {
                log.close_start_dt = None;
                log.close_confirm_dt = None;
                store.upsert_confirmation(log)?;
            }
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::FloatOpenComplete;
        updated.close_start_dt = None;
        updated.close_start_user_id = None;
        updated.close_confirm_dt = None;
        updated.close_confirm_user_id = None;
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::CancelFloatClose,
            SessionStatus::FloatOpenComplete,
            reason_codes::CX_OK_FLOAT_CLOSE_CANCEL,
        )?;
        self.session_snapshot(store, session_id)
    }

    /// Terminal close. Runs the validation gate first and applies no side
    /// effect at all when it blocks.
    pub fn close_session<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        if session.status.is_terminal() {
            return Err(WorkflowError::AlreadyClosed {
                session_id: session_id.clone(),
                status: session.status,
            });
        }
        if !matches!(
            session.status,
            SessionStatus::FloatCloseStart | SessionStatus::FloatCloseComplete
        ) {
            return Err(WorkflowError::InvalidTransition {
                op: SessionOp::CloseSession,
                status: session.status,
            });
        }

        let report = self.evaluate_close(store, &session);
        if !report.can_close {
            let shown = report
                .blocking_items
                .iter()
                .take(self.config.max_audit_payload_items as usize)
                .collect::<Vec<_>>();
            self.audit(
                store,
                &session.org_id,
                session_id,
                Some(actor),
                AuditEventKind::CloseBlocked,
                AuditSeverity::Warn,
                reason_codes::CX_CLOSE_BLOCKED,
                serde_json::json!({
                    "op": SessionOp::CloseSession.as_str(),
                    "blocking_total": report.blocking_items.len(),
                    "blocking_items": shown,
                })
                .to_string(),
            )?;
            return Err(WorkflowError::CloseBlocked { report });
        }

        let mut updated = session.clone();
        updated.status = SessionStatus::Closed;
        updated.close_confirm_dt = Some(now);
        updated.close_confirm_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit_transition(
            store,
            &session,
            actor,
            SessionOp::CloseSession,
            SessionStatus::Closed,
            reason_codes::CX_OK_SESSION_CLOSE,
        )?;
        self.session_snapshot(store, session_id)
    }

    // ------------------------------------------------------------------
    // Membership (no status precondition)
    // ------------------------------------------------------------------

    pub fn join_session<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = existing_session(store, session_id)?;
        let mut updated = session.clone();
        updated.authorized_user_ids.insert(actor.clone());
        updated.active_user_id = Some(actor.clone());
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit(
            store,
            &session.org_id,
            session_id,
            Some(actor),
            AuditEventKind::SessionJoined,
            AuditSeverity::Info,
            reason_codes::CX_OK_SESSION_JOIN,
            serde_json::json!({ "op": SessionOp::JoinSession.as_str() }).to_string(),
        )?;
        self.session_snapshot(store, session_id)
    }

    /// Leaving clears the active pointer only when the leaver holds it and
    /// never elects a replacement; the session stays unattended until
    /// another authorized user joins.
    pub fn leave_session<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        now: MonotonicTimeNs,
    ) -> Result<CxSessionRecord, WorkflowError> {
        let session = existing_session(store, session_id)?;
        let mut updated = session.clone();
        updated.authorized_user_ids.remove(actor);
        if updated.active_user_id.as_ref() == Some(actor) {
            updated.active_user_id = None;
        }
        updated.updated_at = now;
        store.update_session(updated, session.revision)?;

        self.audit(
            store,
            &session.org_id,
            session_id,
            Some(actor),
            AuditEventKind::SessionLeft,
            AuditSeverity::Info,
            reason_codes::CX_OK_SESSION_LEAVE,
            serde_json::json!({ "op": SessionOp::LeaveSession.as_str() }).to_string(),
        )?;
        self.session_snapshot(store, session_id)
    }

    // ------------------------------------------------------------------
    // Ledger count entry
    // ------------------------------------------------------------------

    pub fn record_open_count<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
        count: u64,
        spot: Decimal,
    ) -> Result<(), WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::RecordOpenCount,
            SessionStatus::FloatOpenStart,
        )?;
        let mut stack = existing_stack(store, session_id, repository_id, denomination_id)?;
        stack.open_count = count;
        stack.open_spot = spot;
        store.update_float_stack(stack)?;
        self.audit_count(store, &session, actor, SessionOp::RecordOpenCount)
    }

    pub fn record_midday_count<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
        count: u64,
    ) -> Result<(), WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::RecordMiddayCount,
            SessionStatus::FloatOpenComplete,
        )?;
        let mut stack = existing_stack(store, session_id, repository_id, denomination_id)?;
        stack.midday_count = count;
        store.update_float_stack(stack)?;
        self.audit_count(store, &session, actor, SessionOp::RecordMiddayCount)
    }

    pub fn record_close_count<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
        count: u64,
        spot: Option<Decimal>,
    ) -> Result<(), WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::RecordCloseCount,
            SessionStatus::FloatCloseStart,
        )?;
        let mut stack = existing_stack(store, session_id, repository_id, denomination_id)?;
        if stack.close_count.is_some() {
            return Err(WorkflowError::Contract(ContractViolation::InvalidValue {
                field: "float_stack_record.close_count",
                reason: "immutable once set",
            }));
        }
        stack.close_count = Some(count);
        stack.close_spot = spot;
        store.update_float_stack(stack)?;
        self.audit_count(store, &session, actor, SessionOp::RecordCloseCount)
    }

    pub fn record_spend<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
        amount: Decimal,
    ) -> Result<(), WorkflowError> {
        if amount < Decimal::ZERO {
            return Err(WorkflowError::Contract(ContractViolation::NegativeAmount {
                field: "record_spend.amount",
            }));
        }
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::RecordSpend,
            SessionStatus::FloatOpenComplete,
        )?;
        let mut stack = existing_stack(store, session_id, repository_id, denomination_id)?;
        stack.spent_during_session += amount;
        store.update_float_stack(stack)?;
        self.audit_count(store, &session, actor, SessionOp::RecordSpend)
    }

    pub fn record_transfer<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session_id: &SessionId,
        actor: &UserId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
        quantity: u64,
    ) -> Result<(), WorkflowError> {
        let session = authorized_session(store, session_id, actor)?;
        require_status(
            &session,
            SessionOp::RecordTransfer,
            SessionStatus::FloatOpenComplete,
        )?;
        let mut stack = existing_stack(store, session_id, repository_id, denomination_id)?;
        stack.transferred_during_session += quantity;
        store.update_float_stack(stack)?;
        self.audit_count(store, &session, actor, SessionOp::RecordTransfer)
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Open or pending sessions of the org, actor-active first, then
    /// actor-authorized, then the rest; each bucket newest open first.
    pub fn active_sessions_for_user<S: CxBackofficeStore>(
        &self,
        store: &S,
        org_id: &OrgId,
        actor: &UserId,
    ) -> Vec<CxSessionRecord> {
        let mut sessions: Vec<CxSessionRecord> = store
            .sessions_for_org(org_id)
            .into_iter()
            .filter(|s| !s.status.is_terminal())
            .cloned()
            .collect();
        sessions.sort_by_key(|s| {
            let bucket = if s.active_user_id.as_ref() == Some(actor) {
                0u8
            } else if s.is_authorized(actor) {
                1
            } else {
                2
            };
            (
                bucket,
                std::cmp::Reverse(s.open_start_dt.map_or(0, |t| t.0)),
                std::cmp::Reverse(s.created_at.0),
            )
        });
        sessions
    }

    pub fn validate_session_can_close<S: CxBackofficeStore>(
        &self,
        store: &S,
        session_id: &SessionId,
    ) -> Result<CloseValidationReport, WorkflowError> {
        let session = existing_session(store, session_id)?;
        Ok(self.evaluate_close(store, &session))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn evaluate_close<S: CxBackofficeStore>(
        &self,
        store: &S,
        session: &CxSessionRecord,
    ) -> CloseValidationReport {
        let orders: Vec<OrderRecord> = store
            .orders_for_session(&session.session_id)
            .into_iter()
            .cloned()
            .collect();
        // Inactive repositories are never provisioned, so they are not
        // asked for at close either.
        let repositories: Vec<RepositoryInfo> = store
            .active_repositories_for_org(&session.org_id)
            .into_iter()
            .cloned()
            .collect();
        let confirmations: Vec<RepoConfirmationRecord> = store
            .confirmations_for_session(&session.session_id)
            .into_iter()
            .cloned()
            .collect();
        close_gate::evaluate(
            session,
            &orders.iter().collect::<Vec<_>>(),
            &repositories.iter().collect::<Vec<_>>(),
            &confirmations.iter().collect::<Vec<_>>(),
        )
    }

    /// Seeds the float ledger exactly once per session. The fence is the
    /// existence query itself: any row for the session short-circuits the
    /// whole run, logged rather than surfaced.
    fn provision_float_stacks<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session: &CxSessionRecord,
        repositories: &[RepositoryInfo],
    ) -> Result<(), WorkflowError> {
        if store.session_has_float_stacks(&session.session_id) {
            return self.audit(
                store,
                &session.org_id,
                &session.session_id,
                None,
                AuditEventKind::ProvisioningSkipped,
                AuditSeverity::Info,
                reason_codes::CX_PROVISION_SKIPPED,
                serde_json::json!({ "op": "seed_float_stacks", "outcome": "skipped" })
                    .to_string(),
            );
        }

        let currencies = store.currency_rows().clone();
        let plan = provision::expand_plan(
            &repositories.iter().collect::<Vec<_>>(),
            &currencies,
        );

        // Carry the closing counts of the most recently closed session of
        // the org into `last_session_count`.
        let prior_session_id = store
            .sessions_for_org(&session.org_id)
            .into_iter()
            .filter(|p| p.status == SessionStatus::Closed)
            .max_by_key(|p| p.close_confirm_dt.map_or(0, |t| t.0))
            .map(|p| p.session_id.clone());
        let mut carried: BTreeMap<(RepositoryId, DenominationId), u64> = BTreeMap::new();
        if let Some(prior) = &prior_session_id {
            for stack in store.float_stacks_for_session(prior) {
                carried.insert(
                    (stack.repository_id.clone(), stack.denomination_id.clone()),
                    stack.close_count.unwrap_or(0),
                );
            }
        }

        let seeded = plan.len();
        for seed in &plan {
            let key = (seed.repository_id.clone(), seed.denomination_id.clone());
            let last_session_count = carried.get(&key).copied().unwrap_or(0);
            let prior = if carried.contains_key(&key) {
                prior_session_id.clone()
            } else {
                None
            };
            store.insert_float_stack(FloatStackRecord::seeded_v1(
                session.session_id.clone(),
                seed,
                last_session_count,
                prior,
            )?)?;
        }

        self.audit(
            store,
            &session.org_id,
            &session.session_id,
            None,
            AuditEventKind::ProvisioningRun,
            AuditSeverity::Info,
            reason_codes::CX_PROVISION_RUN,
            serde_json::json!({
                "op": "seed_float_stacks",
                "outcome": "seeded",
                "rows": seeded,
            })
            .to_string(),
        )
    }

    fn audit_transition<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        before: &CxSessionRecord,
        actor: &UserId,
        op: SessionOp,
        to: SessionStatus,
        reason_code: ReasonCodeId,
    ) -> Result<(), WorkflowError> {
        self.audit(
            store,
            &before.org_id,
            &before.session_id,
            Some(actor),
            AuditEventKind::StateTransition,
            AuditSeverity::Info,
            reason_code,
            serde_json::json!({
                "op": op.as_str(),
                "from": before.status.as_str(),
                "to": to.as_str(),
            })
            .to_string(),
        )
    }

    fn audit_count<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        session: &CxSessionRecord,
        actor: &UserId,
        op: SessionOp,
    ) -> Result<(), WorkflowError> {
        self.audit(
            store,
            &session.org_id,
            &session.session_id,
            Some(actor),
            AuditEventKind::LedgerCountRecorded,
            AuditSeverity::Info,
            reason_codes::CX_OK_LEDGER_COUNT,
            serde_json::json!({ "op": op.as_str() }).to_string(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn audit<S: CxBackofficeStore>(
        &self,
        store: &mut S,
        org_id: &OrgId,
        session_id: &SessionId,
        user: Option<&UserId>,
        kind: AuditEventKind,
        severity: AuditSeverity,
        reason_code: ReasonCodeId,
        payload_min: String,
    ) -> Result<(), WorkflowError> {
        let input = AuditEventInput::v1(
            self.audit_clock(store),
            org_id.clone(),
            session_id.clone(),
            user.cloned(),
            kind,
            severity,
            reason_code,
            payload_min,
        )?;
        store.append_audit_row(input)?;
        Ok(())
    }

    // Audit rows carry their own monotonic stamp derived from ledger
    // length, so rows stay ordered even when callers reuse `now`.
    fn audit_clock<S: CxBackofficeStore>(&self, store: &S) -> MonotonicTimeNs {
        MonotonicTimeNs(store.audit_rows().len() as u64 + 1)
    }

    fn session_snapshot<S: CxBackofficeStore>(
        &self,
        store: &S,
        session_id: &SessionId,
    ) -> Result<CxSessionRecord, WorkflowError> {
        existing_session(store, session_id)
    }
}

fn existing_session<S: CxBackofficeStore>(
    store: &S,
    session_id: &SessionId,
) -> Result<CxSessionRecord, WorkflowError> {
    store
        .session_row(session_id)
        .cloned()
        .ok_or_else(|| WorkflowError::NotFound {
            entity: "cx_sessions",
            key: session_id.as_str().to_string(),
        })
}

fn authorized_session<S: CxBackofficeStore>(
    store: &S,
    session_id: &SessionId,
    actor: &UserId,
) -> Result<CxSessionRecord, WorkflowError> {
    let session = existing_session(store, session_id)?;
    if !session.is_authorized(actor) {
        return Err(WorkflowError::Unauthorized {
            session_id: session_id.clone(),
            user_id: actor.clone(),
        });
    }
    Ok(session)
}

fn cloned_confirmations<S: CxBackofficeStore>(
    store: &S,
    session_id: &SessionId,
) -> Vec<RepoConfirmationRecord> {
    store
        .confirmations_for_session(session_id)
        .into_iter()
        .cloned()
        .collect()
}

fn require_status(
    session: &CxSessionRecord,
    op: SessionOp,
    expected: SessionStatus,
) -> Result<(), WorkflowError> {
    if session.status != expected {
        return Err(WorkflowError::InvalidTransition {
            op,
            status: session.status,
        });
    }
    Ok(())
}

fn existing_stack<S: CxBackofficeStore>(
    store: &S,
    session_id: &SessionId,
    repository_id: &RepositoryId,
    denomination_id: &DenominationId,
) -> Result<FloatStackRecord, WorkflowError> {
    store
        .float_stack_row(session_id, repository_id, denomination_id)
        .cloned()
        .ok_or_else(|| WorkflowError::NotFound {
            entity: "float_stacks",
            key: format!(
                "{}/{}/{}",
                session_id.as_str(),
                repository_id.as_str(),
                denomination_id.as_str()
            ),
        })
}
