#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cx_kernel_contracts::audit::{AuditEventId, AuditEventInput, AuditEventRecord};
use cx_kernel_contracts::catalog::{CurrencyInfo, RepositoryInfo};
use cx_kernel_contracts::float::{DenominationId, FloatStackRecord, RepositoryId, Ticker};
use cx_kernel_contracts::order::{OrderId, OrderRecord, OrderStatus};
use cx_kernel_contracts::replog::RepoConfirmationRecord;
use cx_kernel_contracts::session::{CxSessionRecord, OrgId, SessionId};

use crate::store::{CxStore, StorageError};

/// Typed repository interface for the CX session table. The workflow
/// runtime is generic over these traits rather than the concrete store.
pub trait CxSessionRepo {
    fn mint_session_id(&mut self) -> SessionId;
    fn insert_session(&mut self, record: CxSessionRecord) -> Result<(), StorageError>;
    fn session_row(&self, session_id: &SessionId) -> Option<&CxSessionRecord>;
    fn update_session(
        &mut self,
        record: CxSessionRecord,
        expected_revision: u64,
    ) -> Result<u64, StorageError>;
    fn sessions_for_org(&self, org_id: &OrgId) -> Vec<&CxSessionRecord>;
}

/// Typed repository interface for the per-denomination float ledger.
pub trait FloatLedgerRepo {
    fn insert_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError>;
    fn session_has_float_stacks(&self, session_id: &SessionId) -> bool;
    fn float_stack_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
    ) -> Option<&FloatStackRecord>;
    fn float_stacks_for_session(&self, session_id: &SessionId) -> Vec<&FloatStackRecord>;
    fn update_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError>;
}

/// Typed repository interface for per-(session, repository) confirmations.
pub trait ConfirmationLogRepo {
    fn upsert_confirmation(&mut self, record: RepoConfirmationRecord) -> Result<(), StorageError>;
    fn confirmation_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
    ) -> Option<&RepoConfirmationRecord>;
    fn confirmations_for_session(&self, session_id: &SessionId) -> Vec<&RepoConfirmationRecord>;
}

/// Read-only order access plus the seeding/mutation hooks the owning order
/// store would provide in production.
pub trait OrderReadRepo {
    fn insert_order(&mut self, record: OrderRecord) -> Result<(), StorageError>;
    fn set_order_status(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), StorageError>;
    fn orders_for_session(&self, session_id: &SessionId) -> Vec<&OrderRecord>;
}

/// Read-only repository/currency/denomination catalog access.
pub trait CatalogReadRepo {
    fn upsert_repository(&mut self, record: RepositoryInfo) -> Result<(), StorageError>;
    fn upsert_currency(&mut self, record: CurrencyInfo) -> Result<(), StorageError>;
    fn repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo>;
    fn active_repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo>;
    fn currency_row(&self, ticker: &Ticker) -> Option<&CurrencyInfo>;
    fn currency_rows(&self) -> &BTreeMap<Ticker, CurrencyInfo>;
}

/// Append-only audit persistence.
pub trait AuditLedgerRepo {
    fn append_audit_row(&mut self, input: AuditEventInput) -> Result<AuditEventId, StorageError>;
    fn audit_rows(&self) -> &[AuditEventRecord];
    fn audit_rows_for_session(&self, session_id: &SessionId) -> Vec<&AuditEventRecord>;
}

impl CxSessionRepo for CxStore {
    fn mint_session_id(&mut self) -> SessionId {
        CxStore::mint_session_id(self)
    }

    fn insert_session(&mut self, record: CxSessionRecord) -> Result<(), StorageError> {
        CxStore::insert_session(self, record)
    }

    fn session_row(&self, session_id: &SessionId) -> Option<&CxSessionRecord> {
        CxStore::session_row(self, session_id)
    }

    fn update_session(
        &mut self,
        record: CxSessionRecord,
        expected_revision: u64,
    ) -> Result<u64, StorageError> {
        CxStore::update_session(self, record, expected_revision)
    }

    fn sessions_for_org(&self, org_id: &OrgId) -> Vec<&CxSessionRecord> {
        CxStore::sessions_for_org(self, org_id)
    }
}

impl FloatLedgerRepo for CxStore {
    fn insert_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError> {
        CxStore::insert_float_stack(self, record)
    }

    fn session_has_float_stacks(&self, session_id: &SessionId) -> bool {
        CxStore::session_has_float_stacks(self, session_id)
    }

    fn float_stack_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
    ) -> Option<&FloatStackRecord> {
        CxStore::float_stack_row(self, session_id, repository_id, denomination_id)
    }

    fn float_stacks_for_session(&self, session_id: &SessionId) -> Vec<&FloatStackRecord> {
        CxStore::float_stacks_for_session(self, session_id)
    }

    fn update_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError> {
        CxStore::update_float_stack(self, record)
    }
}

impl ConfirmationLogRepo for CxStore {
    fn upsert_confirmation(&mut self, record: RepoConfirmationRecord) -> Result<(), StorageError> {
        CxStore::upsert_confirmation(self, record)
    }

    fn confirmation_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
    ) -> Option<&RepoConfirmationRecord> {
        CxStore::confirmation_row(self, session_id, repository_id)
    }

    fn confirmations_for_session(&self, session_id: &SessionId) -> Vec<&RepoConfirmationRecord> {
        CxStore::confirmations_for_session(self, session_id)
    }
}

impl OrderReadRepo for CxStore {
    fn insert_order(&mut self, record: OrderRecord) -> Result<(), StorageError> {
        CxStore::insert_order(self, record)
    }

    fn set_order_status(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), StorageError> {
        CxStore::set_order_status(self, order_id, status)
    }

    fn orders_for_session(&self, session_id: &SessionId) -> Vec<&OrderRecord> {
        CxStore::orders_for_session(self, session_id)
    }
}

impl CatalogReadRepo for CxStore {
    fn upsert_repository(&mut self, record: RepositoryInfo) -> Result<(), StorageError> {
        CxStore::upsert_repository(self, record)
    }

    fn upsert_currency(&mut self, record: CurrencyInfo) -> Result<(), StorageError> {
        CxStore::upsert_currency(self, record)
    }

    fn repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo> {
        CxStore::repositories_for_org(self, org_id)
    }

    fn active_repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo> {
        CxStore::active_repositories_for_org(self, org_id)
    }

    fn currency_row(&self, ticker: &Ticker) -> Option<&CurrencyInfo> {
        CxStore::currency_row(self, ticker)
    }

    fn currency_rows(&self) -> &BTreeMap<Ticker, CurrencyInfo> {
        CxStore::currency_rows(self)
    }
}

impl AuditLedgerRepo for CxStore {
    fn append_audit_row(&mut self, input: AuditEventInput) -> Result<AuditEventId, StorageError> {
        CxStore::append_audit_row(self, input)
    }

    fn audit_rows(&self) -> &[AuditEventRecord] {
        CxStore::audit_rows(self)
    }

    fn audit_rows_for_session(&self, session_id: &SessionId) -> Vec<&AuditEventRecord> {
        CxStore::audit_rows_for_session(self, session_id)
    }
}
