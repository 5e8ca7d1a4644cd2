#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cx_kernel_contracts::audit::{AuditEventId, AuditEventInput, AuditEventRecord};
use cx_kernel_contracts::catalog::{CurrencyInfo, RepositoryInfo};
use cx_kernel_contracts::float::{DenominationId, FloatStackRecord, RepositoryId, Ticker};
use cx_kernel_contracts::order::{OrderId, OrderRecord, OrderStatus};
use cx_kernel_contracts::replog::RepoConfirmationRecord;
use cx_kernel_contracts::session::{is_allowed_transition, CxSessionRecord, OrgId, SessionId};
use cx_kernel_contracts::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    ForeignKeyViolation { table: &'static str, key: String },
    MissingRow { table: &'static str, key: String },
    RevisionConflict {
        table: &'static str,
        key: String,
        expected: u64,
        found: u64,
    },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// In-memory transactional record store for the CX back office. Each method
/// is one atomic mutation; the session table is the only one with multiple
/// concurrent writers and is guarded by a per-record revision counter.
#[derive(Debug, Clone, Default)]
pub struct CxStore {
    sessions: BTreeMap<SessionId, CxSessionRecord>,
    float_stacks: BTreeMap<(SessionId, RepositoryId, DenominationId), FloatStackRecord>,
    repo_confirmations: BTreeMap<(SessionId, RepositoryId), RepoConfirmationRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    repositories: BTreeMap<RepositoryId, RepositoryInfo>,
    currencies: BTreeMap<Ticker, CurrencyInfo>,
    audit_events: Vec<AuditEventRecord>,
    next_audit_event_id: u64,
    next_session_seq: u64,
}

impl CxStore {
    pub fn new_in_memory() -> Self {
        Self {
            sessions: BTreeMap::new(),
            float_stacks: BTreeMap::new(),
            repo_confirmations: BTreeMap::new(),
            orders: BTreeMap::new(),
            repositories: BTreeMap::new(),
            currencies: BTreeMap::new(),
            audit_events: Vec::new(),
            next_audit_event_id: 1,
            next_session_seq: 1,
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn mint_session_id(&mut self) -> SessionId {
        let seq = self.next_session_seq;
        self.next_session_seq += 1;
        SessionId::new(format!("cxs_{seq:06}"))
            .expect("minted session ids are well-formed by construction")
    }

    pub fn insert_session(&mut self, record: CxSessionRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.sessions.contains_key(&record.session_id) {
            return Err(StorageError::DuplicateKey {
                table: "cx_sessions",
                key: record.session_id.as_str().to_string(),
            });
        }
        self.sessions.insert(record.session_id.clone(), record);
        Ok(())
    }

    pub fn session_row(&self, session_id: &SessionId) -> Option<&CxSessionRecord> {
        self.sessions.get(session_id)
    }

    /// The single session write path. Rejects when the stored revision no
    /// longer matches `expected_revision` (a concurrent writer won), and
    /// when the status change is not an edge of the transition table.
    /// On success the stored revision becomes `expected_revision + 1`.
    pub fn update_session(
        &mut self,
        mut record: CxSessionRecord,
        expected_revision: u64,
    ) -> Result<u64, StorageError> {
        record.validate()?;
        let existing = self.sessions.get(&record.session_id).ok_or_else(|| {
            StorageError::MissingRow {
                table: "cx_sessions",
                key: record.session_id.as_str().to_string(),
            }
        })?;
        if existing.revision != expected_revision {
            return Err(StorageError::RevisionConflict {
                table: "cx_sessions",
                key: record.session_id.as_str().to_string(),
                expected: expected_revision,
                found: existing.revision,
            });
        }
        if !is_allowed_transition(existing.status, record.status) {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "cx_sessions.status",
                    reason: "not an edge of the session transition table",
                },
            ));
        }
        let new_revision = expected_revision + 1;
        record.revision = new_revision;
        self.sessions.insert(record.session_id.clone(), record);
        Ok(new_revision)
    }

    pub fn sessions_for_org(&self, org_id: &OrgId) -> Vec<&CxSessionRecord> {
        self.sessions
            .values()
            .filter(|s| &s.org_id == org_id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Float ledger
    // ------------------------------------------------------------------

    pub fn insert_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError> {
        record.validate()?;
        if !self.sessions.contains_key(&record.session_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "float_stacks.session_id",
                key: record.session_id.as_str().to_string(),
            });
        }
        let key = record.key();
        if self.float_stacks.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: "float_stacks",
                key: format!(
                    "{}/{}/{}",
                    key.0.as_str(),
                    key.1.as_str(),
                    key.2.as_str()
                ),
            });
        }
        self.float_stacks.insert(key, record);
        Ok(())
    }

    /// Provisioning fence: seeding is all-or-nothing per session, so the
    /// existence of any row short-circuits a re-seed.
    pub fn session_has_float_stacks(&self, session_id: &SessionId) -> bool {
        self.float_stacks
            .keys()
            .any(|(sid, _, _)| sid == session_id)
    }

    pub fn float_stack_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
        denomination_id: &DenominationId,
    ) -> Option<&FloatStackRecord> {
        self.float_stacks.get(&(
            session_id.clone(),
            repository_id.clone(),
            denomination_id.clone(),
        ))
    }

    pub fn float_stacks_for_session(&self, session_id: &SessionId) -> Vec<&FloatStackRecord> {
        self.float_stacks
            .values()
            .filter(|r| &r.session_id == session_id)
            .collect()
    }

    /// Replaces an existing stack row. `close_count`, once set, is terminal
    /// data for the session and may never change again.
    pub fn update_float_stack(&mut self, record: FloatStackRecord) -> Result<(), StorageError> {
        record.validate()?;
        let key = record.key();
        let existing = self.float_stacks.get(&key).ok_or_else(|| {
            StorageError::MissingRow {
                table: "float_stacks",
                key: format!(
                    "{}/{}/{}",
                    key.0.as_str(),
                    key.1.as_str(),
                    key.2.as_str()
                ),
            }
        })?;
        if existing.close_count.is_some() && record.close_count != existing.close_count {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "float_stacks.close_count",
                    reason: "immutable once set",
                },
            ));
        }
        self.float_stacks.insert(key, record);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Repository confirmation log
    // ------------------------------------------------------------------

    /// One row per (session, repository); transitions patch the existing row.
    pub fn upsert_confirmation(
        &mut self,
        record: RepoConfirmationRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        if !self.sessions.contains_key(&record.session_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "repo_confirmations.session_id",
                key: record.session_id.as_str().to_string(),
            });
        }
        let key = (record.session_id.clone(), record.repository_id.clone());
        self.repo_confirmations.insert(key, record);
        Ok(())
    }

    pub fn confirmation_row(
        &self,
        session_id: &SessionId,
        repository_id: &RepositoryId,
    ) -> Option<&RepoConfirmationRecord> {
        self.repo_confirmations
            .get(&(session_id.clone(), repository_id.clone()))
    }

    pub fn confirmations_for_session(
        &self,
        session_id: &SessionId,
    ) -> Vec<&RepoConfirmationRecord> {
        self.repo_confirmations
            .values()
            .filter(|r| &r.session_id == session_id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Orders (external collaborator rows; read-only to the workflow)
    // ------------------------------------------------------------------

    pub fn insert_order(&mut self, record: OrderRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.orders.contains_key(&record.order_id) {
            return Err(StorageError::DuplicateKey {
                table: "orders",
                key: record.order_id.as_str().to_string(),
            });
        }
        self.orders.insert(record.order_id.clone(), record);
        Ok(())
    }

    pub fn set_order_status(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), StorageError> {
        let order = self.orders.get_mut(order_id).ok_or_else(|| {
            StorageError::MissingRow {
                table: "orders",
                key: order_id.as_str().to_string(),
            }
        })?;
        order.status = status;
        Ok(())
    }

    pub fn orders_for_session(&self, session_id: &SessionId) -> Vec<&OrderRecord> {
        self.orders
            .values()
            .filter(|o| &o.session_id == session_id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Catalog (repositories, currencies, denominations)
    // ------------------------------------------------------------------

    pub fn upsert_repository(&mut self, record: RepositoryInfo) -> Result<(), StorageError> {
        record.validate()?;
        self.repositories
            .insert(record.repository_id.clone(), record);
        Ok(())
    }

    pub fn upsert_currency(&mut self, record: CurrencyInfo) -> Result<(), StorageError> {
        record.validate()?;
        self.currencies.insert(record.ticker.clone(), record);
        Ok(())
    }

    pub fn repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo> {
        self.repositories
            .values()
            .filter(|r| &r.org_id == org_id)
            .collect()
    }

    pub fn active_repositories_for_org(&self, org_id: &OrgId) -> Vec<&RepositoryInfo> {
        self.repositories
            .values()
            .filter(|r| &r.org_id == org_id && r.active)
            .collect()
    }

    pub fn currency_row(&self, ticker: &Ticker) -> Option<&CurrencyInfo> {
        self.currencies.get(ticker)
    }

    pub fn currency_rows(&self) -> &BTreeMap<Ticker, CurrencyInfo> {
        &self.currencies
    }

    // ------------------------------------------------------------------
    // Audit ledger (append-only)
    // ------------------------------------------------------------------

    pub fn append_audit_row(
        &mut self,
        input: AuditEventInput,
    ) -> Result<AuditEventId, StorageError> {
        input.validate()?;
        let id = AuditEventId(self.next_audit_event_id);
        self.next_audit_event_id += 1;
        self.audit_events.push(AuditEventRecord {
            audit_event_id: id,
            input,
        });
        Ok(id)
    }

    pub fn audit_rows(&self) -> &[AuditEventRecord] {
        &self.audit_events
    }

    pub fn audit_rows_for_session(&self, session_id: &SessionId) -> Vec<&AuditEventRecord> {
        self.audit_events
            .iter()
            .filter(|r| &r.input.session_id == session_id)
            .collect()
    }

    /// Wiring probe: the audit ledger exposes no update path.
    pub fn attempt_overwrite_audit_event(
        &mut self,
        id: AuditEventId,
    ) -> Result<(), StorageError> {
        if self.audit_events.iter().any(|r| r.audit_event_id == id) {
            return Err(StorageError::AppendOnlyViolation {
                table: "audit_events",
            });
        }
        Err(StorageError::MissingRow {
            table: "audit_events",
            key: id.0.to_string(),
        })
    }
}
