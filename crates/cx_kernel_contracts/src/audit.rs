#![forbid(unsafe_code)]

use crate::session::{OrgId, SessionId, UserId};
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

pub const CX_AUDIT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditEventId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    SessionCreated,
    SessionJoined,
    SessionLeft,
    StateTransition,
    ProvisioningRun,
    ProvisioningSkipped,
    LedgerCountRecorded,
    CloseBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditSeverity {
    Info,
    Warn,
    Error,
}

/// Append-only audit row input. `payload_min` is a small, pre-rendered JSON
/// object; bounded so the ledger stays cheap to retain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub org_id: OrgId,
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub kind: AuditEventKind,
    pub severity: AuditSeverity,
    pub reason_code: ReasonCodeId,
    pub payload_min: String,
}

impl AuditEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        org_id: OrgId,
        session_id: SessionId,
        user_id: Option<UserId>,
        kind: AuditEventKind,
        severity: AuditSeverity,
        reason_code: ReasonCodeId,
        payload_min: String,
    ) -> Result<Self, ContractViolation> {
        let i = Self {
            schema_version: CX_AUDIT_CONTRACT_VERSION,
            created_at,
            org_id,
            session_id,
            user_id,
            kind,
            severity,
            reason_code,
            payload_min,
        };
        i.validate()?;
        Ok(i)
    }
}

impl Validate for AuditEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.schema_version",
                reason: "must match CX_AUDIT_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.org_id.validate()?;
        self.session_id.validate()?;
        if let Some(u) = &self.user_id {
            u.validate()?;
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        if self.payload_min.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.payload_min",
                reason: "must not be empty",
            });
        }
        if self.payload_min.len() > 2048 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.payload_min",
                reason: "must be <= 2048 bytes",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEventRecord {
    pub audit_event_id: AuditEventId,
    pub input: AuditEventInput,
}
