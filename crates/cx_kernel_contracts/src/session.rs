#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::common::validate_id;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const CX_SESSION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SessionId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("session_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for OrgId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("org_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("user_id", &self.0, 128)
    }
}

/// Till/shift lifecycle status. Closed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum SessionStatus {
    Dormant,
    FloatOpenStart,
    FloatOpenComplete,
    FloatCloseStart,
    FloatCloseComplete,
    Closed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Dormant => "DORMANT",
            SessionStatus::FloatOpenStart => "FLOAT_OPEN_START",
            SessionStatus::FloatOpenComplete => "FLOAT_OPEN_COMPLETE",
            SessionStatus::FloatCloseStart => "FLOAT_CLOSE_START",
            SessionStatus::FloatCloseComplete => "FLOAT_CLOSE_COMPLETE",
            SessionStatus::Closed => "CLOSED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

/// The full transition table. The single legal backward edge is
/// FloatCloseStart -> FloatOpenComplete (cancel close). Cancellation is an
/// administrative edge available from any non-terminal status; no edge
/// leaves Closed or Cancelled.
pub fn is_allowed_transition(from: SessionStatus, to: SessionStatus) -> bool {
    if from == to {
        return true;
    }
    if to == SessionStatus::Cancelled {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (SessionStatus::Dormant, SessionStatus::FloatOpenStart)
            | (SessionStatus::FloatOpenStart, SessionStatus::FloatOpenComplete)
            | (SessionStatus::FloatOpenComplete, SessionStatus::FloatCloseStart)
            | (SessionStatus::FloatCloseStart, SessionStatus::FloatCloseComplete)
            | (SessionStatus::FloatCloseStart, SessionStatus::FloatOpenComplete)
            | (SessionStatus::FloatCloseStart, SessionStatus::Closed)
            | (SessionStatus::FloatCloseComplete, SessionStatus::Closed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOp {
    StartFloatOpen,
    ConfirmFloatOpen,
    StartFloatClose,
    ConfirmFloatClose,
    CancelFloatClose,
    CloseSession,
    JoinSession,
    LeaveSession,
    RecordOpenCount,
    RecordMiddayCount,
    RecordCloseCount,
    RecordSpend,
    RecordTransfer,
}

impl SessionOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOp::StartFloatOpen => "start_float_open",
            SessionOp::ConfirmFloatOpen => "confirm_float_open",
            SessionOp::StartFloatClose => "start_float_close",
            SessionOp::ConfirmFloatClose => "confirm_float_close",
            SessionOp::CancelFloatClose => "cancel_float_close",
            SessionOp::CloseSession => "close_session",
            SessionOp::JoinSession => "join_session",
            SessionOp::LeaveSession => "leave_session",
            SessionOp::RecordOpenCount => "record_open_count",
            SessionOp::RecordMiddayCount => "record_midday_count",
            SessionOp::RecordCloseCount => "record_close_count",
            SessionOp::RecordSpend => "record_spend",
            SessionOp::RecordTransfer => "record_transfer",
        }
    }
}

/// One till/shift instance. Mutated only through the workflow runtime;
/// `revision` is bumped by the store on every committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CxSessionRecord {
    pub schema_version: SchemaVersion,
    pub session_id: SessionId,
    pub org_id: OrgId,
    pub owner_user_id: UserId,
    pub status: SessionStatus,
    // Advisory UI affinity only. Authorization always consults
    // `authorized_user_ids`, never this field.
    pub active_user_id: Option<UserId>,
    pub authorized_user_ids: BTreeSet<UserId>,
    pub open_start_dt: Option<MonotonicTimeNs>,
    pub open_start_user_id: Option<UserId>,
    pub open_confirm_dt: Option<MonotonicTimeNs>,
    pub open_confirm_user_id: Option<UserId>,
    pub close_start_dt: Option<MonotonicTimeNs>,
    pub close_start_user_id: Option<UserId>,
    pub close_confirm_dt: Option<MonotonicTimeNs>,
    pub close_confirm_user_id: Option<UserId>,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
    pub revision: u64,
}

impl CxSessionRecord {
    pub fn dormant_v1(
        session_id: SessionId,
        org_id: OrgId,
        owner_user_id: UserId,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let mut authorized = BTreeSet::new();
        authorized.insert(owner_user_id.clone());
        let s = Self {
            schema_version: CX_SESSION_CONTRACT_VERSION,
            session_id,
            org_id,
            owner_user_id,
            status: SessionStatus::Dormant,
            // The creator becomes the active user through the best-effort
            // auto-join performed by the workflow, not at construction.
            active_user_id: None,
            authorized_user_ids: authorized,
            open_start_dt: None,
            open_start_user_id: None,
            open_confirm_dt: None,
            open_confirm_user_id: None,
            close_start_dt: None,
            close_start_user_id: None,
            close_confirm_dt: None,
            close_confirm_user_id: None,
            created_at,
            updated_at: created_at,
            revision: 0,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn is_authorized(&self, user_id: &UserId) -> bool {
        self.authorized_user_ids.contains(user_id)
    }
}

impl Validate for CxSessionRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_SESSION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.schema_version",
                reason: "must match CX_SESSION_CONTRACT_VERSION",
            });
        }
        self.session_id.validate()?;
        self.org_id.validate()?;
        self.owner_user_id.validate()?;
        if self.authorized_user_ids.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.authorized_user_ids",
                reason: "must be <= 64 users",
            });
        }
        if let Some(active) = &self.active_user_id {
            if !self.authorized_user_ids.contains(active) {
                return Err(ContractViolation::InvalidValue {
                    field: "cx_session_record.active_user_id",
                    reason: "must be an element of authorized_user_ids",
                });
            }
        }
        if self.open_confirm_dt.is_some() && self.open_start_dt.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.open_confirm_dt",
                reason: "requires open_start_dt",
            });
        }
        if self.close_confirm_dt.is_some() && self.close_start_dt.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.close_confirm_dt",
                reason: "requires close_start_dt",
            });
        }
        if self.status == SessionStatus::Closed && self.close_confirm_dt.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.close_confirm_dt",
                reason: "must be set when status=Closed",
            });
        }
        if self.updated_at.0 < self.created_at.0 {
            return Err(ContractViolation::InvalidValue {
                field: "cx_session_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}
