#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::float::RepositoryId;
use crate::session::{SessionId, UserId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const CX_REPLOG_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Per-(session, repository) confirmation record. One upsert per active
/// repository per transition; close-side fields are cleared again when a
/// close is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfirmationRecord {
    pub schema_version: SchemaVersion,
    pub session_id: SessionId,
    pub repository_id: RepositoryId,
    pub open_start_dt: Option<MonotonicTimeNs>,
    pub open_confirm_dt: Option<MonotonicTimeNs>,
    pub close_start_dt: Option<MonotonicTimeNs>,
    pub close_confirm_dt: Option<MonotonicTimeNs>,
    /// Roster snapshot of users authorized on the session while this
    /// repository was in play.
    pub authorized_users: BTreeSet<UserId>,
    pub released_dt: Option<MonotonicTimeNs>,
}

impl RepoConfirmationRecord {
    pub fn opened_v1(
        session_id: SessionId,
        repository_id: RepositoryId,
        open_start_dt: MonotonicTimeNs,
        authorized_users: BTreeSet<UserId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: CX_REPLOG_CONTRACT_VERSION,
            session_id,
            repository_id,
            open_start_dt: Some(open_start_dt),
            open_confirm_dt: None,
            close_start_dt: None,
            close_confirm_dt: None,
            authorized_users,
            released_dt: None,
        };
        r.validate()?;
        Ok(r)
    }

    /// A repository is close-confirmed iff the close confirm stamp is set.
    pub fn close_confirmed(&self) -> bool {
        self.close_confirm_dt.is_some()
    }
}

impl Validate for RepoConfirmationRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_REPLOG_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "repo_confirmation_record.schema_version",
                reason: "must match CX_REPLOG_CONTRACT_VERSION",
            });
        }
        self.session_id.validate()?;
        self.repository_id.validate()?;
        if self.open_confirm_dt.is_some() && self.open_start_dt.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "repo_confirmation_record.open_confirm_dt",
                reason: "requires open_start_dt",
            });
        }
        if self.close_confirm_dt.is_some() && self.close_start_dt.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "repo_confirmation_record.close_confirm_dt",
                reason: "requires close_start_dt",
            });
        }
        if self.authorized_users.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "repo_confirmation_record.authorized_users",
                reason: "must be <= 64 users",
            });
        }
        Ok(())
    }
}
