#![forbid(unsafe_code)]

use rust_decimal::Decimal;

use crate::common::validate_id;
use crate::session::SessionId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const CX_FLOAT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for RepositoryId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("repository_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for Ticker {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("ticker", &self.0, 16)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DenominationId(String);

impl DenominationId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DenominationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("denomination_id", &self.0, 64)
    }
}

/// One provisioning row: the (repository, ticker, denomination) cell of the
/// expansion, with the face value denormalized so the reconciliation read
/// path never joins back into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatStackSeed {
    pub repository_id: RepositoryId,
    pub ticker: Ticker,
    pub denomination_id: DenominationId,
    pub denominated_value: Decimal,
}

impl Validate for FloatStackSeed {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.repository_id.validate()?;
        self.ticker.validate()?;
        self.denomination_id.validate()?;
        if self.denominated_value <= Decimal::ZERO {
            return Err(ContractViolation::InvalidValue {
                field: "float_stack_seed.denominated_value",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Per-denomination cash counter for one repository within one session.
/// `close_count`, once set, is terminal data for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatStackRecord {
    pub schema_version: SchemaVersion,
    pub session_id: SessionId,
    pub repository_id: RepositoryId,
    pub denomination_id: DenominationId,
    pub ticker: Ticker,
    pub denominated_value: Decimal,
    pub open_count: u64,
    pub midday_count: u64,
    pub close_count: Option<u64>,
    pub last_session_count: u64,
    pub spent_during_session: Decimal,
    pub transferred_during_session: u64,
    pub open_spot: Decimal,
    pub close_spot: Option<Decimal>,
    pub average_spot: Option<Decimal>,
    /// Same (repository, denomination) stack of the immediately preceding
    /// session, when one existed.
    pub prior_session_id: Option<SessionId>,
}

impl FloatStackRecord {
    pub fn seeded_v1(
        session_id: SessionId,
        seed: &FloatStackSeed,
        last_session_count: u64,
        prior_session_id: Option<SessionId>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: CX_FLOAT_CONTRACT_VERSION,
            session_id,
            repository_id: seed.repository_id.clone(),
            denomination_id: seed.denomination_id.clone(),
            ticker: seed.ticker.clone(),
            denominated_value: seed.denominated_value,
            open_count: 0,
            midday_count: 0,
            close_count: None,
            last_session_count,
            spent_during_session: Decimal::ZERO,
            transferred_during_session: 0,
            open_spot: Decimal::ZERO,
            close_spot: None,
            average_spot: None,
            prior_session_id,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn key(&self) -> (SessionId, RepositoryId, DenominationId) {
        (
            self.session_id.clone(),
            self.repository_id.clone(),
            self.denomination_id.clone(),
        )
    }
}

impl Validate for FloatStackRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_FLOAT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "float_stack_record.schema_version",
                reason: "must match CX_FLOAT_CONTRACT_VERSION",
            });
        }
        self.session_id.validate()?;
        self.repository_id.validate()?;
        self.denomination_id.validate()?;
        self.ticker.validate()?;
        if self.denominated_value <= Decimal::ZERO {
            return Err(ContractViolation::InvalidValue {
                field: "float_stack_record.denominated_value",
                reason: "must be > 0",
            });
        }
        if self.spent_during_session < Decimal::ZERO {
            return Err(ContractViolation::NegativeAmount {
                field: "float_stack_record.spent_during_session",
            });
        }
        if self.open_spot < Decimal::ZERO {
            return Err(ContractViolation::NegativeAmount {
                field: "float_stack_record.open_spot",
            });
        }
        if let Some(s) = self.close_spot {
            if s < Decimal::ZERO {
                return Err(ContractViolation::NegativeAmount {
                    field: "float_stack_record.close_spot",
                });
            }
        }
        if let Some(s) = self.average_spot {
            if s < Decimal::ZERO {
                return Err(ContractViolation::NegativeAmount {
                    field: "float_stack_record.average_spot",
                });
            }
        }
        if let Some(prior) = &self.prior_session_id {
            prior.validate()?;
            if prior == &self.session_id {
                return Err(ContractViolation::InvalidValue {
                    field: "float_stack_record.prior_session_id",
                    reason: "must not reference the owning session",
                });
            }
        }
        Ok(())
    }
}
