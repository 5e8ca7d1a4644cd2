#![forbid(unsafe_code)]

use rust_decimal::Decimal;

use crate::common::validate_id;
use crate::float::{DenominationId, RepositoryId, Ticker};
use crate::session::OrgId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const CX_CATALOG_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Fiat rounds to 2 display places, crypto and metal to 8. Exact decimal
/// values are kept for comparison; rounding is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
    Metal,
}

impl CurrencyKind {
    pub fn display_scale(self) -> u32 {
        match self {
            CurrencyKind::Fiat => 2,
            CurrencyKind::Crypto | CurrencyKind::Metal => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenominationInfo {
    pub denomination_id: DenominationId,
    pub value: Decimal,
}

impl Validate for DenominationInfo {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.denomination_id.validate()?;
        if self.value <= Decimal::ZERO {
            return Err(ContractViolation::InvalidValue {
                field: "denomination_info.value",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub schema_version: SchemaVersion,
    pub ticker: Ticker,
    pub kind: CurrencyKind,
    pub denominations: Vec<DenominationInfo>,
}

impl CurrencyInfo {
    pub fn v1(
        ticker: Ticker,
        kind: CurrencyKind,
        denominations: Vec<DenominationInfo>,
    ) -> Result<Self, ContractViolation> {
        let c = Self {
            schema_version: CX_CATALOG_CONTRACT_VERSION,
            ticker,
            kind,
            denominations,
        };
        c.validate()?;
        Ok(c)
    }
}

impl Validate for CurrencyInfo {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_CATALOG_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "currency_info.schema_version",
                reason: "must match CX_CATALOG_CONTRACT_VERSION",
            });
        }
        self.ticker.validate()?;
        if self.denominations.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "currency_info.denominations",
                reason: "must not be empty",
            });
        }
        if self.denominations.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "currency_info.denominations",
                reason: "must be <= 64 denominations",
            });
        }
        for d in &self.denominations {
            d.validate()?;
        }
        Ok(())
    }
}

/// A cash/asset holding location (drawer, vault, wallet). Read-only to this
/// core; the catalog service owns these rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub schema_version: SchemaVersion,
    pub repository_id: RepositoryId,
    pub org_id: OrgId,
    pub name: String,
    pub active: bool,
    /// Repositories with this flag unset are excluded from the close gate's
    /// confirmation check.
    pub float_count_required: bool,
    pub currency_tickers: Vec<Ticker>,
}

impl RepositoryInfo {
    pub fn v1(
        repository_id: RepositoryId,
        org_id: OrgId,
        name: impl Into<String>,
        active: bool,
        float_count_required: bool,
        currency_tickers: Vec<Ticker>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: CX_CATALOG_CONTRACT_VERSION,
            repository_id,
            org_id,
            name: name.into(),
            active,
            float_count_required,
            currency_tickers,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for RepositoryInfo {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_CATALOG_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "repository_info.schema_version",
                reason: "must match CX_CATALOG_CONTRACT_VERSION",
            });
        }
        self.repository_id.validate()?;
        self.org_id.validate()?;
        validate_id("repository_info.name", &self.name, 96)?;
        if self.currency_tickers.len() > 32 {
            return Err(ContractViolation::InvalidValue {
                field: "repository_info.currency_tickers",
                reason: "must be <= 32 tickers",
            });
        }
        for t in &self.currency_tickers {
            t.validate()?;
        }
        Ok(())
    }
}
