#![forbid(unsafe_code)]

use crate::common::validate_id;
use crate::session::SessionId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const CX_ORDER_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for OrderId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("order_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum OrderStatus {
    Draft,
    Accepted,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// A session may only close once every referencing order is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// External collaborator shape: the order store owns these, this core only
/// reads them through the close gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub schema_version: SchemaVersion,
    pub order_id: OrderId,
    pub session_id: SessionId,
    pub status: OrderStatus,
}

impl OrderRecord {
    pub fn v1(
        order_id: OrderId,
        session_id: SessionId,
        status: OrderStatus,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: CX_ORDER_CONTRACT_VERSION,
            order_id,
            session_id,
            status,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for OrderRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CX_ORDER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "order_record.schema_version",
                reason: "must match CX_ORDER_CONTRACT_VERSION",
            });
        }
        self.order_id.validate()?;
        self.session_id.validate()
    }
}
