#![forbid(unsafe_code)]

use crate::float::RepositoryId;
use crate::order::{OrderId, OrderStatus};
use crate::session::{SessionId, SessionStatus};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const CX_GATE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// One reason a session cannot close yet. Serialized outward so the caller
/// can render an actionable list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum BlockingItem {
    Session {
        session_id: String,
        status: SessionStatus,
    },
    Order {
        order_id: String,
        status: OrderStatus,
    },
    Repository {
        repository_id: String,
    },
}

impl BlockingItem {
    pub fn session(session_id: &SessionId, status: SessionStatus) -> Self {
        BlockingItem::Session {
            session_id: session_id.as_str().to_string(),
            status,
        }
    }

    pub fn order(order_id: &OrderId, status: OrderStatus) -> Self {
        BlockingItem::Order {
            order_id: order_id.as_str().to_string(),
            status,
        }
    }

    pub fn repository(repository_id: &RepositoryId) -> Self {
        BlockingItem::Repository {
            repository_id: repository_id.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CloseValidationReport {
    pub can_close: bool,
    pub blocking_items: Vec<BlockingItem>,
}

impl CloseValidationReport {
    pub fn clear() -> Self {
        Self {
            can_close: true,
            blocking_items: Vec::new(),
        }
    }

    pub fn blocked(blocking_items: Vec<BlockingItem>) -> Self {
        Self {
            can_close: false,
            blocking_items,
        }
    }
}

impl Validate for CloseValidationReport {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.can_close && !self.blocking_items.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "close_validation_report.blocking_items",
                reason: "must be empty when can_close=true",
            });
        }
        if !self.can_close && self.blocking_items.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "close_validation_report.blocking_items",
                reason: "must not be empty when can_close=false",
            });
        }
        Ok(())
    }
}
