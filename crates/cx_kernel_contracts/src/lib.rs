#![forbid(unsafe_code)]

pub mod audit;
pub mod catalog;
pub mod common;
pub mod float;
pub mod gate;
pub mod order;
pub mod replog;
pub mod session;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
