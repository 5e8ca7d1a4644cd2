#![forbid(unsafe_code)]

pub mod close_gate;
pub mod provision;
pub mod reconcile;
