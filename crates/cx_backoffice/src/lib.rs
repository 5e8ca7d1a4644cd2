#![forbid(unsafe_code)]

pub mod session_workflow;

pub use session_workflow::{
    CxBackofficeStore, SessionWorkflowConfig, SessionWorkflowRuntime, WorkflowError,
};
