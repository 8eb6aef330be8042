//! Application layer: the workflow engine and its supporting machinery.
//!
//! [`engine::WorkflowEngine`] is the public entry point. Lifecycle
//! operations live in per-family modules (`cheque`, `transfer`, `cash`) and
//! all funnel through the same template: validate the domain object, locate
//! or create the workflow, acquire its lock, run the transition guard,
//! append the event, emit side notifications.

pub mod appender;
pub mod cash;
pub mod cheque;
pub mod engine;
pub mod locator;
pub mod locks;
pub mod status;
pub mod transfer;
