use crate::domain::identifier::NymId;
use crate::domain::workflow::{WorkflowState, WorkflowType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),
    #[error("wrong instrument: {0}")]
    WrongInstrument(String),
    #[error("no workflow found for {0}")]
    NotFound(String),
    #[error("{operation} not legal for {workflow_type:?} in state {state:?}")]
    IllegalTransition {
        operation: &'static str,
        workflow_type: WorkflowType,
        state: WorkflowState,
    },
    #[error("no contact known for nym {0}")]
    UnknownContact(NymId),
    #[error("invalid workflow record: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(String),
}
