use crate::domain::identifier::NymId;
use crate::domain::workflow::{Workflow, WorkflowState, WorkflowType};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One row of the final workflow report.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub owner: String,
    pub workflow: String,
    pub r#type: WorkflowType,
    pub state: WorkflowState,
    pub events: usize,
}

impl ReportRow {
    pub fn new(owner: &NymId, workflow: &Workflow) -> Self {
        Self {
            owner: owner.to_string(),
            workflow: workflow.id.to_string(),
            r#type: workflow.workflow_type,
            state: workflow.state,
            events: workflow.events.len(),
        }
    }
}

/// Writes the workflow report as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_rows(mut self, rows: impl IntoIterator<Item = ReportRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
