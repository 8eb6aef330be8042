//! Workflow lookup: by source instrument or by workflow id, with type-set
//! filtering. Read-only; callers acquire the per-workflow lock afterwards
//! and reload before mutating.

use crate::domain::identifier::{NymId, SourceId, WorkflowId};
use crate::domain::ports::WorkflowStoreBox;
use crate::domain::workflow::{Workflow, WorkflowType};
use crate::error::Result;
use tracing::debug;

/// Resolves the secondary index (owner, source) to a workflow and validates
/// its type. A type mismatch is treated as not-found.
pub(crate) async fn by_source(
    store: &WorkflowStoreBox,
    owner: &NymId,
    source: &SourceId,
    accepted: &[WorkflowType],
) -> Result<Option<Workflow>> {
    let Some(id) = store.lookup_by_source(owner, source).await? else {
        return Ok(None);
    };

    by_id(store, owner, &id, accepted).await
}

/// Loads a workflow directly, optionally constrained to a type set.
pub(crate) async fn by_id(
    store: &WorkflowStoreBox,
    owner: &NymId,
    id: &WorkflowId,
    accepted: &[WorkflowType],
) -> Result<Option<Workflow>> {
    let Some(workflow) = store.load(owner, id).await? else {
        return Ok(None);
    };

    if !accepted.is_empty() && !accepted.contains(&workflow.workflow_type) {
        debug!(
            workflow = %workflow.id,
            found = ?workflow.workflow_type,
            expected = ?accepted,
            "workflow type outside accepted set"
        );
        return Ok(None);
    }

    Ok(Some(workflow))
}
