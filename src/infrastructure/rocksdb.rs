use crate::domain::identifier::{AccountId, NymId, SourceId, WorkflowId};
use crate::domain::ports::WorkflowStore;
use crate::domain::workflow::{Workflow, WorkflowState, WorkflowType};
use crate::error::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;

/// Column family for workflow records, keyed by owner and workflow id.
pub const CF_WORKFLOWS: &str = "workflows";
/// Column family for the source-instrument index, keyed by owner and source
/// id.
pub const CF_SOURCES: &str = "sources";

// Unit separator; cannot occur in identifiers.
const KEY_SEP: char = '\u{1f}';

/// A persistent workflow store backed by RocksDB.
///
/// Records and the source index live in separate column families, both
/// written during the same upsert. `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbWorkflowStore {
    db: Arc<DB>,
}

impl RocksDbWorkflowStore {
    /// Opens or creates a RocksDB instance at the given path, ensuring the
    /// required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_workflows = ColumnFamilyDescriptor::new(CF_WORKFLOWS, Options::default());
        let cf_sources = ColumnFamilyDescriptor::new(CF_SOURCES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_workflows, cf_sources])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| crate::error::WorkflowError::Storage(format!(
                "column family {name} not found"
            )))
    }

    fn scoped_key(owner: &NymId, suffix: &str) -> Vec<u8> {
        format!("{owner}{KEY_SEP}{suffix}").into_bytes()
    }

    /// All workflows belonging to one owner.
    fn owner_workflows(&self, owner: &NymId) -> Result<Vec<Workflow>> {
        let cf = self.cf(CF_WORKFLOWS)?;
        let prefix = Self::scoped_key(owner, "");

        let mut workflows = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            workflows.push(serde_json::from_slice(&value)?);
        }

        Ok(workflows)
    }
}

#[async_trait]
impl WorkflowStore for RocksDbWorkflowStore {
    async fn store(&self, owner: &NymId, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;

        let workflows = self.cf(CF_WORKFLOWS)?;
        let sources = self.cf(CF_SOURCES)?;

        let key = Self::scoped_key(owner, &workflow.id.to_string());
        self.db
            .put_cf(workflows, key, serde_json::to_vec(workflow)?)?;

        for entry in &workflow.source {
            let key = Self::scoped_key(owner, entry.id.as_str());
            self.db.put_cf(sources, key, serde_json::to_vec(&workflow.id)?)?;
        }

        Ok(())
    }

    async fn load(&self, owner: &NymId, id: &WorkflowId) -> Result<Option<Workflow>> {
        let cf = self.cf(CF_WORKFLOWS)?;
        let key = Self::scoped_key(owner, &id.to_string());

        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn lookup_by_source(
        &self,
        owner: &NymId,
        source: &SourceId,
    ) -> Result<Option<WorkflowId>> {
        let cf = self.cf(CF_SOURCES)?;
        let key = Self::scoped_key(owner, source.as_str());

        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_by_state(
        &self,
        owner: &NymId,
        workflow_type: WorkflowType,
        state: WorkflowState,
    ) -> Result<Vec<WorkflowId>> {
        Ok(self
            .owner_workflows(owner)?
            .into_iter()
            .filter(|workflow| {
                workflow.workflow_type == workflow_type && workflow.state == state
            })
            .map(|workflow| workflow.id)
            .collect())
    }

    async fn list_by_account(
        &self,
        owner: &NymId,
        account: &AccountId,
    ) -> Result<Vec<WorkflowId>> {
        Ok(self
            .owner_workflows(owner)?
            .into_iter()
            .filter(|workflow| workflow.accounts.contains(account))
            .map(|workflow| workflow.id)
            .collect())
    }
}
