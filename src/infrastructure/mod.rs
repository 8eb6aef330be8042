//! Adapters for the collaborator ports: in-memory implementations for tests
//! and the simulation driver, and an optional RocksDB-backed store.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
