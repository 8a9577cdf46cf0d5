//! Storage backends
//!
//! The front end never touches stored values directly. It talks to a
//! [`StorageBackend`] chosen once at startup: the local in-memory map, or a
//! client that forwards each key to one of the DHT storage nodes.

pub mod dht;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use clap::ValueEnum;
use thiserror::Error;

pub use dht::DhtBackend;
pub use memory::MemoryBackend;

/// Errors a backend may report. The in-memory map never produces one, remote
/// backends do whenever a node misbehaves or cannot be reached.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no storage nodes configured")]
    NoNodes,

    #[error("request to storage node {node} failed: {source}")]
    Transport {
        node: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("storage node {node} answered with status {status}")]
    UnexpectedStatus { node: String, status: u16 },
}

/// Get/put capability shared by every backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the value stored under `key`. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), BackendError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Backend selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// Local hash map living inside the front end process
    #[default]
    Memory,
    /// Forward requests to the storage nodes given on the command line
    Dht,
}
