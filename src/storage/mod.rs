//! Persistent key-value storage used by the response cache and the saved
//! recipe store.

mod local_file;
mod memory;

pub use local_file::LocalFileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;

use crate::error::Result;

/// String-keyed, string-valued persistent storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites any existing value at `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn all_keys(&self) -> Result<Vec<String>>;
}
