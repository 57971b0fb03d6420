use std::{future::Future, ops::Deref, path::PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::fs::operations::{read_locked, write_locked};

/// Interface for abstracting the key-value storage the tracker state is persisted into.
pub trait StateStorage {
    /// Retrieves a previously saved value. Keys that were never saved yield `None`.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Replaces the value stored under `key`.
    fn save(&self, key: &str, value: &Value) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref> StateStorage for T
where
    T::Target: StateStorage,
{
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send {
        self.deref().load(key)
    }

    fn save(&self, key: &str, value: &Value) -> impl Future<Output = Result<()>> + Send {
        self.deref().save(key, value)
    }
}

/// The main realization of [StateStorage]. Every key is kept in its own `<key>.json` file.
pub struct JsonFileStorage {
    state_dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&state_dir)?;

        Ok(Self { state_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.state_dir.join(format!("{key}.json"))
    }
}

impl StateStorage for JsonFileStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key);
        let Some(contents) = read_locked(&path).await? else {
            debug!("No stored value for {key}");
            return Ok(None);
        };
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("{path:?} doesn't contain valid json"))?;
        Ok(Some(value))
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.key_path(key);
        let mut contents = serde_json::to_vec_pretty(value)?;
        contents.push(b'\n');
        write_locked(&path, &contents)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?;
        Ok(())
    }
}
