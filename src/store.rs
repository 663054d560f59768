//! Named-resource persistence: canonical JSON files under a data directory.

use crate::codec;
use crate::error::{ChainError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk resource names managed by the daemon.
pub const CHAIN_FILE: &str = "blockchain.json";
pub const KEY_FILE: &str = "private_key.json";
pub const PEERS_FILE: &str = "peers.json";

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Store { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Loads a named resource. An absent file is `NotFound`; undecodable
    /// content is `Malformed`. Both are recoverable at startup by falling
    /// back to freshly generated state.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let data = match fs::read(self.path(name)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChainError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        codec::decode(&data).map_err(|e| ChainError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Saves a named resource, overwriting any previous value.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let data = codec::encode(value)?;
        fs::write(self.path(name), data)?;
        Ok(())
    }
}
