//! In-memory ABI registry keyed by account.
//!
//! Thread-safe via `Arc<RwLock<..>>`; cloning shares the same store.
//! Loading a new ABI for an account replaces the previous one, as `setabi` does.

use chainwatch_core::{AbiProvider, ActionSerializer, Name};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use crate::abi::AbiDef;
use crate::error::AbiError;
use crate::serializer::AbiSerializer;

/// File suffix recognised by [`MemoryAbiRegistry::load_directory`].
pub const ABI_FILE_SUFFIX: &str = ".abi.json";

#[derive(Clone, Default)]
pub struct MemoryAbiRegistry {
    inner: Arc<RwLock<HashMap<Name, Arc<AbiSerializer>>>>,
}

impl MemoryAbiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `abi` and register it for `account`.
    pub fn add(&self, account: Name, abi: AbiDef) -> Result<(), AbiError> {
        let serializer = Arc::new(AbiSerializer::new(abi)?);
        let replaced = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account, serializer)
            .is_some();
        tracing::debug!(account = %account, replaced, "Registered ABI");
        Ok(())
    }

    /// Load one `<account>.abi.json` file. Returns the account it was registered under.
    pub fn load_file(&self, path: &Path) -> Result<Name, AbiError> {
        let account = account_for(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| AbiError::io(path, e))?;
        self.add(account, AbiDef::from_json(&content)?)?;
        Ok(account)
    }

    /// Load every `*.abi.json` file directly inside `dir`.
    ///
    /// Returns the number of ABIs loaded.
    pub fn load_directory(&self, dir: &Path) -> Result<usize, AbiError> {
        let entries = std::fs::read_dir(dir).map_err(|e| AbiError::io(dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AbiError::io(dir, e))?.path();
            let is_abi = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ABI_FILE_SUFFIX));
            if is_abi && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let account = self.load_file(path)?;
            tracing::info!(account = %account, path = %path.display(), "Loaded ABI");
        }
        Ok(paths.len())
    }

    pub fn get(&self, account: Name) -> Option<Arc<AbiSerializer>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account)
            .cloned()
    }

    pub fn remove(&self, account: Name) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&account)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered accounts, sorted.
    pub fn accounts(&self) -> Vec<Name> {
        let mut accounts: Vec<Name> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        accounts.sort();
        accounts
    }
}

impl std::fmt::Debug for MemoryAbiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAbiRegistry")
            .field("accounts", &self.accounts())
            .finish()
    }
}

impl AbiProvider for MemoryAbiRegistry {
    fn serializer(&self, account: Name, _budget: Duration) -> Option<Arc<dyn ActionSerializer>> {
        self.get(account).map(|s| s as Arc<dyn ActionSerializer>)
    }
}

fn account_for(path: &Path) -> Result<Name, AbiError> {
    let invalid = |reason: String| AbiError::InvalidFileName {
        path: path.to_path_buf(),
        reason,
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("not valid UTF-8".into()))?;
    let stem = file_name
        .strip_suffix(ABI_FILE_SUFFIX)
        .ok_or_else(|| invalid(format!("expected <account>{ABI_FILE_SUFFIX}")))?;
    stem.parse().map_err(|e: chainwatch_core::ConfigError| invalid(e.to_string()))
}
