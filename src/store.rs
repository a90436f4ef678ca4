//! The shared key-value store every node publishes to and reads from.
//!
//! Entries are addressed by a [Namespace] and an integer key. Values are opaque
//! bytes at this level; [put_value], [get_value] and friends encode them with
//! bincode. Backends only promise eventual visibility of a write to other
//! nodes, callers use [crate::visibility] to wait for entries they need.

use crate::env_var::Config;
use crate::error::{Error, Result};

use enum_dispatch::enum_dispatch;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub(crate) mod fs_store;
pub use fs_store::FsStore;
pub(crate) mod local_store;
pub use local_store::LocalStore;

/// The tables a run uses.
#[derive(
    serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy,
)]
pub enum Namespace {
    /// the left operand, key 0
    OperandA,
    /// the right operand, key 0
    OperandB,
    /// row chunks of the left operand, keyed by ordinal
    ChunkTable,
    /// partial products, keyed by ordinal
    ResultTable,
    /// which node claimed which ordinal
    ClaimTable,
    /// the run manifest, key 0
    Manifest,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::OperandA => "operand-a",
            Namespace::OperandB => "operand-b",
            Namespace::ChunkTable => "chunk-table",
            Namespace::ResultTable => "result-table",
            Namespace::ClaimTable => "claim-table",
            Namespace::Manifest => "manifest",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The list of available store backends
#[derive(
    serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy,
)]
pub enum Backend {
    /// The Local backend -- in process, nodes are threads sharing one store
    Local,
    /// The Fs backend -- one directory shared by every node process
    Fs,
}

impl Backend {
    pub fn from_name(name: &str) -> Result<Backend> {
        match name {
            "local" => Ok(Backend::Local),
            "fs" => Ok(Backend::Fs),
            other => Err(Error::config(format!(
                "unknown store backend '{}', expected 'local' or 'fs'",
                other
            ))),
        }
    }
}

/// Operations a shared store backend provides.
#[enum_dispatch]
pub trait SharedStore: Send + Sync {
    /// Store `value`, replacing any previous value
    fn put(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<()>;
    /// Store `value` only if the key is vacant. Returns whether this call wrote it.
    fn put_if_absent(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<bool>;
    fn get(&self, namespace: Namespace, key: usize) -> Result<Option<Vec<u8>>>;
    fn contains_key(&self, namespace: Namespace, key: usize) -> Result<bool>;
    /// Block for at most `timeout`, returning early if the backend can tell
    /// that new entries may have become visible.
    fn wait_for_change(&self, timeout: Duration) {
        std::thread::sleep(timeout);
    }
    fn backend(&self) -> Backend;
}

#[enum_dispatch(SharedStore)]
#[derive(Debug, Clone)]
pub enum Store {
    LocalStore,
    FsStore,
}

impl Store {
    /// Instantiate the backend selected by `config`.
    ///
    /// A `Local` store is only shared with handles cloned from the returned one.
    pub fn from_config(config: &Config) -> Result<Store> {
        match Backend::from_name(&config.backend)? {
            Backend::Local => Ok(LocalStore::new().into()),
            Backend::Fs => {
                let root = config.store_dir.clone().ok_or_else(|| {
                    Error::config("the fs backend needs DISTMM_STORE_DIR to be set")
                })?;
                Ok(FsStore::open(root, &config.job_id)?.into())
            }
        }
    }
}

pub fn put_value<V: Serialize>(store: &Store, namespace: Namespace, key: usize, value: &V) -> Result<()> {
    store.put(namespace, key, encode(namespace, key, value)?)
}

pub fn put_value_if_absent<V: Serialize>(
    store: &Store,
    namespace: Namespace,
    key: usize,
    value: &V,
) -> Result<bool> {
    store.put_if_absent(namespace, key, encode(namespace, key, value)?)
}

pub fn get_value<V: DeserializeOwned>(store: &Store, namespace: Namespace, key: usize) -> Result<Option<V>> {
    match store.get(namespace, key)? {
        Some(bytes) => crate::deserialize(&bytes)
            .map(Some)
            .map_err(|e| Error::dependency(format!("decode {}[{}]", namespace, key), e.to_string())),
        None => Ok(None),
    }
}

/// Like [get_value] but an absent entry is an error; used after visibility was confirmed.
pub fn expect_value<V: DeserializeOwned>(store: &Store, namespace: Namespace, key: usize) -> Result<V> {
    get_value(store, namespace, key)?.ok_or_else(|| {
        Error::dependency(
            format!("get {}[{}]", namespace, key),
            "entry vanished after it was reported present",
        )
    })
}

fn encode<V: Serialize>(namespace: Namespace, key: usize, value: &V) -> Result<Vec<u8>> {
    crate::serialize(value)
        .map_err(|e| Error::dependency(format!("encode {}[{}]", namespace, key), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    #[test]
    fn typed_round_trip() {
        let store: Store = LocalStore::new().into();
        let m = Matrix::from_rows(vec![vec![1i64, 2], vec![3, 4]]).unwrap();
        put_value(&store, Namespace::OperandA, 0, &m).unwrap();
        assert_eq!(get_value::<Matrix<i64>>(&store, Namespace::OperandA, 0).unwrap(), Some(m));
        assert_eq!(get_value::<Matrix<i64>>(&store, Namespace::OperandB, 0).unwrap(), None);
        assert!(expect_value::<Matrix<i64>>(&store, Namespace::OperandB, 0).is_err());
    }

    #[test]
    fn undecodable_entry_is_dependency_error() {
        let store: Store = LocalStore::new().into();
        store.put(Namespace::OperandB, 0, vec![1, 2, 3]).unwrap();
        let err = get_value::<Matrix<i64>>(&store, Namespace::OperandB, 0).unwrap_err();
        assert!(matches!(err, Error::Dependency { .. }));
    }

    #[test]
    fn backend_names() {
        assert_eq!(Backend::from_name("local").unwrap(), Backend::Local);
        assert_eq!(Backend::from_name("fs").unwrap(), Backend::Fs);
        assert!(Backend::from_name("rofi").is_err());
    }

    #[test]
    fn fs_backend_needs_dir() {
        let config = Config {
            backend: "fs".to_owned(),
            ..Default::default()
        };
        assert!(matches!(Store::from_config(&config), Err(Error::Config { .. })));
        let config = Config::default();
        assert_eq!(Store::from_config(&config).unwrap().backend(), Backend::Local);
    }
}
