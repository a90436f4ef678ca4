//! Waiting for store entries published by other nodes.
//!
//! A node re-checks the keys it needs every poll interval until all of them are
//! present. The wait is bounded by a deadline and fails with
//! [Error::NotReady] once it elapses. Backends able to signal new writes (see
//! [SharedStore::wait_for_change]) cut the interval short.

use crate::env_var::Config;
use crate::error::{Error, Result};
use crate::store::{Namespace, SharedStore, Store};
use crate::warnings::RuntimeWarning;

use std::time::{Duration, Instant};

/// Timing parameters of a visibility wait.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits forever
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> PollPolicy {
        PollPolicy {
            interval: config.poll_interval(),
            deadline: config.deadline(),
        }
    }
}

/// Block until every `(namespace, key)` in `keys` is present in `store`.
///
/// Keys already observed are not checked again.
#[tracing::instrument(skip_all, fields(keys = keys.len()))]
pub fn wait_for_keys(store: &Store, keys: &[(Namespace, usize)], policy: &PollPolicy) -> Result<()> {
    let start = Instant::now();
    let mut warned = false;
    let mut pending = keys.to_vec();
    loop {
        let mut still_missing = Vec::with_capacity(pending.len());
        for (namespace, key) in pending {
            if !store.contains_key(namespace, key)? {
                still_missing.push((namespace, key));
            }
        }
        pending = still_missing;
        let Some(&(namespace, key)) = pending.first() else {
            tracing::trace!(waited = start.elapsed().as_secs_f64(), "keys visible");
            return Ok(());
        };

        let waited = start.elapsed();
        match policy.deadline {
            Some(deadline) => {
                if waited >= deadline {
                    return Err(Error::NotReady {
                        namespace,
                        key,
                        waited: waited.as_secs_f64(),
                    });
                }
                if !warned && waited >= deadline / 2 {
                    RuntimeWarning::SlowVisibility(
                        namespace,
                        key,
                        waited.as_secs_f64(),
                        deadline.as_secs_f64(),
                    )
                    .print();
                    warned = true;
                }
                store.wait_for_change(std::cmp::min(policy.interval, deadline - waited));
            }
            None => {
                if !warned && waited >= Duration::from_secs(60) {
                    RuntimeWarning::SlowVisibility(namespace, key, waited.as_secs_f64(), 0.0).print();
                    warned = true;
                }
                store.wait_for_change(policy.interval);
            }
        }
    }
}

/// Convenience for waiting on a single entry
pub fn wait_for_key(store: &Store, namespace: Namespace, key: usize, policy: &PollPolicy) -> Result<()> {
    wait_for_keys(store, &[(namespace, key)], policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FsStore, LocalStore};

    fn policy(interval_ms: u64, deadline_ms: Option<u64>) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(interval_ms),
            deadline: deadline_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn present_keys_return_immediately() {
        let store: Store = LocalStore::new().into();
        store.put(Namespace::OperandB, 0, vec![]).unwrap();
        store.put(Namespace::Manifest, 0, vec![]).unwrap();
        wait_for_keys(
            &store,
            &[(Namespace::OperandB, 0), (Namespace::Manifest, 0)],
            &policy(100, Some(0)),
        )
        .unwrap();
    }

    #[test]
    fn deadline_yields_not_ready() {
        let store: Store = LocalStore::new().into();
        store.put(Namespace::OperandB, 0, vec![]).unwrap();
        let start = Instant::now();
        let err = wait_for_keys(
            &store,
            &[(Namespace::OperandB, 0), (Namespace::ChunkTable, 2)],
            &policy(10, Some(50)),
        )
        .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        match err {
            Error::NotReady { namespace, key, .. } => {
                assert_eq!(namespace, Namespace::ChunkTable);
                assert_eq!(key, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn late_write_is_observed() {
        let store: Store = LocalStore::new().into();
        let writer = store.clone();
        crossbeam::thread::scope(|s| {
            s.spawn(move |_| {
                std::thread::sleep(Duration::from_millis(30));
                writer.put(Namespace::ChunkTable, 0, vec![1]).unwrap();
            });
            wait_for_key(&store, Namespace::ChunkTable, 0, &policy(100, Some(10_000))).unwrap();
        })
        .unwrap();
    }

    #[test]
    fn fs_backend_polls() {
        let root = tempfile::tempdir().unwrap();
        let store: Store = FsStore::open(root.path(), "vis").unwrap().into();
        let writer = store.clone();
        crossbeam::thread::scope(|s| {
            s.spawn(move |_| {
                std::thread::sleep(Duration::from_millis(30));
                writer.put(Namespace::ResultTable, 1, vec![1]).unwrap();
            });
            wait_for_key(&store, Namespace::ResultTable, 1, &policy(5, Some(10_000))).unwrap();
        })
        .unwrap();
    }
}
