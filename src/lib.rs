//! distmm coordinates the multiplication of two dense matrices across a cluster of nodes that
//! share nothing but a key-value store.
//!
//! Every node resolves its role from the membership view: the node with the smallest id is the
//! coordinator, every other node is a worker. The coordinator publishes both operands and the
//! row chunks of the left operand to the store. Computing nodes claim chunks one ordinal at a
//! time, multiply them against the right operand and record the partial results under the same
//! ordinal. The coordinator waits for every result and concatenates them in ordinal order.
//!
//! Nodes only communicate through the store, whose writes become visible to other nodes
//! eventually. Every wait for another node's entry is bounded by a configurable visibility
//! timeout and fails with [Error::NotReady] when it elapses.
//!
//! Two store backends exist: "local" keeps entries in process memory and is used to run several
//! nodes as threads of one process ([LocalCluster]), "fs" keeps them in a directory shared by
//! several node processes.
//!
//! EXAMPLES
//! --------
//!
//! # Running an in-process cluster
//! ```no_run
//! use distmm::{JobSpec, LocalCluster};
//!
//! let cluster = LocalCluster::new(4).expect("cluster");
//! let outcome = cluster.run::<i64>(&JobSpec::square(1000).with_seed(7)).expect("run");
//! println!("{}", outcome.result.preview(10, 10));
//! ```
//!
//! # Running one node of a multi-process cluster
//! ```no_run
//! // DISTMM_BACKEND=fs DISTMM_STORE_DIR=/shared/distmm DISTMM_NODE_ID=node-1
//! // DISTMM_MEMBERS=node-0,node-1,node-2
//! use distmm::{JobSpec, NodeBuilder};
//!
//! let node = NodeBuilder::from_env().expect("config").build().expect("node");
//! let outcome = node.run::<i64>(&JobSpec::square(1000)).expect("run");
//! if let Some(result) = outcome.result {
//!     println!("{}", result.preview(10, 10));
//! }
//! ```

pub mod assembly;
pub mod cluster;
pub mod dispatch;
mod env_var;
pub mod error;
pub mod generator;
pub mod kernel;
pub mod matrix;
pub mod membership;
mod node;
pub mod partition;
pub mod store;
pub mod visibility;
mod warnings;

pub use crate::cluster::{ClusterOutcome, LocalCluster};
pub use crate::dispatch::RunManifest;
pub use crate::env_var::Config;
pub use crate::error::{Error, RunError, Stage};
pub use crate::generator::MatrixGenerator;
pub use crate::matrix::{Chunk, Element, Matrix, PartialResult};
pub use crate::membership::{Membership, NodeId, Role, RoleResolver, StaticMembership};
pub use crate::node::{JobSpec, MatmulNode, NodeBuilder, RunOutcome};
pub use crate::store::{Backend, FsStore, LocalStore, Namespace, SharedStore, Store};
pub use crate::warnings::set_runtime_warnings;

#[doc(hidden)]
pub fn serialize<T: ?Sized>(obj: &T) -> Result<Vec<u8>, anyhow::Error>
where
    T: serde::Serialize,
{
    Ok(bincode::serialize(obj)?)
}

#[doc(hidden)]
pub fn deserialize<'a, T>(bytes: &'a [u8]) -> Result<T, anyhow::Error>
where
    T: serde::Deserialize<'a>,
{
    Ok(bincode::deserialize(bytes)?)
}
