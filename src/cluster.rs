//! Several nodes in one process, each on its own thread, sharing a [LocalStore].

use crate::env_var::Config;
use crate::error::{Error, RunError, Stage};
use crate::matrix::{Element, Matrix};
use crate::membership::{NodeId, Role, StaticMembership};
use crate::node::{JobSpec, MatmulNode, NodeBuilder, RunOutcome};
use crate::store::LocalStore;

/// Result of a [LocalCluster] run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome<T> {
    pub result: Matrix<T>,
    /// every node with the ordinals it computed
    pub computed_by: Vec<(NodeId, Vec<usize>)>,
}

/// `num_nodes` nodes named `node-0 .. node-{n-1}`; `node-0` coordinates.
pub struct LocalCluster {
    nodes: Vec<MatmulNode>,
    store: LocalStore,
}

impl LocalCluster {
    pub fn new(num_nodes: usize) -> Result<LocalCluster, RunError> {
        LocalCluster::with_config(num_nodes, Config::default())
    }

    /// Every node shares `config` apart from its identity and the store.
    #[tracing::instrument(skip(config))]
    pub fn with_config(num_nodes: usize, config: Config) -> Result<LocalCluster, RunError> {
        if num_nodes == 0 {
            return Err(RunError::new(
                Stage::RoleResolution,
                Error::config("a cluster needs at least one node"),
            ));
        }
        let store = LocalStore::new();
        let nodes = (0..num_nodes)
            .map(|i| {
                NodeBuilder::with_config(config.clone())
                    .with_membership(StaticMembership::numbered(i, num_nodes))
                    .with_store(store.clone())
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LocalCluster { nodes, store })
    }

    pub fn nodes(&self) -> &[MatmulNode] {
        &self.nodes
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Run with operands generated by the coordinator from `job`.
    pub fn run<T: Element>(&self, job: &JobSpec) -> Result<ClusterOutcome<T>, RunError> {
        self.run_nodes(|node| node.run::<T>(job))
    }

    /// Run over the given operands.
    pub fn run_with<T: Element>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<ClusterOutcome<T>, RunError> {
        self.run_nodes(|node| match node.role() {
            Role::Coordinator => node.coordinate(a, b),
            Role::Worker => node.work::<T>(),
        })
    }

    #[tracing::instrument(skip_all, fields(num_nodes = self.nodes.len()))]
    fn run_nodes<T, F>(&self, op: F) -> Result<ClusterOutcome<T>, RunError>
    where
        T: Element,
        F: Fn(&MatmulNode) -> Result<RunOutcome<T>, RunError> + Sync,
    {
        let op = &op;
        let outcomes = crossbeam::thread::scope(|s| {
            let handles = self
                .nodes
                .iter()
                .map(|node| s.spawn(move |_| op(node)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(RunError::new(
                            Stage::Computation,
                            Error::dependency("node thread", "panicked"),
                        ))
                    })
                })
                .collect::<Vec<_>>()
        })
        .map_err(|_| RunError::new(Stage::Computation, Error::dependency("node thread", "panicked")))?;

        let mut result = None;
        let mut computed_by = Vec::with_capacity(outcomes.len());
        for (node, outcome) in self.nodes.iter().zip(outcomes) {
            let outcome = outcome.map_err(|e| {
                tracing::error!(node = %node.id(), "{}", e);
                e
            })?;
            if outcome.result.is_some() {
                result = outcome.result;
            }
            computed_by.push((node.id().clone(), outcome.computed));
        }
        let result = result.ok_or_else(|| {
            RunError::new(Stage::Assembly, Error::config("no node acted as coordinator"))
        })?;
        Ok(ClusterOutcome {
            result,
            computed_by,
        })
    }
}
