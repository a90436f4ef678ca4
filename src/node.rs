//! A participant in a distributed multiplication.
//!
//! A [MatmulNode] is built once with a [NodeBuilder], which resolves the
//! node's [Role] from the membership view. The role never changes afterwards.
//!
//! # Examples
//!
//!```no_run
//! use distmm::{NodeBuilder, JobSpec, StaticMembership};
//!
//! let node = NodeBuilder::new()
//!     .with_membership(StaticMembership::new("node-0", ["node-0"]))
//!     .with_chunk_height(100)
//!     .build()
//!     .expect("node");
//! let outcome = node.run::<i64>(&JobSpec::square(300)).expect("run");
//! println!("{}", outcome.result.expect("coordinator result").preview(10, 10));
//!```

use crate::assembly::merge;
use crate::dispatch::{await_operands, collect_results, compute_chunks, publish};
use crate::env_var::Config;
use crate::error::{Error, RunError, Stage, StageExt};
use crate::generator::MatrixGenerator;
use crate::matrix::{Element, Matrix};
use crate::membership::{Membership, NodeId, Role, RoleResolver, StaticMembership};
use crate::store::{SharedStore, Store};
use crate::visibility::PollPolicy;

use std::time::Duration;

/// Dimensions of a generated run: A is `rows x cols`, B is `cols x b_cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub rows: usize,
    pub cols: usize,
    pub b_cols: usize,
    /// overrides the configured seed
    pub seed: Option<u64>,
}

impl JobSpec {
    pub fn new(rows: usize, cols: usize, b_cols: usize) -> JobSpec {
        JobSpec {
            rows,
            cols,
            b_cols,
            seed: None,
        }
    }

    /// Two `n x n` operands
    pub fn square(n: usize) -> JobSpec {
        JobSpec::new(n, n, n)
    }

    pub fn with_seed(mut self, seed: u64) -> JobSpec {
        self.seed = Some(seed);
        self
    }
}

/// What a node did during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<T> {
    pub role: Role,
    /// ordinals this node multiplied
    pub computed: Vec<usize>,
    /// the assembled product, coordinator only
    pub result: Option<Matrix<T>>,
}

/// Builder for a [MatmulNode].
///
/// Settings start from [Config::default] (or the environment with
/// [NodeBuilder::from_env]); the `with_*` methods override them.
pub struct NodeBuilder {
    config: Config,
    store: Option<Store>,
    membership: Option<Box<dyn Membership>>,
}

impl Default for NodeBuilder {
    fn default() -> Self {
        NodeBuilder::new()
    }
}

impl NodeBuilder {
    pub fn new() -> NodeBuilder {
        NodeBuilder::with_config(Config::default())
    }

    /// Start from the `DISTMM_` environment variables
    #[tracing::instrument(skip_all)]
    pub fn from_env() -> Result<NodeBuilder, RunError> {
        Ok(NodeBuilder::with_config(
            Config::from_env().stage(Stage::RoleResolution)?,
        ))
    }

    pub fn with_config(config: Config) -> NodeBuilder {
        NodeBuilder {
            config,
            store: None,
            membership: None,
        }
    }

    /// Use an existing store handle instead of opening the configured backend
    pub fn with_store(mut self, store: impl Into<Store>) -> NodeBuilder {
        self.store = Some(store.into());
        self
    }

    pub fn with_membership(mut self, membership: impl Membership + 'static) -> NodeBuilder {
        self.membership = Some(Box::new(membership));
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> NodeBuilder {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// `Duration::ZERO` removes the deadline
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> NodeBuilder {
        self.config.visibility_timeout = timeout.as_secs_f64();
        self
    }

    pub fn with_chunk_height(mut self, chunk_height: usize) -> NodeBuilder {
        self.config.chunk_height = chunk_height;
        self
    }

    pub fn with_coordinator_computes(mut self, computes: bool) -> NodeBuilder {
        self.config.coordinator_computes = computes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> NodeBuilder {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> NodeBuilder {
        self.config.job_id = job_id.into();
        self
    }

    fn membership_from_config(config: &Config) -> Result<StaticMembership, Error> {
        let local = config
            .node_id
            .clone()
            .ok_or_else(|| Error::config("no node id, set DISTMM_NODE_ID"))?;
        let members = config.members.clone().unwrap_or_default();
        Ok(StaticMembership::new(local, members))
    }

    /// Validate the settings, open the store and resolve the role.
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Result<MatmulNode, RunError> {
        let config = self.config;
        config.validate().stage(Stage::RoleResolution)?;
        if let Some(enabled) = config.runtime_warnings {
            crate::set_runtime_warnings(enabled);
        }
        let membership: Box<dyn Membership> = match self.membership {
            Some(membership) => membership,
            None => Box::new(NodeBuilder::membership_from_config(&config).stage(Stage::RoleResolution)?),
        };
        let id = membership.local_id().clone();
        let view = membership.current_members().stage(Stage::RoleResolution)?;
        let role = RoleResolver::resolve(&id, &view).stage(Stage::RoleResolution)?;
        if role == Role::Coordinator
            && !config.coordinator_computes
            && view.iter().all(|member| *member == id)
        {
            return Err(RunError::new(
                Stage::RoleResolution,
                Error::config(format!(
                    "node {} is the only member and does not compute, no node would multiply chunks",
                    id
                )),
            ));
        }
        let store = match self.store {
            Some(store) => store,
            None => Store::from_config(&config).stage(Stage::RoleResolution)?,
        };
        tracing::info!(node = %id, ?role, backend = ?store.backend(), "node ready");
        Ok(MatmulNode {
            id,
            role,
            store,
            config,
        })
    }
}

/// A node with a fixed role, bound to one store.
#[derive(Debug, Clone)]
pub struct MatmulNode {
    id: NodeId,
    role: Role,
    store: Store,
    config: Config,
}

impl MatmulNode {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn policy(&self) -> PollPolicy {
        PollPolicy::from_config(&self.config)
    }

    /// Take part in a run with generated operands.
    ///
    /// The coordinator generates A and B from `job` and drives the run, a
    /// worker ignores `job` and computes whatever chunks it can claim.
    #[tracing::instrument(skip_all, fields(node = %self.id, role = ?self.role))]
    pub fn run<T: Element>(&self, job: &JobSpec) -> Result<RunOutcome<T>, RunError> {
        match self.role {
            Role::Coordinator => {
                let mut gen = MatrixGenerator::new(job.seed.or(self.config.seed));
                let a = gen.generate::<T>(job.rows, job.cols).stage(Stage::Dispatch)?;
                let b = gen.generate::<T>(job.cols, job.b_cols).stage(Stage::Dispatch)?;
                self.coordinate(&a, &b)
            }
            Role::Worker => self.work(),
        }
    }

    /// Coordinator path over caller supplied operands: publish, optionally
    /// compute, wait for every result and assemble.
    #[tracing::instrument(skip_all, fields(node = %self.id))]
    pub fn coordinate<T: Element>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<RunOutcome<T>, RunError> {
        if self.role != Role::Coordinator {
            return Err(RunError::new(
                Stage::Dispatch,
                Error::config(format!("node {} is not the coordinator", self.id)),
            ));
        }
        let policy = self.policy();
        let manifest = publish(&self.store, a, b, self.config.chunk_height).stage(Stage::Dispatch)?;

        let computed = if self.config.coordinator_computes {
            compute_chunks(&self.store, &self.id, &manifest, b, &policy).stage(Stage::Computation)?
        } else {
            vec![]
        };

        let partials = collect_results::<T>(&self.store, &manifest, &policy).stage(Stage::Assembly)?;
        let result = merge(partials).stage(Stage::Assembly)?;
        if result.shape() != (manifest.a_rows, manifest.b_cols) {
            return Err(RunError::new(
                Stage::Assembly,
                Error::shape(
                    "assemble",
                    format!(
                        "expected a {}x{} product, merged {}x{}",
                        manifest.a_rows,
                        manifest.b_cols,
                        result.rows(),
                        result.cols()
                    ),
                ),
            ));
        }
        tracing::info!(rows = result.rows(), cols = result.cols(), "assembled result");
        Ok(RunOutcome {
            role: self.role,
            computed,
            result: Some(result),
        })
    }

    /// Worker path: wait for the published operands, then claim and compute chunks.
    #[tracing::instrument(skip_all, fields(node = %self.id))]
    pub fn work<T: Element>(&self) -> Result<RunOutcome<T>, RunError> {
        let policy = self.policy();
        let (manifest, b) = await_operands::<T>(&self.store, &policy).stage(Stage::Computation)?;
        let computed =
            compute_chunks(&self.store, &self.id, &manifest, &b, &policy).stage(Stage::Computation)?;
        tracing::info!(computed = computed.len(), "worker finished");
        Ok(RunOutcome {
            role: self.role,
            computed,
            result: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::multiply;
    use crate::store::LocalStore;

    #[test]
    fn single_node_runs_alone() {
        let node = NodeBuilder::new()
            .with_membership(StaticMembership::new("solo", ["solo"]))
            .with_store(LocalStore::new())
            .with_chunk_height(4)
            .build()
            .unwrap();
        assert_eq!(node.role(), Role::Coordinator);
        let a = Matrix::from_rows(vec![vec![1i64, 2, 3], vec![4, 5, 6]]).unwrap();
        let b = Matrix::from_rows(vec![vec![7i64, 8], vec![9, 10], vec![11, 12]]).unwrap();
        let outcome = node.coordinate(&a, &b).unwrap();
        assert_eq!(outcome.computed, vec![0]);
        assert_eq!(
            outcome.result.unwrap().to_rows(),
            vec![vec![58, 64], vec![139, 154]]
        );
    }

    #[test]
    fn generated_run_matches_direct_product() {
        let node = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(0, 1))
            .with_chunk_height(3)
            .build()
            .unwrap();
        let job = JobSpec::new(10, 6, 4).with_seed(42);
        let outcome = node.run::<i64>(&job).unwrap();
        let mut gen = MatrixGenerator::seeded(42);
        let a = gen.generate::<i64>(10, 6).unwrap();
        let b = gen.generate::<i64>(6, 4).unwrap();
        assert_eq!(outcome.result.unwrap(), multiply(&a, &b).unwrap());
        assert_eq!(outcome.computed, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_membership_fails_role_resolution() {
        let err = NodeBuilder::new()
            .with_membership(StaticMembership::new("a", Vec::<String>::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.stage, Stage::RoleResolution);
        assert!(matches!(err.source, Error::Config { .. }));
    }

    #[test]
    fn zero_chunk_height_is_rejected() {
        let err = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(0, 1))
            .with_chunk_height(0)
            .build()
            .unwrap_err();
        assert!(matches!(err.source, Error::Config { .. }));
    }

    #[test]
    fn passive_coordinator_needs_workers() {
        let err = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(0, 1))
            .with_coordinator_computes(false)
            .build()
            .unwrap_err();
        assert_eq!(err.stage, Stage::RoleResolution);
        assert!(matches!(err.source, Error::Config { .. }));

        let node = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(0, 2))
            .with_coordinator_computes(false)
            .build()
            .unwrap();
        assert_eq!(node.role(), Role::Coordinator);
    }

    #[test]
    fn missing_node_id() {
        let err = NodeBuilder::new().build().unwrap_err();
        assert_eq!(err.stage, Stage::RoleResolution);
    }

    #[test]
    fn membership_from_config() {
        let config = Config {
            node_id: Some("b".to_owned()),
            members: Some(vec!["b".to_owned(), "a".to_owned()]),
            ..Default::default()
        };
        let node = NodeBuilder::with_config(config).build().unwrap();
        assert_eq!(node.role(), Role::Worker);
        assert_eq!(node.id().as_str(), "b");
    }

    #[test]
    fn worker_cannot_coordinate() {
        let node = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(1, 2))
            .build()
            .unwrap();
        let m = Matrix::from_rows(vec![vec![1i64]]).unwrap();
        let err = node.coordinate(&m, &m).unwrap_err();
        assert_eq!(err.stage, Stage::Dispatch);
    }

    #[test]
    fn lonely_worker_times_out() {
        let node = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(1, 2))
            .with_poll_interval(Duration::from_millis(5))
            .with_visibility_timeout(Duration::from_millis(40))
            .build()
            .unwrap();
        let err = node.work::<i64>().unwrap_err();
        assert_eq!(err.stage, Stage::Computation);
        assert!(matches!(err.source, Error::NotReady { .. }));
    }

    #[test]
    fn stale_job_is_config_error() {
        let store = LocalStore::new();
        let node = NodeBuilder::new()
            .with_membership(StaticMembership::numbered(0, 1))
            .with_store(store)
            .build()
            .unwrap();
        let m = Matrix::from_rows(vec![vec![2i64]]).unwrap();
        node.coordinate(&m, &m).unwrap();
        let err = node.coordinate(&m, &m).unwrap_err();
        assert_eq!(err.stage, Stage::Dispatch);
        assert!(matches!(err.source, Error::Config { .. }));
    }
}
