use crate::error::{Error, Result};
use crate::warnings::RuntimeWarning;

use serde::{Deserialize, Serialize};

/// Stable identity of a node. Ordered lexicographically.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> NodeId {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

/// The part a node plays for the lifetime of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Worker,
}

/// Source of the cluster membership view.
pub trait Membership: Send + Sync {
    /// Identity of the calling node
    fn local_id(&self) -> &NodeId;
    /// The members currently known to the cluster
    fn current_members(&self) -> Result<Vec<NodeId>>;
}

/// A membership view fixed at construction, e.g. from a seed list.
#[derive(Debug, Clone)]
pub struct StaticMembership {
    local: NodeId,
    members: Vec<NodeId>,
}

impl StaticMembership {
    pub fn new<I, N>(local: impl Into<NodeId>, members: I) -> StaticMembership
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        StaticMembership {
            local: local.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// `node-0 .. node-{n-1}` as seen from `node-{me}`
    pub fn numbered(me: usize, num_nodes: usize) -> StaticMembership {
        StaticMembership::new(
            format!("node-{}", me),
            (0..num_nodes).map(|i| format!("node-{}", i)),
        )
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl Membership for StaticMembership {
    fn local_id(&self) -> &NodeId {
        &self.local
    }

    fn current_members(&self) -> Result<Vec<NodeId>> {
        Ok(self.members.clone())
    }
}

pub struct RoleResolver;

impl RoleResolver {
    /// The canonical first member of a view: its smallest id.
    pub fn coordinator_of(view: &[NodeId]) -> Result<&NodeId> {
        view.iter()
            .min()
            .ok_or_else(|| Error::config("cluster membership is empty, no node can act"))
    }

    /// Coordinator iff `local` is the smallest id in `view`.
    ///
    /// Every node evaluating the same view agrees without exchanging messages.
    #[tracing::instrument(skip_all, fields(local = %local))]
    pub fn resolve(local: &NodeId, view: &[NodeId]) -> Result<Role> {
        let first = RoleResolver::coordinator_of(view)?;
        if !view.contains(local) {
            RuntimeWarning::NotAMember(local.as_str()).print();
        }
        let role = if first == local {
            Role::Coordinator
        } else {
            Role::Worker
        };
        tracing::debug!(?role, coordinator = %first, "resolved role");
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn smallest_id_coordinates() {
        let view = ids(&["10.0.0.7", "10.0.0.12", "10.0.0.3"]);
        assert_eq!(
            RoleResolver::resolve(&"10.0.0.12".into(), &view).unwrap(),
            Role::Coordinator
        );
        assert_eq!(
            RoleResolver::resolve(&"10.0.0.3".into(), &view).unwrap(),
            Role::Worker
        );
    }

    #[test]
    fn exactly_one_coordinator() {
        for view in [
            ids(&["a"]),
            ids(&["b", "a"]),
            ids(&["node-3", "node-1", "node-2", "node-10"]),
        ] {
            let coordinators = view
                .iter()
                .filter(|me| RoleResolver::resolve(me, &view).unwrap() == Role::Coordinator)
                .count();
            assert_eq!(coordinators, 1, "view {:?}", view);
        }
    }

    #[test]
    fn view_order_does_not_matter() {
        let forward = ids(&["x", "y", "z"]);
        let backward = ids(&["z", "y", "x"]);
        for me in &forward {
            assert_eq!(
                RoleResolver::resolve(me, &forward).unwrap(),
                RoleResolver::resolve(me, &backward).unwrap()
            );
        }
    }

    #[test]
    fn empty_view_is_config_error() {
        let err = RoleResolver::resolve(&"a".into(), &[]).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn outsider_is_worker() {
        RuntimeWarning::disable_warnings();
        let view = ids(&["b", "c"]);
        assert_eq!(
            RoleResolver::resolve(&"a".into(), &view).unwrap(),
            Role::Worker
        );
        RuntimeWarning::enable_warnings();
    }

    #[test]
    fn numbered_membership() {
        let m = StaticMembership::numbered(2, 4);
        assert_eq!(m.local_id().as_str(), "node-2");
        assert_eq!(m.current_members().unwrap().len(), 4);
    }
}
