use crate::node::NodeId;

/// Errors returned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    /// No live node has this id.
    #[error("{0} not found")]
    NodeNotFound(NodeId),

    /// Following would put the child on its own parent chain.
    #[error("{child} cannot follow {parent}: would create a cycle")]
    FollowCycle {
        /// Node asked to follow.
        child: NodeId,
        /// Node it would follow.
        parent: NodeId,
    },
}

/// Convenience result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedError>;
