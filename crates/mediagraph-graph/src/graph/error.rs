use mediagraph_core::Status;

use crate::graph::record::{NodeId, PortId};

/// Failures from topology-mutation calls (`node_remove`, `port_add`,
/// `port_link`, ...) that fall outside the `Status` vocabulary nodes use —
/// a stale handle, a malformed direction pairing, a port still linked.
/// Kept distinct from `mediagraph_core::Status` (spec §7) so that "you
/// passed a handle that no longer exists" is never confused with "the node
/// needs a buffer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("port {0:?} does not exist")]
    UnknownPort(PortId),
    #[error("port {0:?} is already linked")]
    PortAlreadyLinked(PortId),
    #[error("cannot link two ports of the same direction")]
    DirectionMismatch,
    #[error("port {0:?} must be unlinked before it can be removed")]
    PortStillLinked(PortId),
    #[error("node rejected I/O cell for port {0:?}: {1:?}")]
    IoRejected(PortId, Status),
}
