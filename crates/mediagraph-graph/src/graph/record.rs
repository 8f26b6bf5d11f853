use std::fmt;
use std::rc::Rc;

use mediagraph_core::{Direction, IoCell, NodeContract, NodeFlags, PortFlags, PortId as LocalPortId, Status};
use smallvec::SmallVec;

/// Most nodes have a handful of ports; inline storage avoids a heap
/// allocation per node for the common case.
pub type PortList = SmallVec<[PortId; 4]>;

/// An opaque, copyable handle to a node owned by a [`crate::Graph`].
///
/// The graph owns an arena of node records; callers never see a raw
/// pointer into it (see the storage ownership decision this crate
/// implements). Indices from removed slots are never handed back out
/// ([`thunderdome::Arena`] generations guard against stale reuse).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) thunderdome::Index);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}, {})", self.0.slot(), self.0.generation())
    }
}

/// An opaque, copyable handle to a port owned by a [`crate::Graph`].
///
/// Distinct from [`mediagraph_core::PortId`], which is the small
/// node-local identifier (`0`, `1`, ...) a node's own contract
/// implementation uses to name its ports; a `PortId` here names one
/// specific port record in the graph's arena, regardless of which node it
/// belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub(crate) thunderdome::Index);

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortId({}, {})", self.0.slot(), self.0.generation())
    }
}

/// What the scheduler should do the next time it dequeues a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Interpret `state` from the last run and decide follow-up work.
    Check,
    /// Call `process_input`.
    In,
    /// Call `process_output`.
    Out,
}

/// The function the scheduler invokes for `Action::In`/`Action::Out`.
/// Stored as a plain function pointer rather than inlined into the loop,
/// mirroring the original design's "operation table plus instance
/// pointer" split even though Rust's trait object already carries both.
pub type ScheduleFn = fn(&mut dyn NodeContract, Action) -> Status;

pub fn default_schedule(contract: &mut dyn NodeContract, action: Action) -> Status {
    match action {
        Action::In => contract.process_input(),
        Action::Out => contract.process_output(),
        Action::Check => unreachable!("scheduler never dispatches Check through schedule()"),
    }
}

pub struct NodeRecord {
    pub contract: Box<dyn NodeContract>,
    pub flags: NodeFlags,
    pub schedule: ScheduleFn,
    pub action: Action,
    pub state: Status,
    pub queued: bool,
    pub max_in: u32,
    pub max_out: u32,
    pub required_in: u32,
    pub ready_in: u32,
    pub ports_in: PortList,
    pub ports_out: PortList,
}

impl NodeRecord {
    pub fn new(contract: Box<dyn NodeContract>, flags: NodeFlags) -> Self {
        Self {
            contract,
            flags,
            schedule: default_schedule,
            action: Action::Out,
            state: Status::Ok,
            queued: false,
            max_in: 0,
            max_out: 0,
            required_in: 0,
            ready_in: 0,
            ports_in: SmallVec::new(),
            ports_out: SmallVec::new(),
        }
    }

    pub fn ports(&self, direction: Direction) -> &[PortId] {
        match direction {
            Direction::Input => &self.ports_in,
            Direction::Output => &self.ports_out,
        }
    }
}

pub struct PortRecord {
    pub node: NodeId,
    pub local_id: LocalPortId,
    pub direction: Direction,
    pub flags: PortFlags,
    pub io: Option<Rc<IoCell>>,
    pub peer: Option<PortId>,
}
