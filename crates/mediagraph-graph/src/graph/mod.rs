mod error;
mod record;
mod scheduler;

use std::collections::VecDeque;

use mediagraph_core::{Direction, IoCell, NodeContract, NodeFlags, PortFlags, PortId as LocalPortId, Status};
use thunderdome::Arena;

pub use error::GraphError;
pub use record::{Action, NodeId, PortId, ScheduleFn};
use record::{NodeRecord, PortRecord};

/// Initial capacity hints for a [`Graph`]'s node and port arenas. Purely an
/// allocation-sizing hint — a graph never refuses to grow past these.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    pub node_capacity: usize,
    pub port_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_capacity: 16,
            port_capacity: 64,
        }
    }
}

/// Owns the topology — nodes, ports, and peer links — and the ready queue
/// that drives the scheduling loop (spec §4.3). Created empty; every node
/// and port is added and removed explicitly by the host.
pub struct Graph {
    nodes: Arena<NodeRecord>,
    ports: Arena<PortRecord>,
    ready_queue: VecDeque<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            nodes: Arena::with_capacity(config.node_capacity),
            ports: Arena::with_capacity(config.port_capacity),
            ready_queue: VecDeque::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contract(&self, id: NodeId) -> Option<&dyn NodeContract> {
        self.nodes.get(id.0).map(|n| n.contract.as_ref())
    }

    pub fn contract_mut(&mut self, id: NodeId) -> Option<&mut dyn NodeContract> {
        self.nodes.get_mut(id.0).map(|n| n.contract.as_mut())
    }

    /// Overrides the function the scheduler invokes for `Action::In`/`Out`
    /// on this node. Nodes that never need anything other than forwarding
    /// to `process_input`/`process_output` can leave the default in place.
    pub fn set_schedule_fn(&mut self, id: NodeId, schedule: ScheduleFn) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(id.0).ok_or(GraphError::UnknownNode(id))?;
        node.schedule = schedule;
        Ok(())
    }

    /// Registers a node. Its port sequences start empty; `action` starts at
    /// `Out` and `state` at `Ok`, per spec §4.3.
    pub fn node_add(&mut self, contract: Box<dyn NodeContract>, flags: NodeFlags) -> NodeId {
        let index = self.nodes.insert(NodeRecord::new(contract, flags));
        NodeId(index)
    }

    /// Removes all of the node's ports first (symmetrically unlinking any
    /// peers), dequeues the node from the ready queue if present, then
    /// removes the node record.
    pub fn node_remove(&mut self, id: NodeId) -> Result<Box<dyn NodeContract>, GraphError> {
        let (ports_in, ports_out) = {
            let node = self.nodes.get(id.0).ok_or(GraphError::UnknownNode(id))?;
            (node.ports_in.clone(), node.ports_out.clone())
        };
        for port in ports_in.into_iter().chain(ports_out) {
            let _ = self.port_unlink(port);
            self.ports.remove(port.0);
        }
        self.ready_queue.retain(|&n| n != id);
        let node = self.nodes.remove(id.0).ok_or(GraphError::UnknownNode(id))?;
        Ok(node.contract)
    }

    /// Inserts a port, updates the owning node's counters, and runs a port
    /// check in case the new port immediately satisfies readiness (it
    /// won't, absent an I/O cell, but this keeps the invariant uniform).
    pub fn port_add(
        &mut self,
        node_id: NodeId,
        local_id: LocalPortId,
        direction: Direction,
        flags: PortFlags,
    ) -> Result<PortId, GraphError> {
        if !self.nodes.contains(node_id.0) {
            return Err(GraphError::UnknownNode(node_id));
        }

        let port_index = self.ports.insert(PortRecord {
            node: node_id,
            local_id,
            direction,
            flags,
            io: None,
            peer: None,
        });
        let port_id = PortId(port_index);

        let node = self.nodes.get_mut(node_id.0).expect("checked above");
        match direction {
            Direction::Input => {
                node.max_in += 1;
                node.ports_in.push(port_id);
                if !flags.contains(PortFlags::OPTIONAL) {
                    node.required_in += 1;
                }
            }
            Direction::Output => {
                node.max_out += 1;
                node.ports_out.push(port_id);
            }
        }

        self.port_check(port_id);
        Ok(port_id)
    }

    /// Requires the port be unlinked first. Decrements the owning node's
    /// counters and removes the port record.
    pub fn port_remove(&mut self, port_id: PortId) -> Result<(), GraphError> {
        let port = self.ports.get(port_id.0).ok_or(GraphError::UnknownPort(port_id))?;
        if port.peer.is_some() {
            return Err(GraphError::PortStillLinked(port_id));
        }
        let (node_id, direction, optional) = (port.node, port.direction, port.flags.contains(PortFlags::OPTIONAL));

        if let Some(node) = self.nodes.get_mut(node_id.0) {
            match direction {
                Direction::Input => {
                    node.max_in = node.max_in.saturating_sub(1);
                    node.ports_in.retain(|p| *p != port_id);
                    if !optional {
                        node.required_in = node.required_in.saturating_sub(1);
                        node.ready_in = node.ready_in.min(node.required_in);
                    }
                }
                Direction::Output => {
                    node.max_out = node.max_out.saturating_sub(1);
                    node.ports_out.retain(|p| *p != port_id);
                }
            }
        }

        self.ports.remove(port_id.0);
        Ok(())
    }

    /// Symmetric peer assignment. Rejects if either port already has a
    /// peer, or if the ports are not one input and one output.
    pub fn port_link(&mut self, a: PortId, b: PortId) -> Result<(), GraphError> {
        let dir_a = self.ports.get(a.0).ok_or(GraphError::UnknownPort(a))?.direction;
        let dir_b = self.ports.get(b.0).ok_or(GraphError::UnknownPort(b))?.direction;
        if dir_a == dir_b {
            return Err(GraphError::DirectionMismatch);
        }
        if self.ports[a.0].peer.is_some() {
            return Err(GraphError::PortAlreadyLinked(a));
        }
        if self.ports[b.0].peer.is_some() {
            return Err(GraphError::PortAlreadyLinked(b));
        }

        self.ports[a.0].peer = Some(b);
        self.ports[b.0].peer = Some(a);

        let (in_port, out_port) = if dir_a == Direction::Input { (a, b) } else { (b, a) };
        let _ = out_port;
        self.port_check(in_port);
        Ok(())
    }

    /// Symmetric peer clear.
    pub fn port_unlink(&mut self, port_id: PortId) -> Result<(), GraphError> {
        let peer = self.ports.get(port_id.0).ok_or(GraphError::UnknownPort(port_id))?.peer;
        if let Some(peer) = peer {
            self.ports[peer.0].peer = None;
        }
        if let Some(port) = self.ports.get_mut(port_id.0) {
            port.peer = None;
        }
        Ok(())
    }

    /// Attaches the shared I/O cell the node contract will read and write
    /// through `port_set_io`. If the contract rejects the cell (wrong port,
    /// wrong direction), the port record is left without an `io` rather
    /// than holding a cell the node never agreed to use.
    pub fn port_bind_io(&mut self, port_id: PortId, io: std::rc::Rc<IoCell>) -> Result<(), GraphError> {
        let port = self.ports.get_mut(port_id.0).ok_or(GraphError::UnknownPort(port_id))?;
        port.io = Some(std::rc::Rc::clone(&io));
        let (node_id, local_id, direction) = (port.node, port.local_id, port.direction);

        let accepted = match self.nodes.get_mut(node_id.0) {
            Some(node) => node.contract.port_set_io(direction, local_id, io),
            None => return Err(GraphError::UnknownNode(node_id)),
        };
        if accepted != Status::Ok {
            if let Some(port) = self.ports.get_mut(port_id.0) {
                port.io = None;
            }
            return Err(GraphError::IoRejected(port_id, accepted));
        }

        self.port_check(port_id);
        Ok(())
    }

    pub fn peer(&self, port_id: PortId) -> Option<PortId> {
        self.ports.get(port_id.0).and_then(|p| p.peer)
    }

    pub fn port_node(&self, port_id: PortId) -> Option<NodeId> {
        self.ports.get(port_id.0).map(|p| p.node)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
