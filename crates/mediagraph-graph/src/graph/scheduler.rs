use mediagraph_core::{Direction, IoStatus, NodeFlags, Status};

use super::record::Action;
use super::{Graph, NodeId, PortId};

impl Graph {
    fn enqueue(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        if !node.queued {
            node.queued = true;
            self.ready_queue.push_back(id);
        }
    }

    fn dequeue_if_present(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if node.queued {
                node.queued = false;
                self.ready_queue.retain(|&n| n != id);
            }
        }
    }

    /// Reacts to a change on an input port's I/O cell (spec §4.3 "Port
    /// check"): bumps `ready_in` if a buffer just became available, then
    /// enqueues or dequeues the owning node depending on whether it has now
    /// reached readiness.
    pub(super) fn port_check(&mut self, port_id: PortId) {
        let Some(port) = self.ports.get(port_id.0) else {
            return;
        };
        if port.direction != Direction::Input {
            return;
        }
        let node_id = port.node;
        let have_buffer = port.io.as_ref().is_some_and(|io| io.status() == IoStatus::HaveBuffer);

        let Some(node) = self.nodes.get_mut(node_id.0) else {
            return;
        };
        if have_buffer {
            node.ready_in += 1;
        }

        if node.required_in > 0 && node.ready_in == node.required_in {
            log::trace!(target: "mediagraph::scheduler", "{:?} ready ({}/{} inputs)", node_id, node.ready_in, node.required_in);
            node.action = Action::In;
            self.enqueue(node_id);
        } else if node.queued {
            self.dequeue_if_present(node_id);
        }
    }

    /// Drives the scheduler to quiescence starting from `trigger` (spec
    /// §4.3 "Scheduling loop"), dispatching by whatever `action`/`state` are
    /// already recorded on it. Hosts normally reach this through
    /// [`Graph::pull`] or [`Graph::push`] rather than calling it directly.
    /// Not re-entrant: the scheduler must run to completion on the calling
    /// thread before `node_schedule` is called again (spec §5).
    pub fn node_schedule(&mut self, trigger: NodeId) {
        self.enqueue(trigger);

        while let Some(n) = self.ready_queue.pop_front() {
            if let Some(node) = self.nodes.get_mut(n.0) {
                node.queued = false;
            } else {
                continue;
            }

            let action = self.nodes[n.0].action;
            match action {
                Action::In | Action::Out => {
                    let schedule = self.nodes[n.0].schedule;
                    let result = {
                        let node = &mut self.nodes[n.0];
                        schedule(node.contract.as_mut(), action)
                    };
                    self.nodes[n.0].state = result;
                    log::trace!(target: "mediagraph::scheduler", "{:?} ran {:?}, state={:?}", n, action, result);

                    let synchrony_guard = action == Action::In && n == trigger;
                    if !synchrony_guard {
                        self.nodes[n.0].action = Action::Check;
                        self.enqueue(n);
                    }
                }
                Action::Check => self.dispatch_check(n, trigger),
            }
        }
    }

    /// Requests a buffer from `trigger` directly (bypassing the ready
    /// queue, matching how a host's consumer wakeup first calls
    /// `process_input` on the node it wants data from) and then runs the
    /// scheduler to propagate the resulting `NeedBuffer`/`Ok` state
    /// upstream. This is the entry point a sink-driving host uses; it is
    /// deliberately not folded into [`Graph::node_schedule`]'s own IN/OUT
    /// dispatch, since the synchrony guard there exists to stop a second,
    /// scheduler-driven call into the trigger — not to stop its first one.
    pub fn pull(&mut self, trigger: NodeId) {
        let Some(node) = self.nodes.get_mut(trigger.0) else {
            return;
        };
        let schedule = node.schedule;
        let state = schedule(node.contract.as_mut(), Action::In);
        node.state = state;
        node.action = Action::Check;
        self.node_schedule(trigger);
    }

    /// Requests `trigger` to produce directly, then schedules. The
    /// counterpart to [`Graph::pull`] for a producer-driven wakeup (e.g. a
    /// timer callback).
    pub fn push(&mut self, trigger: NodeId) {
        let Some(node) = self.nodes.get_mut(trigger.0) else {
            return;
        };
        let schedule = node.schedule;
        let state = schedule(node.contract.as_mut(), Action::Out);
        node.state = state;
        node.action = Action::Check;
        self.node_schedule(trigger);
    }

    fn dispatch_check(&mut self, n: NodeId, trigger: NodeId) {
        let state = self.nodes[n.0].state;
        match state {
            Status::NeedBuffer => self.check_need_buffer(n, trigger),
            Status::HaveBuffer => self.check_have_buffer(n),
            _ => {}
        }
    }

    fn check_need_buffer(&mut self, n: NodeId, trigger: NodeId) {
        self.nodes[n.0].ready_in = 0;
        let input_ports = self.nodes[n.0].ports_in.clone();

        for p in input_ports {
            let Some(port) = self.ports.get(p.0) else {
                continue;
            };
            let io_status = port.io.as_ref().map(|io| io.status());
            let peer = port.peer;

            match io_status {
                Some(IoStatus::NeedBuffer) => {
                    let Some(peer) = peer else { continue };
                    let Some(u) = self.port_node(peer) else { continue };
                    let is_async = self.nodes.get(u.0).is_some_and(|n| n.flags.contains(NodeFlags::ASYNC));
                    if u != trigger || is_async {
                        if let Some(upstream) = self.nodes.get_mut(u.0) {
                            upstream.action = Action::Out;
                        }
                        self.enqueue(u);
                    }
                }
                Some(IoStatus::Ok) => {
                    self.nodes[n.0].ready_in += 1;
                }
                _ => {}
            }
        }
    }

    fn check_have_buffer(&mut self, n: NodeId) {
        let output_ports = self.nodes[n.0].ports_out.clone();
        for o in output_ports {
            if let Some(peer) = self.ports.get(o.0).and_then(|p| p.peer) {
                self.port_check(peer);
            }
        }
    }
}
