mod graph;

pub use graph::{Action, Graph, GraphConfig, GraphError, NodeId, PortId, ScheduleFn};

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use mediagraph_core::{
        AllocBuffersParams, BufferDesc, BufferId, Callbacks, Command, Direction, IoCell,
        MemType, NodeContract, NodeFlags, PortFlags, PortId as LocalPortId, PortInfo,
        PortInfoFlags, Status,
    };

    use super::*;

    /// A one-port source that either has a buffer ready or doesn't,
    /// controlled directly by the test rather than by a timer. Enough to
    /// exercise the scheduler's readiness protocol without pulling in the
    /// reference source node's pool/pacing machinery.
    struct TestSource {
        io: Option<Rc<IoCell>>,
        pool: Vec<BufferId>,
    }

    impl TestSource {
        fn new() -> Self {
            Self {
                io: None,
                pool: vec![BufferId(0), BufferId(1), BufferId(2)],
            }
        }
    }

    impl NodeContract for TestSource {
        fn debug_name(&self) -> &'static str {
            "test-source"
        }
        fn get_props(&self) -> Vec<u8> {
            Vec::new()
        }
        fn set_props(&mut self, _props: &[u8]) -> Status {
            Status::Ok
        }
        fn send_command(&mut self, _command: Command) -> Status {
            Status::Ok
        }
        fn set_callbacks(&mut self, _callbacks: Callbacks) -> Status {
            Status::Ok
        }
        fn get_n_ports(&self, direction: Direction) -> u32 {
            match direction {
                Direction::Output => 1,
                Direction::Input => 0,
            }
        }
        fn get_port_ids(&self, direction: Direction, out: &mut [LocalPortId]) -> u32 {
            if direction == Direction::Output && !out.is_empty() {
                out[0] = LocalPortId(0);
                1
            } else {
                0
            }
        }
        fn add_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn remove_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn port_enum_formats(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
            _filter: Option<&[u8]>,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_format(&mut self, _direction: Direction, _id: LocalPortId, _format: &[u8]) -> Status {
            Status::Ok
        }
        fn port_get_format(&self, _direction: Direction, _id: LocalPortId) -> Option<Vec<u8>> {
            None
        }
        fn port_get_info(&self, _direction: Direction, _id: LocalPortId) -> Option<PortInfo> {
            Some(PortInfo {
                flags: PortInfoFlags::CAN_USE_BUFFERS,
                rate: None,
            })
        }
        fn port_enum_params(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_param(&mut self, _direction: Direction, _id: LocalPortId, _param: &[u8]) -> Status {
            Status::NotImplemented
        }
        fn port_use_buffers(&mut self, _direction: Direction, _id: LocalPortId, _buffers: &[BufferDesc]) -> Status {
            Status::Ok
        }
        fn port_alloc_buffers(
            &mut self,
            _direction: Direction,
            _id: LocalPortId,
            _params: AllocBuffersParams,
            _out: &mut Vec<BufferDesc>,
        ) -> Status {
            Status::NotImplemented
        }
        fn port_set_io(&mut self, _direction: Direction, _id: LocalPortId, io: Rc<IoCell>) -> Status {
            self.io = Some(io);
            Status::Ok
        }
        fn port_reuse_buffer(&mut self, _id: LocalPortId, buffer: BufferId) -> Status {
            self.pool.push(buffer);
            Status::Ok
        }
        fn process_input(&mut self) -> Status {
            Status::NotImplemented
        }
        fn process_output(&mut self) -> Status {
            let Some(io) = &self.io else {
                return Status::Error;
            };
            if io.status() == mediagraph_core::IoStatus::HaveBuffer {
                return Status::HaveBuffer;
            }
            let Some(id) = self.pool.pop() else {
                return Status::OutOfBuffers;
            };
            io.publish(id);
            Status::HaveBuffer
        }
    }

    /// A one-port sink that consumes whatever arrives.
    struct TestSink {
        io: Option<Rc<IoCell>>,
        consumed: Vec<BufferId>,
    }

    impl TestSink {
        fn new() -> Self {
            Self {
                io: None,
                consumed: Vec::new(),
            }
        }
    }

    impl NodeContract for TestSink {
        fn debug_name(&self) -> &'static str {
            "test-sink"
        }
        fn get_props(&self) -> Vec<u8> {
            Vec::new()
        }
        fn set_props(&mut self, _props: &[u8]) -> Status {
            Status::Ok
        }
        fn send_command(&mut self, _command: Command) -> Status {
            Status::Ok
        }
        fn set_callbacks(&mut self, _callbacks: Callbacks) -> Status {
            Status::Ok
        }
        fn get_n_ports(&self, direction: Direction) -> u32 {
            match direction {
                Direction::Input => 1,
                Direction::Output => 0,
            }
        }
        fn get_port_ids(&self, direction: Direction, out: &mut [LocalPortId]) -> u32 {
            if direction == Direction::Input && !out.is_empty() {
                out[0] = LocalPortId(0);
                1
            } else {
                0
            }
        }
        fn add_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn remove_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn port_enum_formats(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
            _filter: Option<&[u8]>,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_format(&mut self, _direction: Direction, _id: LocalPortId, _format: &[u8]) -> Status {
            Status::Ok
        }
        fn port_get_format(&self, _direction: Direction, _id: LocalPortId) -> Option<Vec<u8>> {
            None
        }
        fn port_get_info(&self, _direction: Direction, _id: LocalPortId) -> Option<PortInfo> {
            Some(PortInfo {
                flags: PortInfoFlags::CAN_USE_BUFFERS,
                rate: None,
            })
        }
        fn port_enum_params(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_param(&mut self, _direction: Direction, _id: LocalPortId, _param: &[u8]) -> Status {
            Status::NotImplemented
        }
        fn port_use_buffers(&mut self, _direction: Direction, _id: LocalPortId, _buffers: &[BufferDesc]) -> Status {
            Status::Ok
        }
        fn port_alloc_buffers(
            &mut self,
            _direction: Direction,
            _id: LocalPortId,
            _params: AllocBuffersParams,
            _out: &mut Vec<BufferDesc>,
        ) -> Status {
            Status::NotImplemented
        }
        fn port_set_io(&mut self, _direction: Direction, _id: LocalPortId, io: Rc<IoCell>) -> Status {
            self.io = Some(io);
            Status::Ok
        }
        fn port_reuse_buffer(&mut self, _id: LocalPortId, _buffer: BufferId) -> Status {
            Status::InvalidBufferId
        }
        fn process_input(&mut self) -> Status {
            let Some(io) = &self.io else {
                return Status::Error;
            };
            match io.consume() {
                Some(id) => {
                    self.consumed.push(id);
                    Status::Ok
                }
                None => Status::NeedBuffer,
            }
        }
        fn process_output(&mut self) -> Status {
            Status::NotImplemented
        }
    }

    /// A node with one input port and one output port, used to exercise the
    /// scheduler's handling of a node that links back to itself: the input
    /// port's upstream neighbor is the node's own output port, so `trigger`
    /// and the upstream node coincide in `check_need_buffer`.
    struct FeedbackNode {
        io_in: Option<Rc<IoCell>>,
        io_out: Option<Rc<IoCell>>,
        output_calls: u32,
    }

    impl FeedbackNode {
        fn new() -> Self {
            Self {
                io_in: None,
                io_out: None,
                output_calls: 0,
            }
        }
    }

    impl NodeContract for FeedbackNode {
        fn debug_name(&self) -> &'static str {
            "feedback"
        }
        fn get_props(&self) -> Vec<u8> {
            Vec::new()
        }
        fn set_props(&mut self, _props: &[u8]) -> Status {
            Status::Ok
        }
        fn send_command(&mut self, _command: Command) -> Status {
            Status::Ok
        }
        fn set_callbacks(&mut self, _callbacks: Callbacks) -> Status {
            Status::Ok
        }
        fn get_n_ports(&self, _direction: Direction) -> u32 {
            1
        }
        fn get_port_ids(&self, _direction: Direction, out: &mut [LocalPortId]) -> u32 {
            if !out.is_empty() {
                out[0] = LocalPortId(0);
                1
            } else {
                0
            }
        }
        fn add_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn remove_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn port_enum_formats(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
            _filter: Option<&[u8]>,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_format(&mut self, _direction: Direction, _id: LocalPortId, _format: &[u8]) -> Status {
            Status::Ok
        }
        fn port_get_format(&self, _direction: Direction, _id: LocalPortId) -> Option<Vec<u8>> {
            None
        }
        fn port_get_info(&self, _direction: Direction, _id: LocalPortId) -> Option<PortInfo> {
            Some(PortInfo {
                flags: PortInfoFlags::CAN_USE_BUFFERS,
                rate: None,
            })
        }
        fn port_enum_params(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_param(&mut self, _direction: Direction, _id: LocalPortId, _param: &[u8]) -> Status {
            Status::NotImplemented
        }
        fn port_use_buffers(&mut self, _direction: Direction, _id: LocalPortId, _buffers: &[BufferDesc]) -> Status {
            Status::Ok
        }
        fn port_alloc_buffers(
            &mut self,
            _direction: Direction,
            _id: LocalPortId,
            _params: AllocBuffersParams,
            _out: &mut Vec<BufferDesc>,
        ) -> Status {
            Status::NotImplemented
        }
        fn port_set_io(&mut self, direction: Direction, _id: LocalPortId, io: Rc<IoCell>) -> Status {
            match direction {
                Direction::Input => self.io_in = Some(io),
                Direction::Output => self.io_out = Some(io),
            }
            Status::Ok
        }
        fn port_reuse_buffer(&mut self, _id: LocalPortId, _buffer: BufferId) -> Status {
            Status::Ok
        }
        fn process_input(&mut self) -> Status {
            match &self.io_in {
                Some(io) => {
                    if io.status() == mediagraph_core::IoStatus::NeedBuffer {
                        Status::NeedBuffer
                    } else {
                        Status::Ok
                    }
                }
                None => Status::Error,
            }
        }
        fn process_output(&mut self) -> Status {
            self.output_calls += 1;
            Status::OutOfBuffers
        }
    }

    fn wire_self_loop(graph: &mut Graph, flags: NodeFlags) -> NodeId {
        let node = graph.node_add(Box::new(FeedbackNode::new()), flags);
        let out_port = graph
            .port_add(node, LocalPortId(0), Direction::Output, PortFlags::empty())
            .unwrap();
        let in_port = graph
            .port_add(node, LocalPortId(0), Direction::Input, PortFlags::empty())
            .unwrap();
        graph.port_link(out_port, in_port).unwrap();
        let cell = IoCell::new();
        graph.port_bind_io(out_port, Rc::clone(&cell)).unwrap();
        graph.port_bind_io(in_port, cell).unwrap();
        node
    }

    #[test]
    fn s2_synchronous_self_reference_is_not_revisited_in_the_same_pass() {
        let mut graph = Graph::new();
        let node = wire_self_loop(&mut graph, NodeFlags::empty());

        graph.pull(node);

        let n = graph.contract_mut(node).unwrap().downcast_ref::<FeedbackNode>().unwrap();
        assert_eq!(n.output_calls, 0);
    }

    #[test]
    fn s2_async_self_reference_is_revisited_despite_being_the_trigger() {
        let mut graph = Graph::new();
        let node = wire_self_loop(&mut graph, NodeFlags::ASYNC);

        graph.pull(node);

        let n = graph.contract_mut(node).unwrap().downcast_ref::<FeedbackNode>().unwrap();
        assert_eq!(n.output_calls, 1);
    }

    fn wire_source_to_sink(graph: &mut Graph) -> (NodeId, NodeId, PortId, PortId) {
        let source = graph.node_add(Box::new(TestSource::new()), NodeFlags::empty());
        let sink = graph.node_add(Box::new(TestSink::new()), NodeFlags::empty());

        let out_port = graph
            .port_add(source, LocalPortId(0), Direction::Output, PortFlags::empty())
            .unwrap();
        let in_port = graph
            .port_add(sink, LocalPortId(0), Direction::Input, PortFlags::empty())
            .unwrap();

        graph.port_link(out_port, in_port).unwrap();
        let cell = IoCell::new();
        graph.port_bind_io(out_port, Rc::clone(&cell)).unwrap();
        graph.port_bind_io(in_port, cell).unwrap();

        (source, sink, out_port, in_port)
    }

    #[test]
    fn idempotent_empty_schedule() {
        let mut graph = Graph::new();
        let (_source, sink, _out, _in) = wire_source_to_sink(&mut graph);
        graph.pull(sink);
        // Cell starts NEED_BUFFER and the source has buffers, so the first
        // pass already drains one; a second pass on a cell back at
        // NEED_BUFFER must again terminate without panicking or hanging.
        graph.pull(sink);
    }

    #[test]
    fn s1_source_pull_one_buffer() {
        let mut graph = Graph::new();
        let (_source, sink, _out, in_port) = wire_source_to_sink(&mut graph);
        assert!(graph.peer(in_port).is_some());

        graph.pull(sink);

        let sink_ref = graph
            .contract_mut(sink)
            .unwrap()
            .downcast_ref::<TestSink>()
            .unwrap();
        assert_eq!(sink_ref.consumed.len(), 1);
    }

    #[test]
    fn s3_underrun_propagates_quietly() {
        let mut graph = Graph::new();
        let source = graph.node_add(Box::new(TestSource { io: None, pool: Vec::new() }), NodeFlags::empty());
        let sink = graph.node_add(Box::new(TestSink::new()), NodeFlags::empty());
        let out_port = graph.port_add(source, LocalPortId(0), Direction::Output, PortFlags::empty()).unwrap();
        let in_port = graph.port_add(sink, LocalPortId(0), Direction::Input, PortFlags::empty()).unwrap();
        graph.port_link(out_port, in_port).unwrap();
        let cell = IoCell::new();
        graph.port_bind_io(out_port, Rc::clone(&cell)).unwrap();
        graph.port_bind_io(in_port, cell).unwrap();

        graph.pull(sink);

        let sink_ref = graph.contract_mut(sink).unwrap().downcast_ref::<TestSink>().unwrap();
        assert!(sink_ref.consumed.is_empty());
    }

    #[test]
    fn s4_optional_input_does_not_gate_readiness() {
        let mut graph = Graph::new();
        let source = graph.node_add(Box::new(TestSource::new()), NodeFlags::empty());
        let sink = graph.node_add(Box::new(TestSink::new()), NodeFlags::empty());

        let out_port = graph.port_add(source, LocalPortId(0), Direction::Output, PortFlags::empty()).unwrap();
        let required_in = graph.port_add(sink, LocalPortId(0), Direction::Input, PortFlags::empty()).unwrap();
        let optional_in = graph.port_add(sink, LocalPortId(1), Direction::Input, PortFlags::OPTIONAL).unwrap();

        graph.port_link(out_port, required_in).unwrap();
        let cell = IoCell::new();
        graph.port_bind_io(out_port, Rc::clone(&cell)).unwrap();
        graph.port_bind_io(required_in, cell).unwrap();

        // Optional port is left unbound entirely; readiness must not wait on it.
        let _ = optional_in;

        graph.pull(sink);

        let sink_ref = graph.contract_mut(sink).unwrap().downcast_ref::<TestSink>().unwrap();
        assert_eq!(sink_ref.consumed.len(), 1);
    }

    #[test]
    fn node_remove_clears_ready_queue_membership() {
        let mut graph = Graph::new();
        let (source, sink, _out, _in) = wire_source_to_sink(&mut graph);
        // Enqueue sink without running the loop to completion isn't directly
        // observable from outside; instead assert removal succeeds cleanly
        // and the graph is left schedulable afterwards.
        graph.node_remove(sink).unwrap();
        graph.node_remove(source).unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    /// A node whose contract never accepts an I/O cell, standing in for a
    /// node whose port enumeration and `port_set_io` logic have drifted out
    /// of sync — the kind of bug `port_bind_io` should surface rather than
    /// silently recording a binding the node rejected.
    struct AlwaysRejectsIo;

    impl NodeContract for AlwaysRejectsIo {
        fn debug_name(&self) -> &'static str {
            "always-rejects-io"
        }
        fn get_props(&self) -> Vec<u8> {
            Vec::new()
        }
        fn set_props(&mut self, _props: &[u8]) -> Status {
            Status::Ok
        }
        fn send_command(&mut self, _command: Command) -> Status {
            Status::Ok
        }
        fn set_callbacks(&mut self, _callbacks: Callbacks) -> Status {
            Status::Ok
        }
        fn get_n_ports(&self, direction: Direction) -> u32 {
            match direction {
                Direction::Output => 1,
                Direction::Input => 0,
            }
        }
        fn get_port_ids(&self, direction: Direction, out: &mut [LocalPortId]) -> u32 {
            if direction == Direction::Output && !out.is_empty() {
                out[0] = LocalPortId(0);
                1
            } else {
                0
            }
        }
        fn add_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn remove_port(&mut self, _direction: Direction, _id: LocalPortId) -> Status {
            Status::NotImplemented
        }
        fn port_enum_formats(
            &self,
            _direction: Direction,
            _id: LocalPortId,
            _index: u32,
            _filter: Option<&[u8]>,
        ) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_format(&mut self, _direction: Direction, _id: LocalPortId, _format: &[u8]) -> Status {
            Status::Ok
        }
        fn port_get_format(&self, _direction: Direction, _id: LocalPortId) -> Option<Vec<u8>> {
            None
        }
        fn port_get_info(&self, _direction: Direction, _id: LocalPortId) -> Option<PortInfo> {
            None
        }
        fn port_enum_params(&self, _direction: Direction, _id: LocalPortId, _index: u32) -> Result<Vec<u8>, Status> {
            Err(Status::EnumEnd)
        }
        fn port_set_param(&mut self, _direction: Direction, _id: LocalPortId, _param: &[u8]) -> Status {
            Status::NotImplemented
        }
        fn port_use_buffers(&mut self, _direction: Direction, _id: LocalPortId, _buffers: &[BufferDesc]) -> Status {
            Status::Ok
        }
        fn port_alloc_buffers(
            &mut self,
            _direction: Direction,
            _id: LocalPortId,
            _params: AllocBuffersParams,
            _out: &mut Vec<BufferDesc>,
        ) -> Status {
            Status::NotImplemented
        }
        fn port_set_io(&mut self, _direction: Direction, _id: LocalPortId, _io: Rc<IoCell>) -> Status {
            Status::InvalidPort
        }
        fn port_reuse_buffer(&mut self, _id: LocalPortId, _buffer: BufferId) -> Status {
            Status::InvalidBufferId
        }
        fn process_input(&mut self) -> Status {
            Status::NotImplemented
        }
        fn process_output(&mut self) -> Status {
            Status::OutOfBuffers
        }
    }

    #[test]
    fn port_bind_io_propagates_a_rejected_cell() {
        let mut graph = Graph::new();
        let node = graph.node_add(Box::new(AlwaysRejectsIo), NodeFlags::empty());
        let port = graph
            .port_add(node, LocalPortId(0), Direction::Output, PortFlags::empty())
            .unwrap();

        let cell = IoCell::new();
        let err = graph.port_bind_io(port, Rc::clone(&cell)).unwrap_err();
        assert_eq!(err, GraphError::IoRejected(port, Status::InvalidPort));
        // The rejection must not leave the port holding a clone of the
        // cell the node never agreed to use.
        assert_eq!(Rc::strong_count(&cell), 1);
    }
}
