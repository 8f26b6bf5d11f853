use std::rc::Rc;

use downcast_rs::Downcast;

use crate::flags::PortInfoFlags;
use crate::io::{BufferId, IoCell};
use crate::result::Status;

/// A node-local port identifier. Distinct port sequences exist for input
/// and output, so `(Direction, PortId)` is what uniquely names a port on a
/// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

/// Which of a node's two port sequences a `PortId` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// The physical backing of a buffer, as reported to `port_use_buffers`.
/// The scheduler never inspects this; it exists purely so a node can
/// validate what it's being handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemType {
    /// A plain host-memory pointer.
    Ptr,
    /// A file descriptor (e.g. a `memfd` or DMA-BUF handle).
    Fd,
    /// Device-local memory not directly readable by the host.
    DmaBuf,
}

/// One entry of a buffer array passed to `port_use_buffers` /
/// filled in by `port_alloc_buffers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub id: BufferId,
    pub mem_type: MemType,
    pub size: usize,
}

/// Parameters describing the buffers a node should allocate for itself via
/// `port_alloc_buffers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocBuffersParams {
    pub count: usize,
    pub size: usize,
    pub mem_type: MemType,
}

/// Port capability/attribute flags and optional live rate, returned by
/// `port_get_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortInfo {
    pub flags: PortInfoFlags,
    /// Present only for `LIVE` ports: the nominal rate, in units defined by
    /// the node (e.g. samples/sec).
    pub rate: Option<u32>,
}

/// A typed command understood by `send_command`. Nodes are free to return
/// `Status::NotImplemented` for any command they don't handle; `Start` and
/// `Pause` are the two every node is expected to at least attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    /// An extension command identified by name; out of scope for this
    /// core, forwarded verbatim to the node.
    Other(&'static str),
}

/// The callback table installed via `set_callbacks`. `have_output` is the
/// node's way of telling the host "I produced a buffer asynchronously (off
/// a timer, say) — please re-enter the scheduler on my node". Nodes that
/// never produce asynchronously never call it.
pub struct Callbacks {
    pub have_output: Box<dyn FnMut() + Send>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            have_output: Box::new(|| {}),
        }
    }
}

/// The uniform polymorphic capability surface every node presents to the
/// graph scheduler (spec §4.1). This trait is object-safe: the scheduler
/// and the graph only ever hold `Box<dyn NodeContract>`, and a host that
/// needs a concrete node's own inherent API downcasts via
/// [`downcast_rs::Downcast`] rather than the graph being generic over node
/// type.
///
/// Operations are grouped in roughly the legal invocation order: identity,
/// properties/commands/callbacks, port enumeration and shape, format and
/// buffer provisioning, per-port I/O binding, and finally the two
/// steady-state entry points the scheduler calls every pass.
pub trait NodeContract: Downcast {
    /// A short, stable name for logs and debug output.
    fn debug_name(&self) -> &'static str;

    /// Read the node's current opaque property blob.
    fn get_props(&self) -> Vec<u8>;

    /// Apply an opaque property blob. Returns `InvalidArguments` if the
    /// blob is malformed for this node.
    fn set_props(&mut self, props: &[u8]) -> Status;

    /// Execute a command. `Start`/`Pause` are expected to be understood by
    /// any node that produces or consumes on a schedule; anything else may
    /// return `NotImplemented`.
    fn send_command(&mut self, command: Command) -> Status;

    /// Install the host's callback table. Nodes whose asynchronous
    /// completion requires a data loop (see [`crate::support::Support`])
    /// but were not given one at construction must return `Status::Error`
    /// here rather than silently accepting callbacks they cannot honor.
    fn set_callbacks(&mut self, callbacks: Callbacks) -> Status;

    fn get_n_ports(&self, direction: Direction) -> u32;

    /// Fill `out` with this node's port ids for `direction`, returning how
    /// many were written.
    fn get_port_ids(&self, direction: Direction, out: &mut [PortId]) -> u32;

    /// Nodes with a fixed port layout return `NotImplemented`.
    fn add_port(&mut self, direction: Direction, id: PortId) -> Status;

    fn remove_port(&mut self, direction: Direction, id: PortId) -> Status;

    /// Enumerate the `index`-th format a port supports, optionally
    /// filtered. Returns `Status::EnumEnd` once `index` runs past the last
    /// entry.
    fn port_enum_formats(
        &self,
        direction: Direction,
        id: PortId,
        index: u32,
        filter: Option<&[u8]>,
    ) -> Result<Vec<u8>, Status>;

    fn port_set_format(&mut self, direction: Direction, id: PortId, format: &[u8]) -> Status;

    fn port_get_format(&self, direction: Direction, id: PortId) -> Option<Vec<u8>>;

    fn port_get_info(&self, direction: Direction, id: PortId) -> Option<PortInfo>;

    fn port_enum_params(
        &self,
        direction: Direction,
        id: PortId,
        index: u32,
    ) -> Result<Vec<u8>, Status>;

    fn port_set_param(&mut self, direction: Direction, id: PortId, param: &[u8]) -> Status;

    /// Bind externally-provided buffers to the port. Passing an empty
    /// slice unbinds the pool (spec §3 Lifecycle).
    fn port_use_buffers(
        &mut self,
        direction: Direction,
        id: PortId,
        buffers: &[BufferDesc],
    ) -> Status;

    /// Ask the node to allocate its own buffers, filling `out` with the
    /// resulting descriptors.
    fn port_alloc_buffers(
        &mut self,
        direction: Direction,
        id: PortId,
        params: AllocBuffersParams,
        out: &mut Vec<BufferDesc>,
    ) -> Status;

    /// Attach the shared I/O cell the graph has created for this port's
    /// link.
    fn port_set_io(&mut self, direction: Direction, id: PortId, io: Rc<IoCell>) -> Status;

    /// Return a previously-published buffer to the node's pool.
    fn port_reuse_buffer(&mut self, id: PortId, buffer: BufferId) -> Status;

    /// Called by the scheduler when an input port has become ready.
    /// Returns `Ok` on success or `NeedBuffer` to request more upstream
    /// production before the node can make progress.
    fn process_input(&mut self) -> Status;

    /// Called by the scheduler to ask the node to produce output. See the
    /// process_output contract in spec §4.1.
    fn process_output(&mut self) -> Status;
}

downcast_rs::impl_downcast!(NodeContract);

/// A trivial node used to seed graph slots that a host hasn't populated
/// yet (mirrors the role filler nodes play while a graph is assembled).
pub struct DummyNode;

impl NodeContract for DummyNode {
    fn debug_name(&self) -> &'static str {
        "dummy"
    }

    fn get_props(&self) -> Vec<u8> {
        Vec::new()
    }

    fn set_props(&mut self, _props: &[u8]) -> Status {
        Status::NotImplemented
    }

    fn send_command(&mut self, _command: Command) -> Status {
        Status::NotImplemented
    }

    fn set_callbacks(&mut self, _callbacks: Callbacks) -> Status {
        Status::Ok
    }

    fn get_n_ports(&self, _direction: Direction) -> u32 {
        0
    }

    fn get_port_ids(&self, _direction: Direction, _out: &mut [PortId]) -> u32 {
        0
    }

    fn add_port(&mut self, _direction: Direction, _id: PortId) -> Status {
        Status::NotImplemented
    }

    fn remove_port(&mut self, _direction: Direction, _id: PortId) -> Status {
        Status::NotImplemented
    }

    fn port_enum_formats(
        &self,
        _direction: Direction,
        _id: PortId,
        _index: u32,
        _filter: Option<&[u8]>,
    ) -> Result<Vec<u8>, Status> {
        Err(Status::EnumEnd)
    }

    fn port_set_format(&mut self, _direction: Direction, _id: PortId, _format: &[u8]) -> Status {
        Status::NotImplemented
    }

    fn port_get_format(&self, _direction: Direction, _id: PortId) -> Option<Vec<u8>> {
        None
    }

    fn port_get_info(&self, _direction: Direction, _id: PortId) -> Option<PortInfo> {
        None
    }

    fn port_enum_params(
        &self,
        _direction: Direction,
        _id: PortId,
        _index: u32,
    ) -> Result<Vec<u8>, Status> {
        Err(Status::EnumEnd)
    }

    fn port_set_param(&mut self, _direction: Direction, _id: PortId, _param: &[u8]) -> Status {
        Status::NotImplemented
    }

    fn port_use_buffers(
        &mut self,
        _direction: Direction,
        _id: PortId,
        _buffers: &[BufferDesc],
    ) -> Status {
        Status::NotImplemented
    }

    fn port_alloc_buffers(
        &mut self,
        _direction: Direction,
        _id: PortId,
        _params: AllocBuffersParams,
        _out: &mut Vec<BufferDesc>,
    ) -> Status {
        Status::NotImplemented
    }

    fn port_set_io(&mut self, _direction: Direction, _id: PortId, _io: Rc<IoCell>) -> Status {
        Status::InvalidPort
    }

    fn port_reuse_buffer(&mut self, _id: PortId, _buffer: BufferId) -> Status {
        Status::InvalidBufferId
    }

    fn process_input(&mut self) -> Status {
        Status::Ok
    }

    fn process_output(&mut self) -> Status {
        Status::Ok
    }
}
