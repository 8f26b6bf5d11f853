//! Reference implementation of the node contract (spec §4.4): a one-port
//! source that paces buffer production either freely (driven by a
//! consumer's `NeedBuffer` demand) or, when `live`, by a wall-clock timer
//! derived from a negotiated sample-rate/frame-count format.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use mediagraph_core::{
    AllocBuffersParams, BufferDesc, BufferId, Callbacks, Command, DataLoop, Direction, IoCell,
    IoStatus, Log, MemType, NodeContract, NodeFlags, PortId as LocalPortId, PortInfo,
    PortInfoFlags, Status, Support, TimerId,
};

/// Upper bound on the fixed-capacity buffer array (spec §4.4). Generous for
/// a reference node; hosts needing more should shard across ports instead.
const POOL_CAPACITY: usize = 32;
type Pool = ArrayVec<BufferId, POOL_CAPACITY>;

/// Construction-time configuration for a [`SourceNode`] (spec §A.3).
#[derive(Debug, Clone, Copy)]
pub struct SourceNodeConfig {
    /// Whether the port paces itself by wall-clock time (`LIVE`) rather
    /// than purely by consumer demand.
    pub live: bool,
    /// An opaque pattern identifier, carried in `props` but otherwise
    /// uninterpreted by the core.
    pub pattern: u32,
    /// Capacity hint for the buffer pool, reserved up front.
    pub pool_size: usize,
}

impl Default for SourceNodeConfig {
    fn default() -> Self {
        Self {
            live: false,
            pattern: 0,
            pool_size: 4,
        }
    }
}

/// The minimal concrete format this reference node negotiates, resolving
/// Open Question 2: two little-endian `u32`s, sample rate and frames per
/// buffer, from which a real production period is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Format {
    sample_rate: u32,
    frame_count: u32,
}

impl Format {
    const WIRE_LEN: usize = 8;

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::WIRE_LEN {
            return None;
        }
        let sample_rate = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let frame_count = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        if sample_rate == 0 {
            return None;
        }
        Some(Self {
            sample_rate,
            frame_count,
        })
    }

    fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.frame_count.to_le_bytes());
        out
    }

    fn period_ns(self) -> u64 {
        self.frame_count as u64 * 1_000_000_000 / self.sample_rate as u64
    }

    fn period(self) -> Duration {
        Duration::from_nanos(self.period_ns())
    }
}

const OUTPUT_PORT: LocalPortId = LocalPortId(0);

/// A fixed reference point for turning `Instant`s into comparable
/// `Duration`s. `Instant` itself carries no meaningful absolute value, so
/// "monotonic clock" (spec §4.4) is expressed here as elapsed time since
/// the first call into this module, process-wide.
fn monotonic_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// A source node: one output port, a preallocated buffer pool with a free
/// list, and either timer-paced or demand-paced production.
///
/// The timer registered with the injected [`DataLoop`] never touches this
/// struct's `Rc`-based port state directly — `DataLoop` callbacks must be
/// `Send` because they run on the loop's own thread, while the I/O cell is
/// deliberately `Rc`-based and single-threaded (spec §4.2). The timer
/// callback instead increments a `Send`-safe atomic counter; [`Self::drain_pending_ticks`]
/// is what actually runs `process_output` semantics, called from whichever
/// thread owns this node and the graph it's part of.
pub struct SourceNode {
    live: bool,
    pattern: u32,
    io: Option<Rc<IoCell>>,
    pool: Pool,
    pool_size: usize,
    buffers_bound: bool,
    underrun: bool,
    buffer_count: u64,
    format: Option<Format>,
    /// `T0` (spec §4.4): captured at `Start` as elapsed time since
    /// [`monotonic_epoch`] when `live`, or `Duration::ZERO` otherwise. Folded
    /// into every produced buffer's `pts` below.
    start: Option<Duration>,
    have_output: Option<Box<dyn FnMut() + Send>>,
    data_loop: Option<Rc<dyn DataLoop>>,
    timer_id: Option<TimerId>,
    pending_ticks: Arc<AtomicU64>,
    last_seq: Option<u64>,
    last_pts: Option<Duration>,
    log: Log,
}

impl SourceNode {
    pub fn new(config: SourceNodeConfig, support: Support) -> Self {
        let _ = support.type_map();
        Self {
            live: config.live,
            pattern: config.pattern,
            io: None,
            pool: ArrayVec::new(),
            pool_size: config.pool_size.min(POOL_CAPACITY),
            buffers_bound: false,
            underrun: false,
            buffer_count: 0,
            format: None,
            start: None,
            have_output: None,
            data_loop: support.data_loop().cloned(),
            timer_id: None,
            pending_ticks: Arc::new(AtomicU64::new(0)),
            last_seq: None,
            last_pts: None,
            log: Log::new("source"),
        }
    }

    /// The `NodeFlags` a host should register this node with: `ASYNC` iff
    /// it's live, since a live source's production is driven off its own
    /// timer and must not be assumed to land synchronously within the
    /// scheduling pass that asked for it (spec §3, §4.4).
    pub fn recommended_flags(&self) -> NodeFlags {
        if self.live {
            NodeFlags::ASYNC
        } else {
            NodeFlags::empty()
        }
    }

    /// Whether the last `send_command(Start)` got far enough to expect a
    /// timer producing on a cadence (diagnostics/tests only).
    pub fn is_underrun(&self) -> bool {
        self.underrun
    }

    pub fn last_produced(&self) -> Option<(u64, Duration)> {
        self.last_seq.zip(self.last_pts)
    }

    /// Drains ticks accumulated by the background timer and runs
    /// `process_output` semantics for each, invoking `have_output` after
    /// every buffer successfully produced. The host calls this on the
    /// thread that owns the graph, typically right before re-entering the
    /// scheduler via `Graph::push`.
    pub fn drain_pending_ticks(&mut self) -> Status {
        let n = self.pending_ticks.swap(0, Ordering::Relaxed);
        let mut last = Status::Ok;
        for _ in 0..n {
            let (status, produced) = self.do_process_output(true);
            last = status;
            if produced {
                if let Some(cb) = &mut self.have_output {
                    cb();
                }
            }
        }
        last
    }

    /// Returns the resulting `Status` plus whether this call is the one that
    /// freshly published a buffer, as opposed to finding one already
    /// sitting unconsumed. Only the former should trigger `have_output` —
    /// re-announcing a buffer nobody has taken yet would tell the host a
    /// second buffer arrived when only one did.
    fn do_process_output(&mut self, force: bool) -> (Status, bool) {
        let Some(io) = self.io.clone() else {
            return (Status::Error, false);
        };

        if io.status() == IoStatus::HaveBuffer {
            return (Status::HaveBuffer, false);
        }

        if let Some(leftover) = io.take_for_reuse() {
            if self.pool.try_push(leftover).is_err() {
                self.log.error("buffer pool capacity exceeded on reuse");
            }
        }

        if !(force || io.status() == IoStatus::NeedBuffer) {
            return (Status::Ok, false);
        }

        let Some(format) = self.format else {
            return (Status::NoFormat, false);
        };

        let Some(buf) = self.pool.pop() else {
            self.underrun = true;
            self.log.warn("buffer pool exhausted, entering underrun");
            if let (Some(timer_id), Some(data_loop)) = (self.timer_id, &self.data_loop) {
                data_loop.set_enabled(timer_id, format.period(), false);
            }
            return (Status::OutOfBuffers, false);
        };

        let seq = self.buffer_count;
        self.buffer_count += 1;
        let t0 = self.start.unwrap_or(Duration::ZERO);
        let pts = t0 + Duration::from_nanos(seq * format.period_ns());
        self.last_seq = Some(seq);
        self.last_pts = Some(pts);
        self.log.trace(&format!("produced buffer {:?} seq={} pts={:?}", buf, seq, pts));

        io.publish(buf);
        (Status::HaveBuffer, true)
    }
}

impl NodeContract for SourceNode {
    fn debug_name(&self) -> &'static str {
        "source"
    }

    fn get_props(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(5);
        v.push(self.live as u8);
        v.extend_from_slice(&self.pattern.to_le_bytes());
        v
    }

    fn set_props(&mut self, props: &[u8]) -> Status {
        if props.len() != 5 {
            return Status::InvalidArguments;
        }
        self.live = props[0] != 0;
        self.pattern = u32::from_le_bytes(props[1..5].try_into().unwrap());
        Status::Ok
    }

    fn send_command(&mut self, command: Command) -> Status {
        match command {
            Command::Start => {
                if self.format.is_none() {
                    return Status::NoFormat;
                }
                if !self.buffers_bound {
                    return Status::NoBuffers;
                }
                self.start = Some(if self.live {
                    Instant::now().duration_since(monotonic_epoch())
                } else {
                    Duration::ZERO
                });

                if self.live {
                    let Some(data_loop) = self.data_loop.clone() else {
                        return Status::Error;
                    };
                    let period = self.format.expect("checked above").period();
                    let id = match self.timer_id {
                        Some(id) => id,
                        None => {
                            let pending = Arc::clone(&self.pending_ticks);
                            let id = data_loop.add_timer(Box::new(move || {
                                pending.fetch_add(1, Ordering::Relaxed);
                            }));
                            self.timer_id = Some(id);
                            id
                        }
                    };
                    data_loop.set_enabled(id, period, true);
                }
                Status::Ok
            }
            Command::Pause => {
                if let (Some(id), Some(data_loop)) = (self.timer_id, &self.data_loop) {
                    let period = self.format.map(Format::period).unwrap_or_default();
                    data_loop.set_enabled(id, period, false);
                }
                Status::Ok
            }
            Command::Other(_) => Status::NotImplemented,
        }
    }

    fn set_callbacks(&mut self, callbacks: Callbacks) -> Status {
        if self.live && self.data_loop.is_none() {
            return Status::Error;
        }
        self.have_output = Some(callbacks.have_output);
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
            out[0] = OUTPUT_PORT;
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
        direction: Direction,
        id: LocalPortId,
        index: u32,
        _filter: Option<&[u8]>,
    ) -> Result<Vec<u8>, Status> {
        if direction != Direction::Output || id != OUTPUT_PORT || index != 0 {
            return Err(Status::EnumEnd);
        }
        Ok(Format {
            sample_rate: 48_000,
            frame_count: 480,
        }
        .encode())
    }

    fn port_set_format(&mut self, direction: Direction, id: LocalPortId, format: &[u8]) -> Status {
        if direction != Direction::Output || id != OUTPUT_PORT {
            return Status::InvalidPort;
        }
        match Format::decode(format) {
            Some(f) => {
                self.format = Some(f);
                Status::Ok
            }
            None => Status::InvalidArguments,
        }
    }

    fn port_get_format(&self, direction: Direction, id: LocalPortId) -> Option<Vec<u8>> {
        if direction != Direction::Output || id != OUTPUT_PORT {
            return None;
        }
        self.format.map(Format::encode)
    }

    fn port_get_info(&self, direction: Direction, id: LocalPortId) -> Option<PortInfo> {
        if direction != Direction::Output || id != OUTPUT_PORT {
            return None;
        }
        let mut flags = PortInfoFlags::CAN_USE_BUFFERS | PortInfoFlags::NO_REF;
        if self.live {
            flags |= PortInfoFlags::LIVE;
        }
        Some(PortInfo {
            flags,
            rate: self.format.map(|f| f.sample_rate),
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

    fn port_use_buffers(&mut self, direction: Direction, id: LocalPortId, buffers: &[BufferDesc]) -> Status {
        if direction != Direction::Output || id != OUTPUT_PORT {
            return Status::InvalidPort;
        }
        if buffers.is_empty() {
            self.pool.clear();
            self.buffers_bound = false;
            return Status::Ok;
        }
        if buffers.iter().any(|b| b.mem_type != MemType::Ptr) {
            return Status::InvalidArguments;
        }
        if buffers.len() > self.pool_size {
            return Status::InvalidArguments;
        }
        self.pool.clear();
        for b in buffers {
            if self.pool.try_push(b.id).is_err() {
                return Status::InvalidArguments;
            }
        }
        self.buffers_bound = true;
        self.underrun = false;
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

    fn port_set_io(&mut self, direction: Direction, id: LocalPortId, io: Rc<IoCell>) -> Status {
        if direction != Direction::Output || id != OUTPUT_PORT {
            return Status::InvalidPort;
        }
        self.io = Some(io);
        Status::Ok
    }

    fn port_reuse_buffer(&mut self, id: LocalPortId, buffer: BufferId) -> Status {
        if id != OUTPUT_PORT {
            return Status::InvalidBufferId;
        }
        if self.pool.try_push(buffer).is_err() {
            return Status::InvalidBufferId;
        }
        if self.underrun {
            self.underrun = false;
            if let (Some(timer_id), Some(data_loop), Some(format)) =
                (self.timer_id, &self.data_loop, self.format)
            {
                data_loop.set_enabled(timer_id, format.period(), true);
            }
        }
        Status::Ok
    }

    fn process_input(&mut self) -> Status {
        Status::NotImplemented
    }

    fn process_output(&mut self) -> Status {
        self.do_process_output(false).0
    }
}
