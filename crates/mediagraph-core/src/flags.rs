bitflags::bitflags! {
    /// Graph-side node flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct NodeFlags: u32 {
        /// The node's scheduled function returns asynchronously: its output
        /// must not be consumed synchronously in the same scheduling pass
        /// that triggered it.
        const ASYNC = 0b01;
    }
}

bitflags::bitflags! {
    /// Graph-side port flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PortFlags: u32 {
        /// An input port so marked does not contribute to `required_in`.
        const OPTIONAL = 0b01;
    }
}

bitflags::bitflags! {
    /// Flags returned from `NodeContract::port_get_info`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PortInfoFlags: u32 {
        /// Mirrors the port's `OPTIONAL` graph flag.
        const OPTIONAL = 0b0001;
        /// The port paces itself by wall-clock time rather than by
        /// consumer demand.
        const LIVE = 0b0010;
        /// The port accepts externally-provided buffers via
        /// `port_use_buffers`.
        const CAN_USE_BUFFERS = 0b0100;
        /// The port can allocate its own buffers via `port_alloc_buffers`.
        const CAN_ALLOC_BUFFERS = 0b1000;
        /// Buffers passed through this port carry no back-reference the
        /// producer needs to retain; once handed off, ownership is fully
        /// the consumer's until reuse.
        const NO_REF = 0b1_0000;
    }
}
