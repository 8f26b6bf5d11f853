/// The result/error vocabulary shared by the node contract, the port I/O
/// cell, and the graph scheduler.
///
/// `Status` plays two roles at once: a subset of its variants
/// (`NeedBuffer`, `HaveBuffer`, `OutOfBuffers`) are normal flow-control
/// signals consumed by the scheduler's `CHECK` step, not failures; the rest
/// are genuine error conditions. See the error-handling design notes for the
/// five families this falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Status {
    /// The operation completed normally.
    #[error("ok")]
    Ok,
    /// The node needs a buffer from its peer before it can make progress.
    #[error("need buffer")]
    NeedBuffer,
    /// The node has a buffer ready for its peer to consume.
    #[error("have buffer")]
    HaveBuffer,
    /// No format has been negotiated on the port yet.
    #[error("no format set")]
    NoFormat,
    /// No buffers have been provisioned on the port yet.
    #[error("no buffers provisioned")]
    NoBuffers,
    /// The node's buffer pool is empty; it cannot produce right now.
    #[error("out of buffers")]
    OutOfBuffers,
    /// The referenced port does not exist on this node.
    #[error("invalid port")]
    InvalidPort,
    /// The referenced buffer id is not known to this node's pool.
    #[error("invalid buffer id")]
    InvalidBufferId,
    /// The supplied arguments were malformed or out of range.
    #[error("invalid arguments")]
    InvalidArguments,
    /// The operation is not valid for the node's current lifecycle state.
    #[error("wrong state")]
    WrongState,
    /// The node does not support this operation.
    #[error("not implemented")]
    NotImplemented,
    /// The requested interface/extension is not known to this node.
    #[error("unknown interface")]
    UnknownInterface,
    /// Enumeration has no more entries.
    #[error("enumeration ended")]
    EnumEnd,
    /// The node has entered an unrecoverable state.
    #[error("error")]
    Error,
}

impl Status {
    /// `true` for the flow-control subset the scheduler's `CHECK` step
    /// interprets directly, rather than treating as a terminal failure.
    pub const fn is_flow_control(self) -> bool {
        matches!(self, Status::NeedBuffer | Status::HaveBuffer | Status::Ok)
    }
}
