use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A node-local buffer identifier, assigned by the producing node's own
/// buffer pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

impl BufferId {
    /// The sentinel meaning "no buffer referenced".
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "BufferId({})", self.0)
        } else {
            write!(f, "BufferId(invalid)")
        }
    }
}

/// The status carried by a [`IoCell`]. A strict subset of [`crate::Status`]
/// — the cell only ever signals flow control, never a full error
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoStatus {
    /// The peer is holding steady; no pending request either way.
    Ok,
    /// The consumer is asking the producer for a buffer.
    NeedBuffer,
    /// The producer has published a buffer for the consumer to take.
    HaveBuffer,
    /// The producer could not honor a request (see `Status::Error`).
    Error,
}

/// The shared, word-sized handoff point between two peer ports (spec
/// §4.2). Only the two endpoints of a link ever touch a given cell; the
/// graph scheduler reads `status` to decide readiness but never writes
/// `buffer_id`.
///
/// Because the scheduling model is single-threaded and cooperative (the
/// scheduler is never re-entered while a cell is being mutated), plain
/// `Cell`s are sufficient; no atomics are needed. The cell is reference
/// counted so both peer ports — and the owning node, when it is itself the
/// producer or consumer — can cheaply share one instance.
#[derive(Debug)]
pub struct IoCell {
    status: Cell<IoStatus>,
    buffer_id: Cell<BufferId>,
}

impl IoCell {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            status: Cell::new(IoStatus::NeedBuffer),
            buffer_id: Cell::new(BufferId::INVALID),
        })
    }

    pub fn status(&self) -> IoStatus {
        self.status.get()
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer_id.get()
    }

    /// Producer side: publish `buffer` and transition to `HaveBuffer`.
    ///
    /// Per invariant 4, the caller must not mutate `buffer` again until the
    /// cell returns to `NeedBuffer` or `Ok`.
    pub fn publish(&self, buffer: BufferId) {
        self.buffer_id.set(buffer);
        self.status.set(IoStatus::HaveBuffer);
    }

    /// Consumer side: take the published buffer and transition the cell
    /// back to `NeedBuffer`, signalling the producer to refill it.
    pub fn consume(&self) -> Option<BufferId> {
        if self.status.get() != IoStatus::HaveBuffer {
            return None;
        }
        let id = self.buffer_id.get();
        self.status.set(IoStatus::NeedBuffer);
        self.buffer_id.set(BufferId::INVALID);
        Some(id)
    }

    /// Consumer side, passive variant: acknowledge without immediately
    /// requesting more (transitions to `Ok` rather than `NeedBuffer`).
    pub fn acknowledge(&self) -> Option<BufferId> {
        if self.status.get() != IoStatus::HaveBuffer {
            return None;
        }
        let id = self.buffer_id.get();
        self.status.set(IoStatus::Ok);
        self.buffer_id.set(BufferId::INVALID);
        Some(id)
    }

    /// Producer side: ask the consumer for a buffer by transitioning to
    /// `NeedBuffer`.
    pub fn request(&self) {
        self.status.set(IoStatus::NeedBuffer);
    }

    pub fn set_error(&self) {
        self.status.set(IoStatus::Error);
    }

    /// Resolves Open Question 3: the "reuse" path in `process_output`
    /// (§4.1) is only safe to read `buffer_id` from if the cell is not
    /// currently `HaveBuffer` — otherwise the buffer is still logically
    /// owned by the consumer and reusing it now would race the handoff.
    /// This makes that ordering an API guarantee rather than an unchecked
    /// assumption: it returns `Some` only when there is a leftover buffer
    /// id to reclaim and the cell is not mid-handoff.
    ///
    /// `consume`/`acknowledge` already clear `buffer_id` on their own way
    /// out, so in practice this only has something to reclaim after
    /// `request` — a producer-initiated "need a buffer" transition that
    /// leaves a previously-published `buffer_id` behind on purpose.
    pub fn take_for_reuse(&self) -> Option<BufferId> {
        if self.status.get() == IoStatus::HaveBuffer {
            return None;
        }
        let id = self.buffer_id.get();
        if !id.is_valid() {
            return None;
        }
        self.buffer_id.set(BufferId::INVALID);
        Some(id)
    }
}
