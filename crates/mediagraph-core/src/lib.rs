pub mod dataloop;
pub mod flags;
pub mod io;
pub mod node;
pub mod result;
pub mod support;

pub use dataloop::{DataLoop, ThreadDataLoop, TimerId};
pub use flags::{NodeFlags, PortFlags, PortInfoFlags};
pub use io::{BufferId, IoCell, IoStatus};
pub use node::{
    AllocBuffersParams, BufferDesc, Callbacks, Command, Direction, DummyNode, MemType,
    NodeContract, PortId, PortInfo,
};
pub use result::Status;
pub use support::{LocalTypeMap, Log, Support, TypeMap};
