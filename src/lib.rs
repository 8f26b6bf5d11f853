pub use mediagraph_core::*;
pub use mediagraph_graph::*;

#[cfg(feature = "source")]
pub use mediagraph_source::{SourceNode, SourceNodeConfig};
