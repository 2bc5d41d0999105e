mod bsp_graph;
mod context;
pub mod mutation;
pub mod snapshot;

pub use bsp_graph::{BarrierSummary, Graph, GraphConfig, StepStats};
pub use mutation::Mutation;
pub use snapshot::{GraphSnapshot, VertexSnapshot};
