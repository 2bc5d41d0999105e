use crate::graph::GraphContext;
use crate::message::Message;
use bspgraph_common::error::BspResult;
use bspgraph_common::types::Vertex;

/// Per-vertex compute logic, invoked once per active or messaged vertex per
/// superstep. An error aborts the superstep.
pub trait ComputeFunction<VV, EV, M: Message>: Send + Sync + 'static {
    fn compute(
        &self,
        graph: &mut dyn GraphContext<VV, EV, M>,
        vertex: &mut Vertex<VV, EV>,
        messages: &mut dyn Iterator<Item = M>,
    ) -> BspResult<()>;
}

impl<VV, EV, M, F> ComputeFunction<VV, EV, M> for F
where
    M: Message,
    F: Fn(
            &mut dyn GraphContext<VV, EV, M>,
            &mut Vertex<VV, EV>,
            &mut dyn Iterator<Item = M>,
        ) -> BspResult<()>
        + Send
        + Sync
        + 'static,
{
    fn compute(
        &self,
        graph: &mut dyn GraphContext<VV, EV, M>,
        vertex: &mut Vertex<VV, EV>,
        messages: &mut dyn Iterator<Item = M>,
    ) -> BspResult<()> {
        (self)(graph, vertex, messages)
    }
}
