use crate::aggregator::AggregateValue;
use crate::message::Message;
use bspgraph_common::error::BspResult;
use bspgraph_common::types::Vertex;

/// Engine affordances available to compute logic during a superstep.
///
/// Structural mutations are staged and take effect at the next barrier, so
/// every worker observes the same frozen topology for the whole superstep.
pub trait GraphContext<VV, EV, M: Message> {
    fn superstep(&self) -> u64;

    /// Sends a message for delivery in the next superstep. Remote
    /// destinations are forwarded through the relayer.
    fn send_message(&mut self, target_id: &str, message: M) -> BspResult<()>;

    fn broadcast_to_neighbors(&mut self, vertex: &Vertex<VV, EV>, message: M) -> BspResult<()> {
        for edge in vertex.edges() {
            self.send_message(&edge.target_id, message.clone())?;
        }
        Ok(())
    }

    /// Folds a value into this worker's private contribution to `name`.
    fn aggregate(&mut self, name: &str, value: AggregateValue) -> BspResult<()>;

    /// Last merged value of an aggregator.
    fn aggregator_value(&self, name: &str) -> Option<AggregateValue>;

    fn add_vertex(&mut self, id: &str, value: VV);

    fn remove_vertex(&mut self, id: &str);

    fn add_edge(&mut self, src_id: &str, target_id: &str, value: EV);

    fn remove_edge(&mut self, src_id: &str, target_id: &str);
}
