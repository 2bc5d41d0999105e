use crate::aggregator::accumulator::Accumulator;
use crate::graph::{Graph, GraphConfig};
use crate::scheduler::{ExecutionReport, Executor, ExecutorCallbacks, ExecutorConfig};
use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::function::ComputeFunction;
use bspgraph_api::graph::GraphContext;
use bspgraph_api::message::Message;
use bspgraph_common::error::BspResult;
use bspgraph_common::types::Vertex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of label changes in one superstep.
pub const UPDATES_AGGREGATOR: &str = "wcc.updates";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMessage(pub String);

impl Message for ComponentMessage {
    fn type_name(&self) -> &str {
        "component"
    }
}

/// Labels each vertex with the smallest vertex id reachable along edges.
/// Weak connectivity needs both directions of every link in the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct WccCompute;

impl ComputeFunction<String, (), ComponentMessage> for WccCompute {
    fn compute(
        &self,
        graph: &mut dyn GraphContext<String, (), ComponentMessage>,
        vertex: &mut Vertex<String, ()>,
        messages: &mut dyn Iterator<Item = ComponentMessage>,
    ) -> BspResult<()> {
        if graph.superstep() == 0 {
            let own = vertex.id().to_string();
            vertex.set_value(own.clone());
            graph.broadcast_to_neighbors(vertex, ComponentMessage(own))?;
            vertex.vote_to_halt();
            return Ok(());
        }

        let smallest = messages.map(|m| m.0).min();
        if let Some(label) = smallest.filter(|l| l < vertex.value()) {
            vertex.set_value(label.clone());
            graph.aggregate(UPDATES_AGGREGATOR, AggregateValue::Int(1))?;
            graph.broadcast_to_neighbors(vertex, ComponentMessage(label))?;
        }
        vertex.vote_to_halt();
        Ok(())
    }
}

pub fn wcc_graph(config: GraphConfig<ComponentMessage>) -> BspResult<Graph<String, (), ComponentMessage>> {
    let mut graph = Graph::new(config, WccCompute)?;
    graph.register_aggregator(UPDATES_AGGREGATOR, Arc::new(Accumulator::int_sum()))?;
    Ok(graph)
}

/// Runs to natural convergence: every vertex halted and no label in flight.
pub fn run_wcc(
    graph: &mut Graph<String, (), ComponentMessage>,
    config: ExecutorConfig,
) -> BspResult<ExecutionReport> {
    Executor::new(graph, ExecutorCallbacks::default(), config).run_to_completion()
}
