use crate::aggregator::accumulator::Accumulator;
use crate::graph::{Graph, GraphConfig};
use crate::scheduler::{ExecutionReport, Executor, ExecutorCallbacks, ExecutorConfig};
use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::function::ComputeFunction;
use bspgraph_api::graph::GraphContext;
use bspgraph_api::message::Message;
use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::Vertex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sum of `|rank - previous rank|` over the vertices of one superstep.
pub const RESIDUAL_AGGREGATOR: &str = "pagerank.residual";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankMessage(pub f64);

impl Message for RankMessage {
    fn type_name(&self) -> &str {
        "rank"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageRankConfig {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: u64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 30,
        }
    }
}

impl PageRankConfig {
    pub fn validate(&self) -> BspResult<()> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(BspError::InvalidArgument(format!(
                "damping factor {} outside [0, 1]",
                self.damping
            )));
        }
        if self.tolerance < 0.0 {
            return Err(BspError::InvalidArgument(
                "tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unnormalised PageRank: every vertex starts from its loaded value and
/// keeps `1 - damping` as teleport mass.
#[derive(Debug, Clone, Copy)]
pub struct PageRankCompute {
    damping: f64,
}

impl PageRankCompute {
    pub fn new(damping: f64) -> Self {
        Self { damping }
    }
}

impl ComputeFunction<f64, (), RankMessage> for PageRankCompute {
    fn compute(
        &self,
        graph: &mut dyn GraphContext<f64, (), RankMessage>,
        vertex: &mut Vertex<f64, ()>,
        messages: &mut dyn Iterator<Item = RankMessage>,
    ) -> BspResult<()> {
        if graph.superstep() > 0 {
            let sum: f64 = messages.map(|m| m.0).sum();
            let rank = self.damping * sum + (1.0 - self.damping);
            graph.aggregate(
                RESIDUAL_AGGREGATOR,
                AggregateValue::Float((rank - *vertex.value()).abs()),
            )?;
            vertex.set_value(rank);
        }

        let out_degree = vertex.out_degree();
        if out_degree > 0 {
            let share = RankMessage(*vertex.value() / out_degree as f64);
            graph.broadcast_to_neighbors(vertex, share)?;
        }
        Ok(())
    }
}

/// Builds a graph running [`PageRankCompute`] with its residual aggregator
/// registered.
pub fn pagerank_graph(
    config: GraphConfig<RankMessage>,
    pagerank: &PageRankConfig,
) -> BspResult<Graph<f64, (), RankMessage>> {
    pagerank.validate()?;
    let mut graph = Graph::new(config, PageRankCompute::new(pagerank.damping))?;
    graph.register_aggregator(RESIDUAL_AGGREGATOR, Arc::new(Accumulator::float_sum()))?;
    Ok(graph)
}

/// Iterates until the residual of a whole superstep drops below the
/// tolerance, or `max_iterations` supersteps ran.
pub fn run_pagerank(
    graph: &mut Graph<f64, (), RankMessage>,
    pagerank: &PageRankConfig,
) -> BspResult<ExecutionReport> {
    pagerank.validate()?;
    let tolerance = pagerank.tolerance;
    let callbacks = ExecutorCallbacks::default().post_step_keep_running(move |g, summary| {
        if summary.superstep == 0 {
            return Ok(true);
        }
        let residual = g
            .aggregator(RESIDUAL_AGGREGATOR)
            .and_then(|a| a.delta().as_float())
            .unwrap_or(0.0);
        Ok(residual >= tolerance)
    });
    let config = ExecutorConfig::default().with_max_supersteps(pagerank.max_iterations);
    Executor::new(graph, callbacks, config).run_to_completion()
}
