use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::graph::GraphContext;
use bspgraph_api::message::Message;
use bspgraph_common::error::BspResult;
use bspgraph_common::types::Vertex;
use bspgraph_runtime::aggregator::accumulator::Accumulator;
use bspgraph_runtime::graph::{Graph, GraphConfig, GraphSnapshot};
use bspgraph_runtime::scheduler::{Executor, ExecutorCallbacks, ExecutorConfig, HaltReason};
use bspgraph_runtime::state::{load_latest, save_checkpoint, CheckpointMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Hop(u32);

impl Message for Hop {
    fn type_name(&self) -> &str {
        "hop"
    }
}

fn hop(
    g: &mut dyn GraphContext<Vec<u32>, (), Hop>,
    v: &mut Vertex<Vec<u32>, ()>,
    msgs: &mut dyn Iterator<Item = Hop>,
) -> BspResult<()> {
    let mut seen = v.value().clone();
    for Hop(n) in msgs {
        seen.push(n);
        g.aggregate("hops", AggregateValue::Int(1))?;
        if n < 6 {
            g.broadcast_to_neighbors(v, Hop(n + 1))?;
        }
    }
    v.set_value(seen);
    v.vote_to_halt();
    Ok(())
}

fn ring() -> Graph<Vec<u32>, (), Hop> {
    let mut graph = Graph::new(GraphConfig::default().with_workers(2), hop).unwrap();
    graph
        .register_aggregator("hops", Arc::new(Accumulator::int_sum()))
        .unwrap();
    for id in ["a", "b", "c"] {
        graph.add_vertex(id, Vec::new()).unwrap();
    }
    graph.add_edge("a", "b", ()).unwrap();
    graph.add_edge("b", "c", ()).unwrap();
    graph.add_edge("c", "a", ()).unwrap();
    graph
}

fn values(graph: &Graph<Vec<u32>, (), Hop>) -> BTreeMap<String, Vec<u32>> {
    graph
        .vertices()
        .map(|v| (v.id().to_string(), v.value().clone()))
        .collect()
}

#[test]
fn test_checkpoint_and_recovery() {
    let dir = tempfile::tempdir().unwrap();

    let mut original = ring();
    original.inject_message("a", Hop(0)).unwrap();
    Executor::new(&mut original, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_steps(3)
        .unwrap();

    let snapshot = original.snapshot().unwrap();
    assert_eq!(snapshot.superstep, 3);
    assert_eq!(snapshot.pending, vec![("a".to_string(), vec![Hop(3)])]);
    let meta = save_checkpoint(dir.path(), "job-1", &snapshot).unwrap();
    assert_eq!(meta.superstep, 3);
    assert_eq!(
        CheckpointMeta::read_json(CheckpointMeta::latest_path(dir.path(), "job-1", 0)).unwrap(),
        meta
    );

    // Taking the snapshot must not consume the pending message.
    let finished = Executor::new(&mut original, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_to_completion()
        .unwrap();
    assert_eq!(finished.reason, HaltReason::Converged);

    let loaded: GraphSnapshot<Vec<u32>, (), Hop> = load_latest(dir.path(), "job-1", 0)
        .unwrap()
        .unwrap();
    let mut recovered = ring();
    recovered.restore(loaded).unwrap();
    assert_eq!(recovered.superstep(), 3);
    assert_eq!(
        recovered.aggregator("hops").unwrap().get(),
        AggregateValue::Int(3)
    );
    let resumed = Executor::new(&mut recovered, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_to_completion()
        .unwrap();

    assert_eq!(resumed.supersteps_executed, finished.supersteps_executed);
    assert_eq!(values(&recovered), values(&original));
    assert_eq!(values(&recovered)["a"], vec![0, 3, 6]);
    assert_eq!(
        recovered.aggregator("hops").unwrap().get(),
        original.aggregator("hops").unwrap().get()
    );
}

#[test]
fn test_missing_checkpoint_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let loaded: Option<GraphSnapshot<Vec<u32>, (), Hop>> =
        load_latest(dir.path(), "never-ran", 0).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_restore_requires_registered_aggregators() {
    let mut original = ring();
    original.inject_message("a", Hop(0)).unwrap();
    let snapshot = original.snapshot().unwrap();

    let mut bare: Graph<Vec<u32>, (), Hop> =
        Graph::new(GraphConfig::default(), hop).unwrap();
    assert!(bare.restore(snapshot).is_err());
    assert_eq!(bare.vertex_count(), 0);
}
