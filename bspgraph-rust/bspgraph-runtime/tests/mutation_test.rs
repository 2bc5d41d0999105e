use bspgraph_api::graph::GraphContext;
use bspgraph_api::message::Message;
use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::Vertex;
use bspgraph_runtime::graph::{Graph, GraphConfig};
use bspgraph_runtime::scheduler::{Executor, ExecutorCallbacks, ExecutorConfig};

#[derive(Debug, Clone)]
struct Ping;

impl Message for Ping {
    fn type_name(&self) -> &str {
        "ping"
    }
}

fn restructure(
    g: &mut dyn GraphContext<u32, u32, Ping>,
    v: &mut Vertex<u32, u32>,
    msgs: &mut dyn Iterator<Item = Ping>,
) -> BspResult<()> {
    let received = msgs.count() as u32;
    v.set_value(*v.value() + received);
    if g.superstep() == 0 && v.id() == "hub" {
        // Still delivered to: "old" is only removed at the barrier.
        g.send_message("old", Ping)?;
        g.remove_edge("hub", "old");
        g.remove_vertex("old");
        g.add_vertex("fresh", 100);
        g.add_edge("hub", "fresh", 7);
        g.add_edge("fresh", "hub", 8);
    }
    if g.superstep() == 1 {
        g.broadcast_to_neighbors(v, Ping)?;
    }
    v.vote_to_halt();
    Ok(())
}

#[test]
fn test_mutations_apply_at_the_barrier() {
    let mut graph = Graph::new(GraphConfig::default().with_workers(2), restructure).unwrap();
    graph.add_vertex("hub", 0).unwrap();
    graph.add_vertex("old", 0).unwrap();
    graph.add_edge("hub", "old", 1).unwrap();

    let stats = graph.step().unwrap();
    assert_eq!(stats.mutations_staged, 5);
    // Nothing is visible before the barrier.
    assert!(graph.vertex("fresh").is_none());
    assert!(graph.vertex("old").is_some());

    let summary = graph.commit_barrier().unwrap();
    assert_eq!(summary.mutations_applied, 5);
    assert!(graph.vertex("old").is_none());
    let hub = graph.vertex("hub").unwrap();
    assert_eq!(hub.out_degree(), 1);
    assert_eq!(hub.edges()[0].target_id, "fresh");
    assert_eq!(hub.edges()[0].value, 7);
    let fresh = graph.vertex("fresh").unwrap();
    assert!(fresh.is_active());
    assert_eq!(*fresh.value(), 100);
    // The message to the removed vertex went with its mailbox.
    assert!(!summary.pending_messages);

    let report = Executor::new(&mut graph, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_to_completion()
        .unwrap();
    assert_eq!(report.supersteps_executed, 2);
    assert_eq!(*graph.vertex("hub").unwrap().value(), 1);
    assert_eq!(*graph.vertex("fresh").unwrap().value(), 100);
}

fn dangling_edge(
    g: &mut dyn GraphContext<u32, u32, Ping>,
    v: &mut Vertex<u32, u32>,
    _msgs: &mut dyn Iterator<Item = Ping>,
) -> BspResult<()> {
    v.set_value(1);
    g.add_edge("ghost", "a", 0);
    Ok(())
}

#[test]
fn test_invalid_mutation_batch_aborts_the_barrier() {
    let mut graph = Graph::new(GraphConfig::default(), dangling_edge).unwrap();
    graph.add_vertex("a", 0).unwrap();
    graph.inject_message("a", Ping).unwrap();

    let err = Executor::new(&mut graph, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_to_completion()
        .unwrap_err();

    assert!(matches!(err, BspError::UnknownVertex(id) if id == "ghost"));
    assert_eq!(graph.superstep(), 0);
    assert_eq!(*graph.vertex("a").unwrap().value(), 0);
    let pending = graph.snapshot().unwrap().pending;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, "a");
    assert_eq!(pending[0].1.len(), 1);
}

#[test]
fn test_edge_edits_on_compute_copy_are_not_committed() {
    let compute = |_g: &mut dyn GraphContext<u32, u32, Ping>,
                   v: &mut Vertex<u32, u32>,
                   _msgs: &mut dyn Iterator<Item = Ping>|
     -> BspResult<()> {
        v.edges_mut().clear();
        v.vote_to_halt();
        Ok(())
    };
    let mut graph = Graph::new(GraphConfig::default(), compute).unwrap();
    graph.add_vertex("a", 0).unwrap();
    graph.add_vertex("b", 0).unwrap();
    graph.add_edge("a", "b", 3).unwrap();

    Executor::new(&mut graph, ExecutorCallbacks::default(), ExecutorConfig::default())
        .run_to_completion()
        .unwrap();

    assert_eq!(graph.vertex("a").unwrap().out_degree(), 1);
}
