use bspgraph_runtime::algorithms::pagerank::{
    pagerank_graph, run_pagerank, PageRankConfig, RESIDUAL_AGGREGATOR,
};
use bspgraph_runtime::graph::GraphConfig;
use bspgraph_runtime::scheduler::HaltReason;

#[test]
fn test_local_pagerank_two_cycle() {
    let config = PageRankConfig::default();
    let mut graph = pagerank_graph(GraphConfig::default().with_workers(2), &config).unwrap();
    graph.add_vertex("1", 1.0).unwrap();
    graph.add_vertex("2", 1.0).unwrap();
    graph.add_edge("1", "2", ()).unwrap();
    graph.add_edge("2", "1", ()).unwrap();

    let report = run_pagerank(&mut graph, &config).unwrap();

    assert_eq!(report.reason, HaltReason::Converged);
    assert_eq!(report.supersteps_executed, 2);
    assert!((graph.vertex("1").unwrap().value() - 1.0).abs() < 1e-9);
    assert!((graph.vertex("2").unwrap().value() - 1.0).abs() < 1e-9);
}

#[test]
fn test_local_pagerank_star_ranks_hub_highest() {
    let config = PageRankConfig {
        tolerance: 1e-9,
        max_iterations: 200,
        ..PageRankConfig::default()
    };
    let mut graph = pagerank_graph(GraphConfig::default().with_workers(4), &config).unwrap();
    graph.add_vertex("hub", 1.0).unwrap();
    for i in 0..5 {
        let leaf = format!("leaf{i}");
        graph.add_vertex(leaf.clone(), 1.0).unwrap();
        graph.add_edge(leaf.clone(), "hub", ()).unwrap();
        graph.add_edge("hub", leaf, ()).unwrap();
    }

    let report = run_pagerank(&mut graph, &config).unwrap();

    assert_eq!(report.reason, HaltReason::Converged);
    let hub = *graph.vertex("hub").unwrap().value();
    let leaf = *graph.vertex("leaf0").unwrap().value();
    assert!(hub > leaf);
    // With no dangling vertices the total mass stays at the vertex count.
    let total: f64 = graph.vertices().map(|v| *v.value()).sum();
    assert!((total - 6.0).abs() < 1e-6);
    let residual = report.aggregates[RESIDUAL_AGGREGATOR].as_float().unwrap();
    assert!(residual > 0.0);
}

#[test]
fn test_local_pagerank_respects_iteration_cap() {
    let config = PageRankConfig {
        tolerance: 0.0,
        max_iterations: 4,
        ..PageRankConfig::default()
    };
    let mut graph = pagerank_graph(GraphConfig::default(), &config).unwrap();
    graph.add_vertex("a", 1.0).unwrap();
    graph.add_vertex("b", 0.0).unwrap();
    graph.add_edge("a", "b", ()).unwrap();
    graph.add_edge("b", "a", ()).unwrap();

    let report = run_pagerank(&mut graph, &config).unwrap();

    assert_eq!(report.reason, HaltReason::MaxSuperstepsExceeded);
    assert_eq!(report.supersteps_executed, 4);
}

#[test]
fn test_invalid_damping_is_rejected() {
    let config = PageRankConfig {
        damping: 1.5,
        ..PageRankConfig::default()
    };
    assert!(pagerank_graph(GraphConfig::default(), &config).is_err());
}
