use bspgraph_common::config::{self, Configuration};
use bspgraph_runtime::algorithms::pagerank::{pagerank_graph, run_pagerank, PageRankConfig};
use bspgraph_runtime::algorithms::wcc::{run_wcc, wcc_graph};
use bspgraph_runtime::graph::GraphConfig;
use bspgraph_runtime::io::file::{
    dump_vertices_csv, read_link_graph, read_undirected_link_graph,
};
use bspgraph_runtime::observability::{init_prometheus, init_tracing};
use bspgraph_runtime::scheduler::ExecutorConfig;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Algorithm {
    Pagerank,
    Wcc,
}

/// Runs a sample algorithm over a `src,dst` link graph on one machine.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, value_enum, default_value_t = Algorithm::Pagerank)]
    algorithm: Algorithm,

    #[arg(long)]
    edges: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// Defaults to the number of CPUs.
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value_t = 0.85)]
    alpha: f64,

    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    #[arg(long, default_value_t = 30)]
    max_supersteps: u64,

    #[arg(long)]
    metrics_listen: Option<SocketAddr>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");
    let args = Args::parse();
    if let Some(addr) = args.metrics_listen {
        init_prometheus(addr)?;
    }

    let mut conf =
        Configuration::new().with(config::MAX_SUPERSTEPS, args.max_supersteps.to_string());
    if let Some(workers) = args.workers {
        conf.put(config::WORKERS, workers.to_string());
    }

    match args.algorithm {
        Algorithm::Pagerank => {
            let pagerank = PageRankConfig {
                damping: args.alpha,
                tolerance: args.tolerance,
                max_iterations: args.max_supersteps,
            };
            let graph_config = GraphConfig::from_configuration(&conf)?;
            let partition = read_link_graph(&args.edges, graph_config.partitioner.as_ref(), 0)?;
            let mut graph = pagerank_graph(graph_config, &pagerank)?;
            partition.load_into(&mut graph, |_| 1.0)?;
            let report = run_pagerank(&mut graph, &pagerank)?;
            let rows = dump_vertices_csv(&args.output, &graph)?;
            tracing::info!(
                supersteps = report.supersteps_executed,
                reason = ?report.reason,
                rows,
                "pagerank finished"
            );
        }
        Algorithm::Wcc => {
            let graph_config = GraphConfig::from_configuration(&conf)?;
            let partition =
                read_undirected_link_graph(&args.edges, graph_config.partitioner.as_ref(), 0)?;
            let mut graph = wcc_graph(graph_config)?;
            partition.load_into(&mut graph, str::to_string)?;
            let report = run_wcc(&mut graph, ExecutorConfig::from_configuration(&conf)?)?;
            let rows = dump_vertices_csv(&args.output, &graph)?;
            tracing::info!(
                supersteps = report.supersteps_executed,
                reason = ?report.reason,
                rows,
                "wcc finished"
            );
        }
    }
    Ok(())
}
