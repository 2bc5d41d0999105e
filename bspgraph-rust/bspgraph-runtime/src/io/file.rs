use crate::graph::Graph;
use crate::partition::Partitioner;
use bspgraph_api::message::Message;
use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::Edge;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::path::Path;

/// The slice of a link graph owned by one partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkGraphPartition {
    /// Local vertex ids, sorted.
    pub vertices: Vec<String>,
    /// Edges whose source is local, in file order. Repeated links collapse.
    pub edges: Vec<Edge<()>>,
}

impl LinkGraphPartition {
    /// Adds every vertex with `init(id)` as its value, then every edge.
    pub fn load_into<VV, M>(
        self,
        graph: &mut Graph<VV, (), M>,
        init: impl Fn(&str) -> VV,
    ) -> BspResult<()>
    where
        VV: Clone + Send + Sync + 'static,
        M: Message,
    {
        for id in &self.vertices {
            graph.add_vertex(id.clone(), init(id))?;
        }
        for edge in self.edges {
            graph.add_edge(edge.src_id, edge.target_id, ())?;
        }
        Ok(())
    }
}

/// Reads a headerless `src,dst` edge list and keeps the part owned by
/// `partition_id`. Vertices that only appear as link targets are created too.
pub fn read_link_graph(
    path: impl AsRef<Path>,
    partitioner: &dyn Partitioner,
    partition_id: usize,
) -> BspResult<LinkGraphPartition> {
    read_links(path.as_ref(), partitioner, partition_id, false)
}

/// Like [`read_link_graph`], but every link also yields its reverse edge.
/// Links present in both directions produce one edge each way.
pub fn read_undirected_link_graph(
    path: impl AsRef<Path>,
    partitioner: &dyn Partitioner,
    partition_id: usize,
) -> BspResult<LinkGraphPartition> {
    read_links(path.as_ref(), partitioner, partition_id, true)
}

fn read_links(
    path: &Path,
    partitioner: &dyn Partitioner,
    partition_id: usize,
    undirected: bool,
) -> BspResult<LinkGraphPartition> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(|e| BspError::Io(e.into()))?;

    let mut vertices = BTreeSet::new();
    let mut edges = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| BspError::InvalidArgument(format!("csv read: {e}")))?;
        let src = rec
            .get(0)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BspError::InvalidArgument("edge src missing".to_string()))?;
        let dst = rec.get(1).map(str::trim).filter(|s| !s.is_empty());

        if partitioner.partition_of(src) == partition_id {
            vertices.insert(src.to_string());
        }
        let Some(dst) = dst else {
            continue;
        };
        if partitioner.partition_of(dst) == partition_id {
            vertices.insert(dst.to_string());
        }
        if partitioner.partition_of(src) == partition_id
            && seen.insert((src.to_string(), dst.to_string()))
        {
            edges.push(Edge::new(src, dst, ()));
        }
        if undirected
            && partitioner.partition_of(dst) == partition_id
            && seen.insert((dst.to_string(), src.to_string()))
        {
            edges.push(Edge::new(dst, src, ()));
        }
    }
    Ok(LinkGraphPartition {
        vertices: vertices.into_iter().collect(),
        edges,
    })
}

/// Writes `id,value` rows sorted by vertex id.
pub fn dump_vertices_csv<VV, EV, M>(
    path: impl AsRef<Path>,
    graph: &Graph<VV, EV, M>,
) -> BspResult<usize>
where
    VV: Clone + Display + Send + Sync + 'static,
    EV: Clone + Send + Sync + 'static,
    M: Message,
{
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut rows: Vec<(&str, String)> = graph
        .vertices()
        .map(|v| (v.id(), v.value().to_string()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| BspError::Io(e.into()))?;
    for (id, value) in &rows {
        wtr.write_record([*id, value.as_str()])
            .map_err(|e| BspError::Io(e.into()))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}
