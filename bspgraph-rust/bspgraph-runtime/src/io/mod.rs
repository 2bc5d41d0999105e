pub mod file;

pub use file::{dump_vertices_csv, read_link_graph, read_undirected_link_graph, LinkGraphPartition};
