pub mod pagerank;
pub mod wcc;
