use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::Edge;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub enum Mutation<VV, EV> {
    AddVertex {
        id: String,
        value: VV,
    },
    RemoveVertex {
        id: String,
    },
    AddEdge {
        src_id: String,
        target_id: String,
        value: EV,
    },
    RemoveEdge {
        src_id: String,
        target_id: String,
    },
}

/// One superstep's mutations, grouped in application order: edge removals,
/// vertex removals, vertex additions, edge additions.
pub(crate) struct MutationBatch<VV, EV> {
    pub edge_removals: Vec<(String, String)>,
    pub vertex_removals: Vec<String>,
    pub vertex_additions: Vec<(String, VV)>,
    pub edge_additions: Vec<Edge<EV>>,
}

impl<VV, EV> MutationBatch<VV, EV> {
    pub fn new(mutations: impl IntoIterator<Item = Mutation<VV, EV>>) -> Self {
        let mut batch = Self {
            edge_removals: Vec::new(),
            vertex_removals: Vec::new(),
            vertex_additions: Vec::new(),
            edge_additions: Vec::new(),
        };
        for m in mutations {
            match m {
                Mutation::AddVertex { id, value } => batch.vertex_additions.push((id, value)),
                Mutation::RemoveVertex { id } => batch.vertex_removals.push(id),
                Mutation::AddEdge {
                    src_id,
                    target_id,
                    value,
                } => batch
                    .edge_additions
                    .push(Edge::new(src_id, target_id, value)),
                Mutation::RemoveEdge { src_id, target_id } => {
                    batch.edge_removals.push((src_id, target_id))
                }
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.edge_removals.is_empty()
            && self.vertex_removals.is_empty()
            && self.vertex_additions.is_empty()
            && self.edge_additions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edge_removals.len()
            + self.vertex_removals.len()
            + self.vertex_additions.len()
            + self.edge_additions.len()
    }

    pub fn validate(
        &self,
        exists: impl Fn(&str) -> bool,
        is_local: impl Fn(&str) -> bool,
    ) -> BspResult<()> {
        for (id, _) in &self.vertex_additions {
            if !is_local(id) {
                return Err(BspError::InvalidArgument(format!(
                    "cannot add vertex {id}: owned by another partition"
                )));
            }
        }

        let removed: HashSet<&str> = self.vertex_removals.iter().map(String::as_str).collect();
        let added: HashSet<&str> = self
            .vertex_additions
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();

        for edge in &self.edge_additions {
            let src = edge.src_id.as_str();
            let present = added.contains(src) || (exists(src) && !removed.contains(src));
            if !present {
                return Err(BspError::UnknownVertex(src.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_from_vertex_added_in_same_batch_is_valid() {
        let batch: MutationBatch<u32, ()> = MutationBatch::new(vec![
            Mutation::AddEdge {
                src_id: "n".into(),
                target_id: "a".into(),
                value: (),
            },
            Mutation::AddVertex {
                id: "n".into(),
                value: 1,
            },
        ]);
        assert!(batch.validate(|_| false, |_| true).is_ok());
    }

    #[test]
    fn edge_from_removed_vertex_is_rejected() {
        let batch: MutationBatch<u32, ()> = MutationBatch::new(vec![
            Mutation::RemoveVertex { id: "a".into() },
            Mutation::AddEdge {
                src_id: "a".into(),
                target_id: "b".into(),
                value: (),
            },
        ]);
        let err = batch.validate(|id| id == "a", |_| true).unwrap_err();
        assert!(matches!(err, BspError::UnknownVertex(id) if id == "a"));
    }

    #[test]
    fn foreign_vertex_addition_is_rejected() {
        let batch: MutationBatch<u32, ()> = MutationBatch::new(vec![Mutation::AddVertex {
            id: "remote".into(),
            value: 0,
        }]);
        assert!(batch.validate(|_| false, |_| false).is_err());
    }
}
