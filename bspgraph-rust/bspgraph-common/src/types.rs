use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge<EV> {
    pub src_id: String,
    pub target_id: String,
    pub value: EV,
}

impl<EV> Edge<EV> {
    pub fn new(src_id: impl Into<String>, target_id: impl Into<String>, value: EV) -> Self {
        Self {
            src_id: src_id.into(),
            target_id: target_id.into(),
            value,
        }
    }
}

/// A vertex as seen by compute logic: identity, value, active flag and a
/// shared, frozen view of its outgoing edges.
#[derive(Debug, Clone)]
pub struct Vertex<VV, EV> {
    id: String,
    value: VV,
    active: bool,
    edges: Arc<Vec<Edge<EV>>>,
}

impl<VV, EV> Vertex<VV, EV> {
    pub fn new(id: impl Into<String>, value: VV) -> Self {
        Self {
            id: id.into(),
            value,
            active: true,
            edges: Arc::new(Vec::new()),
        }
    }

    pub fn from_parts(
        id: impl Into<String>,
        value: VV,
        active: bool,
        edges: Vec<Edge<EV>>,
    ) -> Self {
        Self {
            id: id.into(),
            value,
            active,
            edges: Arc::new(edges),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> &VV {
        &self.value
    }

    pub fn set_value(&mut self, value: VV) {
        self.value = value;
    }

    pub fn into_value(self) -> VV {
        self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Marks the vertex inactive until it receives a message.
    pub fn vote_to_halt(&mut self) {
        self.active = false;
    }

    pub fn edges(&self) -> &[Edge<EV>] {
        &self.edges
    }

    pub fn out_degree(&self) -> usize {
        self.edges.len()
    }
}

impl<VV, EV: Clone> Vertex<VV, EV> {
    /// Edits on the copy handed to compute logic are not committed; structural
    /// changes during a superstep go through the staged mutation API.
    pub fn edges_mut(&mut self) -> &mut Vec<Edge<EV>> {
        Arc::make_mut(&mut self.edges)
    }
}
