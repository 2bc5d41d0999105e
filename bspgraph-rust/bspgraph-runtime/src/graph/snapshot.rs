use crate::graph::bsp_graph::Graph;
use crate::queue::Mailbox;
use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::message::Message;
use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::{Edge, Vertex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexSnapshot<VV, EV> {
    pub id: String,
    pub value: VV,
    pub active: bool,
    pub edges: Vec<Edge<EV>>,
}

/// Partition state at a superstep boundary: enough to resume a computation
/// from the barrier it was taken at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot<VV, EV, M> {
    pub superstep: u64,
    pub partition_id: usize,
    pub vertices: Vec<VertexSnapshot<VV, EV>>,
    /// Messages waiting for the snapshot superstep, by target vertex.
    pub pending: Vec<(String, Vec<M>)>,
    pub aggregates: Vec<(String, AggregateValue)>,
}

impl<VV, EV, M> Graph<VV, EV, M>
where
    VV: Clone + Send + Sync + 'static,
    EV: Clone + Send + Sync + 'static,
    M: Message,
{
    pub fn snapshot(&self) -> BspResult<GraphSnapshot<VV, EV, M>> {
        if self.staged.is_some() {
            return Err(BspError::Internal(
                "cannot snapshot before the barrier commits".to_string(),
            ));
        }

        let mut vertices: Vec<VertexSnapshot<VV, EV>> = self
            .vertices
            .values()
            .map(|v| VertexSnapshot {
                id: v.id().to_string(),
                value: v.value().clone(),
                active: v.is_active(),
                edges: v.edges().to_vec(),
            })
            .collect();
        vertices.sort_by(|a, b| a.id.cmp(&b.id));

        let state = self.mailboxes.read()?;
        let mut pending = Vec::new();
        for (id, mailbox) in &state.boxes {
            let incoming = mailbox.incoming(state.superstep);
            if !incoming.pending_messages() {
                continue;
            }
            pending.push((id.clone(), incoming.messages().collect()));
        }
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        let mut aggregates: Vec<(String, AggregateValue)> = self
            .aggregators
            .iter()
            .map(|(name, a)| (name.to_string(), a.get()))
            .collect();
        aggregates.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(GraphSnapshot {
            superstep: state.superstep,
            partition_id: self.partition_id(),
            vertices,
            pending,
            aggregates,
        })
    }

    /// Replaces vertices, mailboxes and aggregator values with the snapshot.
    /// Aggregators must already be registered under the snapshot's names.
    pub fn restore(&mut self, snapshot: GraphSnapshot<VV, EV, M>) -> BspResult<()> {
        if snapshot.partition_id != self.partition_id() {
            return Err(BspError::InvalidArgument(format!(
                "snapshot of partition {} cannot restore partition {}",
                snapshot.partition_id,
                self.partition_id()
            )));
        }
        if let Some(v) = snapshot.vertices.iter().find(|v| !self.is_local(&v.id)) {
            return Err(BspError::InvalidArgument(format!(
                "snapshot vertex {} is not owned by this partition",
                v.id
            )));
        }
        for (name, _) in &snapshot.aggregates {
            self.aggregators.require(name)?;
        }

        self.staged = None;
        let mailboxes = self.mailboxes.clone();
        let mut state = mailboxes.write()?;
        for (_, mailbox) in state.boxes.drain() {
            mailbox.close()?;
        }
        self.vertices.clear();

        for v in snapshot.vertices {
            state
                .boxes
                .insert(v.id.clone(), Mailbox::new(&self.queue_factory));
            self.vertices.insert(
                v.id.clone(),
                Vertex::from_parts(v.id, v.value, v.active, v.edges),
            );
        }
        state.superstep = snapshot.superstep;
        self.superstep = snapshot.superstep;

        for (id, msgs) in snapshot.pending {
            let incoming = state.mailbox(&id)?.incoming(snapshot.superstep);
            for m in msgs {
                incoming.enqueue(m)?;
            }
        }
        drop(state);

        for (name, value) in snapshot.aggregates {
            let aggregator = self.aggregators.require(&name)?;
            aggregator.set(value)?;
            aggregator.reset_delta();
        }
        Ok(())
    }
}
