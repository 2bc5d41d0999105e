use crate::aggregator::AggregatorRegistry;
use crate::graph::mutation::Mutation;
use crate::partition::Partitioner;
use crate::queue::MailboxState;
use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::graph::GraphContext;
use bspgraph_api::message::Message;
use bspgraph_api::relay::Relayer;
use bspgraph_common::error::{BspError, BspResult};
use std::collections::HashMap;

pub(crate) struct StepShared<'a, M> {
    pub superstep: u64,
    pub mailboxes: &'a MailboxState<M>,
    pub aggregators: &'a AggregatorRegistry,
    pub relayer: Option<&'a dyn Relayer<M>>,
    pub partitioner: &'a dyn Partitioner,
    pub partition_id: usize,
}

pub(crate) struct Contribution {
    pub vertex_id: String,
    pub aggregator: String,
    pub value: AggregateValue,
}

pub(crate) struct WorkerOutput<VV, EV> {
    pub updates: Vec<(String, VV, bool)>,
    pub mutations: Vec<Mutation<VV, EV>>,
    pub contributions: Vec<Contribution>,
    pub messages_sent: u64,
    pub messages_relayed: u64,
}

/// Per-worker [`GraphContext`]. Aggregator contributions and mutations stay
/// private to the worker until the superstep completes.
pub(crate) struct WorkerContext<'a, VV, EV, M> {
    shared: &'a StepShared<'a, M>,
    vertex_partials: HashMap<String, AggregateValue>,
    contributions: Vec<Contribution>,
    mutations: Vec<Mutation<VV, EV>>,
    updates: Vec<(String, VV, bool)>,
    send_error: Option<BspError>,
    messages_sent: u64,
    messages_relayed: u64,
}

impl<'a, VV, EV, M: Message> WorkerContext<'a, VV, EV, M> {
    pub fn new(shared: &'a StepShared<'a, M>) -> Self {
        Self {
            shared,
            vertex_partials: HashMap::new(),
            contributions: Vec::new(),
            mutations: Vec::new(),
            updates: Vec::new(),
            send_error: None,
            messages_sent: 0,
            messages_relayed: 0,
        }
    }

    pub fn take_send_error(&mut self) -> Option<BspError> {
        self.send_error.take()
    }

    pub fn stage_update(&mut self, id: String, value: VV, active: bool) {
        self.updates.push((id, value, active));
    }

    pub fn finish_vertex(&mut self, vertex_id: &str) {
        for (aggregator, value) in self.vertex_partials.drain() {
            self.contributions.push(Contribution {
                vertex_id: vertex_id.to_string(),
                aggregator,
                value,
            });
        }
    }

    pub fn into_output(self) -> WorkerOutput<VV, EV> {
        WorkerOutput {
            updates: self.updates,
            mutations: self.mutations,
            contributions: self.contributions,
            messages_sent: self.messages_sent,
            messages_relayed: self.messages_relayed,
        }
    }

    fn route(&mut self, target_id: &str, message: M) -> BspResult<()> {
        let shared = self.shared;
        let owner = shared.partitioner.partition_of(target_id);
        if owner == shared.partition_id {
            let mailbox = shared
                .mailboxes
                .boxes
                .get(target_id)
                .ok_or_else(|| BspError::InvalidMessageDestination(target_id.to_string()))?;
            mailbox.outgoing(shared.superstep).enqueue(message)?;
            self.messages_sent += 1;
            return Ok(());
        }

        let relayer = shared.relayer.ok_or_else(|| {
            BspError::InvalidMessageDestination(format!(
                "{target_id} (partition {owner}, no relayer configured)"
            ))
        })?;
        relayer
            .relay(target_id, message)
            .map_err(|e| match e {
                relay @ BspError::Relay { .. } => relay,
                other => BspError::Relay {
                    target_id: target_id.to_string(),
                    message: other.to_string(),
                },
            })?;
        self.messages_relayed += 1;
        Ok(())
    }
}

/// Copy of a send failure: one is kept by the engine, one goes to the caller.
fn duplicate(err: &BspError) -> BspError {
    match err {
        BspError::Relay { target_id, message } => BspError::Relay {
            target_id: target_id.clone(),
            message: message.clone(),
        },
        BspError::InvalidMessageDestination(id) => BspError::InvalidMessageDestination(id.clone()),
        BspError::QueueClosed => BspError::QueueClosed,
        other => BspError::Internal(other.to_string()),
    }
}

impl<'a, VV, EV, M: Message> GraphContext<VV, EV, M> for WorkerContext<'a, VV, EV, M> {
    fn superstep(&self) -> u64 {
        self.shared.superstep
    }

    fn send_message(&mut self, target_id: &str, message: M) -> BspResult<()> {
        match self.route(target_id, message) {
            Ok(()) => Ok(()),
            Err(e) => {
                let returned = duplicate(&e);
                if self.send_error.is_none() {
                    self.send_error = Some(e);
                }
                Err(returned)
            }
        }
    }

    fn aggregate(&mut self, name: &str, value: AggregateValue) -> BspResult<()> {
        let aggregator = self.shared.aggregators.require(name)?;
        let acc = self.vertex_partials.remove(name).unwrap_or_default();
        let combined = aggregator.combine(acc, value)?;
        self.vertex_partials.insert(name.to_string(), combined);
        Ok(())
    }

    fn aggregator_value(&self, name: &str) -> Option<AggregateValue> {
        self.shared.aggregators.get(name).map(|a| a.get())
    }

    fn add_vertex(&mut self, id: &str, value: VV) {
        self.mutations.push(Mutation::AddVertex {
            id: id.to_string(),
            value,
        });
    }

    fn remove_vertex(&mut self, id: &str) {
        self.mutations.push(Mutation::RemoveVertex { id: id.to_string() });
    }

    fn add_edge(&mut self, src_id: &str, target_id: &str, value: EV) {
        self.mutations.push(Mutation::AddEdge {
            src_id: src_id.to_string(),
            target_id: target_id.to_string(),
            value,
        });
    }

    fn remove_edge(&mut self, src_id: &str, target_id: &str) {
        self.mutations.push(Mutation::RemoveEdge {
            src_id: src_id.to_string(),
            target_id: target_id.to_string(),
        });
    }
}
