use crate::aggregator::AggregatorRegistry;
use crate::graph::context::{Contribution, StepShared, WorkerContext, WorkerOutput};
use crate::graph::mutation::{Mutation, MutationBatch};
use crate::partition::{HashPartitioner, Partitioner, SinglePartition};
use crate::queue::{in_memory_queue_factory, Mailbox, MailboxState, MailboxTable, MessageSink};
use bspgraph_api::aggregator::Aggregator;
use bspgraph_api::function::ComputeFunction;
use bspgraph_api::message::{Message, QueueFactory};
use bspgraph_api::relay::Relayer;
use bspgraph_common::config::{self, Configuration};
use bspgraph_common::error::{BspError, BspResult};
use bspgraph_common::types::{Edge, Vertex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct GraphConfig<M> {
    pub workers: usize,
    pub partitioner: Arc<dyn Partitioner>,
    pub partition_id: usize,
    pub relayer: Option<Arc<dyn Relayer<M>>>,
    pub queue_factory: QueueFactory<M>,
    pub cancellation: CancellationToken,
}

impl<M: Message> Default for GraphConfig<M> {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            partitioner: Arc::new(SinglePartition),
            partition_id: 0,
            relayer: None,
            queue_factory: in_memory_queue_factory(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl<M: Message> GraphConfig<M> {
    pub fn from_configuration(conf: &Configuration) -> BspResult<Self> {
        let partitions = conf.get_usize(config::PARTITIONS, 1)?;
        let partitioner: Arc<dyn Partitioner> = if partitions > 1 {
            Arc::new(HashPartitioner::new(partitions))
        } else {
            Arc::new(SinglePartition)
        };
        Ok(Self {
            workers: conf.workers()?,
            partitioner,
            partition_id: conf.get_usize(config::PARTITION_ID, 0)?,
            ..Self::default()
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_partitioner(
        mut self,
        partitioner: Arc<dyn Partitioner>,
        partition_id: usize,
    ) -> Self {
        self.partitioner = partitioner;
        self.partition_id = partition_id;
        self
    }

    pub fn with_relayer(mut self, relayer: Arc<dyn Relayer<M>>) -> Self {
        self.relayer = Some(relayer);
        self
    }

    pub fn with_queue_factory(mut self, factory: QueueFactory<M>) -> Self {
        self.queue_factory = factory;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StepStats {
    pub superstep: u64,
    pub dispatched: usize,
    pub active_after_compute: usize,
    pub messages_sent: u64,
    pub messages_relayed: u64,
    pub mutations_staged: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct BarrierSummary {
    pub superstep: u64,
    pub active_vertices: usize,
    pub pending_messages: bool,
    pub aggregator_deltas_zero: bool,
    pub mutations_applied: usize,
}

impl BarrierSummary {
    pub fn is_quiescent(&self) -> bool {
        self.active_vertices == 0 && !self.pending_messages
    }
}

pub(super) struct StagedStep<VV, EV> {
    superstep: u64,
    updates: Vec<(String, VV, bool)>,
    mutations: Vec<Mutation<VV, EV>>,
}

/// One partition of a BSP graph. Nothing compute does is visible until
/// [`Graph::commit_barrier`].
pub struct Graph<VV, EV, M> {
    pub(super) vertices: HashMap<String, Vertex<VV, EV>>,
    pub(super) mailboxes: Arc<MailboxTable<M>>,
    pub(super) aggregators: AggregatorRegistry,
    pub(super) superstep: u64,
    compute_fn: Arc<dyn ComputeFunction<VV, EV, M>>,
    relayer: Option<Arc<dyn Relayer<M>>>,
    partitioner: Arc<dyn Partitioner>,
    partition_id: usize,
    pub(super) queue_factory: QueueFactory<M>,
    cancellation: CancellationToken,
    pool: rayon::ThreadPool,
    workers: usize,
    pub(super) staged: Option<StagedStep<VV, EV>>,
}

impl<VV, EV, M> Graph<VV, EV, M>
where
    VV: Clone + Send + Sync + 'static,
    EV: Clone + Send + Sync + 'static,
    M: Message,
{
    pub fn new(
        config: GraphConfig<M>,
        compute_fn: impl ComputeFunction<VV, EV, M>,
    ) -> BspResult<Self> {
        if config.workers == 0 {
            return Err(BspError::InvalidArgument(
                "worker count must be positive".to_string(),
            ));
        }
        let partitions = config.partitioner.partition_count();
        if config.partition_id >= partitions {
            return Err(BspError::InvalidArgument(format!(
                "partition id {} out of range for {partitions} partitions",
                config.partition_id
            )));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("bsp-worker-{i}"))
            .build()
            .map_err(|e| BspError::Internal(format!("worker pool: {e}")))?;

        Ok(Self {
            vertices: HashMap::new(),
            mailboxes: Arc::new(MailboxTable::new()),
            aggregators: AggregatorRegistry::new(),
            superstep: 0,
            compute_fn: Arc::new(compute_fn),
            relayer: config.relayer,
            partitioner: config.partitioner,
            partition_id: config.partition_id,
            queue_factory: config.queue_factory,
            cancellation: config.cancellation,
            pool,
            workers: config.workers,
            staged: None,
        })
    }

    pub fn superstep(&self) -> u64 {
        self.superstep
    }

    pub fn partition_id(&self) -> usize {
        self.partition_id
    }

    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_local(&self, vertex_id: &str) -> bool {
        self.partitioner.partition_of(vertex_id) == self.partition_id
    }

    pub fn add_vertex(&mut self, id: impl Into<String>, value: VV) -> BspResult<()> {
        let id = id.into();
        if !self.is_local(&id) {
            return Err(BspError::InvalidArgument(format!(
                "vertex {id} belongs to partition {}, not {}",
                self.partitioner.partition_of(&id),
                self.partition_id
            )));
        }
        if let Some(v) = self.vertices.get_mut(&id) {
            v.set_value(value);
            return Ok(());
        }
        self.mailboxes
            .write()?
            .boxes
            .insert(id.clone(), Mailbox::new(&self.queue_factory));
        self.vertices.insert(id.clone(), Vertex::new(id, value));
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        src_id: impl Into<String>,
        target_id: impl Into<String>,
        value: EV,
    ) -> BspResult<()> {
        let src_id = src_id.into();
        let vertex = self
            .vertices
            .get_mut(&src_id)
            .ok_or_else(|| BspError::UnknownVertex(src_id.clone()))?;
        vertex.edges_mut().push(Edge::new(src_id, target_id, value));
        Ok(())
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex<VV, EV>> {
        self.vertices.get(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<VV, EV>> {
        self.vertices.values()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn active_vertex_count(&self) -> usize {
        self.vertices.values().filter(|v| v.is_active()).count()
    }

    /// Places a message in the vertex's inbox for the superstep about to run.
    pub fn inject_message(&self, vertex_id: &str, msg: M) -> BspResult<()> {
        if !self.is_local(vertex_id) {
            return Err(BspError::InvalidMessageDestination(vertex_id.to_string()));
        }
        let state = self.mailboxes.read()?;
        state
            .boxes
            .get(vertex_id)
            .ok_or_else(|| BspError::InvalidMessageDestination(vertex_id.to_string()))?
            .incoming(state.superstep)
            .enqueue(msg)
    }

    pub fn delivery_handle(&self) -> MessageSink<M> {
        MessageSink::new(self.mailboxes.clone())
    }

    pub fn has_pending_messages(&self) -> BspResult<bool> {
        Ok(self.mailboxes.read()?.any_pending())
    }

    pub fn register_aggregator(
        &mut self,
        name: impl Into<String>,
        aggregator: Arc<dyn Aggregator>,
    ) -> BspResult<()> {
        self.aggregators.register(name, aggregator)
    }

    pub fn aggregator(&self, name: &str) -> Option<&Arc<dyn Aggregator>> {
        self.aggregators.get(name)
    }

    pub fn aggregators(&self) -> &AggregatorRegistry {
        &self.aggregators
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// On error, messages sent and aggregated during the superstep are dropped;
    /// vertices and inbound messages stay as of the last barrier.
    pub fn step(&mut self) -> BspResult<StepStats> {
        if self.staged.is_some() {
            return Err(BspError::Internal(format!(
                "superstep {} is waiting for its barrier",
                self.superstep
            )));
        }
        if self.cancellation.is_cancelled() {
            return Err(BspError::Cancelled);
        }

        let started = Instant::now();
        let superstep = self.superstep;
        self.aggregators.reset_deltas();

        let mailboxes = self.mailboxes.clone();
        let state = mailboxes.read()?;
        let dispatch: Vec<&Vertex<VV, EV>> = self
            .vertices
            .values()
            .filter(|v| {
                v.is_active()
                    || state
                        .boxes
                        .get(v.id())
                        .is_some_and(|m| m.incoming(superstep).pending_messages())
            })
            .collect();
        let dispatched = dispatch.len();

        let shared = StepShared {
            superstep,
            mailboxes: &*state,
            aggregators: &self.aggregators,
            relayer: self.relayer.as_deref(),
            partitioner: self.partitioner.as_ref(),
            partition_id: self.partition_id,
        };
        let compute_fn = self.compute_fn.as_ref();
        let cancellation = &self.cancellation;
        let cursor = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let first_error: OnceLock<BspError> = OnceLock::new();
        let outputs: Mutex<Vec<WorkerOutput<VV, EV>>> = Mutex::new(Vec::new());

        let fail = |err: BspError| {
            abort.store(true, Ordering::Release);
            let _ = first_error.set(err);
        };

        let worker_count = self.workers.min(dispatched);
        self.pool.scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|_| {
                    let mut ctx = WorkerContext::new(&shared);
                    loop {
                        if abort.load(Ordering::Acquire) {
                            break;
                        }
                        if cancellation.is_cancelled() {
                            fail(BspError::Cancelled);
                            break;
                        }
                        let idx = cursor.fetch_add(1, Ordering::AcqRel);
                        let Some(vertex) = dispatch.get(idx) else {
                            break;
                        };
                        if let Err(e) = compute_vertex(compute_fn, &mut ctx, &*state, vertex) {
                            fail(e);
                            break;
                        }
                    }
                    outputs
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(ctx.into_output());
                });
            }
        });

        if first_error.get().is_none() && self.cancellation.is_cancelled() {
            fail(BspError::Cancelled);
        }
        let mut outputs = outputs.into_inner().unwrap_or_else(PoisonError::into_inner);
        let absorbed = match first_error.into_inner() {
            Some(err) => Err(err),
            None => {
                let mut contributions: Vec<Contribution> = outputs
                    .iter_mut()
                    .flat_map(|o| std::mem::take(&mut o.contributions))
                    .collect();
                // Vertex order, not worker completion order.
                contributions.sort_by(|a, b| {
                    (a.vertex_id.as_str(), a.aggregator.as_str())
                        .cmp(&(b.vertex_id.as_str(), b.aggregator.as_str()))
                });
                self.aggregators
                    .absorb(contributions.into_iter().map(|c| (c.aggregator, c.value)))
            }
        };
        if let Err(err) = absorbed {
            state.discard_outgoing()?;
            self.aggregators.reset_deltas();
            tracing::warn!(superstep, error = %err, "superstep aborted");
            return Err(err);
        }
        drop(state);

        let mut updates = Vec::with_capacity(dispatched);
        let mut mutations = Vec::new();
        let mut messages_sent = 0;
        let mut messages_relayed = 0;
        for out in outputs {
            updates.extend(out.updates);
            mutations.extend(out.mutations);
            messages_sent += out.messages_sent;
            messages_relayed += out.messages_relayed;
        }
        let active_after_compute = updates.iter().filter(|(_, _, active)| *active).count();
        let mutations_staged = mutations.len();
        self.staged = Some(StagedStep {
            superstep,
            updates,
            mutations,
        });

        let duration = started.elapsed();
        metrics::counter!("bspgraph_vertices_computed_total").increment(dispatched as u64);
        metrics::counter!("bspgraph_messages_sent_total").increment(messages_sent);
        metrics::counter!("bspgraph_messages_relayed_total").increment(messages_relayed);
        metrics::histogram!("bspgraph_superstep_duration_ms").record(duration.as_millis() as f64);
        tracing::debug!(
            superstep,
            dispatched,
            messages_sent,
            messages_relayed,
            elapsed_ms = duration.as_millis() as u64,
            "superstep computed"
        );

        Ok(StepStats {
            superstep,
            dispatched,
            active_after_compute,
            messages_sent,
            messages_relayed,
            mutations_staged,
            duration,
        })
    }

    pub fn commit_barrier(&mut self) -> BspResult<BarrierSummary> {
        let staged = self.staged.take().ok_or_else(|| {
            BspError::Internal("no computed superstep to commit".to_string())
        })?;

        let batch = MutationBatch::new(staged.mutations);
        let partitioner = self.partitioner.clone();
        let partition_id = self.partition_id;
        let vertices = &self.vertices;
        if let Err(err) = batch.validate(
            |id| vertices.contains_key(id),
            |id| partitioner.partition_of(id) == partition_id,
        ) {
            self.mailboxes.read()?.discard_outgoing()?;
            self.aggregators.reset_deltas();
            tracing::warn!(superstep = staged.superstep, error = %err, "barrier rejected");
            return Err(err);
        }

        for (id, value, active) in staged.updates {
            if let Some(v) = self.vertices.get_mut(&id) {
                v.set_value(value);
                v.set_active(active);
            }
        }

        let mutations_applied = batch.len();
        let mailboxes = self.mailboxes.clone();
        let mut state = mailboxes.write()?;
        if !batch.is_empty() {
            self.apply_mutations(&mut state, batch)?;
        }
        state.swap()?;
        self.superstep = state.superstep;
        let pending_messages = state.any_pending();
        drop(state);

        self.aggregators.merge_all()?;

        let summary = BarrierSummary {
            superstep: staged.superstep,
            active_vertices: self.active_vertex_count(),
            pending_messages,
            aggregator_deltas_zero: self.aggregators.deltas_are_zero(),
            mutations_applied,
        };
        tracing::debug!(
            superstep = summary.superstep,
            active = summary.active_vertices,
            pending = summary.pending_messages,
            "barrier committed"
        );
        Ok(summary)
    }

    pub fn abandon_step(&mut self) -> BspResult<()> {
        if self.staged.take().is_some() {
            self.mailboxes.read()?.discard_outgoing()?;
            self.aggregators.reset_deltas();
        }
        Ok(())
    }

    fn apply_mutations(
        &mut self,
        state: &mut MailboxState<M>,
        batch: MutationBatch<VV, EV>,
    ) -> BspResult<()> {
        for (src_id, target_id) in batch.edge_removals {
            if let Some(v) = self.vertices.get_mut(&src_id) {
                v.edges_mut().retain(|e| e.target_id != target_id);
            }
        }
        for id in batch.vertex_removals {
            self.vertices.remove(&id);
            if let Some(mailbox) = state.boxes.remove(&id) {
                mailbox.close()?;
            }
        }
        for (id, value) in batch.vertex_additions {
            match self.vertices.get_mut(&id) {
                Some(v) => v.set_value(value),
                None => {
                    state
                        .boxes
                        .insert(id.clone(), Mailbox::new(&self.queue_factory));
                    self.vertices.insert(id.clone(), Vertex::new(id, value));
                }
            }
        }
        for edge in batch.edge_additions {
            if let Some(v) = self.vertices.get_mut(&edge.src_id) {
                v.edges_mut().push(edge);
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) -> BspResult<()> {
        let mut state = self.mailboxes.write()?;
        for (_, mailbox) in state.boxes.drain() {
            mailbox.close()?;
        }
        state.superstep = 0;
        drop(state);
        self.vertices.clear();
        self.aggregators.clear();
        self.superstep = 0;
        self.staged = None;
        Ok(())
    }

    pub fn close(&mut self) -> BspResult<()> {
        self.staged = None;
        let state = self.mailboxes.read()?;
        for mailbox in state.boxes.values() {
            mailbox.close()?;
        }
        Ok(())
    }
}

fn compute_vertex<VV, EV, M>(
    compute_fn: &dyn ComputeFunction<VV, EV, M>,
    ctx: &mut WorkerContext<'_, VV, EV, M>,
    state: &MailboxState<M>,
    vertex: &Vertex<VV, EV>,
) -> BspResult<()>
where
    VV: Clone + 'static,
    EV: Clone + 'static,
    M: Message,
{
    let mut working = vertex.clone();
    working.set_active(true);
    let mut messages = state.mailbox(vertex.id())?.incoming(state.superstep).messages();
    let result = compute_fn.compute(&mut *ctx, &mut working, &mut messages);

    if let Some(err) = ctx.take_send_error() {
        return Err(err);
    }
    match result {
        Ok(()) => {
            let active = working.is_active();
            ctx.finish_vertex(vertex.id());
            ctx.stage_update(vertex.id().to_string(), working.into_value(), active);
            Ok(())
        }
        Err(err) if err.is_engine_error() => Err(err),
        Err(err) => Err(BspError::Compute {
            vertex_id: vertex.id().to_string(),
            source: Box::new(err),
        }),
    }
}
