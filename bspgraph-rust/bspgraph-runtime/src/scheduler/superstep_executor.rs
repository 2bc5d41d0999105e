use crate::aggregator::AggregatorRegistry;
use crate::graph::{BarrierSummary, Graph, StepStats};
use bspgraph_api::aggregator::AggregateValue;
use bspgraph_api::message::Message;
use bspgraph_common::config::Configuration;
use bspgraph_common::error::{BspError, BspResult};
use std::collections::HashMap;
use std::time::Instant;

pub type PreStepFn<VV, EV, M> = Box<dyn FnMut(&mut Graph<VV, EV, M>) -> BspResult<()> + Send>;
pub type PostStepFn<VV, EV, M> =
    Box<dyn FnMut(&mut Graph<VV, EV, M>, &StepStats) -> BspResult<()> + Send>;
pub type KeepRunningFn<VV, EV, M> =
    Box<dyn FnMut(&Graph<VV, EV, M>, &BarrierSummary) -> BspResult<bool> + Send>;
pub type ConvergenceFn = Box<dyn Fn(&AggregatorRegistry) -> bool + Send>;

/// Hooks around each superstep.
///
/// `post_step` runs after compute and before the barrier commits; a
/// distributed driver waits for its peers there. `post_step_keep_running`
/// runs after the barrier and, when set, replaces the default termination
/// predicate (quiescent and converged).
pub struct ExecutorCallbacks<VV, EV, M> {
    pub pre_step: Option<PreStepFn<VV, EV, M>>,
    pub post_step: Option<PostStepFn<VV, EV, M>>,
    pub post_step_keep_running: Option<KeepRunningFn<VV, EV, M>>,
    pub convergence_check: Option<ConvergenceFn>,
}

impl<VV, EV, M> Default for ExecutorCallbacks<VV, EV, M> {
    fn default() -> Self {
        Self {
            pre_step: None,
            post_step: None,
            post_step_keep_running: None,
            convergence_check: None,
        }
    }
}

impl<VV, EV, M> ExecutorCallbacks<VV, EV, M> {
    pub fn pre_step(
        mut self,
        f: impl FnMut(&mut Graph<VV, EV, M>) -> BspResult<()> + Send + 'static,
    ) -> Self {
        self.pre_step = Some(Box::new(f));
        self
    }

    pub fn post_step(
        mut self,
        f: impl FnMut(&mut Graph<VV, EV, M>, &StepStats) -> BspResult<()> + Send + 'static,
    ) -> Self {
        self.post_step = Some(Box::new(f));
        self
    }

    pub fn post_step_keep_running(
        mut self,
        f: impl FnMut(&Graph<VV, EV, M>, &BarrierSummary) -> BspResult<bool> + Send + 'static,
    ) -> Self {
        self.post_step_keep_running = Some(Box::new(f));
        self
    }

    pub fn convergence_check(
        mut self,
        f: impl Fn(&AggregatorRegistry) -> bool + Send + 'static,
    ) -> Self {
        self.convergence_check = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorConfig {
    /// Hard stop, counted in supersteps executed by one run.
    pub max_supersteps: Option<u64>,
}

impl ExecutorConfig {
    pub fn from_configuration(conf: &Configuration) -> BspResult<Self> {
        Ok(Self {
            max_supersteps: conf.max_supersteps()?,
        })
    }

    pub fn with_max_supersteps(mut self, max: u64) -> Self {
        self.max_supersteps = Some(max);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Converged,
    MaxSuperstepsExceeded,
    /// `run_steps` finished its quota while the computation still had work.
    StepLimitReached,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub reason: HaltReason,
    pub supersteps_executed: u64,
    /// Superstep the graph will run next.
    pub superstep: u64,
    pub aggregates: HashMap<String, AggregateValue>,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Running { executed: u64 },
    Barrier { executed: u64, stats: StepStats },
    Halted { executed: u64, reason: HaltReason },
}

/// Drives a [`Graph`] through supersteps until it halts.
pub struct Executor<'g, VV, EV, M> {
    graph: &'g mut Graph<VV, EV, M>,
    callbacks: ExecutorCallbacks<VV, EV, M>,
    config: ExecutorConfig,
}

impl<'g, VV, EV, M> Executor<'g, VV, EV, M>
where
    VV: Clone + Send + Sync + 'static,
    EV: Clone + Send + Sync + 'static,
    M: Message,
{
    pub fn new(
        graph: &'g mut Graph<VV, EV, M>,
        callbacks: ExecutorCallbacks<VV, EV, M>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            graph,
            callbacks,
            config,
        }
    }

    pub fn graph(&self) -> &Graph<VV, EV, M> {
        &*self.graph
    }

    /// Runs until the termination predicate holds or `max_supersteps` is hit.
    pub fn run_to_completion(&mut self) -> BspResult<ExecutionReport> {
        self.run(None)
    }

    /// Runs at most `steps` supersteps.
    pub fn run_steps(&mut self, steps: u64) -> BspResult<ExecutionReport> {
        self.run(Some(steps))
    }

    fn run(&mut self, quota: Option<u64>) -> BspResult<ExecutionReport> {
        let started = Instant::now();
        let mut state = State::Idle;
        loop {
            state = match state {
                State::Idle => State::Running { executed: 0 },
                State::Running { executed } => {
                    if self.config.max_supersteps.is_some_and(|max| executed >= max) {
                        State::Halted {
                            executed,
                            reason: HaltReason::MaxSuperstepsExceeded,
                        }
                    } else if quota.is_some_and(|q| executed >= q) {
                        State::Halted {
                            executed,
                            reason: HaltReason::StepLimitReached,
                        }
                    } else {
                        let stats = self.compute_phase()?;
                        State::Barrier { executed, stats }
                    }
                }
                State::Barrier { executed, stats } => {
                    let summary = self.graph.commit_barrier()?;
                    tracing::debug!(
                        superstep = stats.superstep,
                        dispatched = stats.dispatched,
                        active = summary.active_vertices,
                        pending = summary.pending_messages,
                        "superstep finished"
                    );
                    if self.keep_running(&summary)? {
                        State::Running {
                            executed: executed + 1,
                        }
                    } else {
                        State::Halted {
                            executed: executed + 1,
                            reason: HaltReason::Converged,
                        }
                    }
                }
                State::Halted { executed, reason } => {
                    tracing::info!(
                        supersteps = executed,
                        superstep = self.graph.superstep(),
                        ?reason,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "bsp run halted"
                    );
                    return Ok(ExecutionReport {
                        reason,
                        supersteps_executed: executed,
                        superstep: self.graph.superstep(),
                        aggregates: self.graph.aggregators().values(),
                    });
                }
            };
        }
    }

    /// Pre-step hook, compute and post-step hook. Any failure voids the
    /// superstep.
    fn compute_phase(&mut self) -> BspResult<StepStats> {
        if let Some(pre) = self.callbacks.pre_step.as_mut() {
            pre(&mut *self.graph)?;
        }
        let stats = match self.graph.step() {
            Ok(stats) => stats,
            Err(err) => {
                if matches!(err, BspError::Cancelled) {
                    tracing::warn!(superstep = self.graph.superstep(), "bsp run cancelled");
                } else {
                    tracing::error!(superstep = self.graph.superstep(), error = %err, "superstep failed");
                }
                return Err(err);
            }
        };
        if let Some(post) = self.callbacks.post_step.as_mut() {
            if let Err(err) = post(&mut *self.graph, &stats) {
                self.graph.abandon_step()?;
                return Err(err);
            }
        }
        Ok(stats)
    }

    fn keep_running(&mut self, summary: &BarrierSummary) -> BspResult<bool> {
        if let Some(keep_running) = self.callbacks.post_step_keep_running.as_mut() {
            return keep_running(&*self.graph, summary);
        }
        let converged = self
            .callbacks
            .convergence_check
            .as_ref()
            .map_or(true, |check| check(self.graph.aggregators()));
        Ok(!(summary.is_quiescent() && converged))
    }
}
