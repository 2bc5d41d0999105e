pub mod superstep_executor;

pub use superstep_executor::{
    ExecutionReport, Executor, ExecutorCallbacks, ExecutorConfig, HaltReason,
};
