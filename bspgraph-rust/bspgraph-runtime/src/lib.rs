pub mod aggregator;
pub mod algorithms;
pub mod distributed;
pub mod graph;
pub mod io;
pub mod observability;
pub mod partition;
pub mod queue;
pub mod scheduler;
pub mod state;
