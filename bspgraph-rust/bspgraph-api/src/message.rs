use bspgraph_common::error::BspResult;

/// Algorithm-defined payload exchanged between vertices.
pub trait Message: Clone + Send + Sync + 'static {
    /// Tag identifying the payload kind, carried alongside relayed messages.
    fn type_name(&self) -> &str;
}

/// Single-pass, finite iterator over one superstep's inbound messages.
pub type MessageIter<M> = Box<dyn Iterator<Item = M> + Send>;

/// A vertex mailbox buffer. Implementations must serialise concurrent
/// `enqueue` calls; every method takes `&self`.
pub trait Queue<M>: Send + Sync {
    /// Appends a message; fails with `QueueClosed` once the queue is closed.
    fn enqueue(&self, msg: M) -> BspResult<()>;

    /// Whether there are buffered messages.
    fn pending_messages(&self) -> bool;

    /// Drops buffered messages without processing them.
    fn discard_messages(&self) -> BspResult<()>;

    /// Copies out the buffered messages, oldest first. The buffer keeps them
    /// until `discard_messages`.
    fn messages(&self) -> MessageIter<M>;

    fn close(&self) -> BspResult<()>;
}

pub type QueueFactory<M> = std::sync::Arc<dyn Fn() -> Box<dyn Queue<M>> + Send + Sync>;
