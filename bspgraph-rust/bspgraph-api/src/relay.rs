use bspgraph_common::error::BspResult;

/// Forwards messages to vertices owned by another partition.
///
/// `relay` returns only once the message has been handed off for delivery in
/// the destination partition's next superstep, or with an error.
pub trait Relayer<M>: Send + Sync {
    fn relay(&self, target_id: &str, message: M) -> BspResult<()>;
}

/// Adapter that lets a plain function act as a [`Relayer`].
pub struct RelayerFn<F>(pub F);

impl<F> RelayerFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<M, F> Relayer<M> for RelayerFn<F>
where
    F: Fn(&str, M) -> BspResult<()> + Send + Sync,
{
    fn relay(&self, target_id: &str, message: M) -> BspResult<()> {
        (self.0)(target_id, message)
    }
}
