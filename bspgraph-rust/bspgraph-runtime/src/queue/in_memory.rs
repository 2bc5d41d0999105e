use bspgraph_api::message::{MessageIter, Queue};
use bspgraph_common::error::{BspError, BspResult};
use std::sync::{Mutex, MutexGuard};

struct QueueState<M> {
    messages: Vec<M>,
    closed: bool,
}

/// Mutex-guarded FIFO buffer.
pub struct InMemoryQueue<M> {
    state: Mutex<QueueState<M>>,
}

impl<M> InMemoryQueue<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                messages: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<M>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<M> Default for InMemoryQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send + Sync + 'static> Queue<M> for InMemoryQueue<M> {
    fn enqueue(&self, msg: M) -> BspResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(BspError::QueueClosed);
        }
        state.messages.push(msg);
        Ok(())
    }

    fn pending_messages(&self) -> bool {
        !self.lock().messages.is_empty()
    }

    fn discard_messages(&self) -> BspResult<()> {
        self.lock().messages.clear();
        Ok(())
    }

    fn messages(&self) -> MessageIter<M> {
        let copied = self.lock().messages.clone();
        Box::new(copied.into_iter())
    }

    fn close(&self) -> BspResult<()> {
        let mut state = self.lock();
        state.closed = true;
        state.messages.clear();
        Ok(())
    }
}
