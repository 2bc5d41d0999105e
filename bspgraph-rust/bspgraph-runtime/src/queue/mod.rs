pub mod in_memory;

use bspgraph_api::message::{Message, Queue, QueueFactory};
use bspgraph_common::error::{BspError, BspResult};
use in_memory::InMemoryQueue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub fn in_memory_queue_factory<M: Message>() -> QueueFactory<M> {
    Arc::new(|| Box::new(InMemoryQueue::<M>::new()) as Box<dyn Queue<M>>)
}

/// Double-buffered mailbox. The buffer at `superstep % 2` is read during
/// that superstep; the other one collects messages for the next.
pub struct Mailbox<M> {
    buffers: [Box<dyn Queue<M>>; 2],
}

impl<M> Mailbox<M> {
    pub fn new(factory: &QueueFactory<M>) -> Self {
        Self {
            buffers: [factory(), factory()],
        }
    }

    pub fn incoming(&self, superstep: u64) -> &dyn Queue<M> {
        self.buffers[(superstep % 2) as usize].as_ref()
    }

    pub fn outgoing(&self, superstep: u64) -> &dyn Queue<M> {
        self.buffers[((superstep + 1) % 2) as usize].as_ref()
    }

    pub fn close(&self) -> BspResult<()> {
        for buffer in &self.buffers {
            buffer.discard_messages()?;
            buffer.close()?;
        }
        Ok(())
    }
}

pub(crate) struct MailboxState<M> {
    pub superstep: u64,
    pub boxes: HashMap<String, Mailbox<M>>,
}

impl<M> MailboxState<M> {
    pub fn mailbox(&self, vertex_id: &str) -> BspResult<&Mailbox<M>> {
        self.boxes
            .get(vertex_id)
            .ok_or_else(|| BspError::UnknownVertex(vertex_id.to_string()))
    }

    // Outgoing becomes incoming once the superstep advances.
    pub fn swap(&mut self) -> BspResult<()> {
        for mailbox in self.boxes.values() {
            mailbox.incoming(self.superstep).discard_messages()?;
        }
        self.superstep += 1;
        Ok(())
    }

    pub fn discard_outgoing(&self) -> BspResult<()> {
        for mailbox in self.boxes.values() {
            mailbox.outgoing(self.superstep).discard_messages()?;
        }
        Ok(())
    }

    pub fn any_pending(&self) -> bool {
        self.boxes
            .values()
            .any(|m| m.incoming(self.superstep).pending_messages())
    }
}

pub struct MailboxTable<M> {
    state: RwLock<MailboxState<M>>,
}

impl<M> MailboxTable<M> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MailboxState {
                superstep: 0,
                boxes: HashMap::new(),
            }),
        }
    }

    pub(crate) fn read(&self) -> BspResult<RwLockReadGuard<'_, MailboxState<M>>> {
        self.state
            .read()
            .map_err(|_| BspError::Internal("mailbox table lock poisoned".to_string()))
    }

    pub(crate) fn write(&self) -> BspResult<RwLockWriteGuard<'_, MailboxState<M>>> {
        self.state
            .write()
            .map_err(|_| BspError::Internal("mailbox table lock poisoned".to_string()))
    }

    pub fn superstep(&self) -> BspResult<u64> {
        Ok(self.read()?.superstep)
    }

    pub fn deliver(&self, target_id: &str, msg: M) -> BspResult<()> {
        let state = self.read()?;
        state.mailbox(target_id)?.outgoing(state.superstep).enqueue(msg)
    }
}

impl<M> Default for MailboxTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MessageSink<M> {
    table: Arc<MailboxTable<M>>,
}

impl<M> Clone for MessageSink<M> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<M> MessageSink<M> {
    pub(crate) fn new(table: Arc<MailboxTable<M>>) -> Self {
        Self { table }
    }

    pub fn deliver(&self, target_id: &str, msg: M) -> BspResult<()> {
        self.table.deliver(target_id, msg)
    }
}
