//! Replies posted back to the caller.
//!
//! Every dispatched command produces one reply carrying the caller's request
//! id. The expiry sweep posts its own replies with request id
//! [`STORE_REQ_ID`].

use crate::types::TodoId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Request id used for replies the store raises on its own
pub const STORE_REQ_ID: u64 = 0;

/// Outcome of a command, or an event raised by the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// A todo was added
    AddedTodo {
        /// Request id of the command
        req_id: u64,
        /// Id assigned to the new todo, [`TodoId::NONE`] if ids ran out
        id: TodoId,
    },
    /// `RemoveTodo` was applied
    RemovedTodo {
        /// Request id of the command
        req_id: u64,
        /// Id the command targeted
        id: TodoId,
    },
    /// `RemoveCompleted` was applied
    RemovedCompleted {
        /// Request id of the command
        req_id: u64,
    },
    /// `CompleteTodo` was applied
    CompletedTodo {
        /// Request id of the command
        req_id: u64,
        /// Id the command targeted
        id: TodoId,
    },
    /// `RestartTodo` was applied
    RestartedTodo {
        /// Request id of the command
        req_id: u64,
        /// Id the command targeted
        id: TodoId,
    },
    /// `ToggleTodo` was applied
    ToggledTodo {
        /// Request id of the command
        req_id: u64,
        /// Id the command targeted
        id: TodoId,
    },
    /// `CompleteAll` was applied
    CompletedAll {
        /// Request id of the command
        req_id: u64,
    },
    /// `RestartAll` was applied
    RestartedAll {
        /// Request id of the command
        req_id: u64,
    },
    /// `SetFilter` was applied
    SetFilter {
        /// Request id of the command
        req_id: u64,
    },
    /// `SetAutoExpireCompletedTodos` was applied
    SetAutoExpireCompletedTodos {
        /// Request id of the command
        req_id: u64,
    },
    /// The sweep removed an expired todo
    CompletedTodoExpired(TodoId),
    /// A completed todo is still counting down
    Tick(TodoId),
}

impl Reply {
    /// Numeric kind code, used at the FFI boundary
    ///
    /// Command replies follow the message tag order (0..=9); store events
    /// come after.
    #[must_use]
    pub const fn kind(&self) -> u8 {
        match self {
            Self::AddedTodo { .. } => 0,
            Self::RemovedTodo { .. } => 1,
            Self::RemovedCompleted { .. } => 2,
            Self::CompletedTodo { .. } => 3,
            Self::RestartedTodo { .. } => 4,
            Self::ToggledTodo { .. } => 5,
            Self::CompletedAll { .. } => 6,
            Self::RestartedAll { .. } => 7,
            Self::SetFilter { .. } => 8,
            Self::SetAutoExpireCompletedTodos { .. } => 9,
            Self::CompletedTodoExpired(_) => 10,
            Self::Tick(_) => 11,
        }
    }

    /// Request id this reply answers
    #[must_use]
    pub const fn req_id(&self) -> u64 {
        match self {
            Self::AddedTodo { req_id, .. }
            | Self::RemovedTodo { req_id, .. }
            | Self::RemovedCompleted { req_id }
            | Self::CompletedTodo { req_id, .. }
            | Self::RestartedTodo { req_id, .. }
            | Self::ToggledTodo { req_id, .. }
            | Self::CompletedAll { req_id }
            | Self::RestartedAll { req_id }
            | Self::SetFilter { req_id }
            | Self::SetAutoExpireCompletedTodos { req_id } => *req_id,
            Self::CompletedTodoExpired(_) | Self::Tick(_) => STORE_REQ_ID,
        }
    }

    /// The todo this reply refers to, if any
    #[must_use]
    pub const fn todo_id(&self) -> Option<TodoId> {
        match self {
            Self::AddedTodo { id, .. }
            | Self::RemovedTodo { id, .. }
            | Self::CompletedTodo { id, .. }
            | Self::RestartedTodo { id, .. }
            | Self::ToggledTodo { id, .. }
            | Self::CompletedTodoExpired(id)
            | Self::Tick(id) => Some(*id),
            _ => None,
        }
    }

    /// String payload, the referenced todo id when there is one
    #[must_use]
    pub fn data(&self) -> Option<String> {
        self.todo_id().map(|id| id.to_string())
    }
}

/// Destination for replies
pub trait ReplySink: Send + Sync {
    /// Publishes a reply
    fn post(&self, reply: Reply);
}

/// In-process reply queue
///
/// Bounded: when full, the oldest reply is dropped to make room. Clones
/// share the same queue.
#[derive(Clone, Debug)]
pub struct ReplyQueue {
    inner: Arc<Mutex<VecDeque<Reply>>>,
    capacity: usize,
}

impl ReplyQueue {
    /// Default number of replies kept before the oldest are dropped
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates an empty queue with [`ReplyQueue::DEFAULT_CAPACITY`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty queue holding at most `capacity` replies
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes and returns the oldest reply
    #[must_use]
    pub fn poll(&self) -> Option<Reply> {
        self.queue().pop_front()
    }

    /// Removes and returns the oldest reply for `req_id`
    #[must_use]
    pub fn take(&self, req_id: u64) -> Option<Reply> {
        let mut queue = self.queue();
        let idx = queue.iter().position(|reply| reply.req_id() == req_id)?;
        queue.remove(idx)
    }

    /// Discards every queued reply for `req_id`, returning how many
    pub fn handled(&self, req_id: u64) -> usize {
        let mut queue = self.queue();
        let before = queue.len();
        queue.retain(|reply| reply.req_id() != req_id);
        before - queue.len()
    }

    /// Number of queued replies
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Removes and returns every queued reply, oldest first
    #[must_use]
    pub fn drain(&self) -> Vec<Reply> {
        self.queue().drain(..).collect()
    }
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySink for ReplyQueue {
    fn post(&self, reply: Reply) {
        let mut queue = self.queue();
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(kind = dropped.kind(), req_id = dropped.req_id(), "Reply queue full, dropped oldest reply");
                metrics::counter!("todo.replies.dropped").increment(1);
            }
        }
        tracing::trace!(kind = reply.kind(), req_id = reply.req_id(), "Posted reply");
        queue.push_back(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_request_ids() {
        let added = Reply::AddedTodo {
            req_id: 7,
            id: TodoId::new(3),
        };
        assert_eq!(added.kind(), 0);
        assert_eq!(added.req_id(), 7);
        assert_eq!(added.data().as_deref(), Some("3"));

        let all = Reply::CompletedAll { req_id: 2 };
        assert_eq!(all.kind(), 6);
        assert_eq!(all.data(), None);

        let tick = Reply::Tick(TodoId::new(5));
        assert_eq!(tick.kind(), 11);
        assert_eq!(tick.req_id(), STORE_REQ_ID);
        assert_eq!(Reply::CompletedTodoExpired(TodoId::new(5)).kind(), 10);
    }

    #[test]
    fn poll_is_fifo() {
        let queue = ReplyQueue::new();
        queue.post(Reply::SetFilter { req_id: 1 });
        queue.post(Reply::RestartedAll { req_id: 2 });

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.poll(), Some(Reply::SetFilter { req_id: 1 }));
        assert_eq!(queue.poll(), Some(Reply::RestartedAll { req_id: 2 }));
        assert_eq!(queue.poll(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn take_and_handled_select_by_request() {
        let queue = ReplyQueue::new();
        queue.post(Reply::Tick(TodoId::new(1)));
        queue.post(Reply::SetFilter { req_id: 4 });
        queue.post(Reply::Tick(TodoId::new(1)));

        assert_eq!(queue.take(4), Some(Reply::SetFilter { req_id: 4 }));
        assert_eq!(queue.take(4), None);
        assert_eq!(queue.handled(STORE_REQ_ID), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_oldest() {
        let queue = ReplyQueue::with_capacity(2);
        queue.post(Reply::CompletedAll { req_id: 1 });
        queue.post(Reply::CompletedAll { req_id: 2 });
        queue.post(Reply::CompletedAll { req_id: 3 });

        let ids: Vec<_> = queue.drain().iter().map(Reply::req_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn clones_share_queue() {
        let queue = ReplyQueue::new();
        let sink: Arc<dyn ReplySink> = Arc::new(queue.clone());
        sink.post(Reply::RemovedCompleted { req_id: 9 });
        assert_eq!(queue.poll(), Some(Reply::RemovedCompleted { req_id: 9 }));
    }
}
