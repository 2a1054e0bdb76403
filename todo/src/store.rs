//! Caller-owned todo store.
//!
//! [`TodoStore`] bundles the generic runtime store with the todo reducer,
//! its environment and the reply queue the reducer posts into.

use crate::config::TodoConfig;
use crate::error::TodoError;
use crate::msg::{Msg, MsgArgs};
use crate::reducer::{TodoAction, TodoEnvironment, TodoReducer};
use crate::reply::{Reply, ReplyQueue, STORE_REQ_ID};
use crate::types::TodoState;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use todo_store_core::environment::{Clock, SystemClock};
use todo_store_runtime::{EffectHandle, Store, StoreGuard};

/// The runtime store specialised for todos
pub type TodoRuntime = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

/// A todo store and the queue its replies land in
///
/// Clones share the same state and queue.
#[derive(Clone)]
pub struct TodoStore {
    store: TodoRuntime,
    replies: ReplyQueue,
    config: TodoConfig,
    next_req_id: Arc<AtomicU64>,
}

impl TodoStore {
    /// Creates an empty store
    ///
    /// Filter starts at `All`. If the config asks for auto-expiry, it is
    /// switched on with request id [`STORE_REQ_ID`] so the sweep starts.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if switching auto-expiry on is rejected.
    pub async fn create(config: TodoConfig) -> Result<Self, TodoError> {
        let state = TodoState::with_settings(config.initial_settings());
        Self::with_state(config, state, Arc::new(SystemClock)).await
    }

    /// Creates a store preloaded with demo todos
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if switching auto-expiry on is rejected.
    pub async fn create_with_samples(config: TodoConfig) -> Result<Self, TodoError> {
        let state = TodoState::with_sample_todos(config.initial_settings());
        Self::with_state(config, state, Arc::new(SystemClock)).await
    }

    /// Creates a store from an existing state and clock
    ///
    /// Auto-expiry requested either by `config` or by the state's own
    /// settings is (re)applied through a command so the sweep is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if switching auto-expiry on is rejected.
    pub async fn with_state(
        config: TodoConfig,
        mut state: TodoState,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TodoError> {
        let auto_expire = config.auto_expire || state.settings().auto_expire_completed_todos;
        state.set_auto_expire(false, clock.now_millis());

        let replies = ReplyQueue::with_capacity(config.reply_capacity);
        let env = TodoEnvironment::new(clock, Arc::new(replies.clone()))
            .with_expiry_tick(config.expiry_tick());
        let store = Store::with_config(state, TodoReducer::new(), env, config.store_config());

        let todo_store = Self {
            store,
            replies,
            config,
            next_req_id: Arc::new(AtomicU64::new(STORE_REQ_ID + 1)),
        };

        if auto_expire {
            todo_store
                .dispatch(STORE_REQ_ID, Msg::SetAutoExpireCompletedTodos(true))
                .await?;
        }

        tracing::info!(auto_expire, "Todo store created");
        Ok(todo_store)
    }

    /// Acquire exclusive access to the state
    ///
    /// Commands and sweeps wait until the guard is dropped. Dispatching on
    /// the same task while holding the guard never completes.
    pub async fn lock(&self) -> StoreGuard<TodoState> {
        self.store.lock().await
    }

    /// Try to acquire exclusive access without waiting
    #[must_use]
    pub fn try_lock(&self) -> Option<StoreGuard<TodoState>> {
        self.store.try_lock()
    }

    /// Applies `msg` on behalf of request `req_id`
    ///
    /// Returns once the state transition is done and its reply is queued.
    /// The handle tracks the expiry sweep a command may start.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self, msg), fields(tag = msg.tag()))]
    pub async fn dispatch(&self, req_id: u64, msg: Msg) -> Result<EffectHandle, TodoError> {
        Ok(self.store.send(TodoAction::command(req_id, msg)).await?)
    }

    /// Decodes a numeric tag with its arguments, then dispatches it
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Decode`] if the message is malformed and
    /// [`TodoError::Store`] if the store is shutting down.
    pub async fn dispatch_tagged(
        &self,
        req_id: u64,
        tag: u8,
        args: MsgArgs,
    ) -> Result<EffectHandle, TodoError> {
        let msg = Msg::decode(tag, args)?;
        self.dispatch(req_id, msg).await
    }

    /// Dispatches `msg` with a fresh request id and returns that id
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn send(&self, msg: Msg) -> Result<u64, TodoError> {
        let req_id = self.next_req_id();
        self.dispatch(req_id, msg).await?;
        Ok(req_id)
    }

    /// Dispatches `msg` and returns its reply
    ///
    /// Returns `None` if the reply was already taken off the queue or
    /// dropped because the queue was full.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn request(&self, msg: Msg) -> Result<Option<Reply>, TodoError> {
        let req_id = self.next_req_id();
        self.dispatch(req_id, msg).await?;
        Ok(self.replies.take(req_id))
    }

    /// Allocates a request id not handed out before by this store
    #[must_use]
    pub fn next_req_id(&self) -> u64 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The queue replies are posted to
    #[must_use]
    pub const fn replies(&self) -> &ReplyQueue {
        &self.replies
    }

    /// The configuration this store was created with
    #[must_use]
    pub const fn config(&self) -> &TodoConfig {
        &self.config
    }

    /// Clone of the current state
    pub async fn snapshot(&self) -> TodoState {
        self.store.state(Clone::clone).await
    }

    /// Subscribe to actions fed back by effects, sweeps included
    #[must_use]
    pub fn subscribe_actions(&self) -> tokio::sync::broadcast::Receiver<TodoAction> {
        self.store.subscribe_actions()
    }

    /// Stops accepting commands and waits for running effects
    ///
    /// A running expiry sweep ends at its next tick.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if effects are still running after the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), TodoError> {
        let timeout = Duration::from_secs(self.config.shutdown_timeout);
        Ok(self.store.shutdown(timeout).await?)
    }
}

impl std::fmt::Debug for TodoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoStore")
            .field("config", &self.config)
            .field("pending_replies", &self.replies.len())
            .finish_non_exhaustive()
    }
}
