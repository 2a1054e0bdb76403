//! Lock-guarded in-memory todo store driven by command messages.
//!
//! A store owns an ordered list of todos, a [`Filter`] selecting the visible
//! ones and [`Settings`] for auto-expiry of completed todos. Callers change
//! it only by dispatching [`Msg`] commands; each command answers with a
//! [`Reply`] on the store's [`ReplyQueue`]. Reads go through a scoped
//! [`StoreGuard`](todo_store_runtime::StoreGuard) from [`TodoStore::lock`].
//!
//! When auto-expiry is on, a sweep runs every few milliseconds, removes
//! completed todos whose expiry has passed and posts
//! [`Reply::CompletedTodoExpired`] for each.
//!
//! # Quick Start
//!
//! ```no_run
//! use todo_store::{Filter, Msg, TodoConfig, TodoId, TodoStore};
//!
//! # async fn example() -> Result<(), todo_store::TodoError> {
//! let store = TodoStore::create(TodoConfig::from_env()).await?;
//!
//! store.send(Msg::AddTodo("buy milk".to_string())).await?;
//! store.send(Msg::CompleteTodo(TodoId::new(1))).await?;
//! store.send(Msg::SetFilter(Filter::Completed)).await?;
//!
//! let guard = store.lock().await;
//! for todo in guard.filtered_todos() {
//!     println!("{todo}");
//! }
//! drop(guard);
//!
//! while let Some(reply) = store.replies().poll() {
//!     println!("reply {} for request {}", reply.kind(), reply.req_id());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod msg;
pub mod reducer;
pub mod reply;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::TodoConfig;
pub use error::TodoError;
pub use msg::{DecodeError, Msg, MsgArgs};
pub use reducer::{TodoAction, TodoEnvironment, TodoReducer};
pub use reply::{Reply, ReplyQueue, ReplySink, STORE_REQ_ID};
pub use store::{TodoRuntime, TodoStore};
pub use types::{Filter, Settings, Todo, TodoId, TodoState};

/// Installs a `tracing` subscriber honouring `RUST_LOG`
///
/// Falls back to `default_filter` when `RUST_LOG` is unset or invalid.
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
